//! # Azsql Database Crate
//!
//! This crate is the connection manager for an Azure SQL database reached
//! with token-based authentication. It is responsible for:
//!
//! - acquiring a fresh access token per connection attempt (via the
//!   `identity` crate) and opening a TDS session with bounded retry on
//!   login timeouts,
//! - running a single auto-committed statement end-to-end with the session
//!   lifecycle fully owned by the call (`SqlManager::perform`),
//! - running several statements as one caller-owned transaction with
//!   rollback on failure (`SqlTransaction`),
//! - marshalling fetched rows and column names into a `Table`.
//!
//! ## Error signaling
//!
//! The two executors deliberately differ. `perform` never returns `Err`:
//! every failure becomes `Outcome::Failed` so callers branch on data. The
//! transactional path instead propagates errors after rolling back, aborting
//! the whole call chain. Callers choosing between them are choosing an error
//! model as much as a commit scope.

// Declare the modules that constitute this crate.
pub mod connection;
pub mod error;
pub mod executor;
pub mod session;
pub mod table;
pub mod value;

// Re-export the key components to create a clean, public-facing API.
pub use connection::{connect_with_retry, odbc_connection_string, Connector, RetryPolicy, TdsConnector};
pub use error::DbError;
pub use executor::{Fetch, Outcome, SqlManager, SqlTransaction};
pub use session::{Session, TdsSession};
pub use table::Table;
pub use value::{Params, Value};
