//! # Azsql Identity Crate
//!
//! Acquires short-lived access tokens for Azure SQL from the Microsoft
//! identity platform using the OAuth2 client-credential flow, and knows how
//! to re-encode a token into the pre-login attribute format that SQL Server
//! drivers accept in place of a username and password.
//!
//! Tokens are deliberately never cached: the database crate requests a fresh
//! one for every connection attempt, so an expiring token can never be handed
//! to the driver.
//!
//! ## Public API
//!
//! - `TokenProvider`: the abstract interface for anything that can produce
//!   an access token, allowing the real client to be swapped for a stub in
//!   tests.
//! - `EntraIdClient`: the concrete client-credential implementation.
//! - `AccessToken`: the opaque token plus its driver-attribute encoding.
//! - `IdentityError`: the specific error types returned by this crate.

mod client;
pub mod error;
pub mod token;

// --- Public API ---
pub use client::{EntraIdClient, TokenProvider};
pub use error::IdentityError;
pub use token::{AccessToken, SQL_COPT_SS_ACCESS_TOKEN};
