//! # Azsql Configuration Crate
//!
//! Holds the process-wide settings needed to reach an Azure SQL database:
//! the server and database names plus the Entra ID credentials used for
//! client-credential token acquisition.
//!
//! Settings are read from the environment exactly once at startup and are
//! immutable for the lifetime of the process. They are carried as an explicit
//! `Settings` struct passed by reference into the other crates rather than as
//! module-level state, so every consumer's inputs are visible in its signature.

// Declare the modules that make up this crate.
pub mod error;
pub mod settings;

// Re-export the core types to provide a clean public API.
pub use error::ConfigError;
pub use settings::Settings;
