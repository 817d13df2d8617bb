//! HealthDB Common Library
//!
//! Shared pieces used by every HealthDB workspace member:
//!
//! - **Error Handling**: the common error type and result alias
//! - **Configuration**: where the SQLite store lives and how it is opened
//! - **Logging**: `tracing` subscriber setup driven by environment variables
//!
//! # Example
//!
//! ```no_run
//! use healthdb_common::config::StoreConfig;
//! use healthdb_common::logging::{init_logging, LogConfig};
//!
//! fn main() -> anyhow::Result<()> {
//!     let _guard = init_logging(&LogConfig::from_env()?)?;
//!     let store = StoreConfig::from_env()?;
//!     tracing::info!(path = %store.path.display(), "Using store");
//!     Ok(())
//! }
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod config;
pub mod error;
pub mod logging;

// Re-export commonly used types
pub use error::{Error, Result};
