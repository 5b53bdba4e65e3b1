//! Foundation types for the kestrel shell.
//!
//! Shared by every kestrel crate: the error taxonomy, TOML configuration,
//! the cancellation context handed to commands, and platform identifiers.

pub mod config;
pub mod context;
pub mod error;
pub mod platform;

pub use config::{ScanConfig, ShellConfig};
pub use context::Context;
pub use error::{Result, ShellError};
pub use platform::Platform;
