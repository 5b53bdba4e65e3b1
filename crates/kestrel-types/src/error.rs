//! Error types for the kestrel shell.

use std::io;

/// Errors produced while dispatching and running shell commands.
#[derive(Debug, thiserror::Error)]
pub enum ShellError {
    #[error("command not found: {0}")]
    CommandNotFound(String),

    #[error("command already registered: {0}")]
    DuplicateCommand(String),

    #[error("invalid arguments: {0}")]
    Validation(String),

    #[error("{0}")]
    Execution(String),

    #[error("unsupported: {0}")]
    Unsupported(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("{message}")]
    Exit { code: i32, message: String },

    #[error("config error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ShellError {
    /// Process exit code reported for this error.
    ///
    /// Every failure maps to 1 except [`ShellError::Exit`], which carries the
    /// command's own nonzero code.
    pub fn exit_code(&self) -> i32 {
        match self {
            ShellError::Exit { code, .. } if *code != 0 => *code,
            _ => 1,
        }
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, ShellError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_display() {
        let e = ShellError::CommandNotFound("pnig".into());
        assert_eq!(format!("{e}"), "command not found: pnig");
    }

    #[test]
    fn duplicate_display() {
        let e = ShellError::DuplicateCommand("ls".into());
        assert_eq!(format!("{e}"), "command already registered: ls");
    }

    #[test]
    fn validation_display() {
        let e = ShellError::Validation("missing host".into());
        assert_eq!(format!("{e}"), "invalid arguments: missing host");
    }

    #[test]
    fn execution_display_is_bare_message() {
        let e = ShellError::Execution("connection refused".into());
        assert_eq!(format!("{e}"), "connection refused");
    }

    #[test]
    fn exit_code_defaults_to_one() {
        assert_eq!(ShellError::Cancelled.exit_code(), 1);
        assert_eq!(ShellError::Validation("x".into()).exit_code(), 1);
        assert_eq!(ShellError::Config("x".into()).exit_code(), 1);
    }

    #[test]
    fn exit_variant_keeps_its_code() {
        let e = ShellError::Exit {
            code: 3,
            message: "partial failure".into(),
        };
        assert_eq!(e.exit_code(), 3);
        assert_eq!(format!("{e}"), "partial failure");
    }

    #[test]
    fn exit_variant_with_zero_code_is_forced_to_one() {
        let e = ShellError::Exit {
            code: 0,
            message: "bogus".into(),
        };
        assert_eq!(e.exit_code(), 1);
    }

    #[test]
    fn io_error_from_conversion() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "gone");
        let e: ShellError = io_err.into();
        let msg = format!("{e}");
        assert!(msg.contains("I/O error"));
        assert!(msg.contains("gone"));
    }

    #[test]
    fn toml_error_from_conversion() {
        let toml_err = toml::from_str::<toml::Value>("this is [[[not valid toml").unwrap_err();
        let e: ShellError = toml_err.into();
        assert!(format!("{e}").contains("TOML parse error"));
    }

    #[test]
    fn json_error_from_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("not json").unwrap_err();
        let e: ShellError = json_err.into();
        assert!(format!("{e}").contains("JSON error"));
    }
}
