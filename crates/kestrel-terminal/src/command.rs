//! The command contract and the result every command returns.

use std::time::Duration;

use serde::{Serialize, Serializer};

use kestrel_types::{Context, Platform, Result, ShellError};

use crate::args::Arguments;

/// Static metadata shared by every command.
///
/// Commands embed one of these and return it from [`Command::info`]; the
/// trait's accessor methods read from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandInfo {
    pub name: &'static str,
    pub description: &'static str,
    pub usage: &'static str,
    pub category: &'static str,
    pub platforms: &'static [Platform],
    pub requires_elevation: bool,
}

impl CommandInfo {
    /// Metadata for a general, unprivileged, cross-platform command.
    pub const fn new(name: &'static str, description: &'static str, usage: &'static str) -> Self {
        Self {
            name,
            description,
            usage,
            category: "general",
            platforms: Platform::ALL,
            requires_elevation: false,
        }
    }

    pub const fn category(mut self, category: &'static str) -> Self {
        self.category = category;
        self
    }

    pub const fn platforms(mut self, platforms: &'static [Platform]) -> Self {
        self.platforms = platforms;
        self
    }

    pub const fn elevated(mut self) -> Self {
        self.requires_elevation = true;
        self
    }

    pub fn supports(&self, platform: Platform) -> bool {
        self.platforms.contains(&platform)
    }
}

/// A single executable command.
///
/// Commands are built once at startup and shared read-only for the life of
/// the process, hence `Send + Sync`.
pub trait Command: Send + Sync {
    fn info(&self) -> &CommandInfo;

    /// The command name (what the user types).
    fn name(&self) -> &str {
        self.info().name
    }

    /// One-line description for `help`.
    fn description(&self) -> &str {
        self.info().description
    }

    /// Usage string (e.g. "ls \[path\]").
    fn usage(&self) -> &str {
        self.info().usage
    }

    /// Category for grouping in `help` output and category browsing.
    fn category(&self) -> &str {
        self.info().category
    }

    fn supported_platforms(&self) -> &[Platform] {
        self.info().platforms
    }

    fn requires_elevation(&self) -> bool {
        self.info().requires_elevation
    }

    /// Check preconditions before execution. Accepts everything by default.
    fn validate(&self, _args: &Arguments) -> Result<()> {
        Ok(())
    }

    /// Run the command. Long-running commands should poll `ctx`.
    fn execute(&self, ctx: &Context, args: Arguments) -> Result<CommandResult>;
}

/// Outcome of one command invocation.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CommandResult {
    pub output: String,
    pub error: Option<String>,
    /// 0 on success.
    pub exit_code: i32,
    #[serde(rename = "duration_ms", serialize_with = "as_millis")]
    pub duration: Duration,
    /// Approximate bytes used by the command, when it knows.
    pub memory_usage: Option<u64>,
    pub warnings: Vec<String>,
}

fn as_millis<S: Serializer>(d: &Duration, s: S) -> std::result::Result<S::Ok, S::Error> {
    s.serialize_f64(d.as_secs_f64() * 1000.0)
}

impl CommandResult {
    /// Successful result with `output`.
    pub fn ok(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            ..Self::default()
        }
    }

    /// Failed result (exit code 1) carrying `error`.
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            exit_code: 1,
            ..Self::default()
        }
    }

    /// Failed result for `err`, using the error's own exit code.
    pub fn from_error(err: &ShellError) -> Self {
        Self {
            error: Some(err.to_string()),
            exit_code: err.exit_code(),
            ..Self::default()
        }
    }

    pub fn with_output(mut self, output: impl Into<String>) -> Self {
        self.output = output.into();
        self
    }

    pub fn with_exit_code(mut self, code: i32) -> Self {
        self.exit_code = code;
        self
    }

    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warnings.push(warning.into());
        self
    }

    pub fn with_memory_usage(mut self, bytes: u64) -> Self {
        self.memory_usage = Some(bytes);
        self
    }

    pub fn is_success(&self) -> bool {
        self.exit_code == 0
    }

    /// Human-readable rendering: output, then warnings, then the error.
    pub fn render(&self) -> String {
        let mut lines: Vec<String> = Vec::new();
        if !self.output.is_empty() {
            lines.push(self.output.trim_end().to_string());
        }
        for w in &self.warnings {
            lines.push(format!("warning: {w}"));
        }
        if let Some(err) = &self.error {
            lines.push(format!("error: {err}"));
        }
        lines.join("\n")
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
