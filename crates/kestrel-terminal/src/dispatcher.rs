//! Dispatcher: turns one input line into one [`CommandResult`].
//!
//! Each invocation walks `Received → Tokenized → Resolved → Validated →
//! Executing` and ends in exactly one of `Completed` or `Failed`. Lookup,
//! requirement and validation failures are terminal and skip execution.
//! Nothing escapes as a panic: faults inside a command are caught and turned
//! into a failed result.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::time::{Duration, Instant};

use kestrel_types::{Context, Platform, Result, ShellConfig, ShellError};

use crate::args::Arguments;
use crate::command::{Command, CommandResult};
use crate::registry::CommandRegistry;

/// Lifecycle stage of a single dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Received,
    Tokenized,
    Resolved,
    Validated,
    Executing,
    Completed,
    Failed,
}

/// Requirement enforcement and time-boxing applied by the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Policy {
    /// Reject commands that do not list `platform`.
    pub enforce_platform: bool,
    /// Reject commands that need elevation when `elevated` is false.
    pub enforce_elevation: bool,
    /// Whether the session runs with elevated privileges.
    pub elevated: bool,
    pub platform: Platform,
    /// Deadline applied to each command's context.
    pub command_timeout: Option<Duration>,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            enforce_platform: false,
            enforce_elevation: false,
            elevated: false,
            platform: Platform::current(),
            command_timeout: None,
        }
    }
}

impl Policy {
    pub fn from_config(config: &ShellConfig, elevated: bool) -> Self {
        Self {
            enforce_platform: config.enforce_platform,
            enforce_elevation: config.enforce_elevation,
            elevated,
            platform: Platform::current(),
            command_timeout: config.command_timeout(),
        }
    }
}

/// Split a line on whitespace into the command name and its arguments.
///
/// `None` for a blank line.
pub fn split_line(line: &str) -> Option<(&str, Arguments)> {
    let mut tokens = line.split_whitespace();
    let name = tokens.next()?;
    Some((name, Arguments::parse(tokens)))
}

pub struct Dispatcher<'r> {
    registry: &'r CommandRegistry,
    policy: Policy,
}

impl<'r> Dispatcher<'r> {
    pub fn new(registry: &'r CommandRegistry) -> Self {
        Self {
            registry,
            policy: Policy::default(),
        }
    }

    pub fn with_policy(mut self, policy: Policy) -> Self {
        self.policy = policy;
        self
    }

    pub fn registry(&self) -> &'r CommandRegistry {
        self.registry
    }

    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    /// Dispatch one line.
    pub fn dispatch(&self, ctx: &Context, line: &str) -> CommandResult {
        self.dispatch_traced(ctx, line).0
    }

    /// Dispatch one line, also returning every stage the invocation passed
    /// through.
    pub fn dispatch_traced(&self, ctx: &Context, line: &str) -> (CommandResult, Vec<Stage>) {
        let mut trace = Vec::with_capacity(7);
        let result = self.run(ctx, line, &mut trace);
        match trace.last() {
            Some(Stage::Failed) => log::debug!(
                "'{}' failed (exit {}): {}",
                line.trim(),
                result.exit_code,
                result.error.as_deref().unwrap_or("nonzero exit")
            ),
            _ => log::debug!("'{}' completed in {:?}", line.trim(), result.duration),
        }
        (result, trace)
    }

    fn run(&self, ctx: &Context, line: &str, trace: &mut Vec<Stage>) -> CommandResult {
        advance(trace, Stage::Received);

        let Some((name, args)) = split_line(line) else {
            advance(trace, Stage::Completed);
            return CommandResult::default();
        };
        advance(trace, Stage::Tokenized);

        let cmd = match self.registry.get(name) {
            Ok(cmd) => cmd,
            Err(e) => return fail(trace, &e),
        };
        advance(trace, Stage::Resolved);

        if let Err(e) = self.check_requirements(cmd) {
            return fail(trace, &e);
        }
        if let Err(e) = guarded(name, || cmd.validate(&args)) {
            return fail(trace, &e);
        }
        advance(trace, Stage::Validated);

        let exec_ctx = match self.policy.command_timeout {
            Some(limit) => ctx.child_with_timeout(limit),
            None => ctx.child(),
        };
        advance(trace, Stage::Executing);
        let start = Instant::now();
        let outcome = guarded(name, || cmd.execute(&exec_ctx, args));
        let elapsed = start.elapsed();

        let mut result = match outcome {
            Ok(mut res) => {
                if res.error.is_some() && res.exit_code == 0 {
                    res.exit_code = 1;
                }
                res
            },
            Err(e) => CommandResult::from_error(&e),
        };
        result.duration = elapsed;
        advance(
            trace,
            if result.is_success() {
                Stage::Completed
            } else {
                Stage::Failed
            },
        );
        result
    }

    fn check_requirements(&self, cmd: &dyn Command) -> Result<()> {
        let policy = &self.policy;
        if policy.enforce_platform && !cmd.supported_platforms().contains(&policy.platform) {
            return Err(ShellError::Unsupported(format!(
                "{} is not available on {}",
                cmd.name(),
                policy.platform
            )));
        }
        if policy.enforce_elevation && cmd.requires_elevation() && !policy.elevated {
            return Err(ShellError::Unsupported(format!(
                "{} requires elevated privileges",
                cmd.name()
            )));
        }
        Ok(())
    }
}

fn advance(trace: &mut Vec<Stage>, stage: Stage) {
    log::trace!("dispatch stage: {stage:?}");
    trace.push(stage);
}

fn fail(trace: &mut Vec<Stage>, err: &ShellError) -> CommandResult {
    advance(trace, Stage::Failed);
    CommandResult::from_error(err)
}

/// Run `f`, converting a panic into an execution error.
///
/// The process panic hook still runs first, so a caught panic is also
/// printed to stderr. Built-in commands reject bad input in `validate`
/// and are not expected to get here.
fn guarded<T>(name: &str, f: impl FnOnce() -> Result<T>) -> Result<T> {
    panic::catch_unwind(AssertUnwindSafe(f)).unwrap_or_else(|payload| {
        Err(ShellError::Execution(format!(
            "{name}: command panicked: {}",
            panic_message(payload.as_ref())
        )))
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic"
    }
}
