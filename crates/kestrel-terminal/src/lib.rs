//! Command dispatch for the kestrel shell.
//!
//! Commands implement the [`Command`] trait and are registered by name in a
//! [`CommandRegistry`]. The [`Dispatcher`] turns an input line into a
//! [`CommandResult`]: it parses arguments, resolves the command name, runs
//! `validate()` and then `execute()`. The [`Completer`] ranks command names
//! against partial input for suggestions and tab completion.

pub mod args;
pub mod command;
mod commands;
pub mod completion;
pub mod dispatcher;
pub mod file_commands;
pub mod network_commands;
pub mod registry;
pub mod system_commands;

/// Structured arguments of one invocation.
pub use args::{ArgValue, Arguments};
/// The command contract, its metadata and its outcome.
pub use command::{Command, CommandInfo, CommandResult};
/// Register all built-in commands (file, network, system) into a registry.
pub use commands::register_builtins;
/// Fuzzy lookup and line completion.
pub use completion::{Completer, CompletionIndex, MatchKind, Suggestion, is_similar};
/// Line dispatch and its lifecycle.
pub use dispatcher::{Dispatcher, Policy, Stage, split_line};
/// Register file commands (ls, pwd, cat) into a registry.
pub use file_commands::register_file_commands;
/// Register network commands (ping, resolve, portscan) into a registry.
pub use network_commands::register_network_commands;
/// Registry of available commands.
pub use registry::CommandRegistry;
/// Register system commands (whoami, hostname, sysinfo, sleep) into a registry.
pub use system_commands::register_system_commands;
