//! Built-in command set for the kestrel shell.

use kestrel_types::{Result, ShellConfig};

use crate::registry::CommandRegistry;

/// Register all built-in commands (file, network, system) into a registry.
///
/// Fails only if a name is already taken, e.g. when called twice on the same
/// registry.
pub fn register_builtins(reg: &mut CommandRegistry, config: &ShellConfig) -> Result<()> {
    crate::register_file_commands(reg)?;
    crate::register_network_commands(reg, &config.scan)?;
    crate::register_system_commands(reg)?;
    log::debug!("registered {} built-in commands", reg.len());
    Ok(())
}
