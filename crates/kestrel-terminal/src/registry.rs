//! Name-keyed command registry.

use std::collections::{BTreeSet, HashMap};

use kestrel_types::{Result, ShellError};

use crate::command::Command;

/// Registry of available commands.
///
/// Filled once at startup and read-only afterwards, so it can be shared by
/// plain reference without locking.
#[derive(Default)]
pub struct CommandRegistry {
    commands: HashMap<String, Box<dyn Command>>,
}

impl CommandRegistry {
    /// Create an empty command registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a command. Fails if the name is taken; the existing entry is
    /// kept.
    pub fn register(&mut self, cmd: Box<dyn Command>) -> Result<()> {
        let name = cmd.name().to_string();
        if self.commands.contains_key(&name) {
            return Err(ShellError::DuplicateCommand(name));
        }
        log::trace!("registered command '{name}'");
        self.commands.insert(name, cmd);
        Ok(())
    }

    /// Look up a command by exact (case-sensitive) name.
    pub fn get(&self, name: &str) -> Result<&dyn Command> {
        self.commands
            .get(name)
            .map(|c| c.as_ref())
            .ok_or_else(|| ShellError::CommandNotFound(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.commands.contains_key(name)
    }

    /// All registered names, in no particular order.
    pub fn list(&self) -> Vec<&str> {
        self.commands.keys().map(String::as_str).collect()
    }

    /// Return a sorted list of (name, description) pairs.
    pub fn list_commands(&self) -> Vec<(&str, &str)> {
        let mut cmds: Vec<(&str, &str)> = self
            .commands
            .values()
            .map(|c| (c.name(), c.description()))
            .collect();
        cmds.sort_by_key(|(name, _)| *name);
        cmds
    }

    /// Sorted names of commands in `category`.
    pub fn commands_in(&self, category: &str) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .commands
            .values()
            .filter(|c| c.category() == category)
            .map(|c| c.name())
            .collect();
        names.sort_unstable();
        names
    }

    /// Sorted, distinct categories of registered commands.
    pub fn categories(&self) -> Vec<&str> {
        self.commands
            .values()
            .map(|c| c.category())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn Command> {
        self.commands.values().map(|c| c.as_ref())
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

impl std::fmt::Debug for CommandRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names = self.list();
        names.sort_unstable();
        f.debug_struct("CommandRegistry")
            .field("commands", &names)
            .finish()
    }
}
