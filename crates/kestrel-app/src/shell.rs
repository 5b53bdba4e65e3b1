//! Interactive front end: prompt, shell built-ins and result printing.

use std::io::{self, BufRead, Write};

use kestrel_terminal::{
    CommandRegistry, CommandResult, Completer, Dispatcher, MatchKind, Policy, split_line,
};
use kestrel_types::{Context, ShellConfig};

/// Names handled by the shell itself rather than the registry.
const BUILTINS: &[(&str, &str)] = &[
    ("help", "List commands or show usage for one"),
    ("which", "Show what a command name refers to"),
    ("suggest", "Rank command names against a query"),
    ("complete", "Complete the last word of a partial line"),
    ("categories", "List categories or the commands in one"),
    ("history", "Show lines entered this session"),
    ("exit", "Leave the shell"),
    ("quit", "Leave the shell"),
];

/// Lines kept by `history`; the oldest is dropped first.
const MAX_HISTORY: usize = 100;

/// What the caller should do after one line.
#[derive(Debug, PartialEq)]
pub enum Step {
    Continue(CommandResult),
    Exit(i32),
}

pub struct Shell<'r> {
    registry: &'r CommandRegistry,
    dispatcher: Dispatcher<'r>,
    completer: Completer<'r>,
    prompt: String,
    history: Vec<String>,
    last_exit: i32,
}

impl<'r> Shell<'r> {
    pub fn new(registry: &'r CommandRegistry, config: &ShellConfig, elevated: bool) -> Self {
        Self {
            registry,
            dispatcher: Dispatcher::new(registry).with_policy(Policy::from_config(config, elevated)),
            completer: Completer::from_config(registry, config),
            prompt: config.prompt.clone(),
            history: Vec::new(),
            last_exit: 0,
        }
    }

    /// Exit code of the most recent line.
    pub fn last_exit(&self) -> i32 {
        self.last_exit
    }

    /// Evaluate one line: a shell built-in, or a dispatch through the
    /// registry.
    pub fn eval(&mut self, line: &str) -> Step {
        self.push_history(line.trim());

        let Some((name, args)) = split_line(line) else {
            return Step::Continue(CommandResult::default());
        };

        let result = match name {
            "exit" | "quit" => {
                let code = match args.positional(0).map(str::parse::<i32>) {
                    Some(Ok(code)) => code,
                    Some(Err(_)) => {
                        return self.finish(CommandResult::failure("usage: exit [code]"));
                    },
                    None => self.last_exit,
                };
                return Step::Exit(code);
            },
            "help" => self.help(args.positional(0)),
            "which" => self.which(args.positional(0)),
            "suggest" => self.suggest(&args.raw.join(" ")),
            "complete" => self.complete(line),
            "categories" => self.categories(args.positional(0)),
            "history" => CommandResult::ok(
                self.history
                    .iter()
                    .enumerate()
                    .map(|(i, l)| format!("{:>4}  {l}", i + 1))
                    .collect::<Vec<_>>()
                    .join("\n"),
            ),
            _ => self.dispatch(name, line),
        };
        self.finish(result)
    }

    fn push_history(&mut self, line: &str) {
        if line.is_empty() || self.history.last().is_some_and(|last| last == line) {
            return;
        }
        self.history.push(line.to_string());
        if self.history.len() > MAX_HISTORY {
            self.history.remove(0);
        }
    }

    fn finish(&mut self, result: CommandResult) -> Step {
        self.last_exit = result.exit_code;
        Step::Continue(result)
    }

    fn dispatch(&self, name: &str, line: &str) -> CommandResult {
        let result = self.dispatcher.dispatch(&Context::background(), line);
        if self.registry.contains(name) {
            return result;
        }
        match self.completer.did_you_mean(name) {
            Some(hint) => result.with_warning(format!("did you mean '{hint}'?")),
            None => result,
        }
    }

    fn help(&self, topic: Option<&str>) -> CommandResult {
        if let Some(name) = topic {
            if let Some((_, desc)) = BUILTINS.iter().find(|(n, _)| *n == name) {
                return CommandResult::ok(format!("{name} (shell)\n  {desc}"));
            }
            return match self.registry.get(name) {
                Ok(cmd) => CommandResult::ok(format!(
                    "{} ({})\n  {}\n  Usage: {}",
                    cmd.name(),
                    cmd.category(),
                    cmd.description(),
                    cmd.usage()
                )),
                Err(e) => CommandResult::from_error(&e),
            };
        }

        let total = self.registry.len() + BUILTINS.len();
        let mut out = format!("Commands ({total}):\n");
        for cat in self.registry.categories() {
            out.push_str(&format!("\n  [{cat}]\n"));
            for name in self.registry.commands_in(cat) {
                if let Ok(cmd) = self.registry.get(name) {
                    out.push_str(&format!("  {name:<12} {}\n", cmd.description()));
                }
            }
        }
        out.push_str("\n  [shell]\n");
        for (name, desc) in BUILTINS {
            out.push_str(&format!("  {name:<12} {desc}\n"));
        }
        CommandResult::ok(out)
    }

    fn which(&self, name: Option<&str>) -> CommandResult {
        let Some(name) = name else {
            return CommandResult::failure("usage: which <command>");
        };
        if BUILTINS.iter().any(|(n, _)| *n == name) {
            return CommandResult::ok(format!("{name}: shell built-in"));
        }
        match self.registry.get(name) {
            Ok(cmd) => CommandResult::ok(format!(
                "{}: {} ({})",
                cmd.name(),
                cmd.description(),
                cmd.category()
            )),
            Err(_) => CommandResult::failure(format!("{name}: not found")),
        }
    }

    fn suggest(&self, query: &str) -> CommandResult {
        if query.trim().is_empty() {
            return CommandResult::failure("usage: suggest <query>");
        }
        let lines: Vec<String> = self
            .completer
            .suggest(query)
            .into_iter()
            .map(|s| {
                let kind = match s.kind {
                    MatchKind::Exact => "exact",
                    MatchKind::Prefix => "prefix",
                    MatchKind::Substring => "substring",
                    MatchKind::Description => "description",
                    MatchKind::Similar => "similar",
                };
                format!("{:<12} {kind}", s.name)
            })
            .collect();
        CommandResult::ok(lines.join("\n"))
    }

    /// `complete <partial line>`; whatever follows the keyword, trailing
    /// whitespace included, is the line to complete.
    fn complete(&self, line: &str) -> CommandResult {
        let partial = line
            .trim_start()
            .strip_prefix("complete")
            .map(|rest| rest.strip_prefix(char::is_whitespace).unwrap_or(rest))
            .unwrap_or_default();
        CommandResult::ok(self.completer.complete(partial).join("\n"))
    }

    fn categories(&self, name: Option<&str>) -> CommandResult {
        match name {
            None => CommandResult::ok(self.completer.categories().join("\n")),
            Some(cat) => {
                let cmds = self.completer.browse(cat);
                if cmds.is_empty() {
                    CommandResult::failure(format!("no commands in category '{cat}'"))
                } else {
                    CommandResult::ok(cmds.join("\n"))
                }
            },
        }
    }

    /// Read-eval-print loop over `input` until EOF or `exit`.
    ///
    /// Invalid UTF-8 is replaced rather than ending the session. Returns the
    /// exit code for the process.
    pub fn run<R: BufRead, W: Write>(&mut self, mut input: R, mut out: W) -> io::Result<i32> {
        let mut buf = Vec::new();
        loop {
            write!(out, "{}", self.prompt)?;
            out.flush()?;
            buf.clear();
            if input.read_until(b'\n', &mut buf)? == 0 {
                writeln!(out)?;
                return Ok(self.last_exit);
            }
            let line = String::from_utf8_lossy(&buf);
            match self.eval(line.trim_end_matches(['\n', '\r'])) {
                Step::Exit(code) => return Ok(code),
                Step::Continue(result) => {
                    let text = result.render();
                    if !text.is_empty() {
                        writeln!(out, "{text}")?;
                    }
                },
            }
        }
    }
}
