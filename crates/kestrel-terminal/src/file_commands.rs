//! File commands: ls, pwd, cat.

use std::fs;
use std::path::{Path, PathBuf};

use kestrel_types::{Context, Result, ShellError};

use crate::args::Arguments;
use crate::command::{Command, CommandInfo, CommandResult};
use crate::registry::CommandRegistry;

/// `ls -l /tmp` parses as option `l = "/tmp"`. Recover the path for
/// commands whose short switches never take a value.
fn switch_target<'a>(args: &'a Arguments, switches: &[&str]) -> Option<&'a str> {
    args.positional(0).or_else(|| args.option_any(switches))
}

fn switch_set(args: &Arguments, short: &str, long: &str) -> bool {
    args.has(short) || args.flag(long)
}

fn io_error(path: &Path, e: std::io::Error) -> ShellError {
    ShellError::Execution(format!("{}: {e}", path.display()))
}

// ---------------------------------------------------------------------------
// ls
// ---------------------------------------------------------------------------

struct LsCmd;
const LS: CommandInfo = CommandInfo::new("ls", "List directory contents", "ls [-a] [-l] [path]")
    .category("file");

impl Command for LsCmd {
    fn info(&self) -> &CommandInfo {
        &LS
    }
    fn execute(&self, _ctx: &Context, args: Arguments) -> Result<CommandResult> {
        let all = switch_set(&args, "a", "all");
        let long = switch_set(&args, "l", "long");
        let dir = PathBuf::from(switch_target(&args, &["l", "a"]).unwrap_or("."));

        let mut entries: Vec<(String, fs::Metadata)> = Vec::new();
        for entry in fs::read_dir(&dir).map_err(|e| io_error(&dir, e))? {
            let entry = entry.map_err(|e| io_error(&dir, e))?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if !all && name.starts_with('.') {
                continue;
            }
            let meta = entry.metadata().map_err(|e| io_error(&entry.path(), e))?;
            entries.push((name, meta));
        }
        entries.sort_by(|a, b| a.0.cmp(&b.0));

        let lines: Vec<String> = entries
            .iter()
            .map(|(name, meta)| {
                let suffix = if meta.is_dir() { "/" } else { "" };
                if long {
                    let kind = if meta.is_dir() { 'd' } else { '-' };
                    format!("{kind} {:>10}  {name}{suffix}", meta.len())
                } else {
                    format!("{name}{suffix}")
                }
            })
            .collect();
        Ok(CommandResult::ok(lines.join("\n")))
    }
}

// ---------------------------------------------------------------------------
// pwd
// ---------------------------------------------------------------------------

struct PwdCmd;
const PWD: CommandInfo =
    CommandInfo::new("pwd", "Print working directory", "pwd").category("file");

impl Command for PwdCmd {
    fn info(&self) -> &CommandInfo {
        &PWD
    }
    fn execute(&self, _ctx: &Context, _args: Arguments) -> Result<CommandResult> {
        let cwd = std::env::current_dir()?;
        Ok(CommandResult::ok(cwd.display().to_string()))
    }
}

// ---------------------------------------------------------------------------
// cat
// ---------------------------------------------------------------------------

struct CatCmd;
const CAT: CommandInfo =
    CommandInfo::new(
    "cat",
    "Print file contents (-n goes before the files)",
    "cat [-n] <file...>",
).category("file");

impl CatCmd {
    /// Files to print. `-n file` swallows the first one, so `-n` has to
    /// come before the file names for them to print in line order.
    fn files(args: &Arguments) -> Vec<&str> {
        args.option("n")
            .into_iter()
            .chain(args.raw.iter().map(String::as_str))
            .collect()
    }
}

impl Command for CatCmd {
    fn info(&self) -> &CommandInfo {
        &CAT
    }
    fn validate(&self, args: &Arguments) -> Result<()> {
        if Self::files(args).is_empty() {
            return Err(ShellError::Validation("usage: cat [-n] <file...>".into()));
        }
        Ok(())
    }
    fn execute(&self, ctx: &Context, args: Arguments) -> Result<CommandResult> {
        let number = args.has("n");
        let mut out = String::new();
        let mut bytes = 0u64;
        let mut line_no = 0usize;

        for file in Self::files(&args) {
            ctx.check()?;
            let path = Path::new(file);
            let text = fs::read_to_string(path).map_err(|e| io_error(path, e))?;
            bytes += text.len() as u64;
            if number {
                for line in text.lines() {
                    line_no += 1;
                    out.push_str(&format!("{line_no:>6}  {line}\n"));
                }
            } else {
                out.push_str(&text);
            }
        }
        Ok(CommandResult::ok(out).with_memory_usage(bytes))
    }
}

/// Register file commands.
pub fn register_file_commands(reg: &mut CommandRegistry) -> Result<()> {
    reg.register(Box::new(LsCmd))?;
    reg.register(Box::new(PwdCmd))?;
    reg.register(Box::new(CatCmd))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatcher::Dispatcher;

    fn exec(line: &str) -> CommandResult {
        let mut reg = CommandRegistry::new();
        register_file_commands(&mut reg).unwrap();
        Dispatcher::new(&reg).dispatch(&Context::background(), line)
    }

    fn fixture() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.txt"), "beta\n").unwrap();
        fs::write(dir.path().join("a.txt"), "alpha\nsecond\n").unwrap();
        fs::write(dir.path().join(".hidden"), "").unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        dir
    }

    #[test]
    fn ls_sorted_without_hidden() {
        let dir = fixture();
        let res = exec(&format!("ls {}", dir.path().display()));
        assert_eq!(res.exit_code, 0);
        assert_eq!(res.output, "a.txt\nb.txt\nsub/");
    }

    #[test]
    fn ls_all_shows_hidden() {
        let dir = fixture();
        let res = exec(&format!("ls --all {}", dir.path().display()));
        assert!(res.output.starts_with(".hidden\n"));
    }

    #[test]
    fn ls_short_switch_before_path() {
        let dir = fixture();
        let res = exec(&format!("ls -l {}", dir.path().display()));
        assert_eq!(res.exit_code, 0);
        let lines: Vec<&str> = res.output.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with('-'));
        assert!(lines[0].ends_with("a.txt"));
        assert!(lines[2].starts_with('d'));
    }

    #[test]
    fn ls_missing_dir_fails() {
        let dir = fixture();
        let res = exec(&format!("ls {}", dir.path().join("nope").display()));
        assert_eq!(res.exit_code, 1);
        assert!(res.error.is_some());
    }

    #[test]
    fn pwd_prints_cwd() {
        let res = exec("pwd");
        let cwd = std::env::current_dir().unwrap();
        assert_eq!(res.output, cwd.display().to_string());
    }

    #[test]
    fn cat_concatenates() {
        let dir = fixture();
        let a = dir.path().join("a.txt");
        let b = dir.path().join("b.txt");
        let res = exec(&format!("cat {} {}", a.display(), b.display()));
        assert_eq!(res.output, "alpha\nsecond\nbeta\n");
        assert_eq!(res.memory_usage, Some(18));
    }

    #[test]
    fn cat_numbered() {
        let dir = fixture();
        let res = exec(&format!("cat -n {}", dir.path().join("a.txt").display()));
        assert_eq!(res.output, "     1  alpha\n     2  second\n");
    }

    #[test]
    fn cat_numbered_keeps_file_order() {
        let dir = fixture();
        let a = dir.path().join("a.txt");
        let b = dir.path().join("b.txt");
        let res = exec(&format!("cat -n {} {}", a.display(), b.display()));
        assert_eq!(res.output, "     1  alpha\n     2  second\n     3  beta\n");
    }

    #[test]
    fn cat_requires_file() {
        let res = exec("cat");
        assert_eq!(res.exit_code, 1);
        assert!(res.error.as_deref().unwrap().contains("usage"));
    }

    #[test]
    fn cat_missing_file() {
        let dir = fixture();
        let res = exec(&format!("cat {}", dir.path().join("missing").display()));
        assert_eq!(res.exit_code, 1);
    }
}
