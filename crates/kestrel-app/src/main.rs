//! kestrel shell entry point.
//!
//! `kestrel` starts the interactive loop on stdin. `kestrel -c "<line>"` runs
//! one line and exits with its exit code; add `--json` to print the result as
//! JSON. `--config=<path>` (or `KESTREL_CONFIG`) selects a TOML config file.

mod privilege;
mod shell;

use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context as _, Result};

use kestrel_terminal::{Arguments, CommandRegistry, register_builtins};
use kestrel_types::ShellConfig;

use shell::{Shell, Step};

const USAGE: &str = "\
usage: kestrel [--config=<path>] [-c <line> [--json]]

  -c <line>         run one command line and exit with its code
  --json            print the one-shot result as JSON
  --config=<path>   load settings from a TOML file (also KESTREL_CONFIG)
  -h, --help        show this message";

fn config_path(args: &Arguments) -> Option<PathBuf> {
    args.option("config")
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("KESTREL_CONFIG").map(PathBuf::from))
}

fn main() -> Result<()> {
    let args = Arguments::parse(std::env::args().skip(1));
    if args.has("help") || args.has("h") {
        println!("{USAGE}");
        return Ok(());
    }

    let config = match config_path(&args) {
        Some(path) => ShellConfig::load(&path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => ShellConfig::default(),
    };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&config.log_level))
        .init();

    let mut registry = CommandRegistry::new();
    register_builtins(&mut registry, &config)?;
    let elevated = privilege::is_elevated();
    log::debug!(
        "kestrel started: {} commands, elevated={elevated}",
        registry.len()
    );

    let mut shell = Shell::new(&registry, &config, elevated);

    let code = if let Some(line) = args.option("c") {
        match shell.eval(line) {
            Step::Exit(code) => code,
            Step::Continue(result) => {
                if args.flag("json") {
                    println!("{}", result.to_json()?);
                } else {
                    let text = result.render();
                    if !text.is_empty() {
                        println!("{text}");
                    }
                }
                result.exit_code
            },
        }
    } else if args.has("c") {
        anyhow::bail!("-c requires a command line\n{USAGE}");
    } else {
        let stdin = io::stdin();
        shell.run(stdin.lock(), io::stdout())?
    };

    io::stdout().flush()?;
    std::process::exit(code);
}
