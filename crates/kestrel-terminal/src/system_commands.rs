//! System commands: whoami, hostname, sysinfo, sleep.

use std::time::Duration;

use kestrel_types::{Context, Platform, Result, ShellError};

use crate::args::Arguments;
use crate::command::{Command, CommandInfo, CommandResult};
use crate::registry::CommandRegistry;

fn env_var(keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|k| std::env::var(k).ok())
        .find(|v| !v.trim().is_empty())
}

// ---------------------------------------------------------------------------
// whoami
// ---------------------------------------------------------------------------

struct WhoamiCmd;
const WHOAMI: CommandInfo =
    CommandInfo::new("whoami", "Print current user name", "whoami").category("system");

impl Command for WhoamiCmd {
    fn info(&self) -> &CommandInfo {
        &WHOAMI
    }
    fn execute(&self, _ctx: &Context, _args: Arguments) -> Result<CommandResult> {
        let user = env_var(&["USER", "USERNAME", "LOGNAME"])
            .ok_or_else(|| ShellError::Execution("cannot determine current user".into()))?;
        Ok(CommandResult::ok(user))
    }
}

// ---------------------------------------------------------------------------
// hostname
// ---------------------------------------------------------------------------

struct HostnameCmd;
const HOSTNAME: CommandInfo =
    CommandInfo::new("hostname", "Print system hostname", "hostname").category("system");

fn read_hostname() -> Option<String> {
    if let Some(name) = env_var(&["HOSTNAME", "COMPUTERNAME"]) {
        return Some(name);
    }
    ["/proc/sys/kernel/hostname", "/etc/hostname"]
        .iter()
        .filter_map(|p| std::fs::read_to_string(p).ok())
        .map(|s| s.trim().to_string())
        .find(|s| !s.is_empty())
}

impl Command for HostnameCmd {
    fn info(&self) -> &CommandInfo {
        &HOSTNAME
    }
    fn execute(&self, _ctx: &Context, _args: Arguments) -> Result<CommandResult> {
        let name = read_hostname()
            .ok_or_else(|| ShellError::Execution("cannot determine hostname".into()))?;
        Ok(CommandResult::ok(name))
    }
}

// ---------------------------------------------------------------------------
// sysinfo
// ---------------------------------------------------------------------------

struct SysinfoCmd;
const SYSINFO: CommandInfo = CommandInfo::new(
    "sysinfo",
    "Show operating system, CPU and memory information",
    "sysinfo [os|cpu|memory|all]",
)
.category("system");

const SECTIONS: &[&str] = &["os", "cpu", "memory", "all"];

fn os_lines() -> Vec<String> {
    vec![
        format!("os:       {}", Platform::current()),
        format!("family:   {}", std::env::consts::FAMILY),
        format!("arch:     {}", std::env::consts::ARCH),
    ]
}

fn cpu_lines() -> Vec<String> {
    let cpus = std::thread::available_parallelism()
        .map(|n| n.get().to_string())
        .unwrap_or_else(|_| "unknown".to_string());
    vec![format!("cpus:     {cpus}")]
}

/// `(total, available)` in KiB from `/proc/meminfo` text.
fn parse_meminfo(text: &str) -> Option<(u64, u64)> {
    let field = |name: &str| -> Option<u64> {
        text.lines()
            .find_map(|l| l.strip_prefix(name))
            .and_then(|rest| rest.trim_start_matches(':').split_whitespace().next())
            .and_then(|v| v.parse().ok())
    };
    Some((field("MemTotal")?, field("MemAvailable")?))
}

fn memory_lines() -> Vec<String> {
    match std::fs::read_to_string("/proc/meminfo")
        .ok()
        .as_deref()
        .and_then(parse_meminfo)
    {
        Some((total, avail)) => vec![
            format!("memory:   {} MiB total", total / 1024),
            format!("free:     {} MiB available", avail / 1024),
        ],
        None => vec!["memory:   unavailable".to_string()],
    }
}

impl Command for SysinfoCmd {
    fn info(&self) -> &CommandInfo {
        &SYSINFO
    }
    fn validate(&self, args: &Arguments) -> Result<()> {
        match args.positional(0) {
            Some(s) if !SECTIONS.contains(&s) => Err(ShellError::Validation(format!(
                "unknown section '{s}' (expected one of: {})",
                SECTIONS.join(", ")
            ))),
            _ => Ok(()),
        }
    }
    fn execute(&self, _ctx: &Context, args: Arguments) -> Result<CommandResult> {
        let lines = match args.positional(0).unwrap_or("all") {
            "os" => os_lines(),
            "cpu" => cpu_lines(),
            "memory" => memory_lines(),
            _ => [os_lines(), cpu_lines(), memory_lines()].concat(),
        };
        Ok(CommandResult::ok(lines.join("\n")))
    }
}

// ---------------------------------------------------------------------------
// sleep
// ---------------------------------------------------------------------------

struct SleepCmd;
const SLEEP: CommandInfo =
    CommandInfo::new("sleep", "Pause for a number of seconds", "sleep <seconds>")
        .category("system");

fn sleep_duration(args: &Arguments) -> Result<Duration> {
    let raw = args
        .positional(0)
        .ok_or_else(|| ShellError::Validation("usage: sleep <seconds>".into()))?;
    let secs = raw
        .parse::<f64>()
        .map_err(|_| ShellError::Validation(format!("invalid number: '{raw}'")))?;
    Duration::try_from_secs_f64(secs)
        .map_err(|_| ShellError::Validation(format!("duration out of range: '{raw}'")))
}

impl Command for SleepCmd {
    fn info(&self) -> &CommandInfo {
        &SLEEP
    }
    fn validate(&self, args: &Arguments) -> Result<()> {
        sleep_duration(args).map(|_| ())
    }
    fn execute(&self, ctx: &Context, args: Arguments) -> Result<CommandResult> {
        let d = sleep_duration(&args)?;
        ctx.sleep(d)?;
        Ok(CommandResult::ok(format!("slept {:.1}s", d.as_secs_f64())))
    }
}

/// Register system commands.
pub fn register_system_commands(reg: &mut CommandRegistry) -> Result<()> {
    reg.register(Box::new(WhoamiCmd))?;
    reg.register(Box::new(HostnameCmd))?;
    reg.register(Box::new(SysinfoCmd))?;
    reg.register(Box::new(SleepCmd))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatcher::{Dispatcher, Policy};

    fn exec(line: &str) -> CommandResult {
        let mut reg = CommandRegistry::new();
        register_system_commands(&mut reg).unwrap();
        Dispatcher::new(&reg).dispatch(&Context::background(), line)
    }

    #[test]
    fn sysinfo_all_sections() {
        let res = exec("sysinfo");
        assert_eq!(res.exit_code, 0);
        assert!(res.output.contains("os:"));
        assert!(res.output.contains("cpus:"));
        assert!(res.output.contains("memory:"));
    }

    #[test]
    fn sysinfo_single_section() {
        let res = exec("sysinfo cpu");
        assert!(res.output.starts_with("cpus:"));
        assert_eq!(res.output.lines().count(), 1);
    }

    #[test]
    fn sysinfo_unknown_section() {
        let res = exec("sysinfo disks");
        assert_eq!(res.exit_code, 1);
        assert!(res.error.as_deref().unwrap().contains("unknown section"));
    }

    #[test]
    fn meminfo_parsing() {
        let text = "MemTotal:       16314124 kB\nMemFree:  1 kB\nMemAvailable:   8157062 kB\n";
        assert_eq!(parse_meminfo(text), Some((16314124, 8157062)));
        assert_eq!(parse_meminfo("MemTotal: 5 kB\n"), None);
    }

    #[test]
    fn sleep_short() {
        let res = exec("sleep 0.01");
        assert_eq!(res.exit_code, 0);
        assert_eq!(res.output, "slept 0.0s");
        assert!(res.duration >= Duration::from_millis(10));
    }

    #[test]
    fn sleep_requires_number() {
        assert_eq!(exec("sleep").exit_code, 1);
        assert_eq!(exec("sleep abc").exit_code, 1);
        assert_eq!(exec("sleep -- ").exit_code, 1);
    }

    #[test]
    fn sleep_out_of_range_is_invalid() {
        for line in ["sleep 1e20", "sleep -1", "sleep inf", "sleep NaN"] {
            let res = exec(line);
            assert_eq!(res.exit_code, 1, "{line}");
            let err = res.error.as_deref().unwrap();
            assert!(err.starts_with("invalid arguments"), "{line}: {err}");
            assert!(!err.contains("panicked"), "{line}: {err}");
        }
    }

    #[test]
    fn sleep_honors_command_timeout() {
        let mut reg = CommandRegistry::new();
        register_system_commands(&mut reg).unwrap();
        let d = Dispatcher::new(&reg).with_policy(Policy {
            command_timeout: Some(Duration::from_millis(30)),
            ..Policy::default()
        });
        let res = d.dispatch(&Context::background(), "sleep 5");
        assert_eq!(res.exit_code, 1);
        assert!(res.duration < Duration::from_secs(1));
    }

    #[test]
    fn hostname_is_not_empty() {
        // Containers without /etc/hostname and HOSTNAME report an error.
        let res = exec("hostname");
        if res.is_success() {
            assert!(!res.output.trim().is_empty());
        }
    }
}
