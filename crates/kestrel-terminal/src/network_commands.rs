//! Network commands: ping, resolve, portscan.

use std::fmt::Write as _;
use std::time::{Duration, Instant};

use kestrel_net::{
    COMMON_PORTS, PortScanner, ProbeTask, parse_ports, probe_tcp, resolve_all, resolve_host,
    service_name,
};
use kestrel_types::{Context, Result, ScanConfig, ShellError};

use crate::args::Arguments;
use crate::command::{Command, CommandInfo, CommandResult};
use crate::registry::CommandRegistry;

/// Parse a timeout given in (possibly fractional) seconds.
fn timeout_option(args: &Arguments, keys: &[&str]) -> Result<Option<Duration>> {
    match args.parse_option::<f64>(keys)? {
        Some(secs) if secs > 0.0 => Duration::try_from_secs_f64(secs).map(Some).map_err(|_| {
            ShellError::Validation(format!("timeout out of range: {secs} seconds"))
        }),
        Some(secs) => Err(ShellError::Validation(format!(
            "timeout must be a positive number of seconds, got {secs}"
        ))),
        None => Ok(None),
    }
}

fn positive<T>(value: Option<T>, what: &str) -> Result<Option<T>>
where
    T: PartialOrd + Default + Copy,
{
    match value {
        Some(v) if v <= T::default() => Err(ShellError::Validation(format!(
            "{what} must be greater than zero"
        ))),
        other => Ok(other),
    }
}

// ---------------------------------------------------------------------------
// ping
// ---------------------------------------------------------------------------

struct PingCmd;
const PING: CommandInfo = CommandInfo::new(
    "ping",
    "Check whether a host accepts TCP connections",
    "ping [-c count] [-t secs] [-p port] [host]",
)
.category("network");

const PING_DEFAULT_COUNT: u32 = 4;
const PING_DEFAULT_PORT: u16 = 80;
const PING_DEFAULT_TIMEOUT: Duration = Duration::from_secs(1);

impl Command for PingCmd {
    fn info(&self) -> &CommandInfo {
        &PING
    }
    fn validate(&self, args: &Arguments) -> Result<()> {
        positive(args.parse_option::<u32>(&["c", "count"])?, "count")?;
        positive(args.parse_option::<u16>(&["p", "port"])?, "port")?;
        timeout_option(args, &["t", "timeout"])?;
        Ok(())
    }
    fn execute(&self, ctx: &Context, mut args: Arguments) -> Result<CommandResult> {
        if args.raw.is_empty() {
            args.raw.push("localhost".to_string());
        }
        let host = args.raw[0].clone();
        let count = args
            .parse_option::<u32>(&["c", "count"])?
            .unwrap_or(PING_DEFAULT_COUNT);
        let port = args
            .parse_option::<u16>(&["p", "port"])?
            .unwrap_or(PING_DEFAULT_PORT);
        let timeout = timeout_option(&args, &["t", "timeout"])?.unwrap_or(PING_DEFAULT_TIMEOUT);

        let addr = resolve_host(&host)?;
        let task = ProbeTask {
            addr,
            port,
            timeout,
        };

        let mut out = format!("PING {host} ({addr}) tcp/{port}\n");
        let mut sent = 0u32;
        let mut received = 0u32;
        let mut result = CommandResult::default();
        for seq in 1..=count {
            if ctx.is_done() {
                result = result.with_warning(format!("interrupted after {sent} probe(s)"));
                break;
            }
            sent += 1;
            let start = Instant::now();
            if probe_tcp(ctx, &task) {
                received += 1;
                let ms = start.elapsed().as_secs_f64() * 1000.0;
                let _ = writeln!(out, "connected to {addr}:{port} seq={seq} time={ms:.2} ms");
            } else {
                let _ = writeln!(out, "no response from {addr}:{port} seq={seq}");
            }
        }

        let loss = if sent == 0 {
            100.0
        } else {
            f64::from(sent - received) * 100.0 / f64::from(sent)
        };
        let _ = write!(
            out,
            "--- {host} ping statistics ---\n{sent} probes sent, {received} answered, {loss:.0}% loss"
        );
        result.output = out;
        if received == 0 {
            result.error = Some(format!("{host}:{port} is unreachable"));
            result.exit_code = 1;
        }
        Ok(result)
    }
}

// ---------------------------------------------------------------------------
// resolve
// ---------------------------------------------------------------------------

struct ResolveCmd;
const RESOLVE: CommandInfo =
    CommandInfo::new("resolve", "Resolve a host name to addresses", "resolve <host>")
        .category("network");

impl Command for ResolveCmd {
    fn info(&self) -> &CommandInfo {
        &RESOLVE
    }
    fn validate(&self, args: &Arguments) -> Result<()> {
        if args.raw.is_empty() {
            return Err(ShellError::Validation("usage: resolve <host>".into()));
        }
        Ok(())
    }
    fn execute(&self, _ctx: &Context, args: Arguments) -> Result<CommandResult> {
        let mut lines = Vec::new();
        for host in &args.raw {
            let addrs = resolve_all(host)?;
            if addrs.is_empty() {
                return Err(ShellError::Execution(format!("no addresses for {host}")));
            }
            for addr in addrs {
                lines.push(format!("{host}\t{addr}"));
            }
        }
        Ok(CommandResult::ok(lines.join("\n")))
    }
}

// ---------------------------------------------------------------------------
// portscan
// ---------------------------------------------------------------------------

/// TCP connect scan. Defaults come from the `[scan]` config section.
struct PortScanCmd {
    defaults: ScanConfig,
}

const PORTSCAN: CommandInfo = CommandInfo::new(
    "portscan",
    "Scan TCP ports on a host",
    "portscan [-p ports] [-t secs] [-c concurrency] <host>",
)
.category("network");

struct ScanRequest {
    host: String,
    ports: Vec<u16>,
    scanner: PortScanner,
}

impl PortScanCmd {
    fn request(&self, args: &Arguments) -> Result<ScanRequest> {
        let host = args
            .positional(0)
            .ok_or_else(|| ShellError::Validation("usage: portscan [options] <host>".into()))?
            .to_string();

        let ports = match args.option_any(&["p", "ports"]) {
            Some(spec) => parse_ports(spec)?,
            None if args.has("p") || args.has("ports") => {
                return Err(ShellError::Validation("-p requires a port list".into()));
            },
            None => COMMON_PORTS.to_vec(),
        };

        let mut scanner = PortScanner::from_config(&self.defaults);
        if let Some(timeout) = timeout_option(args, &["t", "timeout"])? {
            scanner = scanner.with_timeout(timeout);
        }
        if let Some(c) = positive(
            args.parse_option::<usize>(&["c", "concurrency"])?,
            "concurrency",
        )? {
            scanner = scanner.with_concurrency(c);
        }
        Ok(ScanRequest {
            host,
            ports,
            scanner,
        })
    }
}

impl Command for PortScanCmd {
    fn info(&self) -> &CommandInfo {
        &PORTSCAN
    }
    fn validate(&self, args: &Arguments) -> Result<()> {
        self.request(args).map(|_| ())
    }
    fn execute(&self, ctx: &Context, args: Arguments) -> Result<CommandResult> {
        let req = self.request(&args)?;
        let addr = resolve_host(&req.host)?;
        log::info!(
            "portscan {} ({addr}): {} port(s), concurrency {}, timeout {:?}",
            req.host,
            req.ports.len(),
            req.scanner.concurrency(),
            req.scanner.timeout()
        );

        let report = req.scanner.scan(ctx, addr, &req.ports);

        let mut out = format!(
            "Scanning {} ({addr}): {} port(s)\n",
            req.host,
            req.ports.len()
        );
        for port in &report.open {
            let _ = writeln!(
                out,
                "{:<9} open  {}",
                format!("{port}/tcp"),
                service_name(*port).unwrap_or("unknown")
            );
        }
        let _ = write!(
            out,
            "{} scanned in {:.2}s: {} open",
            report.scanned,
            report.elapsed.as_secs_f64(),
            report.open.len()
        );

        let mut result = CommandResult::ok(out)
            .with_memory_usage((req.ports.len() * std::mem::size_of::<ProbeTask>()) as u64);
        if report.skipped > 0 {
            result = result.with_warning(format!(
                "scan interrupted: {} port(s) not probed",
                report.skipped
            ));
        }
        Ok(result)
    }
}

/// Register network commands; `portscan` takes its defaults from `scan`.
pub fn register_network_commands(reg: &mut CommandRegistry, scan: &ScanConfig) -> Result<()> {
    reg.register(Box::new(PingCmd))?;
    reg.register(Box::new(ResolveCmd))?;
    reg.register(Box::new(PortScanCmd {
        defaults: *scan,
    }))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatcher::Dispatcher;
    use std::net::TcpListener;

    fn registry() -> CommandRegistry {
        let mut reg = CommandRegistry::new();
        register_network_commands(&mut reg, &ScanConfig::default()).unwrap();
        reg
    }

    fn exec(line: &str) -> CommandResult {
        Dispatcher::new(&registry()).dispatch(&Context::background(), line)
    }

    fn closed_port() -> u16 {
        TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port()
    }

    #[test]
    fn portscan_reference_line_succeeds() {
        let res = exec("portscan -p 80,443 -t 1 -c 2 localhost");
        assert_eq!(res.exit_code, 0, "{:?}", res.error);
        assert!(res.error.is_none());
        assert!(res.output.contains("2 port(s)"));
        assert!(res.output.contains("2 scanned"));
        assert!(res.memory_usage.is_some());
    }

    #[test]
    fn portscan_reports_open_port() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let open = listener.local_addr().unwrap().port();
        let closed = closed_port();
        let res = exec(&format!("portscan --ports={open},{closed} -t 1 127.0.0.1"));
        assert_eq!(res.exit_code, 0);
        assert!(res.output.contains(&format!("{open}/tcp")));
        assert!(!res.output.contains(&format!("{closed}/tcp")));
        assert!(res.output.ends_with("1 open"));
    }

    #[test]
    fn portscan_validation() {
        for line in [
            "portscan -p 80",
            "portscan -p 0 localhost",
            "portscan -p 90-80 localhost",
            "portscan -t x localhost",
            "portscan -t 0 localhost",
            "portscan -c 0 localhost",
            "portscan localhost -p",
        ] {
            let res = exec(line);
            assert_eq!(res.exit_code, 1, "{line}");
            assert!(res.error.as_deref().unwrap().starts_with("invalid arguments"), "{line}");
        }
    }

    #[test]
    fn portscan_unknown_host_fails_in_execute() {
        let res = exec("portscan -p 80 -t 1 kestrel-test.invalid");
        assert_eq!(res.exit_code, 1);
        assert!(res.error.as_deref().unwrap().contains("resolve"));
    }

    #[test]
    fn portscan_cancelled_still_succeeds() {
        let reg = registry();
        let ctx = Context::background();
        ctx.cancel();
        let res = Dispatcher::new(&reg).dispatch(&ctx, "portscan -p 1-10 -t 1 127.0.0.1");
        assert_eq!(res.exit_code, 0);
        assert!(res.warnings[0].contains("10 port(s) not probed"));
    }

    #[test]
    fn ping_open_port() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let res = exec(&format!("ping -c 2 -p {port} 127.0.0.1"));
        assert_eq!(res.exit_code, 0);
        assert!(res.output.contains("seq=2"));
        assert!(res.output.contains("2 answered, 0% loss"));
    }

    #[test]
    fn ping_defaults_to_localhost() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let res = exec(&format!("ping -c 1 --port={port}"));
        assert!(res.output.starts_with("PING localhost"));
    }

    #[test]
    fn ping_unreachable_is_failure() {
        let res = exec(&format!("ping -c 1 -t 0.5 -p {} 127.0.0.1", closed_port()));
        assert_eq!(res.exit_code, 1);
        assert!(res.error.as_deref().unwrap().contains("unreachable"));
        assert!(res.output.contains("100% loss"));
    }

    #[test]
    fn oversized_timeouts_are_rejected() {
        for line in [
            "portscan -t 1e20 -p 80 localhost",
            "ping -t 1e20 localhost",
            "ping --timeout=inf localhost",
        ] {
            let res = exec(line);
            assert_eq!(res.exit_code, 1, "{line}");
            let err = res.error.as_deref().unwrap();
            assert!(err.starts_with("invalid arguments"), "{line}: {err}");
            assert!(!err.contains("panicked"), "{line}: {err}");
        }
    }

    #[test]
    fn ping_rejects_zero_count() {
        let res = exec("ping -c 0 localhost");
        assert_eq!(res.exit_code, 1);
        assert!(res.error.as_deref().unwrap().contains("count"));
    }

    #[test]
    fn resolve_literal() {
        let res = exec("resolve 127.0.0.1");
        assert_eq!(res.output, "127.0.0.1\t127.0.0.1");
    }

    #[test]
    fn resolve_requires_host() {
        assert_eq!(exec("resolve").exit_code, 1);
    }
}
