//! TCP connect probes and the port scanner built on [`FanOut`].

use std::net::{IpAddr, SocketAddr, TcpStream, ToSocketAddrs};
use std::time::{Duration, Instant};

use kestrel_types::{Context, Result, ScanConfig, ShellError};

use crate::pool::{FanOut, Progress};

/// One connection attempt: a target address, a port and its own timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeTask {
    pub addr: IpAddr,
    pub port: u16,
    pub timeout: Duration,
}

impl ProbeTask {
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.addr, self.port)
    }
}

/// Attempt a TCP connection; `true` when the port accepted it.
///
/// The timeout is clamped to the context deadline. A done context never dials.
pub fn probe_tcp(ctx: &Context, task: &ProbeTask) -> bool {
    if ctx.is_done() {
        return false;
    }
    let timeout = ctx.clamp(task.timeout);
    if timeout.is_zero() {
        return false;
    }
    match TcpStream::connect_timeout(&task.socket_addr(), timeout) {
        Ok(_) => true,
        Err(e) => {
            log::trace!("{}: {e}", task.socket_addr());
            false
        },
    }
}

/// Resolve a host name or literal address, preferring IPv4.
pub fn resolve_host(host: &str) -> Result<IpAddr> {
    let addrs: Vec<SocketAddr> = (host, 0)
        .to_socket_addrs()
        .map_err(|e| ShellError::Execution(format!("cannot resolve {host}: {e}")))?
        .collect();
    addrs
        .iter()
        .find(|a| a.is_ipv4())
        .or_else(|| addrs.first())
        .map(SocketAddr::ip)
        .ok_or_else(|| ShellError::Execution(format!("no addresses for {host}")))
}

/// Resolve every address a host name maps to, de-duplicated in resolver order.
pub fn resolve_all(host: &str) -> Result<Vec<IpAddr>> {
    let mut out: Vec<IpAddr> = Vec::new();
    let addrs = (host, 0)
        .to_socket_addrs()
        .map_err(|e| ShellError::Execution(format!("cannot resolve {host}: {e}")))?;
    for addr in addrs {
        if !out.contains(&addr.ip()) {
            out.push(addr.ip());
        }
    }
    Ok(out)
}

/// Outcome of a port scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanReport {
    pub addr: IpAddr,
    /// Open ports in ascending order.
    pub open: Vec<u16>,
    /// Ports that were dialed.
    pub scanned: usize,
    /// Ports never dialed because the scan was cancelled.
    pub skipped: usize,
    pub elapsed: Duration,
}

/// Concurrent TCP connect scanner.
#[derive(Debug, Clone, Copy)]
pub struct PortScanner {
    pool: FanOut,
    timeout: Duration,
}

impl PortScanner {
    pub fn new(concurrency: usize, timeout: Duration) -> Self {
        Self {
            pool: FanOut::new(concurrency),
            timeout,
        }
    }

    pub fn from_config(config: &ScanConfig) -> Self {
        Self {
            pool: FanOut::new(config.concurrency).progress_every(config.progress_every),
            timeout: config.timeout(),
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.pool = self.pool.with_concurrency(concurrency);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_progress_every(mut self, every: usize) -> Self {
        self.pool = self.pool.progress_every(every);
        self
    }

    pub fn concurrency(&self) -> usize {
        self.pool.concurrency()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Scan `ports` on `addr`.
    pub fn scan(&self, ctx: &Context, addr: IpAddr, ports: &[u16]) -> ScanReport {
        self.scan_with_progress(ctx, addr, ports, |_| {})
    }

    /// Scan `ports` on `addr`, reporting progress through `on_progress`.
    pub fn scan_with_progress<P>(
        &self,
        ctx: &Context,
        addr: IpAddr,
        ports: &[u16],
        on_progress: P,
    ) -> ScanReport
    where
        P: Fn(Progress) + Sync,
    {
        let start = Instant::now();
        let tasks: Vec<ProbeTask> = ports
            .iter()
            .map(|&port| ProbeTask {
                addr,
                port,
                timeout: self.timeout,
            })
            .collect();

        let report = self.pool.run_with_progress(
            ctx,
            tasks,
            |ctx, task| probe_tcp(ctx, task).then_some(task.port),
            on_progress,
        );

        let mut open = report.successes;
        open.sort_unstable();
        log::debug!(
            "scan {addr}: {} open of {} dialed ({} skipped)",
            open.len(),
            report.completed,
            report.skipped
        );
        ScanReport {
            addr,
            open,
            scanned: report.completed,
            skipped: report.skipped,
            elapsed: start.elapsed(),
        }
    }
}

/// Well-known service name for a port, if any.
pub fn service_name(port: u16) -> Option<&'static str> {
    Some(match port {
        21 => "ftp",
        22 => "ssh",
        23 => "telnet",
        25 => "smtp",
        53 => "dns",
        80 => "http",
        110 => "pop3",
        111 => "rpcbind",
        135 => "msrpc",
        139 => "netbios",
        143 => "imap",
        443 => "https",
        445 => "smb",
        993 => "imaps",
        995 => "pop3s",
        1433 => "mssql",
        1521 => "oracle",
        1723 => "pptp",
        3306 => "mysql",
        3389 => "rdp",
        5432 => "postgres",
        5900 => "vnc",
        6379 => "redis",
        8080 => "http-alt",
        8443 => "https-alt",
        9200 => "elasticsearch",
        27017 => "mongodb",
        _ => return None,
    })
}
