//! Networking for the kestrel shell.
//!
//! The [`pool`] module is the bounded-concurrency fan-out runner; [`probe`]
//! builds TCP connect probing and the port scanner on top of it.

pub mod pool;
pub mod ports;
pub mod probe;

pub use pool::{FanOut, FanOutReport, Progress};
pub use ports::{COMMON_PORTS, parse_ports};
pub use probe::{
    PortScanner, ProbeTask, ScanReport, probe_tcp, resolve_all, resolve_host, service_name,
};
