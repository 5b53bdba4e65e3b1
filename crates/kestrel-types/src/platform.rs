//! Operating system identifiers used in command metadata.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    Linux,
    MacOs,
    Windows,
    FreeBsd,
    Other,
}

impl Platform {
    /// Every platform, for commands that run anywhere.
    pub const ALL: &'static [Platform] = &[
        Platform::Linux,
        Platform::MacOs,
        Platform::Windows,
        Platform::FreeBsd,
        Platform::Other,
    ];

    /// Unix-like platforms.
    pub const UNIX: &'static [Platform] = &[Platform::Linux, Platform::MacOs, Platform::FreeBsd];

    /// The platform this binary was compiled for.
    pub fn current() -> Self {
        if cfg!(target_os = "linux") {
            Platform::Linux
        } else if cfg!(target_os = "macos") {
            Platform::MacOs
        } else if cfg!(target_os = "windows") {
            Platform::Windows
        } else if cfg!(target_os = "freebsd") {
            Platform::FreeBsd
        } else {
            Platform::Other
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Linux => "linux",
            Platform::MacOs => "macos",
            Platform::Windows => "windows",
            Platform::FreeBsd => "freebsd",
            Platform::Other => "other",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
