//! Detects whether the shell runs with elevated privileges.

/// Effective UID from `/proc/<pid>/status` text.
///
/// The `Uid:` line lists real, effective, saved and filesystem IDs.
fn effective_uid(status: &str) -> Option<u32> {
    status
        .lines()
        .find_map(|l| l.strip_prefix("Uid:"))
        .and_then(|ids| ids.split_whitespace().nth(1))
        .and_then(|id| id.parse().ok())
}

/// Whether the current process is root (Unix) or elevated.
///
/// Windows elevation is not detected and always reports `false`.
pub fn is_elevated() -> bool {
    if cfg!(windows) {
        return false;
    }
    match std::fs::read_to_string("/proc/self/status")
        .ok()
        .as_deref()
        .and_then(effective_uid)
    {
        Some(uid) => uid == 0,
        None => std::env::var("USER").is_ok_and(|u| u == "root"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_effective_uid() {
        let status = "Name:\tkestrel\nUmask:\t0022\nUid:\t1000\t0\t1000\t1000\nGid:\t100\t100\t100\t100\n";
        assert_eq!(effective_uid(status), Some(0));
    }

    #[test]
    fn missing_uid_line() {
        assert_eq!(effective_uid("Name:\tkestrel\n"), None);
        assert_eq!(effective_uid("Uid:\t1000\n"), None);
    }
}
