//! Port list parsing for the scanner.

use kestrel_types::{Result, ShellError};

/// Ports probed when the caller gives no `-p` list.
pub const COMMON_PORTS: &[u16] = &[
    21, 22, 23, 25, 53, 80, 110, 111, 135, 139, 143, 443, 445, 993, 995, 1433, 1521, 1723, 3306,
    3389, 5432, 5900, 6379, 8080, 8443, 9200, 27017,
];

/// Parse `22,80,8000-8010` into a sorted, de-duplicated port list.
pub fn parse_ports(spec: &str) -> Result<Vec<u16>> {
    let mut ports = Vec::new();
    for part in spec.split(',').map(str::trim) {
        if part.is_empty() {
            continue;
        }
        match part.split_once('-') {
            Some((lo, hi)) => {
                let lo = parse_port(lo)?;
                let hi = parse_port(hi)?;
                if lo > hi {
                    return Err(ShellError::Validation(format!(
                        "invalid port range: {part}"
                    )));
                }
                ports.extend(lo..=hi);
            },
            None => ports.push(parse_port(part)?),
        }
    }
    ports.sort_unstable();
    ports.dedup();
    if ports.is_empty() {
        return Err(ShellError::Validation(format!("no ports in '{spec}'")));
    }
    Ok(ports)
}

fn parse_port(s: &str) -> Result<u16> {
    match s.trim().parse::<u16>() {
        Ok(0) | Err(_) => Err(ShellError::Validation(format!(
            "invalid port: '{s}' (expected 1-65535)"
        ))),
        Ok(p) => Ok(p),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_and_list() {
        assert_eq!(parse_ports("80").unwrap(), vec![80]);
        assert_eq!(parse_ports("443,80").unwrap(), vec![80, 443]);
    }

    #[test]
    fn ranges_expand_inclusively() {
        assert_eq!(parse_ports("20-23").unwrap(), vec![20, 21, 22, 23]);
        assert_eq!(parse_ports("22,8000-8002").unwrap(), vec![22, 8000, 8001, 8002]);
    }

    #[test]
    fn duplicates_removed() {
        assert_eq!(parse_ports("80,80,79-81").unwrap(), vec![79, 80, 81]);
    }

    #[test]
    fn whitespace_and_empty_parts_tolerated() {
        assert_eq!(parse_ports(" 22 , ,80").unwrap(), vec![22, 80]);
    }

    #[test]
    fn full_range() {
        assert_eq!(parse_ports("1-65535").unwrap().len(), 65535);
    }

    #[test]
    fn rejects_zero_and_overflow() {
        assert!(parse_ports("0").is_err());
        assert!(parse_ports("65536").is_err());
        assert!(parse_ports("http").is_err());
    }

    #[test]
    fn rejects_reversed_range() {
        let err = parse_ports("100-10").unwrap_err();
        assert!(format!("{err}").contains("invalid port range"));
    }

    #[test]
    fn rejects_empty() {
        assert!(parse_ports("").is_err());
        assert!(parse_ports(",,").is_err());
    }

    #[test]
    fn common_ports_sorted_and_unique() {
        let mut sorted = COMMON_PORTS.to_vec();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(sorted, COMMON_PORTS);
    }
}
