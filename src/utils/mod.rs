/// Utility functions and helpers
use crate::error::{ReplikaError, ReplikaResult};
use std::time::Duration;

/// Split a "host:port" address. IPv6 hosts may be bracketed ("[::1]:6379").
pub fn parse_host_port(addr: &str) -> ReplikaResult<(String, u16)> {
    let addr = addr.trim();
    let (host, port) = addr
        .rsplit_once(':')
        .ok_or_else(|| ReplikaError::invalid_address(addr, "missing port"))?;

    let host = host.trim_start_matches('[').trim_end_matches(']');
    if host.is_empty() {
        return Err(ReplikaError::invalid_address(addr, "missing host"));
    }

    let port: u16 = port
        .parse()
        .map_err(|_| ReplikaError::invalid_address(addr, "invalid port"))?;
    if port == 0 {
        return Err(ReplikaError::invalid_address(addr, "port must be non-zero"));
    }

    Ok((host.to_string(), port))
}

/// Format duration for human-readable output
pub fn format_duration(duration: Duration) -> String {
    let millis = duration.as_millis();
    if millis < 1000 {
        return format!("{}ms", millis);
    }

    let secs = duration.as_secs();
    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m{}s", secs / 60, secs % 60)
    } else {
        format!("{}h{}m{}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
