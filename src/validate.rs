//! Parsing of inbound update parameters.
//!
//! Everything here is pure: no network, no shared state. A request that fails
//! any of these checks never reaches the provider.

use std::net::IpAddr;

use log::warn;

use crate::error::ValidationError;
use crate::provider::DnsRecordUpdate;

/// Marks a bulk host entry as proxied, e.g. `www.example.com:P`.
pub const PROXIED_SUFFIX: &str = ":P";

pub fn validate_ip(raw: &str) -> Result<IpAddr, ValidationError> {
    raw.parse::<IpAddr>().map_err(|_| {
        warn!("Invalid IP address format: {:?}", raw);
        ValidationError::InvalidIp
    })
}

pub fn parse_ttl(raw: &str, default: u32) -> Result<u32, ValidationError> {
    if raw.is_empty() {
        return Ok(default);
    }

    match raw.parse::<u32>() {
        Ok(ttl) if ttl > 0 => Ok(ttl),
        _ => {
            warn!("Invalid TTL parameter: {:?}", raw);
            Err(ValidationError::InvalidTtl)
        }
    }
}

pub fn parse_proxied(raw: &str, default: bool) -> Result<bool, ValidationError> {
    if raw.is_empty() {
        return Ok(default);
    }

    raw.parse::<bool>().map_err(|_| {
        warn!("Invalid proxied parameter: {:?}", raw);
        ValidationError::InvalidProxied
    })
}

/// Expands `host1:P,host2,host3:P` into one update per host.
pub fn parse_bulk_hosts(
    raw: &str,
    ip: &str,
    ttl: u32,
    record_type: &str,
    default_proxied: bool,
) -> Result<Vec<DnsRecordUpdate>, ValidationError> {
    let mut updates = Vec::new();

    for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let (hostname, proxied) = parse_host_entry(entry, default_proxied);
        if hostname.is_empty() {
            warn!("Empty hostname in bulk entry: {:?}", entry);
            return Err(ValidationError::EmptyHostname(entry.to_string()));
        }

        updates.push(DnsRecordUpdate::new(record_type, hostname, ip, ttl, proxied));
    }

    if updates.is_empty() {
        warn!("No valid hosts in bulk parameter: {:?}", raw);
        return Err(ValidationError::NoValidHosts);
    }

    Ok(updates)
}

fn parse_host_entry(entry: &str, default_proxied: bool) -> (&str, bool) {
    match entry.strip_suffix(PROXIED_SUFFIX) {
        Some(hostname) => (hostname, true),
        None => (entry, default_proxied),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_ip_literals_only() {
        assert!(validate_ip("203.0.113.5").is_ok());
        assert!(validate_ip("2001:db8::1").is_ok());
        assert!(validate_ip("::ffff:192.0.2.1").is_ok());

        for bad in ["", "203.0.113.5.1", "256.1.1.1", "home.example.com", " 203.0.113.5", "fe80::1%eth0"] {
            assert_eq!(validate_ip(bad), Err(ValidationError::InvalidIp), "{bad:?}");
        }
    }

    #[test]
    fn ttl_defaults_and_bounds() {
        assert_eq!(parse_ttl("", 300), Ok(300));
        assert_eq!(parse_ttl("120", 300), Ok(120));
        assert_eq!(parse_ttl("0", 300), Err(ValidationError::InvalidTtl));
        assert_eq!(parse_ttl("-5", 300), Err(ValidationError::InvalidTtl));
        assert_eq!(parse_ttl("abc", 300), Err(ValidationError::InvalidTtl));
        assert_eq!(parse_ttl("1.5", 300), Err(ValidationError::InvalidTtl));
    }

    #[test]
    fn proxied_accepts_canonical_literals() {
        assert_eq!(parse_proxied("", true), Ok(true));
        assert_eq!(parse_proxied("", false), Ok(false));
        assert_eq!(parse_proxied("true", false), Ok(true));
        assert_eq!(parse_proxied("false", true), Ok(false));
        assert_eq!(parse_proxied("yes", true), Err(ValidationError::InvalidProxied));
        assert_eq!(parse_proxied("TRUE", true), Err(ValidationError::InvalidProxied));
    }

    #[test]
    fn bulk_hosts_with_proxied_suffix() {
        let updates =
            parse_bulk_hosts("a.example.com,b.example.com:P", "1.2.3.4", 300, "A", false).unwrap();

        assert_eq!(updates.len(), 2);
        assert_eq!(updates[0].name, "a.example.com");
        assert!(!updates[0].proxied);
        assert_eq!(updates[1].name, "b.example.com");
        assert!(updates[1].proxied);
        assert!(updates.iter().all(|u| u.content == "1.2.3.4" && u.ttl == 300 && u.record_type == "A"));
    }

    #[test]
    fn bulk_hosts_trims_and_skips_empty_segments() {
        let updates = parse_bulk_hosts(" a.example.com , ,b.example.com,", "2001:db8::1", 60, "AAAA", true)
            .unwrap();

        let names: Vec<_> = updates.iter().map(|u| u.name.as_str()).collect();
        assert_eq!(names, vec!["a.example.com", "b.example.com"]);
        assert!(updates.iter().all(|u| u.proxied));
    }

    #[test]
    fn bulk_hosts_without_entries_fail() {
        assert_eq!(
            parse_bulk_hosts("", "1.2.3.4", 300, "A", false),
            Err(ValidationError::NoValidHosts)
        );
        assert_eq!(
            parse_bulk_hosts(",,", "1.2.3.4", 300, "A", false),
            Err(ValidationError::NoValidHosts)
        );
    }

    #[test]
    fn bulk_entry_that_is_only_suffix_fails() {
        assert_eq!(
            parse_bulk_hosts("a.example.com,:P", "1.2.3.4", 300, "A", false),
            Err(ValidationError::EmptyHostname(":P".to_string()))
        );
    }
}
