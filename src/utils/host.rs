use crate::error::{IndexError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Port used when an address has no `:port` suffix
pub const DEFAULT_PORT: u16 = 12526;

/// Split `host[:port]`.
///
/// Returns `("", 0)` when a `:` is present but the port is empty,
/// non-numeric, out of range or zero.
pub fn parse_host(text: &str) -> (String, u16) {
    match text.split_once(':') {
        Some((host, port)) => {
            let valid = !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit());
            match port.parse::<u16>() {
                Ok(port) if valid && port != 0 => (host.to_string(), port),
                _ => (String::new(), 0),
            }
        }
        None => (text.to_string(), DEFAULT_PORT),
    }
}

/// A parsed daemon address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostAddress {
    pub host: String,
    pub port: u16,
}

impl HostAddress {
    pub fn parse(text: &str) -> Result<Self> {
        match parse_host(text) {
            (_, 0) => Err(IndexError::InvalidAddress {
                address: text.to_string(),
            }),
            (host, port) => Ok(Self { host, port }),
        }
    }
}

impl Default for HostAddress {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: DEFAULT_PORT,
        }
    }
}

impl fmt::Display for HostAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_host_with_port() {
        assert_eq!(parse_host("localhost:9000"), ("localhost".to_string(), 9000));
    }

    #[test]
    fn test_parse_host_default_port() {
        assert_eq!(parse_host("localhost"), ("localhost".to_string(), DEFAULT_PORT));
    }

    #[test]
    fn test_parse_host_invalid_port() {
        assert_eq!(parse_host("localhost:abc"), (String::new(), 0));
        assert_eq!(parse_host("localhost:"), (String::new(), 0));
        assert_eq!(parse_host("localhost:0"), (String::new(), 0));
        assert_eq!(parse_host("localhost:70000"), (String::new(), 0));
        assert_eq!(parse_host("localhost:+80"), (String::new(), 0));
    }

    #[test]
    fn test_parse_host_splits_on_first_colon() {
        assert_eq!(parse_host("a:1:2"), (String::new(), 0));
        assert_eq!(parse_host(":8080"), (String::new(), 8080));
    }

    #[test]
    fn test_host_address() {
        let addr = HostAddress::parse("build-box:4000").unwrap();
        assert_eq!(addr.to_string(), "build-box:4000");
        assert_eq!(HostAddress::parse("box").unwrap().port, DEFAULT_PORT);

        match HostAddress::parse("box:x") {
            Err(IndexError::InvalidAddress { address }) => assert_eq!(address, "box:x"),
            other => panic!("expected invalid address, got {:?}", other),
        }
    }
}
