use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

use thiserror::Error;

/// A reachable UDP address: an IP (v4 or v6) plus port (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Endpoint {
    pub addr: IpAddr,
    pub port: u16,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EndpointError {
    #[error("'{0}' does not look like a numeric IP address (hostnames are not accepted)")]
    NotNumeric(String),
    #[error("endpoint byte encoding has unexpected length {0} (expected 6 or 18)")]
    BadEncodingLen(usize),
}

impl Endpoint {
    pub fn new(addr: IpAddr, port: u16) -> Self {
        Self { addr, port }
    }

    /// Encodes to 6 bytes (IPv4 octets + big-endian port) or 18 bytes
    /// (IPv6 octets + big-endian port), per spec §6.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(18);
        match self.addr {
            IpAddr::V4(v4) => out.extend_from_slice(&v4.octets()),
            IpAddr::V6(v6) => out.extend_from_slice(&v6.octets()),
        }
        out.extend_from_slice(&self.port.to_be_bytes());
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, EndpointError> {
        match bytes.len() {
            6 => {
                let addr = Ipv4Addr::new(bytes[0], bytes[1], bytes[2], bytes[3]);
                let port = u16::from_be_bytes([bytes[4], bytes[5]]);
                Ok(Self { addr: IpAddr::V4(addr), port })
            }
            18 => {
                let mut octets = [0u8; 16];
                octets.copy_from_slice(&bytes[..16]);
                let addr = Ipv6Addr::from(octets);
                let port = u16::from_be_bytes([bytes[16], bytes[17]]);
                Ok(Self { addr: IpAddr::V6(addr), port })
            }
            other => Err(EndpointError::BadEncodingLen(other)),
        }
    }

    /// Parses `a.b.c.d:port`, `[v6]:port`, bare `a.b.c.d`, or bare `v6`,
    /// falling back to `default_port` for the two host-only forms.
    /// Hostnames and malformed/oversized IPv6 literals are rejected —
    /// never resolved.
    pub fn parse_with_default_port(s: &str, default_port: u16) -> Result<Self, EndpointError> {
        if let Ok(sock) = std::net::SocketAddr::from_str(s) {
            return Ok(Self { addr: sock.ip(), port: sock.port() });
        }
        if let Some(inner) = s.strip_prefix('[').and_then(|r| r.strip_suffix(']')) {
            let addr = Ipv6Addr::from_str(inner).map_err(|_| EndpointError::NotNumeric(s.to_string()))?;
            return Ok(Self { addr: IpAddr::V6(addr), port: default_port });
        }
        if let Ok(addr) = Ipv4Addr::from_str(s) {
            return Ok(Self { addr: IpAddr::V4(addr), port: default_port });
        }
        if let Ok(addr) = Ipv6Addr::from_str(s) {
            return Ok(Self { addr: IpAddr::V6(addr), port: default_port });
        }
        Err(EndpointError::NotNumeric(s.to_string()))
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.addr {
            IpAddr::V4(v4) => write!(f, "{v4}:{}", self.port),
            IpAddr::V6(v6) => write!(f, "[{v6}]:{}", self.port),
        }
    }
}

impl FromStr for Endpoint {
    type Err = EndpointError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        std::net::SocketAddr::from_str(s)
            .map(|sock| Self { addr: sock.ip(), port: sock.port() })
            .map_err(|_| EndpointError::NotNumeric(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_v4_with_port() {
        let e = Endpoint::parse_with_default_port("10.0.0.1:9000", 1234).unwrap();
        assert_eq!(e.to_string(), "10.0.0.1:9000");
    }

    #[test]
    fn parses_v6_bracketed_with_port() {
        let e = Endpoint::parse_with_default_port("[::1]:9000", 1234).unwrap();
        assert_eq!(e.port, 9000);
        assert!(e.addr.is_ipv6());
    }

    #[test]
    fn parses_v4_without_port_uses_default() {
        let e = Endpoint::parse_with_default_port("10.0.0.1", 1234).unwrap();
        assert_eq!(e.port, 1234);
    }

    #[test]
    fn parses_v6_without_port_uses_default() {
        let e = Endpoint::parse_with_default_port("::1", 4321).unwrap();
        assert_eq!(e.port, 4321);
        assert!(e.addr.is_ipv6());
    }

    #[test]
    fn rejects_hostnames() {
        assert!(Endpoint::parse_with_default_port("example.com", 80).is_err());
        assert!(Endpoint::parse_with_default_port("example.com:80", 80).is_err());
    }

    #[test]
    fn rejects_oversized_v6() {
        assert!(Endpoint::parse_with_default_port("1:2:3:4:5:6:7:8:9", 80).is_err());
    }

    #[test]
    fn byte_round_trip() {
        let v4 = Endpoint::parse_with_default_port("192.168.1.1:53", 0).unwrap();
        assert_eq!(v4.to_bytes().len(), 6);
        assert_eq!(Endpoint::from_bytes(&v4.to_bytes()).unwrap(), v4);

        let v6 = Endpoint::parse_with_default_port("::1", 53).unwrap();
        assert_eq!(v6.to_bytes().len(), 18);
        assert_eq!(Endpoint::from_bytes(&v6.to_bytes()).unwrap(), v6);
    }
}
