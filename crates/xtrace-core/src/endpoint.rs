use crate::error::{ClientError, ConfigError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{SocketAddr, ToSocketAddrs};
use std::str::FromStr;

pub const DEFAULT_DAEMON_HOST: &str = "127.0.0.1";
pub const DEFAULT_DAEMON_PORT: u16 = 2000;

/// Collector address. Resolution is deferred until a segment is sent, so an
/// unresolvable host is not a construction error.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Endpoint {
    host: String,
    port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Resolve to the first socket address. Port 0 is never a valid target.
    pub fn resolve(&self) -> Result<SocketAddr, ClientError> {
        if self.port == 0 {
            return Err(ClientError::InvalidPort(self.port));
        }
        let mut addrs = (self.host.as_str(), self.port)
            .to_socket_addrs()
            .map_err(|source| ClientError::Resolve {
                host: self.host.clone(),
                port: self.port,
                source,
            })?;
        addrs.next().ok_or_else(|| ClientError::NoAddress {
            host: self.host.clone(),
            port: self.port,
        })
    }
}

impl Default for Endpoint {
    fn default() -> Self {
        Self::new(DEFAULT_DAEMON_HOST, DEFAULT_DAEMON_PORT)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

/// Accepts `host:port` and `[v6-addr]:port`.
impl FromStr for Endpoint {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ConfigError::InvalidEndpoint(s.to_string());
        let (host, port) = s.trim().rsplit_once(':').ok_or_else(invalid)?;
        let host = match host.strip_prefix('[') {
            Some(inner) => inner.strip_suffix(']').ok_or_else(invalid)?,
            None if host.contains(':') => return Err(invalid()),
            None => host,
        };
        if host.is_empty() {
            return Err(invalid());
        }
        let port = port.parse::<u16>().map_err(|_| invalid())?;
        Ok(Self::new(host, port))
    }
}

impl TryFrom<String> for Endpoint {
    type Error = ConfigError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Endpoint> for String {
    fn from(endpoint: Endpoint) -> Self {
        endpoint.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_host_port() {
        let e: Endpoint = "127.0.0.1:2000".parse().unwrap();
        assert_eq!(e.host(), "127.0.0.1");
        assert_eq!(e.port(), 2000);

        let e: Endpoint = "xray-daemon:3000".parse().unwrap();
        assert_eq!(e.host(), "xray-daemon");
        assert_eq!(e.to_string(), "xray-daemon:3000");
    }

    #[test]
    fn test_parse_ipv6() {
        let e: Endpoint = "[::1]:2000".parse().unwrap();
        assert_eq!(e.host(), "::1");
        assert_eq!(e.to_string(), "[::1]:2000");
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for bad in ["", "localhost", ":2000", "host:", "host:99999", "::1:2000", "[::1:2000"] {
            assert!(bad.parse::<Endpoint>().is_err(), "accepted {bad:?}");
        }
    }

    #[test]
    fn test_port_zero_fails_at_resolve_time() {
        let e = Endpoint::new("127.0.0.1", 0);
        assert!(matches!(e.resolve(), Err(ClientError::InvalidPort(0))));
    }

    #[test]
    fn test_resolve_loopback() {
        let addr = Endpoint::new("127.0.0.1", 2000).resolve().unwrap();
        assert_eq!(addr, "127.0.0.1:2000".parse::<SocketAddr>().unwrap());
    }
}
