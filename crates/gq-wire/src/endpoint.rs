use std::fmt;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};

/// A game server endpoint: IPv4 or IPv6 address plus port.
///
/// `0.0.0.0:0` is reserved (see [`ServerEndpoint::is_sentinel`]): it is both
/// the seed used to start Master Server iteration and the terminator that
/// ends it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ServerEndpoint(pub SocketAddr);

impl ServerEndpoint {
    /// The reserved sentinel value `0.0.0.0:0`.
    pub const SENTINEL: ServerEndpoint =
        ServerEndpoint(SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0)));

    pub fn new(addr: SocketAddr) -> Self {
        ServerEndpoint(addr)
    }

    pub fn is_sentinel(&self) -> bool {
        *self == Self::SENTINEL
    }

    pub fn addr(&self) -> SocketAddr {
        self.0
    }
}

impl fmt::Display for ServerEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<SocketAddr> for ServerEndpoint {
    fn from(addr: SocketAddr) -> Self {
        ServerEndpoint(addr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinel_is_zero_addr_zero_port() {
        assert_eq!(ServerEndpoint::SENTINEL.to_string(), "0.0.0.0:0");
        assert!(ServerEndpoint::SENTINEL.is_sentinel());
    }

    #[test]
    fn non_sentinel_endpoint_is_not_flagged() {
        let ep: ServerEndpoint = "1.2.3.4:27015".parse::<SocketAddr>().unwrap().into();
        assert!(!ep.is_sentinel());
    }
}
