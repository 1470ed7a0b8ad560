//! Valve Master Server wire format.
//!
//! Request: `31 <region:u8> <"addr:port\0"> <"\filter\value...\0">`
//! Response: `FF FF FF FF 66 0A` followed by N * (ip:4 bytes BE, port:u16 BE).
//! The terminator entry is the 6-byte encoding of `0.0.0.0:0`.

use crate::endpoint::ServerEndpoint;
use crate::error::WireError;
use crate::reader::PacketReader;
use crate::region::Region;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

const REQUEST_HEADER: u8 = 0x31;
const RESPONSE_HEADER: [u8; 6] = [0xFF, 0xFF, 0xFF, 0xFF, 0x66, 0x0A];

/// A Master Server pagination request.
///
/// `seed` is the cursor: `ServerEndpoint::SENTINEL` on the first request,
/// otherwise the last endpoint of the previous page (spec.md §3, §4.5).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MasterServerRequest {
    pub region: Region,
    pub seed: ServerEndpoint,
    /// Raw Valve filter string, e.g. `\gamedir\cstrike\empty\1`. Empty string
    /// means no filter.
    pub filter: String,
}

impl MasterServerRequest {
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(32);
        out.push(REQUEST_HEADER);
        out.push(self.region.to_byte());
        out.extend_from_slice(self.seed.to_string().as_bytes());
        out.push(0);
        out.extend_from_slice(self.filter.as_bytes());
        out.push(0);
        out
    }
}

/// A decoded page of the Master Server response.
///
/// `entries` is the raw ordered sequence of endpoints exactly as received,
/// including the echoed seed (if present) and the terminator (if present).
/// De-duplicating the echoed seed and stopping at the terminator is the
/// caller's job (the Master Server loop in gq-core), per spec.md §3's
/// "MUST be de-duplicated by the caller" invariant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MasterServerResponse {
    pub entries: Vec<ServerEndpoint>,
}

impl MasterServerResponse {
    pub fn decode(buf: &[u8]) -> Result<MasterServerResponse, WireError> {
        if buf.len() < RESPONSE_HEADER.len() {
            return Err(WireError::malformed("master response shorter than header"));
        }
        if buf[..RESPONSE_HEADER.len()] != RESPONSE_HEADER {
            return Err(WireError::unrecognized(buf[0], buf));
        }
        let mut reader = PacketReader::new(&buf[RESPONSE_HEADER.len()..]);
        let mut entries = Vec::new();
        while !reader.is_empty() {
            let ip = reader.read_u32_be()?;
            let port = reader.read_u16_be()?;
            let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::from(ip)), port);
            entries.push(ServerEndpoint::new(addr));
        }
        Ok(MasterServerResponse { entries })
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::from(RESPONSE_HEADER);
        for entry in &self.entries {
            if let SocketAddr::V4(v4) = entry.addr() {
                out.extend_from_slice(&v4.ip().octets());
                out.extend_from_slice(&v4.port().to_be_bytes());
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_round_trip_bytes() {
        let req = MasterServerRequest {
            region: Region::Rest,
            seed: ServerEndpoint::SENTINEL,
            filter: String::new(),
        };
        let bytes = req.encode();
        assert_eq!(bytes[0], REQUEST_HEADER);
        assert_eq!(bytes[1], 0xFF);
        assert!(bytes.ends_with(b"0.0.0.0:0\0\0"));
    }

    #[test]
    fn response_decode_s1_single_page_with_terminator() {
        let mut raw = Vec::from(RESPONSE_HEADER);
        for (ip, port) in [([1, 2, 3, 4], 100u16), ([5, 6, 7, 8], 200), ([9, 10, 11, 12], 300)] {
            raw.extend_from_slice(&ip);
            raw.extend_from_slice(&port.to_be_bytes());
        }
        raw.extend_from_slice(&[0, 0, 0, 0, 0, 0]);

        let resp = MasterServerResponse::decode(&raw).unwrap();
        assert_eq!(resp.entries.len(), 4);
        assert!(resp.entries.last().unwrap().is_sentinel());
    }

    #[test]
    fn response_decode_round_trips_to_same_bytes() {
        let resp = MasterServerResponse {
            entries: vec![
                ServerEndpoint::new("1.2.3.4:27015".parse().unwrap()),
                ServerEndpoint::SENTINEL,
            ],
        };
        let encoded = resp.encode();
        let decoded = MasterServerResponse::decode(&encoded).unwrap();
        assert_eq!(decoded, resp);
        assert_eq!(decoded.encode(), encoded);
    }

    #[test]
    fn unknown_header_is_unrecognized() {
        let raw = [0xFF, 0xFF, 0xFF, 0xFF, 0x12, 0x34];
        assert!(matches!(
            MasterServerResponse::decode(&raw),
            Err(WireError::UnrecognizedMessage { .. })
        ));
    }
}
