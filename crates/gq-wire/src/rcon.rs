//! Source RCON wire format (TCP, little-endian).
//!
//! `size:i32 | id:i32 | type:i32 | body:UTF-8 NUL | pad:NUL`, where `size`
//! counts every byte after the size field itself.

use crate::error::WireError;
use crate::reader::PacketReader;

pub const TYPE_AUTH: i32 = 3;
/// Shared by `SERVERDATA_AUTH_RESPONSE` (server->client) and
/// `SERVERDATA_EXECCOMMAND` (client->server) — the Source protocol reuses
/// the discriminator in both directions; callers disambiguate by direction,
/// not by this value alone.
pub const TYPE_AUTH_RESPONSE_OR_EXECCOMMAND: i32 = 2;
pub const TYPE_RESPONSE_VALUE: i32 = 0;

const HEADER_LEN: usize = 8; // id + type, the two fields counted by `size` besides the body
const TRAILER_LEN: usize = 2; // body NUL + pad NUL

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RconPacket {
    pub id: i32,
    pub packet_type: i32,
    pub body: String,
}

impl RconPacket {
    pub fn auth(id: i32, password: &str) -> Self {
        RconPacket { id, packet_type: TYPE_AUTH, body: password.to_owned() }
    }

    pub fn exec_command(id: i32, command: &str) -> Self {
        RconPacket {
            id,
            packet_type: TYPE_AUTH_RESPONSE_OR_EXECCOMMAND,
            body: command.to_owned(),
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let body_bytes = self.body.as_bytes();
        let size = (HEADER_LEN + body_bytes.len() + TRAILER_LEN) as i32;
        let mut out = Vec::with_capacity(4 + size as usize);
        out.extend_from_slice(&size.to_le_bytes());
        out.extend_from_slice(&self.id.to_le_bytes());
        out.extend_from_slice(&self.packet_type.to_le_bytes());
        out.extend_from_slice(body_bytes);
        out.push(0);
        out.push(0);
        out
    }

    /// Decodes a single packet given only its body (everything after the
    /// 4-byte size field, with `size` bytes total — the caller, which owns
    /// the TCP stream, is responsible for reading exactly `size` bytes
    /// before calling this).
    pub fn decode_body(body: &[u8]) -> Result<RconPacket, WireError> {
        if body.len() < HEADER_LEN + TRAILER_LEN {
            return Err(WireError::malformed("rcon packet shorter than header+trailer"));
        }
        let mut r = PacketReader::new(body);
        let id = r.read_i32_le()?;
        let packet_type = r.read_i32_le()?;
        let remaining = r.remaining();
        if remaining.len() < TRAILER_LEN {
            return Err(WireError::malformed("rcon packet missing NUL trailer"));
        }
        let body_slice = &remaining[..remaining.len() - TRAILER_LEN];
        let trailer = &remaining[remaining.len() - TRAILER_LEN..];
        if trailer != [0, 0] {
            return Err(WireError::malformed("rcon packet trailer is not double-NUL"));
        }
        let body_str = std::str::from_utf8(body_slice)
            .map_err(|e| WireError::malformed(format!("invalid utf-8 in rcon body: {e}")))?
            .to_owned();
        Ok(RconPacket { id, packet_type, body: body_str })
    }

    /// Reads the 4-byte little-endian size prefix from the start of `buf`.
    pub fn read_size_prefix(buf: &[u8; 4]) -> i32 {
        i32::from_le_bytes(*buf)
    }
}
