//! Source engine A2S query wire format.
//!
//! All three query kinds share the `FF FF FF FF` packet prefix; the fifth
//! byte is the discriminator. A2S_PLAYERS and A2S_RULES use a challenge
//! handshake: a first request with challenge `0xFFFFFFFF` may be answered
//! with a `0x41` challenge response instead of data, which must be echoed
//! back in a follow-up request (spec.md §3 "A2S challenge handshake").

use crate::error::WireError;
use crate::reader::PacketReader;

const PREFIX: [u8; 4] = [0xFF, 0xFF, 0xFF, 0xFF];
const A2S_INFO_PAYLOAD: &[u8] = b"Source Engine Query\0";

const REQ_INFO: u8 = 0x54;
const REQ_PLAYERS: u8 = 0x55;
const REQ_RULES: u8 = 0x56;

const RESP_INFO: u8 = 0x49;
const RESP_PLAYERS: u8 = 0x44;
const RESP_RULES: u8 = 0x45;
const RESP_CHALLENGE: u8 = 0x41;

pub const CHALLENGE_PLACEHOLDER: u32 = 0xFFFF_FFFF;

// ---------------------------------------------------------------------------
// A2S_INFO
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct A2sInfoRequest;

impl A2sInfoRequest {
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::from(PREFIX);
        out.push(REQ_INFO);
        out.extend_from_slice(A2S_INFO_PAYLOAD);
        out
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct A2sInfoResponse {
    pub protocol: u8,
    pub name: String,
    pub map: String,
    pub folder: String,
    pub game: String,
    pub app_id: u16,
    pub players: u8,
    pub max_players: u8,
    pub bots: u8,
    pub server_type: u8,
    pub environment: u8,
    pub visibility: u8,
    pub vac: u8,
    pub version: String,
    pub extra: A2sInfoExtra,
}

/// Optional EDF-gated tail fields of the A2S_INFO response. Each field is
/// present only when its corresponding bit of the EDF byte is set; absent
/// bits leave the field `None` rather than being treated as malformed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct A2sInfoExtra {
    pub game_port: Option<i16>,
    pub steam_id: Option<u64>,
    pub spectator_port: Option<i16>,
    pub spectator_name: Option<String>,
    pub keywords: Option<String>,
    pub game_id: Option<u64>,
}

const EDF_GAME_PORT: u8 = 0x80;
const EDF_STEAM_ID: u8 = 0x10;
const EDF_SPECTATOR: u8 = 0x40;
const EDF_KEYWORDS: u8 = 0x20;
const EDF_GAME_ID: u8 = 0x01;

impl A2sInfoResponse {
    pub fn decode(buf: &[u8]) -> Result<A2sInfoResponse, WireError> {
        if buf.len() < 5 || buf[..4] != PREFIX {
            return Err(WireError::malformed("a2s_info response missing prefix"));
        }
        if buf[4] != RESP_INFO {
            return Err(WireError::unrecognized(buf[4], buf));
        }
        let mut r = PacketReader::new(&buf[5..]);
        let protocol = r.read_u8()?;
        let name = r.read_cstring()?;
        let map = r.read_cstring()?;
        let folder = r.read_cstring()?;
        let game = r.read_cstring()?;
        let app_id = r.read_u16_le()?;
        let players = r.read_u8()?;
        let max_players = r.read_u8()?;
        let bots = r.read_u8()?;
        let server_type = r.read_u8()?;
        let environment = r.read_u8()?;
        let visibility = r.read_u8()?;
        let vac = r.read_u8()?;
        // The version string and EDF tail are both absent from some
        // stripped/legacy responses; a buffer ending right after `vac` is
        // still a valid, complete response (decoders need not consume the
        // entire buffer, but here we treat "nothing left" as "no tail" so
        // older servers aren't rejected as malformed).
        let version = if r.is_empty() { String::new() } else { r.read_cstring()? };
        let extra = if r.is_empty() {
            A2sInfoExtra::default()
        } else {
            let edf = r.read_u8()?;
            let mut extra = A2sInfoExtra::default();
            if edf & EDF_GAME_PORT != 0 {
                extra.game_port = Some(r.read_u16_le()? as i16);
            }
            if edf & EDF_STEAM_ID != 0 {
                extra.steam_id = Some(r.read_u64_le()?);
            }
            if edf & EDF_SPECTATOR != 0 {
                extra.spectator_port = Some(r.read_u16_le()? as i16);
                extra.spectator_name = Some(r.read_cstring()?);
            }
            if edf & EDF_KEYWORDS != 0 {
                extra.keywords = Some(r.read_cstring()?);
            }
            if edf & EDF_GAME_ID != 0 {
                extra.game_id = Some(r.read_u64_le()?);
            }
            extra
        };
        Ok(A2sInfoResponse {
            protocol,
            name,
            map,
            folder,
            game,
            app_id,
            players,
            max_players,
            bots,
            server_type,
            environment,
            visibility,
            vac,
            version,
            extra,
        })
    }
}

// ---------------------------------------------------------------------------
// A2S_PLAYERS
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct A2sPlayersRequest {
    pub challenge: u32,
}

impl A2sPlayersRequest {
    pub fn initial() -> Self {
        A2sPlayersRequest { challenge: CHALLENGE_PLACEHOLDER }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::from(PREFIX);
        out.push(REQ_PLAYERS);
        out.extend_from_slice(&self.challenge.to_le_bytes());
        out
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlayerEntry {
    pub index: u8,
    pub name: String,
    pub score: i32,
    pub duration: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum A2sPlayersResult {
    Players(Vec<PlayerEntry>),
    Challenge(u32),
}

pub fn decode_a2s_players(buf: &[u8]) -> Result<A2sPlayersResult, WireError> {
    if buf.len() < 5 || buf[..4] != PREFIX {
        return Err(WireError::malformed("a2s_players response missing prefix"));
    }
    match buf[4] {
        RESP_CHALLENGE => {
            let mut r = PacketReader::new(&buf[5..]);
            Ok(A2sPlayersResult::Challenge(r.read_u32_le()?))
        }
        RESP_PLAYERS => {
            let mut r = PacketReader::new(&buf[5..]);
            let count = r.read_u8()?;
            let mut players = Vec::with_capacity(count as usize);
            for _ in 0..count {
                players.push(PlayerEntry {
                    index: r.read_u8()?,
                    name: r.read_cstring()?,
                    score: r.read_i32_le()?,
                    duration: r.read_f32_le()?,
                });
            }
            Ok(A2sPlayersResult::Players(players))
        }
        other => Err(WireError::unrecognized(other, buf)),
    }
}

// ---------------------------------------------------------------------------
// A2S_RULES
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct A2sRulesRequest {
    pub challenge: u32,
}

impl A2sRulesRequest {
    pub fn initial() -> Self {
        A2sRulesRequest { challenge: CHALLENGE_PLACEHOLDER }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::from(PREFIX);
        out.push(REQ_RULES);
        out.extend_from_slice(&self.challenge.to_le_bytes());
        out
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleEntry {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum A2sRulesResult {
    Rules(Vec<RuleEntry>),
    Challenge(u32),
}

pub fn decode_a2s_rules(buf: &[u8]) -> Result<A2sRulesResult, WireError> {
    if buf.len() < 5 || buf[..4] != PREFIX {
        return Err(WireError::malformed("a2s_rules response missing prefix"));
    }
    match buf[4] {
        RESP_CHALLENGE => {
            let mut r = PacketReader::new(&buf[5..]);
            Ok(A2sRulesResult::Challenge(r.read_u32_le()?))
        }
        RESP_RULES => {
            let mut r = PacketReader::new(&buf[5..]);
            let count = r.read_u16_le()?;
            let mut rules = Vec::with_capacity(count as usize);
            for _ in 0..count {
                rules.push(RuleEntry {
                    name: r.read_cstring()?,
                    value: r.read_cstring()?,
                });
            }
            Ok(A2sRulesResult::Rules(rules))
        }
        other => Err(WireError::unrecognized(other, buf)),
    }
}
