//! Wire encoding/decoding for the protocols `gq-core` drives: Source A2S
//! (INFO/PLAYERS/RULES), the Valve Master Server, and Source RCON.
//!
//! Every type in this crate is a pure data structure or a pure function
//! from bytes to a typed result — no sockets, no async, no timers. That
//! belongs to `gq-core`.

pub mod a2s;
pub mod endpoint;
pub mod error;
pub mod family;
pub mod master;
pub mod rcon;
pub mod reader;
pub mod region;

pub use endpoint::ServerEndpoint;
pub use error::WireError;
pub use family::ProtocolFamily;
pub use region::Region;
