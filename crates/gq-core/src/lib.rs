//! Runtime shared by every `gamequery` protocol client: the datagram
//! transport (C1), the session registry (C3), the messenger (C4), the
//! Master Server iteration loop (C5), and the RCON authentication +
//! reassembly state machine (C6).
//!
//! Wire encoding/decoding lives in `gq-wire`; this crate drives sockets,
//! timers, and queues around it.

pub mod a2s;
pub mod config;
pub mod error;
pub mod master;
pub mod messenger;
pub mod rcon;
pub mod session;
pub mod transport;

pub use config::Config;
pub use error::Error;
pub use master::{MasterEvent, MasterServerClient};
pub use messenger::{Messenger, OutboundRequest, RequestId, RequestPayload, ResponseMessage};
pub use rcon::{RconClient, RconState};
pub use session::{Priority, SessionKey, SessionRegistry};
pub use transport::UdpTransport;
