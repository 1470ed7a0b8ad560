//! `gamequery`: an async client for querying Source/GoldSrc game servers,
//! the Valve Master Server, and Source RCON.
//!
//! This crate is a thin facade over [`gq_core`]'s request/response engine
//! and [`gq_wire`]'s protocol codecs — see those crates for the transport,
//! session registry, messenger, Master Server loop, and RCON state
//! machine that do the actual work.

pub mod client;
pub mod error;

pub use client::{Client, PendingInfo};
pub use error::Error;

pub use gq_core::config::Config;
pub use gq_core::master::{MasterEvent, MasterServerClient};
pub use gq_core::messenger::RequestId;
pub use gq_core::rcon::{RconClient, RconState};
pub use gq_core::session::Priority;
pub use gq_wire::a2s::{A2sInfoResponse, PlayerEntry, RuleEntry};
pub use gq_wire::endpoint::ServerEndpoint;
pub use gq_wire::region::Region;

pub type Result<T> = std::result::Result<T, Error>;
