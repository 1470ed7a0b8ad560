//! Mock UDP/TCP servers used by `gq-core`'s and the facade's integration
//! tests: a generic scriptable UDP responder, a Master Server page
//! scripter built on top of it, and a scriptable RCON TCP server.

pub mod mock_master;
pub mod mock_rcon;
pub mod mock_udp;

pub use mock_master::MockMasterServer;
pub use mock_rcon::{MockRconBehavior, MockRconServer};
pub use mock_udp::MockUdpServer;
