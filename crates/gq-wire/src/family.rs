/// The protocol family a session belongs to.
///
/// Used alongside the remote address as the session-key discriminator.
/// These families carry no in-payload request id, so the family plus
/// remote address is the whole key. RCON does not use this registry at
/// all — a connection's commands are already serialized one at a time by
/// its own actor task (see `gq_core::rcon`), so there is no concurrent
/// in-flight set to correlate against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProtocolFamily {
    A2sInfo,
    A2sPlayers,
    A2sRules,
    Master,
}
