use crate::session::SessionKey;

/// The error taxonomy surfaced via each request's completion handle. The
/// dispatch loop never dies on a single request's failure — every fallible
/// step here maps to one of these variants instead of propagating up and
/// killing the Messenger task.
#[derive(Debug, thiserror::Error, Clone)]
pub enum Error {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("encoding error: {0}")]
    Encoding(String),

    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    #[error("unrecognized message ({len} bytes, discriminator {discriminator:#04x})")]
    UnrecognizedMessage { discriminator: u8, len: usize },

    #[error("packet exceeds {limit}-byte MTU cap ({actual} bytes)")]
    PacketSizeLimitExceeded { limit: usize, actual: usize },

    #[error("request timed out")]
    RequestTimedOut,

    #[error("duplicate session for key {0:?}")]
    DuplicateSession(SessionKey),

    #[error("rcon authentication failed")]
    AuthenticationFailed,

    #[error("request cancelled")]
    Cancelled,
}

impl From<gq_wire::WireError> for Error {
    fn from(e: gq_wire::WireError) -> Self {
        match e {
            gq_wire::WireError::MalformedPayload(msg) => Error::MalformedPayload(msg),
            gq_wire::WireError::UnrecognizedMessage { discriminator, len, .. } => {
                Error::UnrecognizedMessage { discriminator, len }
            }
        }
    }
}
