/// Decode-time errors. Decoders are total: any malformed input produces one
/// of these, never a panic.
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    #[error("unrecognized message (discriminator {discriminator:#04x}, {len} bytes)")]
    UnrecognizedMessage { discriminator: u8, raw: Vec<u8>, len: usize },
}

impl WireError {
    pub fn malformed(reason: impl Into<String>) -> Self {
        WireError::MalformedPayload(reason.into())
    }

    pub fn unrecognized(discriminator: u8, raw: &[u8]) -> Self {
        WireError::UnrecognizedMessage {
            discriminator,
            raw: raw.to_vec(),
            len: raw.len(),
        }
    }
}
