/// The facade's error type: every failure from the underlying engine or
/// from config loading composes into this one enum via `#[from]`, the
/// pattern `services/receiver/src/session.rs`'s `SessionError` uses for its
/// own upstream error composition.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Engine(#[from] gq_core::Error),

    #[error(transparent)]
    Config(#[from] gq_core::config::ConfigError),
}
