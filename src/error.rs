use thiserror::Error;

/// Domain errors callers classify on; everything else travels as
/// `anyhow::Error` with context.
#[derive(Error, Debug)]
pub enum MirrorError {
    #[error("Unsupported registry host: {0}")]
    UnsupportedHost(String),

    #[error("Fetching {url} failed after {attempts} attempts: {reason}")]
    RetriesExhausted {
        url: String,
        attempts: u32,
        reason: String,
    },

    #[error("Container runtime error: {0}")]
    Runtime(String),
}
