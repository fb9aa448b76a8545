use std::path::PathBuf;

/// Core error type for the bot.
///
/// Adapter crates should map their specific errors into this type so the
/// dispatcher can decide between a degraded reply and a log line.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("storage error: {path}: {source}")]
    Storage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("delivery failed: {0}")]
    Delivery(String),

    #[error("qr encoding failed: {0}")]
    QrEncode(String),

    #[error("external error: {0}")]
    External(String),
}

impl Error {
    pub fn storage(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Storage {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
