//! Error types for runmetrics.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid daemon address {addr:?}: {reason}")]
    DaemonAddress { addr: String, reason: String },

    /// The client was never configured. Not a fault, just nothing to emit to.
    #[error("{0} client is not configured")]
    NotConfigured(&'static str),

    #[error("could not resolve run context: {0}")]
    Context(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("bad config file: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;
