//! Errors surfaced by graph construction and program execution.

use thiserror::Error;

/// Failures raised while parsing a configuration document.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Failures raised during graph construction or while running a program.
///
/// Box-level errors flow through [`smx_channel::ChannelError`] and the
/// [`crate::BoxResult`] return code instead; this type covers the things
/// that are fatal to the *program*, not to a single channel operation.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("a channel named '{0}' was already created")]
    DuplicateChannel(String),
    #[error("a net named '{0}' was already created")]
    DuplicateNet(String),
    #[error("channel '{0}' was not found")]
    UnknownChannel(String),
    #[error("net handle {0} was not found")]
    UnknownNet(u64),
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("failed to spawn thread for net '{0}': {1}")]
    Spawn(String, String),
    #[error("net '{0}' panicked: {1}")]
    NetPanicked(String, String),
}
