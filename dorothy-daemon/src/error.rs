//! Error types for dorothy-daemon
//!
//! Node failures are not part of this enum: they are reported by nodes as
//! [`NodeFailure`](crate::node::NodeFailure) values and recovered at the
//! orchestrator/channel boundary.

use thiserror::Error;

/// Main error type for the daemon
#[derive(Error, Debug)]
pub enum Error {
    /// Channel-qualified command named a channel that does not exist
    #[error("Channel not found: {0}")]
    ChannelNotFound(String),

    /// Plugin manifest rejected (duplicate node names)
    #[error("Plugin manifest error: {0}")]
    Manifest(String),

    /// Node configuration file loading or validation errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Addressing, bootstrap config and TOML errors from dorothy-common
    #[error(transparent)]
    Common(#[from] dorothy_common::Error),
}

/// Convenience Result type using the daemon Error
pub type Result<T> = std::result::Result<T, Error>;
