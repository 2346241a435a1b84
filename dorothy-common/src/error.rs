//! Common error types for Dorothy

use thiserror::Error;

/// Common result type for Dorothy operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types shared by the daemon and its plugins
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// TOML document could not be written
    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    /// Serialized resource id carries an unknown kind prefix
    #[error("Invalid resource kind: {0}")]
    InvalidResourceKind(String),

    /// Serialized node instance path carries an unknown node capability
    #[error("Invalid node capability: {0}")]
    InvalidNodeCapability(String),

    /// Serialized address does not follow the field/escape layout
    #[error("Malformed address: {0}")]
    MalformedAddress(String),
}
