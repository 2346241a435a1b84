//! # Dorothy Common Library
//!
//! Shared code for the Dorothy music daemon and its plugins including:
//! - Addressing primitives (node instance paths, resource ids) and their
//!   flat string encoding
//! - Resource value objects (songs, albums, artists)
//! - Bootstrap configuration loading and TOML utilities
//! - The common error type

pub mod address;
pub mod config;
pub mod error;
pub mod models;

pub use address::{NodeCapability, NodeInstancePath, ResourceId, ResourceKind};
pub use error::{Error, Result};
pub use models::{Album, Artist, Song};
