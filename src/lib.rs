//! annotool - Client-side data layer for timeline video annotation
//!
//! Resource synchronization against the annotations backend, track visibility
//! policy and loop playback windows, with a small CLI on top.

pub mod cli;
pub mod config;
pub mod context;
pub mod looping;
pub mod resource;
pub mod sync;
pub mod tracks;

use thiserror::Error;

/// Main error type for annotool
#[derive(Error, Debug)]
pub enum AnnotoolError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A save was blocked by local validation
    #[error("Validation error: {0}")]
    Validation(String),

    /// Non-success HTTP response
    #[error("{status}, {message}")]
    Transport { status: u16, message: String },

    /// Network failure before any status was received
    #[error("0, {0}")]
    Http(#[from] reqwest::Error),

    /// Caller bug, e.g. a required constructor attribute is missing
    #[error("Contract violation: {0}")]
    Contract(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    Other(String),
}

impl AnnotoolError {
    pub fn contract(msg: impl Into<String>) -> Self {
        Self::Contract(msg.into())
    }

    pub fn transport(status: u16, message: impl Into<String>) -> Self {
        Self::Transport {
            status,
            message: message.into(),
        }
    }

    /// HTTP status carried by a transport failure, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Transport { status, .. } => Some(*status),
            Self::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, AnnotoolError>;

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = "annotool";
