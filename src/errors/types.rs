//! Error type definitions for the guide ingestion service
//!
//! This module defines the error hierarchy used throughout the crate. Only
//! [`SourceError`] is ever produced per channel; everything else describes
//! the fate of a whole job or request.

use thiserror::Error;

use crate::models::NormalizedSchedule;

/// Top-level application error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Provider errors that escaped a single channel (e.g. client construction)
    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    /// Cycle-level ingestion outcomes
    #[error("Ingestion error: {0}")]
    Ingestion(#[from] IngestionError),

    /// Persistence errors
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Validation errors
    #[error("Validation error: {message}")]
    Validation { message: String },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Generic internal errors
    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Errors raised while fetching one channel's schedule from the provider
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    /// The fetch did not complete within the configured timeout
    #[error("Request timed out after {timeout_secs}s: channel {channel_id}")]
    Timeout { channel_id: String, timeout_secs: u64 },

    /// Non-success HTTP status from the provider
    #[error("HTTP error: {status} - {message}")]
    Http { status: u16, message: String },

    /// Transport-level failure (DNS, connect, TLS, reset)
    #[error("Network error: {message}")]
    Network { message: String },

    /// Response body could not be decoded
    #[error("Parse error: {source_type} - {message}")]
    ParseError { source_type: String, message: String },

    /// Invalid provider configuration
    #[error("Invalid configuration: {field} - {message}")]
    InvalidConfig { field: String, message: String },
}

/// Cycle-level ingestion errors
#[derive(Error, Debug)]
pub enum IngestionError {
    /// Some channels were still failing once the retry cap was reached.
    /// The records gathered from every other channel travel with the error.
    #[error(
        "retries exhausted after {rounds} round(s); {} channel(s) unresolved: {}",
        .failed_channels.len(),
        .failed_channels.join(", ")
    )]
    RetriesExhausted {
        rounds: u32,
        failed_channels: Vec<String>,
        partial: Vec<NormalizedSchedule>,
    },

    /// The cycle was cancelled before every channel resolved
    #[error("ingestion cancelled with {pending} channel(s) unresolved")]
    Cancelled {
        pending: usize,
        partial: Vec<NormalizedSchedule>,
    },

    /// Nothing to ingest
    #[error("no channels available for ingestion")]
    NoChannels,
}

/// Persistence errors for schedules, channels and the run marker
#[derive(Error, Debug)]
pub enum StorageError {
    /// Filesystem failures
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Data serialization/deserialization failures
    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Convenience methods for creating common error types
impl AppError {
    /// Create a validation error with a custom message
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

impl SourceError {
    /// Create a network error from any displayable cause
    pub fn network<S: Into<String>>(message: S) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    /// Create a parse error for the given source type
    pub fn parse<S: Into<String>, M: Into<String>>(source_type: S, message: M) -> Self {
        Self::ParseError {
            source_type: source_type.into(),
            message: message.into(),
        }
    }
}

impl StorageError {
    pub fn io<P: Into<String>>(path: P, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
