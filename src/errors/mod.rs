//! Centralized error handling for the guide ingestion service
//!
//! Errors are split by the layer that raises them so that callers can decide
//! what is retryable and what is terminal.
//!
//! # Error Categories
//!
//! - **Source Errors**: provider connectivity, status codes, timeouts and payload decoding.
//!   These are per-channel and always feed the retry path.
//! - **Ingestion Errors**: cycle-level outcomes such as exhausted retries or cancellation.
//! - **Storage Errors**: schedule, channel and run-marker persistence failures.
//! - **Validation Errors**: rejected requests (for example an empty timeline window).
//!
//! # Usage
//!
//! ```rust
//! use epg_grid::errors::{AppError, AppResult};
//!
//! fn example_function() -> AppResult<String> {
//!     Err(AppError::validation("window start must precede window end"))
//! }
//! ```

pub mod types;

pub use types::*;

/// Convenience type alias for Results using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Convenience type alias for Source Results
pub type SourceResult<T> = Result<T, SourceError>;

/// Convenience type alias for Storage Results
pub type StorageResult<T> = Result<T, StorageError>;
