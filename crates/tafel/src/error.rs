//! Error types for tafel.
//!
//! All fallible document-level operations return [`TafelError`]. Failures that are local
//! to a single page never reach this type: the analyzer records them as a
//! [`PageStatus`](crate::core::pipeline::PageStatus) on the page result so that the rest
//! of the document is still returned.
//!
//! # Error Handling Philosophy
//!
//! **System errors MUST always bubble up unchanged:**
//! - `TafelError::Io` (from `std::io::Error`) - e.g. the working directory lookup in
//!   `ReconstructionConfig::discover`
//!
//! Config files that are missing, unreadable or malformed are reported as `Validation`
//! errors naming the file.
//!
//! **Application errors are wrapped with context:**
//! - `Validation` - invalid configuration or parameters
//! - `InvalidFragment` - an OCR fragment rejected at ingestion
//! - `Pipeline` - a broken invariant inside one page's reconstruction
//! - `LockPoisoned` / `WorkerPool` - orchestration infrastructure failures
//!
//! # Example
//!
//! ```rust
//! use tafel::{Result, TafelError};
//!
//! fn check_factor(factor: f64) -> Result<f64> {
//!     if !factor.is_finite() || factor <= 0.0 {
//!         return Err(TafelError::validation(format!("factor must be positive, got {}", factor)));
//!     }
//!     Ok(factor)
//! }
//! ```
use thiserror::Error;

/// Result type alias using `TafelError`.
pub type Result<T> = std::result::Result<T, TafelError>;

/// Main error type for all tafel operations.
///
/// # Variants
///
/// - `Io` - File system and I/O errors (always bubble up)
/// - `Validation` - Invalid configuration or parameters
/// - `InvalidFragment` - A fragment that violates the fragment invariants
/// - `Pipeline` - A reconstruction stage produced an inconsistent result
/// - `Serialization` - JSON/TOML/YAML serialization errors
/// - `WorkerPool` - The page worker pool could not be created
/// - `LockPoisoned` - Mutex poisoning (should not happen in normal operation)
/// - `Cancelled` - The document job was cancelled before it started
/// - `Other` - Catch-all for uncommon errors
#[derive(Debug, Error)]
pub enum TafelError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Validation error: {message}")]
    Validation {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Invalid fragment: {message}")]
    InvalidFragment {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Pipeline error: {message}")]
    Pipeline {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Serialization error: {message}")]
    Serialization {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Worker pool unavailable: {message}")]
    WorkerPool {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Lock poisoned: {0}")]
    LockPoisoned(String),

    #[error("Cancelled: {0}")]
    Cancelled(String),

    #[error("{0}")]
    Other(String),
}

impl From<serde_json::Error> for TafelError {
    fn from(err: serde_json::Error) -> Self {
        TafelError::Serialization {
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }
}

impl From<rayon::ThreadPoolBuildError> for TafelError {
    fn from(err: rayon::ThreadPoolBuildError) -> Self {
        TafelError::WorkerPool {
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }
}

macro_rules! error_constructor {
    ($name:ident, $variant:ident) => {
        pastey::paste! {
            #[doc = "Create a " $variant " error"]
            pub fn $name<S: Into<String>>(message: S) -> Self {
                Self::$variant {
                    message: message.into(),
                    source: None,
                }
            }

            #[doc = "Create a " $variant " error with source"]
            pub fn [<$name _with_source>]<S: Into<String>, E: std::error::Error + Send + Sync + 'static>(
                message: S,
                source: E,
            ) -> Self {
                Self::$variant {
                    message: message.into(),
                    source: Some(Box::new(source)),
                }
            }
        }
    };
}

impl TafelError {
    error_constructor!(validation, Validation);
    error_constructor!(invalid_fragment, InvalidFragment);
    error_constructor!(pipeline, Pipeline);
    error_constructor!(serialization, Serialization);
    error_constructor!(worker_pool, WorkerPool);
}
