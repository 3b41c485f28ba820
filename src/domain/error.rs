use thiserror::Error;

/// Errors surfaced by the cache core.
///
/// Precondition failures (`add` on a live key, `replace` on a missing one)
/// are reported as `Ok(false)` by the operations themselves and never reach
/// this type. Remote store failures do, on reads and writes alike.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Backend error: {message}")]
    Backend { message: String },

    #[error("Serialization error: {message}")]
    Serialization { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },
}

impl CacheError {
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
        }
    }

    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }
}
