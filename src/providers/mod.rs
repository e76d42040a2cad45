// External service capabilities
// Embedding and chat completion are network-backed and may fail at any call

pub mod openai;
#[cfg(any(test, feature = "testing"))]
pub mod testing;


use std::env;
use std::fmt;

use thiserror::Error;

use crate::{MemoryError, Result};

pub use openai::OpenAiClient;

pub const DEFAULT_API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Failure reported by an embedding or consultation call
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Authentication failed (HTTP {0})")]
    Auth(u16),

    #[error("Rate limited by provider")]
    RateLimited,

    #[error("Provider returned HTTP {0}")]
    Status(u16),

    #[error("Malformed provider payload: {0}")]
    Malformed(String),

    #[error("Request failed: {0}")]
    Request(String),
}

impl ProviderError {
    /// Whether repeating the same request could succeed
    #[inline]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(_) | Self::Timeout(_) | Self::RateLimited => true,
            Self::Status(status) => *status >= 500,
            Self::Auth(_) | Self::Malformed(_) | Self::Request(_) => false,
        }
    }
}

/// Maps text to a fixed-dimension vector
pub trait EmbeddingProvider: Send + Sync {
    fn embed(&self, text: &str) -> std::result::Result<Vec<f32>, ProviderError>;
}

/// Answers a prompt with a text completion
pub trait ConsultationService: Send + Sync {
    fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> std::result::Result<String, ProviderError>;
}

/// API credential read once at startup
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    api_key: String,
}

impl Credentials {
    #[inline]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
        }
    }

    /// Read the key from `var`. An unset or blank variable is a
    /// [`MemoryError::MissingCredential`].
    #[inline]
    pub fn from_env(var: &str) -> Result<Self> {
        match env::var(var) {
            Ok(key) if !key.trim().is_empty() => Ok(Self::new(key.trim())),
            _ => Err(MemoryError::MissingCredential(var.to_string())),
        }
    }

    #[inline]
    pub fn api_key(&self) -> &str {
        &self.api_key
    }
}

impl fmt::Debug for Credentials {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &"<redacted>")
            .finish()
    }
}
