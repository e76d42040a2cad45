
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, warn};
use url::Url;

use super::{ConsultationService, Credentials, EmbeddingProvider, ProviderError};
use crate::config::ProviderConfig;
use crate::{MemoryError, Result};

const EXPONENTIAL_BACKOFF_BASE: u32 = 2;
const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_secs(1);

/// Blocking client for OpenAI-compatible `/embeddings` and
/// `/chat/completions` endpoints
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    base_url: Url,
    embedding_model: String,
    chat_model: String,
    credentials: Credentials,
    agent: ureq::Agent,
    retry_attempts: u32,
    retry_backoff: Duration,
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: [&'a str; 1],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    content: Option<String>,
}

impl OpenAiClient {
    #[inline]
    pub fn new(config: &ProviderConfig, credentials: Credentials) -> Result<Self> {
        let base_url = config
            .api_url()
            .map_err(|e| MemoryError::Config(e.to_string()))?;

        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(config.timeout_seconds)))
            .build()
            .into();

        Ok(Self {
            base_url,
            embedding_model: config.embedding_model.clone(),
            chat_model: config.chat_model.clone(),
            credentials,
            agent,
            retry_attempts: config.retry_attempts.max(1),
            retry_backoff: DEFAULT_RETRY_BACKOFF,
        })
    }

    #[inline]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.agent = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .build()
            .into();
        self
    }

    #[inline]
    pub fn with_retry_attempts(mut self, attempts: u32) -> Self {
        self.retry_attempts = attempts.max(1);
        self
    }

    /// Delay before the first retry; doubles on each further attempt
    #[inline]
    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    /// Embed a single text
    #[inline]
    pub fn generate_embedding(&self, text: &str) -> std::result::Result<Vec<f32>, ProviderError> {
        debug!("Generating embedding for text (length: {})", text.len());

        let url = self.endpoint("embeddings")?;
        let request = EmbeddingRequest {
            model: &self.embedding_model,
            input: [text],
        };
        let request_json = serde_json::to_string(&request)
            .map_err(|e| ProviderError::Malformed(format!("embedding request: {}", e)))?;

        let response_text = self.post_with_retry(&url, &request_json)?;

        let response: EmbeddingResponse = serde_json::from_str(&response_text)
            .map_err(|e| ProviderError::Malformed(format!("embedding response: {}", e)))?;

        let embedding = response
            .data
            .into_iter()
            .next()
            .map(|data| data.embedding)
            .ok_or_else(|| ProviderError::Malformed("embedding response has no data".to_string()))?;

        if embedding.is_empty() {
            return Err(ProviderError::Malformed(
                "embedding response contains an empty vector".to_string(),
            ));
        }

        debug!("Generated embedding with {} dimensions", embedding.len());
        Ok(embedding)
    }

    /// Run a two-message chat completion and return the reply text
    #[inline]
    pub fn chat_completion(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> std::result::Result<String, ProviderError> {
        debug!(
            "Requesting chat completion from {} (prompt length: {})",
            self.chat_model,
            user_prompt.len()
        );

        let url = self.endpoint("chat/completions")?;
        let request = ChatRequest {
            model: &self.chat_model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: user_prompt,
                },
            ],
        };
        let request_json = serde_json::to_string(&request)
            .map_err(|e| ProviderError::Malformed(format!("chat request: {}", e)))?;

        let response_text = self.post_with_retry(&url, &request_json)?;

        let response: ChatResponse = serde_json::from_str(&response_text)
            .map_err(|e| ProviderError::Malformed(format!("chat response: {}", e)))?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| ProviderError::Malformed("chat response has no content".to_string()))
    }

    fn endpoint(&self, path: &str) -> std::result::Result<Url, ProviderError> {
        self.base_url
            .join(path)
            .map_err(|e| ProviderError::Request(format!("failed to build {} URL: {}", path, e)))
    }

    fn post_with_retry(&self, url: &Url, body: &str) -> std::result::Result<String, ProviderError> {
        let authorization = format!("Bearer {}", self.credentials.api_key());

        self.make_request_with_retry(|| {
            self.agent
                .post(url.as_str())
                .header("Authorization", authorization.as_str())
                .header("Content-Type", "application/json")
                .send(body)
                .and_then(|mut resp| resp.body_mut().read_to_string())
        })
    }

    fn make_request_with_retry<F>(&self, mut request_fn: F) -> std::result::Result<String, ProviderError>
    where
        F: FnMut() -> std::result::Result<String, ureq::Error>,
    {
        let mut last_error = None;

        for attempt in 1..=self.retry_attempts {
            debug!("HTTP request attempt {}/{}", attempt, self.retry_attempts);

            match request_fn() {
                Ok(response_text) => {
                    debug!("Request succeeded on attempt {}", attempt);
                    return Ok(response_text);
                }
                Err(error) => {
                    let error = classify_error(error);

                    if !error.is_retryable() {
                        warn!("Non-retryable error: {}", error);
                        return Err(error);
                    }

                    warn!(
                        "Retryable error: {}, attempt {}/{}",
                        error, attempt, self.retry_attempts
                    );
                    last_error = Some(error);

                    // Wait before retry (exponential backoff)
                    if attempt < self.retry_attempts {
                        let delay = self.retry_backoff * EXPONENTIAL_BACKOFF_BASE.pow(attempt - 1);
                        debug!("Waiting {:?} before retry", delay);
                        std::thread::sleep(delay);
                    }
                }
            }
        }

        error!("All retry attempts failed for request to {}", self.base_url);

        Err(last_error
            .unwrap_or_else(|| ProviderError::Network("request failed after retries".to_string())))
    }
}

fn classify_error(error: ureq::Error) -> ProviderError {
    match error {
        ureq::Error::StatusCode(status @ (401 | 403)) => ProviderError::Auth(status),
        ureq::Error::StatusCode(429) => ProviderError::RateLimited,
        ureq::Error::StatusCode(status) => ProviderError::Status(status),
        ureq::Error::Timeout(_) => ProviderError::Timeout(error.to_string()),
        ureq::Error::ConnectionFailed | ureq::Error::HostNotFound | ureq::Error::Io(_) => {
            ProviderError::Network(error.to_string())
        }
        other => ProviderError::Request(other.to_string()),
    }
}

impl EmbeddingProvider for OpenAiClient {
    #[inline]
    fn embed(&self, text: &str) -> std::result::Result<Vec<f32>, ProviderError> {
        self.generate_embedding(text)
    }
}

impl ConsultationService for OpenAiClient {
    #[inline]
    fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> std::result::Result<String, ProviderError> {
        self.chat_completion(system_prompt, user_prompt)
    }
}
