//! Deterministic in-process providers for tests and offline runs.

use std::sync::Mutex;
use std::time::Duration;

use super::{ConsultationService, EmbeddingProvider, ProviderError};

struct Rule {
    needle: String,
    outcome: Result<Vec<f32>, ProviderError>,
    delay: Option<Duration>,
}

/// Embeds text by substring rules: the first rule whose needle occurs in the
/// text decides the result. Text matching no rule falls back to a hashed
/// vector so every input still gets a stable embedding.
pub struct RuleEmbedder {
    dimension: usize,
    rules: Vec<Rule>,
    calls: Mutex<Vec<String>>,
}

impl RuleEmbedder {
    #[inline]
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            rules: Vec::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    #[inline]
    pub fn with_rule(mut self, needle: &str, vector: Vec<f32>) -> Self {
        self.rules.push(Rule {
            needle: needle.to_string(),
            outcome: Ok(vector),
            delay: None,
        });
        self
    }

    /// Like [`with_rule`](Self::with_rule) but sleeps before answering
    #[inline]
    pub fn with_slow_rule(mut self, needle: &str, vector: Vec<f32>, delay: Duration) -> Self {
        self.rules.push(Rule {
            needle: needle.to_string(),
            outcome: Ok(vector),
            delay: Some(delay),
        });
        self
    }

    #[inline]
    pub fn failing_on(mut self, needle: &str, error: ProviderError) -> Self {
        self.rules.push(Rule {
            needle: needle.to_string(),
            outcome: Err(error),
            delay: None,
        });
        self
    }

    /// Texts embedded so far, in call order
    #[inline]
    pub fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }
}

impl EmbeddingProvider for RuleEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(text.to_string());
        }

        match self.rules.iter().find(|rule| text.contains(&rule.needle)) {
            Some(rule) => {
                if let Some(delay) = rule.delay {
                    std::thread::sleep(delay);
                }
                rule.outcome.clone()
            }
            None => Ok(hashed_vector(text, self.dimension)),
        }
    }
}

/// Spread the bytes of `text` over `dimension` buckets and normalise
#[inline]
pub fn hashed_vector(text: &str, dimension: usize) -> Vec<f32> {
    let mut vector = vec![0.0_f32; dimension];
    if dimension == 0 {
        return vector;
    }

    for (i, byte) in text.bytes().enumerate() {
        let bucket = (usize::from(byte) * 31 + i) % dimension;
        vector[bucket] += 1.0;
    }

    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for value in &mut vector {
            *value /= norm;
        }
    }
    vector
}

/// Consultation fake that returns a canned reply and remembers prompts
pub struct ScriptedConsultant {
    reply: Result<String, ProviderError>,
    prompts: Mutex<Vec<(String, String)>>,
}

impl ScriptedConsultant {
    #[inline]
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: Ok(reply.to_string()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    #[inline]
    pub fn failing(error: ProviderError) -> Self {
        Self {
            reply: Err(error),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// `(system, user)` prompt pairs received so far
    #[inline]
    pub fn prompts(&self) -> Vec<(String, String)> {
        self.prompts
            .lock()
            .map(|prompts| prompts.clone())
            .unwrap_or_default()
    }
}

impl ConsultationService for ScriptedConsultant {
    fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String, ProviderError> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push((system_prompt.to_string(), user_prompt.to_string()));
        }
        self.reply.clone()
    }
}
