//! Text-Generation Gateway
//!
//! Narrow boundary to an external generative-language service: send a prompt,
//! get raw text back, and decode JSON replies that may arrive wrapped in a
//! markdown code fence. No retries and no caching; each call is one round trip.

mod gemini;

pub use gemini::{GeminiClient, GeminiClientConfig};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

use crate::metrics::{GATEWAY_REQUESTS, UNPARSEABLE_REPLIES};

/// Reply format hint passed to the service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseFormat {
    Json,
    #[default]
    Text,
}

impl ResponseFormat {
    pub fn mime_type(&self) -> &'static str {
        match self {
            ResponseFormat::Json => "application/json",
            ResponseFormat::Text => "text/plain",
        }
    }
}

/// One generation request
#[derive(Debug, Clone, Default)]
pub struct GenerateRequest {
    pub prompt: String,
    pub system_instruction: Option<String>,
    pub response_format: ResponseFormat,
    /// Ask the service for its low-latency mode (no extended reasoning)
    pub fast_mode: bool,
    pub seed: Option<u64>,
    pub temperature: Option<f32>,
}

impl GenerateRequest {
    pub fn json(prompt: impl Into<String>) -> Self {
        GenerateRequest {
            prompt: prompt.into(),
            response_format: ResponseFormat::Json,
            ..Default::default()
        }
    }

    pub fn fast(mut self) -> Self {
        self.fast_mode = true;
        self
    }

    pub fn with_system_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.system_instruction = Some(instruction.into());
        self
    }
}

/// Gateway failures. Callers must not assume partial success.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("text generation temporarily unavailable: http error: {0}")]
    Http(String),
    #[error("text generation temporarily unavailable: response error: {0}")]
    Response(String),
    #[error("text generation temporarily unavailable: serialization error: {0}")]
    Serialization(String),
    #[error("text generation temporarily unavailable: no service configured")]
    NotConfigured,
}

/// A generative-language backend
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, request: GenerateRequest) -> Result<String, GatewayError>;
}

#[async_trait]
impl<T: TextGenerator + ?Sized> TextGenerator for Arc<T> {
    async fn generate(&self, request: GenerateRequest) -> Result<String, GatewayError> {
        (**self).generate(request).await
    }
}

/// Decode a JSON reply, tolerating a surrounding markdown code fence with or
/// without a language tag. Returns `None` when the payload is not valid JSON
/// for `T`.
pub fn parse_json<T: DeserializeOwned>(raw: &str) -> Option<T> {
    let cleaned = strip_code_fence(raw);
    match serde_json::from_str(cleaned) {
        Ok(value) => Some(value),
        Err(e) => {
            debug!(error = %e, payload = cleaned, "Failed to parse JSON reply");
            None
        }
    }
}

fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(body) = trimmed
        .strip_prefix("```")
        .and_then(|rest| rest.strip_suffix("```"))
    else {
        return trimmed;
    };
    body.trim_start_matches(|c: char| c.is_alphanumeric() || c == '_')
        .trim()
}

/// Issue one request and decode the reply as `T`.
///
/// `Ok(None)` means the service answered with something unusable; callers
/// treat it like a failure but it is not a transport error.
pub async fn request_json<T, G>(
    generator: &G,
    request: GenerateRequest,
) -> Result<Option<T>, GatewayError>
where
    T: DeserializeOwned,
    G: TextGenerator + ?Sized,
{
    debug!(prompt = %request.prompt, "Sending prompt");
    let raw = match generator.generate(request).await {
        Ok(raw) => {
            GATEWAY_REQUESTS.with_label_values(&["ok"]).inc();
            raw
        }
        Err(e) => {
            GATEWAY_REQUESTS.with_label_values(&["error"]).inc();
            return Err(e);
        }
    };

    let parsed = parse_json::<T>(&raw);
    if parsed.is_none() {
        UNPARSEABLE_REPLIES.inc();
        warn!(reply_len = raw.len(), "Gateway reply did not match the expected JSON shape");
    }
    Ok(parsed)
}
