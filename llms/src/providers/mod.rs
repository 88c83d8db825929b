//! Vendor translations.
//!
//! Each vendor contributes one [`Vendor`] implementation: how to build its
//! request body, where to send it, and how to read its responses. The four
//! common operations are implemented once by [`Adapter`](crate::Adapter).
//!
//! # Available Vendors
//!
//! - [`reka`] - Reka chat API
//! - [`openai`] - OpenAI and OpenAI-compatible APIs (Groq, DeepSeek, Mistral)
//! - [`anthropic`] - Anthropic messages API
//! - [`bedrock`] - Anthropic models on Amazon Bedrock (Converse API)
//! - [`cohere`] - Cohere chat API
//! - [`google`] - Google Gemini API
//! - [`ollama`] - Ollama local LLM server

use std::fmt;

use serde_json::Value;

use crate::error::{LlmError, Result};
use crate::model_info::ModelTable;
use crate::request::ModelInputs;
use crate::stream::{ChunkEvent, StreamFormat};

#[cfg(feature = "reka")]
pub mod reka;

#[cfg(feature = "openai")]
pub mod openai;

#[cfg(feature = "anthropic")]
pub mod anthropic;

#[cfg(feature = "bedrock")]
pub mod bedrock;

#[cfg(feature = "cohere")]
pub mod cohere;

#[cfg(feature = "google")]
pub mod google;

#[cfg(feature = "ollama")]
pub mod ollama;

#[cfg(feature = "reka")]
pub use reka::Reka;

#[cfg(feature = "openai")]
pub use openai::OpenAI;

#[cfg(feature = "anthropic")]
pub use anthropic::Anthropic;

#[cfg(feature = "bedrock")]
pub use bedrock::Bedrock;

#[cfg(feature = "cohere")]
pub use cohere::Cohere;

#[cfg(feature = "google")]
pub use google::Google;

#[cfg(feature = "ollama")]
pub use ollama::Ollama;

/// One vendor's request/response translation.
pub trait Vendor: fmt::Debug + Clone + Send + Sync + 'static {
    /// Provider name used in errors, logs and the registry.
    fn name(&self) -> &'static str;

    /// Prefix of the `<PREFIX>_API_KEY` style environment variables.
    fn env_prefix(&self) -> &'static str;

    /// API root used when no base URL is configured.
    fn default_base_url(&self) -> &'static str;

    /// Model used when none is configured.
    fn default_model(&self) -> &'static str;

    /// Pricing table.
    fn models(&self) -> ModelTable;

    /// Whether calls need an API key.
    fn requires_api_key(&self) -> bool {
        true
    }

    /// Chat endpoint under `base_url` (no trailing slash).
    ///
    /// Vendors that address the model in the path, or stream from a separate
    /// endpoint, use `model` and `stream`.
    fn chat_url(&self, base_url: &str, model: &str, stream: bool) -> String;

    /// Request headers besides `Content-Type`.
    fn headers(&self, api_key: Option<&str>) -> Vec<(&'static str, String)>;

    /// Vendor request body.
    fn build_body(&self, model: &str, inputs: &ModelInputs, stream: bool) -> Result<Value>;

    /// Completion text of a non-streamed response.
    fn extract_text(&self, payload: Value) -> Result<String>;

    /// Wire framing of streamed responses.
    fn stream_format(&self) -> StreamFormat {
        StreamFormat::Sse
    }

    /// Interpret one stream frame.
    fn parse_chunk(&self, frame: &str) -> Result<ChunkEvent>;

    /// Turn an error response into an [`LlmError`].
    fn parse_error(&self, status: u16, body: &str) -> LlmError;
}

/// Decode a JSON frame or payload, reporting the raw text on failure.
pub(crate) fn decode<T: serde::de::DeserializeOwned>(
    provider: &str,
    expected: &str,
    text: &str,
) -> Result<T> {
    serde_json::from_str(text).map_err(|e| {
        LlmError::response_format(expected, format!("{e} in {text}"))
            .with_provider(provider)
            .into()
    })
}

/// Decode an already parsed payload.
pub(crate) fn decode_value<T: serde::de::DeserializeOwned>(
    provider: &str,
    expected: &str,
    payload: Value,
) -> Result<T> {
    serde_json::from_value(payload).map_err(|e| {
        LlmError::response_format(expected, e.to_string())
            .with_provider(provider)
            .into()
    })
}

/// Common payload `{model, messages, temperature, max_tokens, ..extra}`.
pub(crate) fn base_body(model: &str, inputs: &ModelInputs) -> Result<serde_json::Map<String, Value>> {
    let mut body = inputs.to_json()?;
    body.insert("model".into(), Value::from(model));
    Ok(body)
}
