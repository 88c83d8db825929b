//! Reka chat API.
//!
//! Requests go to `POST {base}/chat` with an `X-Api-Key` header. The body is
//! the common payload plus `model` and, when streaming, `stream: true`.
//! Streamed responses are server-sent events whose payload carries the
//! fragment in `responses[0].chunk.content`.

use serde::Deserialize;
use serde_json::Value;

use crate::error::{LlmError, Result};
use crate::model_info::{ModelInfo, ModelTable};
use crate::request::ModelInputs;
use crate::stream::ChunkEvent;

use super::{Vendor, base_body, decode, decode_value};

const MODELS: ModelTable = &[
    ("reka-edge", ModelInfo::new(0.4, 1.0, 128_000)),
    ("reka-flash", ModelInfo::new(0.8, 2.0, 128_000)),
    ("reka-core", ModelInfo::new(3.0, 15.0, 128_000)),
];

/// Reka vendor translation.
#[derive(Debug, Clone, Copy, Default)]
pub struct Reka;

impl Reka {
    /// Default Reka API base URL.
    pub const DEFAULT_BASE_URL: &'static str = "https://api.reka.ai/v1";
    /// Default model.
    pub const DEFAULT_MODEL: &'static str = "reka-core";
}

/// Message content: plain text or a list of typed parts.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RekaContent {
    Text(String),
    Parts(Vec<RekaContentPart>),
}

#[derive(Debug, Deserialize)]
struct RekaContentPart {
    #[serde(default)]
    text: Option<String>,
}

impl RekaContent {
    fn into_text(self) -> String {
        match self {
            Self::Text(text) => text,
            Self::Parts(parts) => parts.into_iter().filter_map(|p| p.text).collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RekaChatResponse {
    responses: Vec<RekaResponse>,
}

#[derive(Debug, Deserialize)]
struct RekaResponse {
    message: RekaMessage,
}

#[derive(Debug, Deserialize)]
struct RekaMessage {
    content: RekaContent,
}

#[derive(Debug, Deserialize)]
struct RekaStreamChunk {
    responses: Vec<RekaStreamResponse>,
}

#[derive(Debug, Deserialize)]
struct RekaStreamResponse {
    chunk: RekaMessage,
}

#[derive(Debug, Deserialize)]
struct RekaErrorResponse {
    detail: Value,
}

impl Vendor for Reka {
    fn name(&self) -> &'static str {
        "reka"
    }

    fn env_prefix(&self) -> &'static str {
        "REKA"
    }

    fn default_base_url(&self) -> &'static str {
        Self::DEFAULT_BASE_URL
    }

    fn default_model(&self) -> &'static str {
        Self::DEFAULT_MODEL
    }

    fn models(&self) -> ModelTable {
        MODELS
    }

    fn chat_url(&self, base_url: &str, _model: &str, _stream: bool) -> String {
        format!("{base_url}/chat")
    }

    fn headers(&self, api_key: Option<&str>) -> Vec<(&'static str, String)> {
        api_key
            .map(|key| vec![("X-Api-Key", key.to_owned())])
            .unwrap_or_default()
    }

    fn build_body(&self, model: &str, inputs: &ModelInputs, stream: bool) -> Result<Value> {
        let mut body = base_body(model, inputs)?;
        if stream {
            body.insert("stream".into(), Value::Bool(true));
        }
        Ok(Value::Object(body))
    }

    fn extract_text(&self, payload: Value) -> Result<String> {
        let response: RekaChatResponse = decode_value(self.name(), "Reka chat response", payload)?;
        response
            .responses
            .into_iter()
            .next()
            .map(|r| r.message.content.into_text())
            .ok_or_else(|| {
                LlmError::response_format("at least one response", "empty responses")
                    .with_provider(self.name())
                    .into()
            })
    }

    fn parse_chunk(&self, frame: &str) -> Result<ChunkEvent> {
        let chunk: RekaStreamChunk = decode(self.name(), "Reka stream chunk", frame)?;
        Ok(chunk
            .responses
            .into_iter()
            .next()
            .map_or(ChunkEvent::Skip, |r| ChunkEvent::Text(r.chunk.content.into_text())))
    }

    fn parse_error(&self, status: u16, body: &str) -> LlmError {
        match serde_json::from_str::<RekaErrorResponse>(body) {
            Ok(RekaErrorResponse {
                detail: Value::String(message),
            }) => LlmError::from_status(self.name(), status, message),
            Ok(RekaErrorResponse { detail }) => {
                LlmError::from_status(self.name(), status, detail.to_string())
            }
            Err(_) => LlmError::http_status(status, body).with_provider(self.name()),
        }
    }
}
