//! Ollama local LLM server.
//!
//! Ollama needs no API key and streams newline-delimited JSON rather than
//! server-sent events. Sampling parameters live under `options`.

use serde::Deserialize;
use serde_json::{Value, json};

use crate::error::{LlmError, Result};
use crate::model_info::ModelTable;
use crate::request::ModelInputs;
use crate::stream::{ChunkEvent, StreamFormat};

use super::{Vendor, decode, decode_value};

/// Ollama vendor translation.
#[derive(Debug, Clone, Copy, Default)]
pub struct Ollama;

impl Ollama {
    /// Default Ollama server URL.
    pub const DEFAULT_BASE_URL: &'static str = "http://localhost:11434";
    /// Default model.
    pub const DEFAULT_MODEL: &'static str = "llama3";
}

#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    #[serde(default)]
    message: Option<OllamaMessage>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OllamaMessage {
    #[serde(default)]
    content: String,
}

impl Vendor for Ollama {
    fn name(&self) -> &'static str {
        "ollama"
    }

    fn env_prefix(&self) -> &'static str {
        "OLLAMA"
    }

    fn default_base_url(&self) -> &'static str {
        Self::DEFAULT_BASE_URL
    }

    fn default_model(&self) -> &'static str {
        Self::DEFAULT_MODEL
    }

    // Local models are free.
    fn models(&self) -> ModelTable {
        &[]
    }

    fn requires_api_key(&self) -> bool {
        false
    }

    fn chat_url(&self, base_url: &str, _model: &str, _stream: bool) -> String {
        format!("{base_url}/api/chat")
    }

    fn headers(&self, _api_key: Option<&str>) -> Vec<(&'static str, String)> {
        Vec::new()
    }

    fn build_body(&self, model: &str, inputs: &ModelInputs, stream: bool) -> Result<Value> {
        let mut body = serde_json::Map::new();
        body.insert("model".into(), Value::from(model));
        body.insert("messages".into(), serde_json::to_value(&inputs.messages)?);
        body.insert("stream".into(), Value::Bool(stream));
        body.insert(
            "options".into(),
            json!({
                "temperature": inputs.temperature,
                "num_predict": inputs.max_tokens,
            }),
        );
        body.extend(inputs.extra.clone());
        Ok(Value::Object(body))
    }

    fn extract_text(&self, payload: Value) -> Result<String> {
        let response: OllamaChatResponse =
            decode_value(self.name(), "Ollama chat response", payload)?;
        if let Some(error) = response.error {
            return Err(LlmError::provider(self.name(), error).into());
        }
        response.message.map(|m| m.content).ok_or_else(|| {
            LlmError::response_format("message", "response without message")
                .with_provider(self.name())
                .into()
        })
    }

    fn stream_format(&self) -> StreamFormat {
        StreamFormat::JsonLines
    }

    fn parse_chunk(&self, frame: &str) -> Result<ChunkEvent> {
        let chunk: OllamaChatResponse = decode(self.name(), "Ollama stream line", frame)?;
        if let Some(error) = chunk.error {
            return Err(LlmError::provider(self.name(), error).into());
        }
        if chunk.done {
            return Ok(ChunkEvent::Done);
        }
        Ok(chunk
            .message
            .map_or(ChunkEvent::Skip, |m| ChunkEvent::Text(m.content)))
    }

    fn parse_error(&self, status: u16, body: &str) -> LlmError {
        match serde_json::from_str::<OllamaChatResponse>(body) {
            Ok(OllamaChatResponse {
                error: Some(message),
                ..
            }) => LlmError::from_status(self.name(), status, message),
            _ => LlmError::http_status(status, body).with_provider(self.name()),
        }
    }
}
