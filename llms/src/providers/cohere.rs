//! Cohere chat API (v1).
//!
//! Cohere splits the conversation differently from the other vendors: the
//! newest message goes in `message`, earlier turns in `chat_history` with
//! upper-case roles, and system instructions in `preamble`. Streamed
//! responses are newline-delimited JSON events tagged by `event_type`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{LlmError, Result};
use crate::message::{Message, Role};
use crate::model_info::{ModelInfo, ModelTable};
use crate::request::ModelInputs;
use crate::stream::{ChunkEvent, StreamFormat};

use super::{Vendor, decode, decode_value};

const MODELS: ModelTable = &[
    ("command", ModelInfo::new(1.0, 2.0, 4_096)),
    ("command-light", ModelInfo::new(0.3, 0.6, 4_096)),
    ("command-r", ModelInfo::new(0.5, 1.5, 128_000)),
    ("command-r-plus", ModelInfo::new(3.0, 15.0, 128_000)),
];

/// Cohere vendor translation.
#[derive(Debug, Clone, Copy, Default)]
pub struct Cohere;

impl Cohere {
    /// Default Cohere API base URL.
    pub const DEFAULT_BASE_URL: &'static str = "https://api.cohere.ai/v1";
    /// Default model.
    pub const DEFAULT_MODEL: &'static str = "command-r";
}

#[derive(Debug, Serialize)]
struct CohereTurn<'a> {
    role: &'static str,
    message: &'a str,
}

impl<'a> From<&'a Message> for CohereTurn<'a> {
    fn from(message: &'a Message) -> Self {
        let role = match message.role {
            Role::System => "SYSTEM",
            Role::User => "USER",
            Role::Assistant => "CHATBOT",
        };
        Self {
            role,
            message: &message.content,
        }
    }
}

#[derive(Debug, Deserialize)]
struct CohereChatResponse {
    text: String,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "event_type", rename_all = "kebab-case")]
enum CohereStreamEvent {
    TextGeneration {
        text: String,
    },
    StreamEnd {
        #[serde(default)]
        finish_reason: Option<String>,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct CohereErrorResponse {
    message: String,
}

impl Vendor for Cohere {
    fn name(&self) -> &'static str {
        "cohere"
    }

    fn env_prefix(&self) -> &'static str {
        "COHERE"
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
            .map(|key| vec![("Authorization", format!("Bearer {key}"))])
            .unwrap_or_default()
    }

    fn build_body(&self, model: &str, inputs: &ModelInputs, stream: bool) -> Result<Value> {
        let (preamble, turns): (Vec<&Message>, Vec<&Message>) = inputs
            .messages
            .iter()
            .partition(|m| m.role == Role::System);
        let (message, history) = turns
            .split_last()
            .map_or(("", &[][..]), |(last, rest)| (last.content.as_str(), rest));
        let history: Vec<CohereTurn<'_>> = history.iter().map(|m| CohereTurn::from(*m)).collect();

        let mut body = serde_json::Map::new();
        body.insert("model".into(), Value::from(model));
        body.insert("message".into(), Value::from(message));
        if !history.is_empty() {
            body.insert("chat_history".into(), serde_json::to_value(history)?);
        }
        if !preamble.is_empty() {
            let preamble: Vec<&str> = preamble.iter().map(|m| m.content.as_str()).collect();
            body.insert("preamble".into(), Value::from(preamble.join("\n\n")));
        }
        body.insert("temperature".into(), Value::from(inputs.temperature));
        body.insert("max_tokens".into(), Value::from(inputs.max_tokens));
        if stream {
            body.insert("stream".into(), Value::Bool(true));
        }
        body.extend(inputs.extra.clone());
        Ok(Value::Object(body))
    }

    fn extract_text(&self, payload: Value) -> Result<String> {
        let response: CohereChatResponse =
            decode_value(self.name(), "Cohere chat response", payload)?;
        Ok(response.text)
    }

    fn stream_format(&self) -> StreamFormat {
        StreamFormat::JsonLines
    }

    fn parse_chunk(&self, frame: &str) -> Result<ChunkEvent> {
        match decode(self.name(), "Cohere stream event", frame)? {
            CohereStreamEvent::TextGeneration { text } => Ok(ChunkEvent::Text(text)),
            CohereStreamEvent::StreamEnd {
                finish_reason: Some(reason),
            } if reason.starts_with("ERROR") => Err(LlmError::provider(
                self.name(),
                format!("stream ended with {reason}"),
            )
            .with_code(reason)
            .into()),
            CohereStreamEvent::StreamEnd { .. } => Ok(ChunkEvent::Done),
            CohereStreamEvent::Other => Ok(ChunkEvent::Skip),
        }
    }

    fn parse_error(&self, status: u16, body: &str) -> LlmError {
        match serde_json::from_str::<CohereErrorResponse>(body) {
            Ok(response) => LlmError::from_status(self.name(), status, response.message),
            Err(_) => LlmError::http_status(status, body).with_provider(self.name()),
        }
    }
}
