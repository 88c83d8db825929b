//! Anthropic messages API.
//!
//! Anthropic takes system instructions as a top-level `system` string rather
//! than as messages, so system-role messages are lifted out of the message
//! list and joined with blank lines.

use serde::Deserialize;
use serde_json::Value;

use crate::error::{LlmError, Result};
use crate::message::Role;
use crate::model_info::{ModelInfo, ModelTable};
use crate::request::ModelInputs;
use crate::stream::ChunkEvent;

use super::{Vendor, decode, decode_value};

const MODELS: ModelTable = &[
    ("claude-3-haiku-20240307", ModelInfo::new(0.25, 1.25, 200_000)),
    ("claude-3-sonnet-20240229", ModelInfo::new(3.0, 15.0, 200_000)),
    ("claude-3-opus-20240229", ModelInfo::new(15.0, 75.0, 200_000)),
    ("claude-3-5-sonnet-20240620", ModelInfo::new(3.0, 15.0, 200_000)),
];

/// Anthropic vendor translation.
#[derive(Debug, Clone, Copy, Default)]
pub struct Anthropic;

impl Anthropic {
    /// Default Anthropic API base URL.
    pub const DEFAULT_BASE_URL: &'static str = "https://api.anthropic.com/v1";
    /// Default model.
    pub const DEFAULT_MODEL: &'static str = "claude-3-haiku-20240307";
    /// Value of the `anthropic-version` header.
    pub const API_VERSION: &'static str = "2023-06-01";
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContentBlock>,
}

#[derive(Debug, Deserialize)]
struct AnthropicContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    #[serde(default)]
    text: Option<String>,
}

/// Streaming event payloads. Only text deltas, the stop marker and errors
/// matter; everything else is bookkeeping.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum AnthropicStreamEvent {
    ContentBlockDelta { delta: AnthropicDelta },
    MessageStop,
    Error { error: AnthropicError },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct AnthropicDelta {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AnthropicErrorResponse {
    error: AnthropicError,
}

#[derive(Debug, Deserialize)]
struct AnthropicError {
    #[serde(rename = "type")]
    error_type: String,
    message: String,
}

impl Vendor for Anthropic {
    fn name(&self) -> &'static str {
        "anthropic"
    }

    fn env_prefix(&self) -> &'static str {
        "ANTHROPIC"
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
        format!("{base_url}/messages")
    }

    fn headers(&self, api_key: Option<&str>) -> Vec<(&'static str, String)> {
        let mut headers = vec![("anthropic-version", Self::API_VERSION.to_owned())];
        if let Some(key) = api_key {
            headers.push(("x-api-key", key.to_owned()));
        }
        headers
    }

    fn build_body(&self, model: &str, inputs: &ModelInputs, stream: bool) -> Result<Value> {
        let system = inputs
            .system_messages()
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");
        let messages: Vec<_> = inputs
            .messages
            .iter()
            .filter(|m| m.role != Role::System)
            .collect();

        let mut body = serde_json::Map::new();
        body.insert("model".into(), Value::from(model));
        body.insert("messages".into(), serde_json::to_value(messages)?);
        body.insert("max_tokens".into(), Value::from(inputs.max_tokens));
        body.insert("temperature".into(), Value::from(inputs.temperature));
        if !system.is_empty() {
            body.insert("system".into(), Value::from(system));
        }
        if stream {
            body.insert("stream".into(), Value::Bool(true));
        }
        body.extend(inputs.extra.clone());
        Ok(Value::Object(body))
    }

    fn extract_text(&self, payload: Value) -> Result<String> {
        let response: AnthropicResponse =
            decode_value(self.name(), "Anthropic messages response", payload)?;
        Ok(response
            .content
            .into_iter()
            .filter(|block| block.block_type == "text")
            .filter_map(|block| block.text)
            .collect())
    }

    fn parse_chunk(&self, frame: &str) -> Result<ChunkEvent> {
        match decode(self.name(), "Anthropic stream event", frame)? {
            AnthropicStreamEvent::ContentBlockDelta { delta } => {
                Ok(delta.text.map_or(ChunkEvent::Skip, ChunkEvent::Text))
            }
            AnthropicStreamEvent::MessageStop => Ok(ChunkEvent::Done),
            AnthropicStreamEvent::Error { error } => {
                Err(LlmError::provider(self.name(), error.message)
                    .with_code(error.error_type)
                    .into())
            }
            AnthropicStreamEvent::Other => Ok(ChunkEvent::Skip),
        }
    }

    fn parse_error(&self, status: u16, body: &str) -> LlmError {
        match serde_json::from_str::<AnthropicErrorResponse>(body) {
            Ok(response) => LlmError::from_status(self.name(), status, response.error.message)
                .with_code(response.error.error_type),
            Err(_) => LlmError::http_status(status, body).with_provider(self.name()),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::error::{Error, LlmErrorKind};
    use crate::message::Message;
    use crate::request::CompletionRequest;
    use serde_json::json;

    mod build_body {
        use super::*;

        #[test]
        fn lifts_system_messages() {
            let inputs = CompletionRequest::new("Hi")
                .system(vec![Message::system("Be terse"), Message::system("Use French")])
                .history(vec![Message::user("Hello"), Message::assistant("Bonjour")])
                .model_inputs();
            let body = Anthropic.build_body(Anthropic::DEFAULT_MODEL, &inputs, false).unwrap();

            assert_eq!(body["system"], json!("Be terse\n\nUse French"));
            assert_eq!(
                body["messages"],
                json!([
                    {"role": "user", "content": "Hello"},
                    {"role": "assistant", "content": "Bonjour"},
                    {"role": "user", "content": "Hi"}
                ])
            );
            assert!(body.get("stream").is_none());
        }

        #[test]
        fn no_system_field_without_system_messages() {
            let inputs = CompletionRequest::new("Hi").max_tokens(20).model_inputs();
            let body = Anthropic.build_body("claude-3-opus-20240229", &inputs, true).unwrap();

            assert_eq!(
                body,
                json!({
                    "model": "claude-3-opus-20240229",
                    "messages": [{"role": "user", "content": "Hi"}],
                    "max_tokens": 20,
                    "temperature": 0.0,
                    "stream": true
                })
            );
        }

        #[test]
        fn version_and_key_headers() {
            let headers = Anthropic.headers(Some("key"));
            assert!(headers.contains(&("anthropic-version", "2023-06-01".to_owned())));
            assert!(headers.contains(&("x-api-key", "key".to_owned())));
        }
    }

    mod extract_text {
        use super::*;

        #[test]
        fn concatenates_text_blocks() {
            let payload = json!({
                "id": "msg_1",
                "type": "message",
                "role": "assistant",
                "content": [
                    {"type": "text", "text": "Hello"},
                    {"type": "tool_use", "id": "t", "name": "x", "input": {}},
                    {"type": "text", "text": " world"}
                ],
                "stop_reason": "end_turn"
            });
            assert_eq!(Anthropic.extract_text(payload).unwrap(), "Hello world");
        }

        #[test]
        fn missing_content_is_error() {
            let err = Anthropic.extract_text(json!({"type": "message"})).unwrap_err();
            assert!(matches!(err, Error::Llm(e) if e.kind == LlmErrorKind::ResponseFormat));
        }
    }

    mod parse_chunk {
        use super::*;

        #[test]
        fn text_delta() {
            let frame = r#"{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"Hi"}}"#;
            assert_eq!(Anthropic.parse_chunk(frame).unwrap(), ChunkEvent::Text("Hi".into()));
        }

        #[test]
        fn bookkeeping_events_skipped() {
            for frame in [
                r#"{"type":"message_start","message":{"id":"msg_1"}}"#,
                r#"{"type":"content_block_start","index":0,"content_block":{"type":"text","text":""}}"#,
                r#"{"type":"ping"}"#,
                r#"{"type":"content_block_stop","index":0}"#,
                r#"{"type":"message_delta","delta":{"stop_reason":"end_turn"},"usage":{"output_tokens":5}}"#,
            ] {
                assert_eq!(Anthropic.parse_chunk(frame).unwrap(), ChunkEvent::Skip, "{frame}");
            }
        }

        #[test]
        fn message_stop_ends_stream() {
            assert_eq!(
                Anthropic.parse_chunk(r#"{"type":"message_stop"}"#).unwrap(),
                ChunkEvent::Done
            );
        }

        #[test]
        fn error_event() {
            let frame = r#"{"type":"error","error":{"type":"overloaded_error","message":"Overloaded"}}"#;
            let Error::Llm(err) = Anthropic.parse_chunk(frame).unwrap_err() else {
                panic!("expected vendor error")
            };
            assert_eq!(err.code.as_deref(), Some("overloaded_error"));
            assert_eq!(err.message, "Overloaded");
        }
    }

    #[test]
    fn parse_error_body() {
        let body = r#"{"type":"error","error":{"type":"authentication_error","message":"invalid x-api-key"}}"#;
        let err = Anthropic.parse_error(401, body);
        assert_eq!(err.kind, LlmErrorKind::Auth);
        assert_eq!(err.code.as_deref(), Some("authentication_error"));
    }
}
