//! Anthropic models on Amazon Bedrock, through the Bedrock Converse API.
//!
//! Requests go to `{base}/model/{model}/converse` (or `converse-stream`)
//! with a Bedrock API key as bearer token. Request signing with AWS
//! credentials is not done here; point `base_url` at a signing proxy when
//! bearer keys are not available. Streamed events are read as one JSON
//! object per line.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::error::{LlmError, Result};
use crate::message::{Message, Role};
use crate::model_info::{ModelInfo, ModelTable};
use crate::request::ModelInputs;
use crate::stream::{ChunkEvent, StreamFormat};

use super::{Vendor, decode, decode_value};

const MODELS: ModelTable = &[
    ("anthropic.claude-3-haiku-20240307-v1:0", ModelInfo::new(0.25, 1.25, 200_000)),
    ("anthropic.claude-3-sonnet-20240229-v1:0", ModelInfo::new(3.0, 15.0, 200_000)),
    ("anthropic.claude-3-opus-20240229-v1:0", ModelInfo::new(15.0, 75.0, 200_000)),
    ("anthropic.claude-3-5-sonnet-20240620-v1:0", ModelInfo::new(3.0, 15.0, 200_000)),
];

/// Bedrock (Anthropic models) vendor translation.
#[derive(Debug, Clone, Copy, Default)]
pub struct Bedrock;

impl Bedrock {
    /// Default Bedrock runtime endpoint.
    pub const DEFAULT_BASE_URL: &'static str = "https://bedrock-runtime.us-east-1.amazonaws.com";
    /// Default model.
    pub const DEFAULT_MODEL: &'static str = "anthropic.claude-3-haiku-20240307-v1:0";
}

#[derive(Debug, Serialize)]
struct TextBlock<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct ConverseMessage<'a> {
    role: &'static str,
    content: [TextBlock<'a>; 1],
}

impl<'a> From<&'a Message> for ConverseMessage<'a> {
    fn from(message: &'a Message) -> Self {
        let role = match message.role {
            Role::Assistant => "assistant",
            Role::User | Role::System => "user",
        };
        Self {
            role,
            content: [TextBlock {
                text: &message.content,
            }],
        }
    }
}

#[derive(Debug, Deserialize)]
struct ConverseResponse {
    output: ConverseOutput,
}

#[derive(Debug, Deserialize)]
struct ConverseOutput {
    message: ConverseOutputMessage,
}

#[derive(Debug, Deserialize)]
struct ConverseOutputMessage {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: Option<String>,
}

/// One stream event. Exceptions arrive as `{"<name>Exception": {"message": ..}}`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConverseStreamEvent {
    #[serde(default)]
    content_block_delta: Option<ContentBlockDelta>,
    #[serde(default)]
    message_stop: Option<Value>,
    #[serde(flatten)]
    rest: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct ContentBlockDelta {
    delta: ContentBlock,
}

#[derive(Debug, Deserialize)]
struct BedrockErrorResponse {
    #[serde(alias = "Message")]
    message: String,
    #[serde(default, rename = "__type")]
    error_type: Option<String>,
}

impl Vendor for Bedrock {
    fn name(&self) -> &'static str {
        "bedrock"
    }

    fn env_prefix(&self) -> &'static str {
        "BEDROCK"
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

    fn chat_url(&self, base_url: &str, model: &str, stream: bool) -> String {
        let action = if stream { "converse-stream" } else { "converse" };
        format!("{base_url}/model/{model}/{action}")
    }

    fn headers(&self, api_key: Option<&str>) -> Vec<(&'static str, String)> {
        api_key
            .map(|key| vec![("Authorization", format!("Bearer {key}"))])
            .unwrap_or_default()
    }

    fn build_body(&self, _model: &str, inputs: &ModelInputs, _stream: bool) -> Result<Value> {
        let messages: Vec<ConverseMessage<'_>> = inputs
            .messages
            .iter()
            .filter(|m| m.role != Role::System)
            .map(ConverseMessage::from)
            .collect();
        let system: Vec<TextBlock<'_>> = inputs
            .system_messages()
            .map(|m| TextBlock { text: &m.content })
            .collect();

        let mut body = Map::new();
        body.insert("messages".into(), serde_json::to_value(messages)?);
        if !system.is_empty() {
            body.insert("system".into(), serde_json::to_value(system)?);
        }
        body.insert(
            "inferenceConfig".into(),
            json!({
                "maxTokens": inputs.max_tokens,
                "temperature": inputs.temperature,
            }),
        );
        body.extend(inputs.extra.clone());
        Ok(Value::Object(body))
    }

    fn extract_text(&self, payload: Value) -> Result<String> {
        let response: ConverseResponse =
            decode_value(self.name(), "Bedrock converse response", payload)?;
        Ok(response
            .output
            .message
            .content
            .into_iter()
            .filter_map(|block| block.text)
            .collect())
    }

    fn stream_format(&self) -> StreamFormat {
        StreamFormat::JsonLines
    }

    fn parse_chunk(&self, frame: &str) -> Result<ChunkEvent> {
        let event: ConverseStreamEvent = decode(self.name(), "Bedrock stream event", frame)?;
        if let Some((name, body)) = event.rest.iter().find(|(k, _)| k.ends_with("Exception")) {
            let message = body
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or(name.as_str());
            return Err(exception_error(self.name(), name, message).into());
        }
        if let Some(delta) = event.content_block_delta {
            return Ok(delta.delta.text.map_or(ChunkEvent::Skip, ChunkEvent::Text));
        }
        if event.message_stop.is_some() {
            return Ok(ChunkEvent::Done);
        }
        Ok(ChunkEvent::Skip)
    }

    fn parse_error(&self, status: u16, body: &str) -> LlmError {
        match serde_json::from_str::<BedrockErrorResponse>(body) {
            Ok(BedrockErrorResponse {
                message,
                error_type: Some(error_type),
            }) => {
                let err = if is_throttling(&error_type) {
                    LlmError::rate_limited(self.name(), message)
                } else {
                    LlmError::from_status(self.name(), status, message)
                };
                err.with_code(error_type)
            }
            Ok(response) => LlmError::from_status(self.name(), status, response.message),
            Err(_) => LlmError::http_status(status, body).with_provider(self.name()),
        }
    }
}

fn is_throttling(name: &str) -> bool {
    name.to_ascii_lowercase().contains("throttl")
}

/// Error for an in-stream exception event.
fn exception_error(provider: &str, name: &str, message: &str) -> LlmError {
    let err = if is_throttling(name) {
        LlmError::rate_limited(provider, message)
    } else {
        LlmError::provider(provider, message)
    };
    err.with_code(name)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::error::LlmErrorKind;
    use crate::request::CompletionRequest;
    use crate::stream::BlockingFragments;
    use std::io::Cursor;

    #[test]
    fn converse_urls() {
        let model = Bedrock::DEFAULT_MODEL;
        assert_eq!(
            Bedrock.chat_url("https://bedrock", model, false),
            format!("https://bedrock/model/{model}/converse")
        );
        assert_eq!(
            Bedrock.chat_url("https://bedrock", model, true),
            format!("https://bedrock/model/{model}/converse-stream")
        );
    }

    #[test]
    fn build_body_lifts_system_and_maps_config() {
        let inputs = CompletionRequest::new("Hi")
            .system("Be brief.")
            .history(vec![Message::user("Hello"), Message::assistant("Hey")])
            .max_tokens(50)
            .model_inputs();
        let body = Bedrock.build_body(Bedrock::DEFAULT_MODEL, &inputs, false).unwrap();

        assert_eq!(
            body,
            json!({
                "messages": [
                    {"role": "user", "content": [{"text": "Hello"}]},
                    {"role": "assistant", "content": [{"text": "Hey"}]},
                    {"role": "user", "content": [{"text": "Hi"}]}
                ],
                "system": [{"text": "Be brief."}],
                "inferenceConfig": {"maxTokens": 50, "temperature": 0.0}
            })
        );
    }

    #[test]
    fn extract_text_joins_blocks() {
        let payload = json!({
            "output": {"message": {"role": "assistant", "content": [{"text": "Hello "}, {"text": "there"}]}},
            "stopReason": "end_turn",
            "usage": {"inputTokens": 3, "outputTokens": 2, "totalTokens": 5}
        });
        assert_eq!(Bedrock.extract_text(payload).unwrap(), "Hello there");
    }

    mod parse_chunk {
        use super::*;

        #[test]
        fn stream_events() {
            let body = concat!(
                "{\"messageStart\":{\"role\":\"assistant\"}}\n",
                "{\"contentBlockDelta\":{\"delta\":{\"text\":\"Hel\"},\"contentBlockIndex\":0}}\n",
                "{\"contentBlockDelta\":{\"delta\":{\"text\":\"lo\"},\"contentBlockIndex\":0}}\n",
                "{\"contentBlockStop\":{\"contentBlockIndex\":0}}\n",
                "{\"messageStop\":{\"stopReason\":\"end_turn\"}}\n",
                "{\"metadata\":{\"usage\":{\"inputTokens\":3}}}\n",
            );
            let fragments: Vec<String> = BlockingFragments::new(Bedrock, Cursor::new(body))
                .map(Result::unwrap)
                .collect();
            assert_eq!(fragments, vec!["Hel", "lo"]);
        }

        #[test]
        fn throttling_exception_is_rate_limit() {
            let frame = r#"{"throttlingException":{"message":"Too many requests"}}"#;
            let err = Bedrock.parse_chunk(frame).unwrap_err();
            let err = err.as_llm().unwrap();
            assert_eq!(err.kind, LlmErrorKind::RateLimited);
            assert_eq!(err.code.as_deref(), Some("throttlingException"));
        }

        #[test]
        fn other_exception_is_provider_error() {
            let frame = r#"{"modelStreamErrorException":{"message":"boom"}}"#;
            let err = Bedrock.parse_chunk(frame).unwrap_err();
            assert_eq!(err.as_llm().unwrap().kind, LlmErrorKind::Provider);
        }
    }

    mod parse_error {
        use super::*;

        #[test]
        fn typed_auth_error() {
            let err = Bedrock.parse_error(
                403,
                r#"{"message":"The security token is invalid","__type":"UnrecognizedClientException"}"#,
            );
            assert_eq!(err.kind, LlmErrorKind::Auth);
            assert_eq!(err.code.as_deref(), Some("UnrecognizedClientException"));
        }

        #[test]
        fn throttling_with_bad_request_status() {
            let err = Bedrock.parse_error(
                400,
                r#"{"message":"Rate exceeded","__type":"ThrottlingException"}"#,
            );
            assert_eq!(err.kind, LlmErrorKind::RateLimited);
        }

        #[test]
        fn capitalized_message() {
            let err = Bedrock.parse_error(429, r#"{"Message":"slow down"}"#);
            assert_eq!(err.kind, LlmErrorKind::RateLimited);
            assert_eq!(err.message, "slow down");
        }
    }
}
