//! OpenAI chat completions and OpenAI-compatible APIs.
//!
//! Groq, DeepSeek and Mistral speak the same wire protocol as OpenAI, so they
//! share this translation and differ only in their [`OpenAIProfile`].

use serde::Deserialize;
use serde_json::Value;

use crate::error::{LlmError, Result};
use crate::model_info::{ModelInfo, ModelTable};
use crate::request::ModelInputs;
use crate::stream::ChunkEvent;

use super::{Vendor, base_body, decode, decode_value};

/// Static description of one OpenAI-compatible service.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OpenAIProfile {
    /// Provider name.
    pub name: &'static str,
    /// Environment variable prefix.
    pub env_prefix: &'static str,
    /// API root.
    pub base_url: &'static str,
    /// Default model.
    pub default_model: &'static str,
    /// Pricing table.
    pub models: ModelTable,
}

/// OpenAI.
pub const OPENAI: OpenAIProfile = OpenAIProfile {
    name: "openai",
    env_prefix: "OPENAI",
    base_url: "https://api.openai.com/v1",
    default_model: "gpt-3.5-turbo",
    models: &[
        ("gpt-3.5-turbo", ModelInfo::new(0.5, 1.5, 16_385)),
        ("gpt-4", ModelInfo::new(30.0, 60.0, 8_192)),
        ("gpt-4-turbo", ModelInfo::new(10.0, 30.0, 128_000)),
        ("gpt-4o", ModelInfo::new(5.0, 15.0, 128_000)),
        ("gpt-4o-mini", ModelInfo::new(0.15, 0.6, 128_000)),
    ],
};

/// Groq.
pub const GROQ: OpenAIProfile = OpenAIProfile {
    name: "groq",
    env_prefix: "GROQ",
    base_url: "https://api.groq.com/openai/v1",
    default_model: "llama3-70b-8192",
    models: &[
        ("llama3-8b-8192", ModelInfo::new(0.05, 0.08, 8_192)),
        ("llama3-70b-8192", ModelInfo::new(0.59, 0.79, 8_192)),
        ("mixtral-8x7b-32768", ModelInfo::new(0.24, 0.24, 32_768)),
        ("gemma-7b-it", ModelInfo::new(0.07, 0.07, 8_192)),
    ],
};

/// DeepSeek.
pub const DEEPSEEK: OpenAIProfile = OpenAIProfile {
    name: "deepseek",
    env_prefix: "DEEPSEEK",
    base_url: "https://api.deepseek.com",
    default_model: "deepseek-chat",
    models: &[
        ("deepseek-chat", ModelInfo::new(0.14, 0.28, 128_000)),
        ("deepseek-coder", ModelInfo::new(0.14, 0.28, 128_000)),
    ],
};

/// Mistral.
pub const MISTRAL: OpenAIProfile = OpenAIProfile {
    name: "mistral",
    env_prefix: "MISTRAL",
    base_url: "https://api.mistral.ai/v1",
    default_model: "mistral-small-latest",
    models: &[
        ("open-mistral-7b", ModelInfo::new(0.25, 0.25, 32_000)),
        ("open-mixtral-8x7b", ModelInfo::new(0.7, 0.7, 32_000)),
        ("mistral-small-latest", ModelInfo::new(1.0, 3.0, 32_000)),
        ("mistral-large-latest", ModelInfo::new(4.0, 12.0, 32_000)),
    ],
};

/// OpenAI-family vendor translation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OpenAI {
    profile: OpenAIProfile,
}

impl Default for OpenAI {
    fn default() -> Self {
        Self::openai()
    }
}

impl OpenAI {
    /// Translation for a custom OpenAI-compatible service.
    #[must_use]
    pub const fn with_profile(profile: OpenAIProfile) -> Self {
        Self { profile }
    }

    /// OpenAI itself.
    #[must_use]
    pub const fn openai() -> Self {
        Self::with_profile(OPENAI)
    }

    /// Groq.
    #[must_use]
    pub const fn groq() -> Self {
        Self::with_profile(GROQ)
    }

    /// DeepSeek.
    #[must_use]
    pub const fn deepseek() -> Self {
        Self::with_profile(DEEPSEEK)
    }

    /// Mistral.
    #[must_use]
    pub const fn mistral() -> Self {
        Self::with_profile(MISTRAL)
    }

    /// The service profile.
    #[must_use]
    pub const fn profile(&self) -> &OpenAIProfile {
        &self.profile
    }
}

#[derive(Debug, Deserialize)]
struct OpenAIChatResponse {
    choices: Vec<OpenAIChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIResponseMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAIStreamChunk {
    #[serde(default)]
    choices: Vec<OpenAIStreamChoice>,
    #[serde(default)]
    error: Option<OpenAIError>,
}

#[derive(Debug, Deserialize)]
struct OpenAIStreamChoice {
    #[serde(default)]
    delta: OpenAIDelta,
}

#[derive(Debug, Default, Deserialize)]
struct OpenAIDelta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAIErrorResponse {
    error: OpenAIError,
}

#[derive(Debug, Deserialize)]
struct OpenAIError {
    message: String,
    #[serde(default, rename = "type")]
    error_type: Option<String>,
    #[serde(default)]
    code: Option<Value>,
}

impl OpenAIError {
    fn code(&self) -> Option<String> {
        match &self.code {
            Some(Value::String(code)) => Some(code.clone()),
            Some(Value::Null) | None => self.error_type.clone(),
            Some(other) => Some(other.to_string()),
        }
    }
}

impl Vendor for OpenAI {
    fn name(&self) -> &'static str {
        self.profile.name
    }

    fn env_prefix(&self) -> &'static str {
        self.profile.env_prefix
    }

    fn default_base_url(&self) -> &'static str {
        self.profile.base_url
    }

    fn default_model(&self) -> &'static str {
        self.profile.default_model
    }

    fn models(&self) -> ModelTable {
        self.profile.models
    }

    fn chat_url(&self, base_url: &str, _model: &str, _stream: bool) -> String {
        format!("{base_url}/chat/completions")
    }

    fn headers(&self, api_key: Option<&str>) -> Vec<(&'static str, String)> {
        api_key
            .map(|key| vec![("Authorization", format!("Bearer {key}"))])
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
        let response: OpenAIChatResponse =
            decode_value(self.name(), "chat completion response", payload)?;
        let choice = response.choices.into_iter().next().ok_or_else(|| {
            LlmError::response_format("at least one choice", "empty choices")
                .with_provider(self.name())
        })?;
        Ok(choice.message.content.unwrap_or_default())
    }

    fn parse_chunk(&self, frame: &str) -> Result<ChunkEvent> {
        if frame.trim() == "[DONE]" {
            return Ok(ChunkEvent::Done);
        }
        let chunk: OpenAIStreamChunk = decode(self.name(), "chat completion chunk", frame)?;
        if let Some(error) = chunk.error {
            let mut err = LlmError::provider(self.name(), error.message.as_str());
            if let Some(code) = error.code() {
                err = err.with_code(code);
            }
            return Err(err.into());
        }
        Ok(chunk
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.delta.content)
            .map_or(ChunkEvent::Skip, ChunkEvent::Text))
    }

    fn parse_error(&self, status: u16, body: &str) -> LlmError {
        let Ok(response) = serde_json::from_str::<OpenAIErrorResponse>(body) else {
            return LlmError::http_status(status, body).with_provider(self.name());
        };
        let code = response.error.code();
        let err = LlmError::from_status(self.name(), status, response.error.message);
        match code {
            Some(code) => err.with_code(code),
            None => err,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::error::{Error, LlmErrorKind};
    use crate::request::CompletionRequest;
    use serde_json::json;

    mod profiles {
        use super::*;

        #[test]
        fn compatible_services_share_protocol() {
            for vendor in [OpenAI::openai(), OpenAI::groq(), OpenAI::deepseek(), OpenAI::mistral()] {
                assert_eq!(
                    vendor.chat_url(vendor.default_base_url(), vendor.default_model(), false),
                    format!("{}/chat/completions", vendor.profile().base_url)
                );
                assert!(
                    crate::model_info::lookup(vendor.models(), vendor.default_model()).is_some(),
                    "{} default model missing from table",
                    vendor.name()
                );
            }
        }

        #[test]
        fn default_is_openai() {
            assert_eq!(OpenAI::default().name(), "openai");
            assert_eq!(OpenAI::groq().env_prefix(), "GROQ");
        }
    }

    mod build_body {
        use super::*;

        #[test]
        fn system_message_stays_in_messages() {
            let inputs = CompletionRequest::new("Hi").system("Be terse").model_inputs();
            let body = OpenAI::openai().build_body("gpt-4o", &inputs, true).unwrap();

            assert_eq!(
                body,
                json!({
                    "model": "gpt-4o",
                    "messages": [
                        {"role": "system", "content": "Be terse"},
                        {"role": "user", "content": "Hi"}
                    ],
                    "temperature": 0.0,
                    "max_tokens": 300,
                    "stream": true
                })
            );
        }

        #[test]
        fn bearer_header() {
            let headers = OpenAI::openai().headers(Some("sk-test"));
            assert_eq!(headers, vec![("Authorization", "Bearer sk-test".to_owned())]);
            assert!(OpenAI::openai().headers(None).is_empty());
        }
    }

    mod extract_text {
        use super::*;

        #[test]
        fn reads_first_choice() {
            let payload = json!({
                "id": "chatcmpl-1",
                "object": "chat.completion",
                "model": "gpt-4o",
                "choices": [{"index": 0, "message": {"role": "assistant", "content": "Hi!"}, "finish_reason": "stop"}]
            });
            assert_eq!(OpenAI::openai().extract_text(payload).unwrap(), "Hi!");
        }

        #[test]
        fn null_content_is_empty() {
            let payload = json!({"choices": [{"message": {"role": "assistant", "content": null}}]});
            assert_eq!(OpenAI::openai().extract_text(payload).unwrap(), "");
        }

        #[test]
        fn no_choices_is_error() {
            let err = OpenAI::openai().extract_text(json!({"choices": []})).unwrap_err();
            assert!(matches!(err, Error::Llm(e) if e.kind == LlmErrorKind::ResponseFormat));
        }
    }

    mod parse_chunk {
        use super::*;

        #[test]
        fn text_delta() {
            let frame = r#"{"id":"1","object":"chat.completion.chunk","created":1,"model":"gpt-4o","choices":[{"index":0,"delta":{"content":"Hello"},"finish_reason":null}]}"#;
            assert_eq!(
                OpenAI::openai().parse_chunk(frame).unwrap(),
                ChunkEvent::Text("Hello".into())
            );
        }

        #[test]
        fn role_only_delta_is_skipped() {
            let frame = r#"{"choices":[{"index":0,"delta":{"role":"assistant"}}]}"#;
            assert_eq!(OpenAI::openai().parse_chunk(frame).unwrap(), ChunkEvent::Skip);
        }

        #[test]
        fn usage_only_chunk_is_skipped() {
            let frame = r#"{"choices":[],"usage":{"prompt_tokens":3,"completion_tokens":5}}"#;
            assert_eq!(OpenAI::openai().parse_chunk(frame).unwrap(), ChunkEvent::Skip);
        }

        #[test]
        fn done_marker() {
            assert_eq!(OpenAI::openai().parse_chunk("[DONE]").unwrap(), ChunkEvent::Done);
        }

        #[test]
        fn in_band_error() {
            let frame = r#"{"error":{"message":"overloaded","type":"server_error","code":null}}"#;
            let err = OpenAI::groq().parse_chunk(frame).unwrap_err();
            let Error::Llm(err) = err else { panic!("expected vendor error") };
            assert_eq!(err.provider.as_deref(), Some("groq"));
            assert_eq!(err.code.as_deref(), Some("server_error"));
        }
    }

    mod parse_error {
        use super::*;

        #[test]
        fn invalid_key() {
            let body = r#"{"error":{"message":"Incorrect API key provided","type":"invalid_request_error","code":"invalid_api_key"}}"#;
            let err = OpenAI::openai().parse_error(401, body);
            assert_eq!(err.kind, LlmErrorKind::Auth);
            assert_eq!(err.code.as_deref(), Some("invalid_api_key"));
            assert_eq!(err.message, "Incorrect API key provided");
        }

        #[test]
        fn rate_limit() {
            let body = r#"{"error":{"message":"Rate limit reached","type":"requests","code":"rate_limit_exceeded"}}"#;
            let err = OpenAI::mistral().parse_error(429, body);
            assert_eq!(err.kind, LlmErrorKind::RateLimited);
            assert!(err.is_retryable());
        }

        #[test]
        fn unparseable_body() {
            let err = OpenAI::openai().parse_error(500, "upstream exploded");
            assert_eq!(err.kind, LlmErrorKind::HttpStatus);
            assert_eq!(err.provider.as_deref(), Some("openai"));
        }
    }
}
