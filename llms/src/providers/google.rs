//! Google Gemini API (`generateContent`).
//!
//! The model is part of the URL, and streaming uses a separate
//! `streamGenerateContent?alt=sse` endpoint whose events carry the same
//! response shape as a full call. Assistant turns are called `model`, and
//! system instructions travel in `systemInstruction`.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::error::{LlmError, Result};
use crate::message::{Message, Role};
use crate::model_info::{ModelInfo, ModelTable};
use crate::request::ModelInputs;
use crate::stream::ChunkEvent;

use super::{Vendor, decode, decode_value};

const MODELS: ModelTable = &[
    ("gemini-1.0-pro", ModelInfo::new(0.5, 1.5, 32_760)),
    ("gemini-1.5-flash", ModelInfo::new(0.35, 1.05, 1_048_576)),
    ("gemini-1.5-pro", ModelInfo::new(3.5, 10.5, 2_097_152)),
];

/// Google Gemini vendor translation.
#[derive(Debug, Clone, Copy, Default)]
pub struct Google;

impl Google {
    /// Default Gemini API base URL.
    pub const DEFAULT_BASE_URL: &'static str = "https://generativelanguage.googleapis.com/v1beta";
    /// Default model.
    pub const DEFAULT_MODEL: &'static str = "gemini-1.5-flash";
}

#[derive(Debug, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: [PartRef<'a>; 1],
}

#[derive(Debug, Serialize)]
struct PartRef<'a> {
    text: &'a str,
}

impl<'a> From<&'a Message> for Content<'a> {
    fn from(message: &'a Message) -> Self {
        let role = match message.role {
            Role::Assistant => "model",
            Role::User | Role::System => "user",
        };
        Self {
            role,
            parts: [PartRef {
                text: &message.content,
            }],
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
    #[serde(default)]
    error: Option<GoogleError>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GoogleErrorResponse {
    error: GoogleError,
}

#[derive(Debug, Deserialize)]
struct GoogleError {
    message: String,
    #[serde(default)]
    status: Option<String>,
}

impl GenerateContentResponse {
    /// Text of the first candidate, `None` when there is no candidate.
    fn into_text(self) -> Option<String> {
        self.candidates.into_iter().next().map(|candidate| {
            candidate
                .content
                .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
                .unwrap_or_default()
        })
    }
}

impl Google {
    fn response_error(&self, response: &mut GenerateContentResponse) -> Option<LlmError> {
        if let Some(error) = response.error.take() {
            let err = LlmError::provider(self.name(), error.message);
            return Some(match error.status {
                Some(status) => err.with_code(status),
                None => err,
            });
        }
        if response.candidates.is_empty() {
            if let Some(reason) = response
                .prompt_feedback
                .as_mut()
                .and_then(|f| f.block_reason.take())
            {
                return Some(
                    LlmError::provider(self.name(), format!("prompt blocked: {reason}"))
                        .with_code(reason),
                );
            }
        }
        None
    }
}

impl Vendor for Google {
    fn name(&self) -> &'static str {
        "google"
    }

    fn env_prefix(&self) -> &'static str {
        "GOOGLE"
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
        if stream {
            format!("{base_url}/models/{model}:streamGenerateContent?alt=sse")
        } else {
            format!("{base_url}/models/{model}:generateContent")
        }
    }

    fn headers(&self, api_key: Option<&str>) -> Vec<(&'static str, String)> {
        api_key
            .map(|key| vec![("x-goog-api-key", key.to_owned())])
            .unwrap_or_default()
    }

    // The model is addressed by the URL, so it is not part of the body.
    fn build_body(&self, _model: &str, inputs: &ModelInputs, _stream: bool) -> Result<Value> {
        let contents: Vec<Content<'_>> = inputs
            .messages
            .iter()
            .filter(|m| m.role != Role::System)
            .map(Content::from)
            .collect();
        let system: Vec<PartRef<'_>> = inputs
            .system_messages()
            .map(|m| PartRef { text: &m.content })
            .collect();

        let mut body = serde_json::Map::new();
        body.insert("contents".into(), serde_json::to_value(contents)?);
        if !system.is_empty() {
            body.insert("systemInstruction".into(), json!({ "parts": system }));
        }
        body.insert(
            "generationConfig".into(),
            json!({
                "temperature": inputs.temperature,
                "maxOutputTokens": inputs.max_tokens,
            }),
        );
        body.extend(inputs.extra.clone());
        Ok(Value::Object(body))
    }

    fn extract_text(&self, payload: Value) -> Result<String> {
        let mut response: GenerateContentResponse =
            decode_value(self.name(), "Gemini generateContent response", payload)?;
        if let Some(err) = self.response_error(&mut response) {
            return Err(err.into());
        }
        response.into_text().ok_or_else(|| {
            LlmError::response_format("at least one candidate", "no candidates")
                .with_provider(self.name())
                .into()
        })
    }

    fn parse_chunk(&self, frame: &str) -> Result<ChunkEvent> {
        let mut chunk: GenerateContentResponse =
            decode(self.name(), "Gemini stream chunk", frame)?;
        if let Some(err) = self.response_error(&mut chunk) {
            return Err(err.into());
        }
        Ok(chunk.into_text().map_or(ChunkEvent::Skip, ChunkEvent::Text))
    }

    fn parse_error(&self, status: u16, body: &str) -> LlmError {
        match serde_json::from_str::<GoogleErrorResponse>(body) {
            Ok(GoogleErrorResponse { error }) => {
                let err = LlmError::from_status(self.name(), status, error.message);
                match error.status {
                    Some(code) => err.with_code(code),
                    None => err,
                }
            }
            Err(_) => LlmError::http_status(status, body).with_provider(self.name()),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::error::LlmErrorKind;
    use crate::request::CompletionRequest;

    #[test]
    fn urls_carry_model_and_mode() {
        let base = Google::DEFAULT_BASE_URL;
        assert_eq!(
            Google.chat_url(base, "gemini-1.5-pro", false),
            format!("{base}/models/gemini-1.5-pro:generateContent")
        );
        assert_eq!(
            Google.chat_url(base, "gemini-1.5-pro", true),
            format!("{base}/models/gemini-1.5-pro:streamGenerateContent?alt=sse")
        );
        assert_eq!(
            Google.headers(Some("g-key")),
            vec![("x-goog-api-key", "g-key".to_owned())]
        );
    }

    mod build_body {
        use super::*;

        #[test]
        fn contents_system_and_generation_config() {
            let inputs = CompletionRequest::new("And Italy?")
                .system("Answer in one word.")
                .history(vec![
                    Message::user("Capital of France?"),
                    Message::assistant("Paris"),
                ])
                .temperature(0.4)
                .max_tokens(20)
                .model_inputs();
            let body = Google.build_body("gemini-1.5-flash", &inputs, false).unwrap();

            assert_eq!(
                body,
                json!({
                    "contents": [
                        {"role": "user", "parts": [{"text": "Capital of France?"}]},
                        {"role": "model", "parts": [{"text": "Paris"}]},
                        {"role": "user", "parts": [{"text": "And Italy?"}]}
                    ],
                    "systemInstruction": {"parts": [{"text": "Answer in one word."}]},
                    "generationConfig": {"temperature": 0.4, "maxOutputTokens": 20}
                })
            );
        }

        #[test]
        fn no_system_instruction_without_system_messages() {
            let inputs = CompletionRequest::new("Hi").model_inputs();
            let body = Google.build_body("gemini-1.5-flash", &inputs, true).unwrap();
            assert!(body.get("systemInstruction").is_none());
            assert!(body.get("model").is_none());
        }
    }

    mod extract_text {
        use super::*;

        #[test]
        fn joins_first_candidate_parts() {
            let payload = json!({
                "candidates": [
                    {"content": {"role": "model", "parts": [{"text": "Ro"}, {"text": "me"}]}, "finishReason": "STOP"},
                    {"content": {"role": "model", "parts": [{"text": "ignored"}]}}
                ]
            });
            assert_eq!(Google.extract_text(payload).unwrap(), "Rome");
        }

        #[test]
        fn blocked_prompt_is_provider_error() {
            let payload = json!({"promptFeedback": {"blockReason": "SAFETY"}});
            let err = Google.extract_text(payload).unwrap_err();
            let err = err.as_llm().unwrap();
            assert_eq!(err.kind, LlmErrorKind::Provider);
            assert_eq!(err.code.as_deref(), Some("SAFETY"));
        }

        #[test]
        fn no_candidates_is_format_error() {
            let err = Google.extract_text(json!({})).unwrap_err();
            assert_eq!(err.as_llm().unwrap().kind, LlmErrorKind::ResponseFormat);
        }
    }

    mod parse_chunk {
        use super::*;

        #[test]
        fn candidate_text() {
            let frame = r#"{"candidates":[{"content":{"parts":[{"text":"Hel"}],"role":"model"}}]}"#;
            assert_eq!(Google.parse_chunk(frame).unwrap(), ChunkEvent::Text("Hel".into()));
        }

        #[test]
        fn usage_only_chunk_is_skipped() {
            let frame = r#"{"usageMetadata":{"promptTokenCount":3}}"#;
            assert_eq!(Google.parse_chunk(frame).unwrap(), ChunkEvent::Skip);
        }

        #[test]
        fn in_band_error() {
            let frame = r#"{"error":{"code":500,"message":"internal","status":"INTERNAL"}}"#;
            assert!(Google.parse_chunk(frame).is_err());
        }
    }

    #[test]
    fn parse_error_keeps_status_code() {
        let err = Google.parse_error(
            400,
            r#"{"error":{"code":400,"message":"API key not valid","status":"INVALID_ARGUMENT"}}"#,
        );
        assert_eq!(err.kind, LlmErrorKind::InvalidRequest);
        assert_eq!(err.message, "API key not valid");
        assert_eq!(err.code.as_deref(), Some("INVALID_ARGUMENT"));
    }
}
