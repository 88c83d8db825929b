//! Completion request parameters and the resolved model inputs.
//!
//! # Example
//!
//! ```rust,ignore
//! use llms::prelude::*;
//!
//! let request = CompletionRequest::new("What is the capital of France?")
//!     .system("Answer in one word.")
//!     .temperature(0.2)
//!     .max_tokens(50)
//!     .extra("top_p", 0.9);
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::message::{Message, SystemMessage, build_messages};

/// Parameters common to every provider's completion call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// The new user prompt.
    pub prompt: String,

    /// Prior conversation, inserted before the prompt.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub history: Vec<Message>,

    /// System instructions, inserted before everything else.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_message: Option<SystemMessage>,

    /// Sampling temperature.
    #[serde(default)]
    pub temperature: f64,

    /// Maximum tokens to generate.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Vendor-specific options merged verbatim into the payload.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub extra: Map<String, Value>,
}

const fn default_max_tokens() -> u32 {
    CompletionRequest::DEFAULT_MAX_TOKENS
}

impl CompletionRequest {
    /// Default completion length.
    pub const DEFAULT_MAX_TOKENS: u32 = 300;

    /// Creates a request for the given prompt with default parameters.
    #[must_use]
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            history: Vec::new(),
            system_message: None,
            temperature: 0.0,
            max_tokens: Self::DEFAULT_MAX_TOKENS,
            extra: Map::new(),
        }
    }

    /// Sets the prior conversation.
    #[must_use]
    pub fn history(mut self, history: Vec<Message>) -> Self {
        self.history = history;
        self
    }

    /// Sets the system message (a string or a list of messages).
    #[must_use]
    pub fn system(mut self, system_message: impl Into<SystemMessage>) -> Self {
        self.system_message = Some(system_message.into());
        self
    }

    /// Sets temperature.
    #[must_use]
    pub const fn temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    /// Sets max tokens.
    #[must_use]
    pub const fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Adds one vendor passthrough option.
    #[must_use]
    pub fn extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// Resolves the request into the payload sent to the vendor.
    #[must_use]
    pub fn model_inputs(&self) -> ModelInputs {
        ModelInputs {
            messages: build_messages(
                &self.prompt,
                &self.history,
                self.system_message.as_ref(),
            ),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            extra: self.extra.clone(),
        }
    }
}

/// The resolved request payload, echoed back in every result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInputs {
    /// Ordered messages: system, history, prompt.
    pub messages: Vec<Message>,
    /// Sampling temperature.
    pub temperature: f64,
    /// Maximum tokens to generate.
    pub max_tokens: u32,
    /// Vendor passthrough options.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub extra: Map<String, Value>,
}

impl ModelInputs {
    /// JSON object `{messages, temperature, max_tokens, ..extra}`.
    ///
    /// Keys in `extra` replace the common keys of the same name.
    pub fn to_json(&self) -> serde_json::Result<Map<String, Value>> {
        let mut map = Map::new();
        map.insert("messages".into(), serde_json::to_value(&self.messages)?);
        map.insert("temperature".into(), Value::from(self.temperature));
        map.insert("max_tokens".into(), Value::from(self.max_tokens));
        map.extend(self.extra.clone());
        Ok(map)
    }

    /// Messages carrying the system role.
    pub fn system_messages(&self) -> impl Iterator<Item = &Message> {
        self.messages
            .iter()
            .filter(|m| m.role == crate::message::Role::System)
    }
}
