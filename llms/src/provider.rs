//! The common provider surface and its generic implementation.
//!
//! [`Provider`] is the object-safe contract every vendor exposes. [`Adapter`]
//! implements it once on top of a [`Vendor`] translation, so a vendor only
//! describes its wire format.
//!
//! # Example
//!
//! ```rust,ignore
//! use llms::prelude::*;
//!
//! let reka = Adapter::from_env(Reka)?;
//! let result = reka.complete(&CompletionRequest::new("What is the capital of France?"))?;
//! println!("{} ({} tokens)", result.text, result.meta.tokens());
//! ```

use std::io::BufReader;
use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{Error, LlmError, Result};
use crate::latency::LatencyTracker;
use crate::message::Message;
use crate::model_info::{self, ModelInfo};
use crate::providers::{Vendor, decode};
use crate::request::{CompletionRequest, ModelInputs};
use crate::result::{AsyncStreamResult, CompletionResult, Meta, ProviderRef, StreamResult};
use crate::stream::{BlockingFragments, async_fragments};
use crate::tokenizer::Tokenizer;

/// Connection settings of one provider.
///
/// Unset fields fall back to the vendor's defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// API key for authentication.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Base URL for the API.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Model to call.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Request timeout in seconds. No timeout when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

impl ProviderConfig {
    /// Creates an empty configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates configuration from environment variables.
    ///
    /// Reads from:
    /// - `<PREFIX>_API_KEY` - API key
    /// - `<PREFIX>_BASE_URL` - Optional base URL
    /// - `<PREFIX>_MODEL` - Optional model
    #[must_use]
    pub fn from_env(prefix: &str) -> Self {
        Self::from_lookup(prefix, |key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) over an arbitrary variable source.
    #[must_use]
    pub fn from_lookup(prefix: &str, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |suffix: &str| lookup(&format!("{prefix}_{suffix}")).filter(|v| !v.is_empty());
        Self {
            api_key: var("API_KEY"),
            base_url: var("BASE_URL"),
            model: var("MODEL"),
            timeout_secs: None,
        }
    }

    /// Sets the API key.
    #[must_use]
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Sets the base URL.
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Sets the model.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Sets the request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    /// Field-wise fallback: values set in `self` win over `other`.
    #[must_use]
    pub fn or(self, other: Self) -> Self {
        Self {
            api_key: self.api_key.or(other.api_key),
            base_url: self.base_url.or(other.base_url),
            model: self.model.or(other.model),
            timeout_secs: self.timeout_secs.or(other.timeout_secs),
        }
    }
}

/// Unified completion interface over one vendor and model.
///
/// The blocking methods must not be called from inside an async runtime
/// worker thread; use the `a`-prefixed methods there.
#[async_trait]
pub trait Provider: Send + Sync + std::fmt::Debug {
    /// Provider name (e.g., "reka").
    fn name(&self) -> &'static str;

    /// Model this provider calls.
    fn model(&self) -> &str;

    /// Pricing and limits of the model, when it is in the vendor's table.
    fn model_info(&self) -> Option<ModelInfo>;

    /// Latency of the last finished call.
    fn last_latency(&self) -> Option<Duration>;

    /// Approximate token count of `text`.
    ///
    /// # Errors
    ///
    /// Fails if the tokenizer cannot be loaded.
    fn count_tokens(&self, text: &str) -> Result<usize> {
        Ok(Tokenizer::reference()?.count_tokens(text))
    }

    /// Approximate token count of a message list.
    ///
    /// # Errors
    ///
    /// Fails if the tokenizer cannot be loaded.
    fn count_message_tokens(&self, messages: &[Message]) -> Result<usize> {
        Tokenizer::reference()?.count_messages(messages)
    }

    /// Blocking completion.
    ///
    /// # Errors
    ///
    /// Vendor and transport failures are passed through unchanged.
    fn complete(&self, request: &CompletionRequest) -> Result<CompletionResult>;

    /// Asynchronous completion.
    async fn acomplete(&self, request: &CompletionRequest) -> Result<CompletionResult>;

    /// Blocking streamed completion.
    ///
    /// # Errors
    ///
    /// Fails if the request is rejected; later failures arrive as stream items.
    fn complete_stream(&self, request: &CompletionRequest) -> Result<StreamResult>;

    /// Asynchronous streamed completion.
    async fn acomplete_stream(&self, request: &CompletionRequest) -> Result<AsyncStreamResult>;
}

/// A [`Provider`] built from a [`Vendor`] translation.
#[derive(Debug)]
pub struct Adapter<V: Vendor> {
    vendor: V,
    model: String,
    api_key: Option<String>,
    base_url: String,
    timeout: Option<Duration>,
    client: reqwest::Client,
    blocking: OnceLock<reqwest::blocking::Client>,
    latency: LatencyTracker,
}

impl<V: Vendor> Adapter<V> {
    /// Creates an adapter.
    ///
    /// # Errors
    ///
    /// Fails with an authentication error if the vendor needs an API key and
    /// none is configured.
    pub fn new(vendor: V, config: ProviderConfig) -> Result<Self> {
        let api_key = config.api_key.filter(|key| !key.is_empty());
        if api_key.is_none() && vendor.requires_api_key() {
            return Err(LlmError::auth(
                vendor.name(),
                format!("{}_API_KEY is not set", vendor.env_prefix()),
            )
            .into());
        }

        let timeout = config.timeout_secs.map(Duration::from_secs);
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| LlmError::internal(format!("Failed to create HTTP client: {e}")))?;

        let base_url = config
            .base_url
            .unwrap_or_else(|| vendor.default_base_url().to_owned())
            .trim_end_matches('/')
            .to_owned();
        let model = config
            .model
            .unwrap_or_else(|| vendor.default_model().to_owned());

        Ok(Self {
            vendor,
            model,
            api_key,
            base_url,
            timeout,
            client,
            blocking: OnceLock::new(),
            latency: LatencyTracker::new(),
        })
    }

    /// Creates an adapter configured from `<PREFIX>_*` environment variables.
    ///
    /// # Errors
    ///
    /// See [`new`](Self::new).
    pub fn from_env(vendor: V) -> Result<Self> {
        let config = ProviderConfig::from_env(vendor.env_prefix());
        Self::new(vendor, config)
    }

    /// The vendor translation.
    #[must_use]
    pub const fn vendor(&self) -> &V {
        &self.vendor
    }

    /// API root requests are sent under.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn provider_ref(&self) -> ProviderRef {
        ProviderRef {
            name: self.vendor.name(),
            model: self.model.clone(),
        }
    }

    fn request_body(&self, inputs: &ModelInputs, stream: bool) -> Result<Value> {
        debug!(
            provider = self.vendor.name(),
            model = %self.model,
            messages = inputs.messages.len(),
            stream,
            "Sending completion request"
        );
        self.vendor.build_body(&self.model, inputs, stream)
    }

    fn status_error(&self, status: u16, body: &str) -> Error {
        let err = self.vendor.parse_error(status, body);
        warn!(provider = self.vendor.name(), status, error = %err, "Vendor returned error status");
        err.into()
    }

    /// The blocking client, built on first synchronous use.
    fn blocking_client(&self) -> Result<&reqwest::blocking::Client> {
        if let Some(client) = self.blocking.get() {
            return Ok(client);
        }
        let client = reqwest::blocking::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| LlmError::internal(format!("Failed to create HTTP client: {e}")))?;
        Ok(self.blocking.get_or_init(|| client))
    }

    fn send_blocking(&self, body: &Value, stream: bool) -> Result<reqwest::blocking::Response> {
        let url = self.vendor.chat_url(&self.base_url, &self.model, stream);
        let mut req = self.blocking_client()?.post(url).json(body);
        for (name, value) in self.vendor.headers(self.api_key.as_deref()) {
            req = req.header(name, value);
        }

        let response = req.send().map_err(LlmError::from)?;
        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().unwrap_or_default();
            return Err(self.status_error(status.as_u16(), &error_text));
        }
        Ok(response)
    }

    async fn send(&self, body: &Value, stream: bool) -> Result<reqwest::Response> {
        let url = self.vendor.chat_url(&self.base_url, &self.model, stream);
        let mut req = self.client.post(url).json(body);
        for (name, value) in self.vendor.headers(self.api_key.as_deref()) {
            req = req.header(name, value);
        }

        let response = req.send().await.map_err(LlmError::from)?;
        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(self.status_error(status.as_u16(), &error_text));
        }
        Ok(response)
    }

    /// Turns a raw response body into a result with token accounting.
    fn finish(&self, body: &str, inputs: ModelInputs, latency: Duration) -> Result<CompletionResult> {
        let payload: Value = decode(self.vendor.name(), "JSON response body", body)?;
        let text = self.vendor.extract_text(payload)?.trim().to_owned();

        let tokenizer = Tokenizer::reference()?;
        let tokens_prompt = tokenizer.count_messages(&inputs.messages)?;
        let tokens_completion = tokenizer.count_tokens(&text);
        let cost = self
            .model_info()
            .map(|info| info.cost(tokens_prompt, tokens_completion));

        debug!(
            provider = self.vendor.name(),
            model = %self.model,
            ?latency,
            tokens_prompt,
            tokens_completion,
            "Completion finished"
        );

        Ok(CompletionResult::new(
            text,
            inputs,
            self.provider_ref(),
            Meta {
                tokens_prompt,
                tokens_completion,
                latency,
                cost,
            },
        ))
    }
}

#[async_trait]
impl<V: Vendor> Provider for Adapter<V> {
    fn name(&self) -> &'static str {
        self.vendor.name()
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn model_info(&self) -> Option<ModelInfo> {
        model_info::lookup(self.vendor.models(), &self.model)
    }

    fn last_latency(&self) -> Option<Duration> {
        self.latency.last()
    }

    fn complete(&self, request: &CompletionRequest) -> Result<CompletionResult> {
        let inputs = request.model_inputs();
        let body = self.request_body(&inputs, false)?;

        let timer = self.latency.track();
        let response = self.send_blocking(&body, false)?;
        let text = response.text().map_err(LlmError::from)?;
        let latency = timer.finish();

        self.finish(&text, inputs, latency)
    }

    async fn acomplete(&self, request: &CompletionRequest) -> Result<CompletionResult> {
        let inputs = request.model_inputs();
        let body = self.request_body(&inputs, false)?;

        let timer = self.latency.track();
        let response = self.send(&body, false).await?;
        let text = response.text().await.map_err(LlmError::from)?;
        let latency = timer.finish();

        self.finish(&text, inputs, latency)
    }

    fn complete_stream(&self, request: &CompletionRequest) -> Result<StreamResult> {
        let inputs = request.model_inputs();
        let body = self.request_body(&inputs, true)?;
        let response = self.send_blocking(&body, true)?;

        let fragments = BlockingFragments::new(self.vendor.clone(), BufReader::new(response));
        Ok(StreamResult::new(
            Box::new(fragments),
            inputs,
            self.provider_ref(),
        ))
    }

    async fn acomplete_stream(&self, request: &CompletionRequest) -> Result<AsyncStreamResult> {
        let inputs = request.model_inputs();
        let body = self.request_body(&inputs, true)?;
        let response = self.send(&body, true).await?;

        let fragments = async_fragments(self.vendor.clone(), response);
        Ok(AsyncStreamResult::new(
            Box::pin(fragments),
            inputs,
            self.provider_ref(),
        ))
    }
}

/// Reka provider.
#[cfg(feature = "reka")]
pub type RekaProvider = Adapter<crate::providers::Reka>;

/// OpenAI or OpenAI-compatible provider.
#[cfg(feature = "openai")]
pub type OpenAIProvider = Adapter<crate::providers::OpenAI>;

/// Anthropic provider.
#[cfg(feature = "anthropic")]
pub type AnthropicProvider = Adapter<crate::providers::Anthropic>;

/// Anthropic models on Amazon Bedrock.
#[cfg(feature = "bedrock")]
pub type BedrockProvider = Adapter<crate::providers::Bedrock>;

/// Cohere provider.
#[cfg(feature = "cohere")]
pub type CohereProvider = Adapter<crate::providers::Cohere>;

/// Google Gemini provider.
#[cfg(feature = "google")]
pub type GoogleProvider = Adapter<crate::providers::Google>;

/// Ollama provider.
#[cfg(feature = "ollama")]
pub type OllamaProvider = Adapter<crate::providers::Ollama>;
