//! Result types returned by every provider.
//!
//! - [`CompletionResult`]: text plus token and latency metadata
//! - [`StreamResult`]: blocking, single-pass iterator of text fragments
//! - [`AsyncStreamResult`]: single-pass [`Stream`] of text fragments

use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use futures::stream::Fuse;
use futures::{Stream, StreamExt};
use serde::Serialize;

use crate::error::Result;
use crate::request::ModelInputs;

/// Boxed blocking fragment iterator.
pub type FragmentIter = Box<dyn Iterator<Item = Result<String>> + Send>;

/// Boxed asynchronous fragment stream.
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Which provider and model produced a result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderRef {
    /// Provider name (e.g., "reka").
    pub name: &'static str,
    /// Model the call was made with.
    pub model: String,
}

impl fmt::Display for ProviderRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.name, self.model)
    }
}

/// Token and latency metadata of a completion.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Meta {
    /// Approximate prompt tokens.
    pub tokens_prompt: usize,
    /// Approximate completion tokens.
    pub tokens_completion: usize,
    /// Wall-clock duration of the vendor call.
    pub latency: Duration,
    /// Estimated cost in USD, when the model is in the provider's table.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost: Option<f64>,
}

impl Meta {
    /// Prompt plus completion tokens.
    #[must_use]
    pub const fn tokens(&self) -> usize {
        self.tokens_prompt + self.tokens_completion
    }
}

/// A finished completion.
#[derive(Debug, Clone, Serialize)]
pub struct CompletionResult {
    /// Completion text with surrounding whitespace removed.
    pub text: String,
    /// The payload that was sent.
    pub model_inputs: ModelInputs,
    /// Provider back-reference.
    pub provider: ProviderRef,
    /// Token counts and latency.
    pub meta: Meta,
}

impl CompletionResult {
    /// Creates a result.
    #[must_use]
    pub const fn new(
        text: String,
        model_inputs: ModelInputs,
        provider: ProviderRef,
        meta: Meta,
    ) -> Self {
        Self {
            text,
            model_inputs,
            provider,
            meta,
        }
    }
}

/// A streamed completion, consumed by blocking iteration.
///
/// The fragment sequence is lazy and single-pass: once exhausted it keeps
/// returning `None`.
pub struct StreamResult {
    stream: std::iter::Fuse<FragmentIter>,
    model_inputs: ModelInputs,
    provider: ProviderRef,
}

impl StreamResult {
    /// Wraps a fragment iterator.
    #[must_use]
    pub fn new(stream: FragmentIter, model_inputs: ModelInputs, provider: ProviderRef) -> Self {
        Self {
            stream: stream.fuse(),
            model_inputs,
            provider,
        }
    }

    /// The payload that was sent.
    #[must_use]
    pub const fn model_inputs(&self) -> &ModelInputs {
        &self.model_inputs
    }

    /// Provider back-reference.
    #[must_use]
    pub const fn provider(&self) -> &ProviderRef {
        &self.provider
    }

    /// Drains the remaining fragments into one string.
    pub fn into_text(self) -> Result<String> {
        self.stream.collect()
    }
}

impl Iterator for StreamResult {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        self.stream.next()
    }
}

impl fmt::Debug for StreamResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamResult")
            .field("model_inputs", &self.model_inputs)
            .field("provider", &self.provider)
            .finish_non_exhaustive()
    }
}

/// A streamed completion, consumed as a [`Stream`].
pub struct AsyncStreamResult {
    stream: Fuse<FragmentStream>,
    model_inputs: ModelInputs,
    provider: ProviderRef,
}

impl AsyncStreamResult {
    /// Wraps a fragment stream.
    #[must_use]
    pub fn new(stream: FragmentStream, model_inputs: ModelInputs, provider: ProviderRef) -> Self {
        Self {
            stream: stream.fuse(),
            model_inputs,
            provider,
        }
    }

    /// The payload that was sent.
    #[must_use]
    pub const fn model_inputs(&self) -> &ModelInputs {
        &self.model_inputs
    }

    /// Provider back-reference.
    #[must_use]
    pub const fn provider(&self) -> &ProviderRef {
        &self.provider
    }

    /// Drains the remaining fragments into one string.
    pub async fn into_text(mut self) -> Result<String> {
        let mut text = String::new();
        while let Some(fragment) = self.stream.next().await {
            text.push_str(&fragment?);
        }
        Ok(text)
    }
}

impl Stream for AsyncStreamResult {
    type Item = Result<String>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().stream.poll_next_unpin(cx)
    }
}

impl fmt::Debug for AsyncStreamResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncStreamResult")
            .field("model_inputs", &self.model_inputs)
            .field("provider", &self.provider)
            .finish_non_exhaustive()
    }
}
