//! Prelude module for convenient imports.
//!
//! ```rust,ignore
//! use llms::prelude::*;
//! ```

#[cfg(feature = "anthropic")]
pub use crate::providers::Anthropic;
#[cfg(feature = "bedrock")]
pub use crate::providers::Bedrock;
#[cfg(feature = "cohere")]
pub use crate::providers::Cohere;
#[cfg(feature = "google")]
pub use crate::providers::Google;
#[cfg(feature = "ollama")]
pub use crate::providers::Ollama;
#[cfg(feature = "openai")]
pub use crate::providers::OpenAI;
#[cfg(feature = "reka")]
pub use crate::providers::Reka;

pub use crate::error::{Error, LlmError, LlmErrorKind, Result};
pub use crate::message::{Message, Role, SystemMessage};
pub use crate::model_info::ModelInfo;
pub use crate::provider::{Adapter, Provider, ProviderConfig};
pub use crate::registry::{ProviderEntry, Registry};
pub use crate::request::{CompletionRequest, ModelInputs};
pub use crate::result::{AsyncStreamResult, CompletionResult, Meta, ProviderRef, StreamResult};
pub use crate::tokenizer::Tokenizer;

pub use futures::StreamExt;
