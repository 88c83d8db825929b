//! llms - One client surface over many LLM vendor APIs
//!
//! Every vendor is exposed through the same four calls: [`Provider::complete`],
//! [`Provider::acomplete`], [`Provider::complete_stream`] and
//! [`Provider::acomplete_stream`]. Requests, results, token accounting and
//! latency measurement are normalized across vendors.
//!
//! ```rust,ignore
//! use llms::prelude::*;
//!
//! let provider = llms::init("reka-core")?;
//! let result = provider
//!     .acomplete(&CompletionRequest::new("Hello").system("Be terse"))
//!     .await?;
//! println!("{} in {:?}", result.text, result.meta.latency);
//! ```

pub mod error;
pub mod latency;
pub mod message;
pub mod model_info;
pub mod prelude;
pub mod provider;
pub mod providers;
pub mod registry;
pub mod request;
pub mod result;
pub mod stream;
pub mod tokenizer;

pub use error::{Error, LlmError, LlmErrorKind, Result};
pub use provider::{Adapter, Provider, ProviderConfig};
pub use registry::{Registry, init};
