//! Configuration schema definitions.

use std::collections::BTreeMap;

use llms::ProviderConfig;
use serde::{Deserialize, Serialize};

/// Model used when neither the command line nor the config file names one.
pub const DEFAULT_MODEL: &str = "reka-core";

/// Root configuration structure.
///
/// ```toml
/// default_model = "reka-core"
///
/// [providers.reka]
/// api_key = "..."
///
/// [providers.ollama]
/// base_url = "http://gpu-box:11434"
/// timeout_secs = 120
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CliConfig {
    /// Model for `complete` when `-m` is not given.
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Per-provider settings keyed by provider name.
    #[serde(default)]
    pub providers: BTreeMap<String, ProviderConfig>,
}

fn default_model() -> String {
    DEFAULT_MODEL.to_owned()
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            default_model: default_model(),
            providers: BTreeMap::new(),
        }
    }
}

impl CliConfig {
    /// Settings for `provider`: environment variables win over the file.
    #[must_use]
    pub fn provider(&self, provider: &str, env_prefix: &str) -> ProviderConfig {
        self.provider_with(provider, env_prefix, |key| std::env::var(key).ok())
    }

    /// Same as [`provider`](Self::provider) over an arbitrary variable source.
    #[must_use]
    pub fn provider_with(
        &self,
        provider: &str,
        env_prefix: &str,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> ProviderConfig {
        let file = self.providers.get(provider).cloned().unwrap_or_default();
        ProviderConfig::from_lookup(env_prefix, lookup).or(file)
    }

    /// Template written by `config init`.
    #[must_use]
    pub fn template() -> Self {
        let providers = ["reka", "openai", "anthropic"]
            .into_iter()
            .map(|name| (name.to_owned(), ProviderConfig::new().with_api_key("")))
            .chain([(
                "ollama".to_owned(),
                ProviderConfig::new().with_base_url("http://localhost:11434"),
            )])
            .collect();
        Self {
            default_model: default_model(),
            providers,
        }
    }
}
