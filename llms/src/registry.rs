//! Name-keyed provider table.
//!
//! The registry maps provider names and model names to constructors. The
//! builtin registry holds every provider enabled through cargo features and
//! is built once per process.

use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};

use crate::error::{Error, Result};
use crate::model_info::{self, ModelInfo, ModelTable};
use crate::provider::{Adapter, Provider, ProviderConfig};
use crate::providers::Vendor;

/// Constructor of a provider from its configuration.
pub type BuildFn = fn(ProviderConfig) -> Result<Arc<dyn Provider>>;

/// One registered provider.
#[derive(Debug, Clone, Copy)]
pub struct ProviderEntry {
    /// Provider name.
    pub name: &'static str,
    /// Model used when none is requested.
    pub default_model: &'static str,
    /// Known models and prices.
    pub models: ModelTable,
    /// Prefix of the provider's environment variables.
    pub env_prefix: &'static str,
    /// Constructor.
    pub build: BuildFn,
}

impl ProviderEntry {
    /// Builds an entry for `vendor`. `build` must construct the same vendor.
    #[must_use]
    pub fn for_vendor<V: Vendor>(vendor: &V, build: BuildFn) -> Self {
        Self {
            name: vendor.name(),
            default_model: vendor.default_model(),
            models: vendor.models(),
            env_prefix: vendor.env_prefix(),
            build,
        }
    }

    /// Whether `model` is in this provider's table.
    #[must_use]
    pub fn serves(&self, model: &str) -> bool {
        model_info::lookup(self.models, model).is_some()
    }
}

/// A model reference resolved to its provider.
#[derive(Debug, Clone, Copy)]
pub struct Resolved<'a> {
    /// The provider entry.
    pub entry: &'a ProviderEntry,
    /// Model name without any provider prefix.
    pub model: &'a str,
}

/// Provider table keyed by name.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    entries: BTreeMap<&'static str, ProviderEntry>,
}

fn build<V: Vendor + Default>(config: ProviderConfig) -> Result<Arc<dyn Provider>> {
    Ok(Arc::new(Adapter::new(V::default(), config)?))
}

#[cfg(feature = "openai")]
fn build_openai_profile(
    vendor: crate::providers::OpenAI,
    config: ProviderConfig,
) -> Result<Arc<dyn Provider>> {
    Ok(Arc::new(Adapter::new(vendor, config)?))
}

impl Registry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry of every provider compiled into this build.
    pub fn builtin() -> &'static Self {
        static BUILTIN: OnceLock<Registry> = OnceLock::new();
        BUILTIN.get_or_init(Self::with_builtin_providers)
    }

    #[allow(unused_mut)]
    fn with_builtin_providers() -> Self {
        let mut registry = Self::new();

        #[cfg(feature = "reka")]
        registry.register(ProviderEntry::for_vendor(
            &crate::providers::Reka,
            build::<crate::providers::Reka>,
        ));

        #[cfg(feature = "openai")]
        {
            use crate::providers::OpenAI;
            registry.register(ProviderEntry::for_vendor(
                &OpenAI::openai(),
                build::<OpenAI>,
            ));
            registry.register(ProviderEntry::for_vendor(&OpenAI::groq(), |config| {
                build_openai_profile(OpenAI::groq(), config)
            }));
            registry.register(ProviderEntry::for_vendor(&OpenAI::deepseek(), |config| {
                build_openai_profile(OpenAI::deepseek(), config)
            }));
            registry.register(ProviderEntry::for_vendor(&OpenAI::mistral(), |config| {
                build_openai_profile(OpenAI::mistral(), config)
            }));
        }

        #[cfg(feature = "anthropic")]
        registry.register(ProviderEntry::for_vendor(
            &crate::providers::Anthropic,
            build::<crate::providers::Anthropic>,
        ));

        #[cfg(feature = "bedrock")]
        registry.register(ProviderEntry::for_vendor(
            &crate::providers::Bedrock,
            build::<crate::providers::Bedrock>,
        ));

        #[cfg(feature = "cohere")]
        registry.register(ProviderEntry::for_vendor(
            &crate::providers::Cohere,
            build::<crate::providers::Cohere>,
        ));

        #[cfg(feature = "google")]
        registry.register(ProviderEntry::for_vendor(
            &crate::providers::Google,
            build::<crate::providers::Google>,
        ));

        #[cfg(feature = "ollama")]
        registry.register(ProviderEntry::for_vendor(
            &crate::providers::Ollama,
            build::<crate::providers::Ollama>,
        ));

        registry
    }

    /// Adds or replaces an entry.
    pub fn register(&mut self, entry: ProviderEntry) -> &mut Self {
        self.entries.insert(entry.name, entry);
        self
    }

    /// Entry registered under `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ProviderEntry> {
        self.entries.get(name)
    }

    /// Registered provider names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.keys().copied()
    }

    /// Resolves a model reference.
    ///
    /// `"provider/model"` selects the provider explicitly (the model part may
    /// be empty for the provider's default). A bare name is looked up in the
    /// model tables, then tried as a provider name.
    ///
    /// # Errors
    ///
    /// [`Error::UnknownProvider`] for an unregistered prefix,
    /// [`Error::UnknownModel`] when no table contains the model.
    pub fn resolve<'a>(&'a self, model: &'a str) -> Result<Resolved<'a>> {
        if let Some((name, rest)) = model.split_once('/') {
            if let Some(entry) = self.get(name) {
                let model = if rest.is_empty() {
                    entry.default_model
                } else {
                    rest
                };
                return Ok(Resolved { entry, model });
            }
            // Model names such as "meta/llama-3" may contain a slash.
            if self.entries.values().all(|e| !e.serves(model)) {
                return Err(Error::UnknownProvider(name.to_owned()));
            }
        }

        if let Some(entry) = self.entries.values().find(|e| e.serves(model)) {
            return Ok(Resolved { entry, model });
        }
        if let Some(entry) = self.get(model) {
            return Ok(Resolved {
                entry,
                model: entry.default_model,
            });
        }
        Err(Error::UnknownModel(model.to_owned()))
    }

    /// Builds the provider registered under `name`.
    ///
    /// # Errors
    ///
    /// [`Error::UnknownProvider`], or whatever the constructor reports.
    pub fn create(&self, name: &str, config: ProviderConfig) -> Result<Arc<dyn Provider>> {
        let entry = self
            .get(name)
            .ok_or_else(|| Error::UnknownProvider(name.to_owned()))?;
        (entry.build)(config)
    }

    /// Resolves `model` and builds its provider configured from the
    /// environment.
    ///
    /// # Errors
    ///
    /// Resolution errors, or a missing API key.
    pub fn init(&self, model: &str) -> Result<Arc<dyn Provider>> {
        let resolved = self.resolve(model)?;
        let config = ProviderConfig::from_env(resolved.entry.env_prefix).with_model(resolved.model);
        (resolved.entry.build)(config)
    }

    /// Every `(provider, model, info)` triple.
    pub fn models(&self) -> impl Iterator<Item = (&'static str, &'static str, ModelInfo)> + '_ {
        self.entries.values().flat_map(|entry| {
            entry
                .models
                .iter()
                .map(move |(model, info)| (entry.name, *model, *info))
        })
    }
}

/// Builds the provider for `model` from the builtin registry.
///
/// ```rust,ignore
/// let provider = llms::init("reka-core")?;
/// let provider = llms::init("ollama/mistral")?;
/// ```
///
/// # Errors
///
/// See [`Registry::init`].
pub fn init(model: &str) -> Result<Arc<dyn Provider>> {
    Registry::builtin().init(model)
}
