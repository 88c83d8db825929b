//! Static pricing and context-window tables.

use serde::{Deserialize, Serialize};

/// Pricing and limits of one model.
///
/// Prices are USD per one million tokens.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    /// Price of prompt tokens.
    pub prompt: f64,
    /// Price of completion tokens.
    pub completion: f64,
    /// Context window in tokens.
    pub token_limit: u32,
}

impl ModelInfo {
    /// Creates a table entry.
    #[must_use]
    pub const fn new(prompt: f64, completion: f64, token_limit: u32) -> Self {
        Self {
            prompt,
            completion,
            token_limit,
        }
    }

    /// Cost in USD of a call with the given token counts.
    #[must_use]
    pub fn cost(&self, prompt_tokens: usize, completion_tokens: usize) -> f64 {
        (prompt_tokens as f64).mul_add(
            self.prompt,
            completion_tokens as f64 * self.completion,
        ) / 1_000_000.0
    }
}

/// A vendor's model table.
pub type ModelTable = &'static [(&'static str, ModelInfo)];

/// Look up `model` in `table`.
#[must_use]
pub fn lookup(table: ModelTable, model: &str) -> Option<ModelInfo> {
    table
        .iter()
        .find(|(name, _)| *name == model)
        .map(|(_, info)| *info)
}
