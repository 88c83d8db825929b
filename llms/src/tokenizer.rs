//! Approximate token counting.
//!
//! Every provider counts tokens with the encoding of one fixed reference model
//! (`gpt-3.5-turbo`, i.e. `cl100k_base`). Counts are therefore approximations
//! for non-OpenAI vendors and will not match vendor-reported usage exactly.

use std::sync::OnceLock;

use tiktoken_rs::CoreBPE;

use crate::error::{Error, Result};
use crate::message::Message;

/// Model whose encoding is used for every vendor.
pub const REFERENCE_MODEL: &str = "gpt-3.5-turbo";

static REFERENCE: OnceLock<Tokenizer> = OnceLock::new();

/// BPE tokenizer used for token accounting.
pub struct Tokenizer {
    encoder: CoreBPE,
    model: String,
}

impl std::fmt::Debug for Tokenizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tokenizer")
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl Tokenizer {
    /// Load the tokenizer registered for `model`.
    pub fn for_model(model: &str) -> Result<Self> {
        let encoder = tiktoken_rs::get_bpe_from_model(model)
            .map_err(|e| Error::tokenizer(format!("no encoding for model '{model}': {e}")))?;
        Ok(Self {
            encoder,
            model: model.to_owned(),
        })
    }

    /// The shared reference tokenizer, loaded on first use.
    pub fn reference() -> Result<&'static Self> {
        if let Some(tokenizer) = REFERENCE.get() {
            return Ok(tokenizer);
        }
        let tokenizer = Self::for_model(REFERENCE_MODEL)?;
        Ok(REFERENCE.get_or_init(|| tokenizer))
    }

    /// Count the tokens in `text`.
    #[must_use]
    pub fn count_tokens(&self, text: &str) -> usize {
        self.encoder.encode_with_special_tokens(text).len()
    }

    /// Sum of the token counts of each message's JSON text.
    pub fn count_messages(&self, messages: &[Message]) -> Result<usize> {
        messages.iter().try_fold(0, |total, message| {
            let text = serde_json::to_string(message)?;
            Ok(total + self.count_tokens(&text))
        })
    }

    /// Model this tokenizer was loaded for.
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn reference_is_shared() {
        let a = Tokenizer::reference().unwrap();
        let b = Tokenizer::reference().unwrap();
        assert!(std::ptr::eq(a, b));
        assert_eq!(a.model(), REFERENCE_MODEL);
    }

    #[test]
    fn unknown_model_fails() {
        let err = Tokenizer::for_model("definitely-not-a-model").unwrap_err();
        assert!(matches!(err, Error::Tokenizer(_)));
    }

    #[test]
    fn empty_text_has_no_tokens() {
        assert_eq!(Tokenizer::reference().unwrap().count_tokens(""), 0);
    }

    #[test]
    fn counting_is_deterministic() {
        let tok = Tokenizer::reference().unwrap();
        let text = "The quick brown fox jumps over the lazy dog.";
        let first = tok.count_tokens(text);
        assert!(first > 0);
        assert_eq!(first, tok.count_tokens(text));
    }

    #[test]
    fn concatenation_is_monotonic() {
        let tok = Tokenizer::reference().unwrap();
        let pairs = [
            ("Hello", " world"),
            ("Reka is", " a model vendor."),
            ("fn main() {", " println!(\"hi\"); }"),
            ("", "only right"),
        ];
        for (left, right) in pairs {
            let joined = format!("{left}{right}");
            let total = tok.count_tokens(&joined);
            assert!(total >= tok.count_tokens(left), "{joined}");
            assert!(total >= tok.count_tokens(right), "{joined}");
        }
    }

    #[test]
    fn messages_sum_individual_counts() {
        let tok = Tokenizer::reference().unwrap();
        let messages = vec![Message::system("Be terse"), Message::user("Hi")];
        let expected: usize = messages
            .iter()
            .map(|m| tok.count_tokens(&serde_json::to_string(m).unwrap()))
            .sum();
        assert_eq!(tok.count_messages(&messages).unwrap(), expected);
        assert_eq!(tok.count_messages(&[]).unwrap(), 0);
    }
}
