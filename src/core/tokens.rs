// src/core/tokens.rs — BPE token counting and budget truncation

use tiktoken_rs::CoreBPE;

use crate::infra::errors::SelfEvolveError;

/// Token counter for a model family.
pub struct Tokenizer {
    bpe: CoreBPE,
}

impl Tokenizer {
    /// Tokenizer for `model`, falling back to cl100k_base if the model isn't recognized.
    pub fn for_model(model: &str) -> Result<Self, SelfEvolveError> {
        let bpe = match tiktoken_rs::get_bpe_from_model(model) {
            Ok(bpe) => bpe,
            Err(_) => tiktoken_rs::cl100k_base().map_err(|e| {
                SelfEvolveError::Config(format!("cannot load cl100k_base tokenizer: {e}"))
            })?,
        };
        Ok(Self { bpe })
    }

    pub fn count(&self, text: &str) -> usize {
        self.bpe.encode_with_special_tokens(text).len()
    }

    /// Longest prefix of `text` that fits in `budget` tokens.
    ///
    /// The cut always falls on a char boundary, so the result is a true prefix
    /// of the input rather than a lossy decode of partial tokens.
    pub fn truncate<'a>(&self, text: &'a str, budget: usize) -> &'a str {
        if self.count(text) <= budget {
            return text;
        }

        // Binary search over char boundaries for the longest fitting prefix.
        let boundaries: Vec<usize> = text
            .char_indices()
            .map(|(i, _)| i)
            .chain(std::iter::once(text.len()))
            .collect();

        let (mut lo, mut hi) = (0usize, boundaries.len() - 1);
        while lo < hi {
            let mid = (lo + hi + 1) / 2;
            if self.count(&text[..boundaries[mid]]) <= budget {
                lo = mid;
            } else {
                hi = mid - 1;
            }
        }

        &text[..boundaries[lo]]
    }
}
