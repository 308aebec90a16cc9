//! Token counting traits and utilities

use anyhow::Result;
use tiktoken_rs::{cl100k_base, CoreBPE};

/// Trait for counting tokens in a string.
pub trait CountToken {
    fn count_token(&self, string: &str) -> usize;
}

/// Blanket impl of CountToken for Fn(&str) -> usize.
impl<F> CountToken for F where F: Fn(&str) -> usize {
    fn count_token(&self, string: &str) -> usize {
        self(string)
    }
}

/// Counter using the `cl100k_base` BPE.
///
/// Local models ship their own tokenizers, so the count is an estimate. It is close enough to tell whether a prompt
/// will overflow the context window of the backend.
#[derive(Clone)]
#[readonly::make]
pub struct Cl100kCounter {
    /// The tokenizer. read-only.
    #[readonly]
    pub bpe: CoreBPE,
}

impl Cl100kCounter {
    pub fn new() -> Result<Self> {
        Ok(Self { bpe: cl100k_base()? })
    }
}

impl CountToken for Cl100kCounter {
    fn count_token(&self, string: &str) -> usize {
        self.bpe.encode_with_special_tokens(string).len()
    }
}

#[cfg(test)]
mod test_token {
    use super::{Cl100kCounter, CountToken};

    #[test]
    fn test_str_len_impl() {
        let counter = str::len;
        let size = counter.count_token("");
        assert_eq!(0, size);
    }

    #[test]
    fn test_cl100k_counts_words() {
        let counter = Cl100kCounter::new().expect("cl100k_base is bundled with tiktoken-rs");
        assert_eq!(0, counter.count_token(""));
        let short = counter.count_token("hello");
        let long = counter.count_token("hello there, how are you doing on this fine day?");
        assert!(short >= 1);
        assert!(long > short);
    }
}
