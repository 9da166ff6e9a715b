// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::path::Path;
use std::sync::Arc;

use crate::errors::{ConfigError, CorpusError, Result};
use crate::observability::messages::text::{TokenizerFallback, TokenizerLoaded};

/// Token accounting used for chunk budgets and token statistics.
pub trait Tokenizer: Send + Sync {
    fn encode(&self, text: &str) -> Result<Vec<u32>>;

    /// Longest input the model accepts in one sequence.
    fn model_max_length(&self) -> usize;

    fn name(&self) -> &str;
}

/// Counts whitespace-separated words. Used when no tokenizer is configured
/// and as the fallback when encoding fails.
#[derive(Debug, Clone)]
pub struct WhitespaceTokenizer {
    model_max_length: usize,
}

impl WhitespaceTokenizer {
    pub fn new(model_max_length: usize) -> Self {
        Self { model_max_length }
    }
}

impl Tokenizer for WhitespaceTokenizer {
    fn encode(&self, text: &str) -> Result<Vec<u32>> {
        Ok((0..whitespace_count(text)).map(|i| i as u32).collect())
    }

    fn model_max_length(&self) -> usize {
        self.model_max_length
    }

    fn name(&self) -> &str {
        "whitespace"
    }
}

/// A HuggingFace `tokenizer.json`.
pub struct HfTokenizer {
    inner: tokenizers::Tokenizer,
    model_max_length: usize,
}

impl HfTokenizer {
    pub fn from_file(path: &Path, model_max_length: usize) -> Result<Self> {
        let inner = tokenizers::Tokenizer::from_file(path).map_err(|e| {
            CorpusError::Config(ConfigError::invalid(
                "text_splitter.tokenizer_path",
                format!("cannot load {}: {}", path.display(), e),
            ))
        })?;
        tracing::info!(
            "{}",
            TokenizerLoaded {
                path,
                model_max_length,
            }
        );
        Ok(Self {
            inner,
            model_max_length,
        })
    }
}

impl Tokenizer for HfTokenizer {
    fn encode(&self, text: &str) -> Result<Vec<u32>> {
        self.inner
            .encode(text, false)
            .map(|encoding| encoding.get_ids().to_vec())
            .map_err(|e| CorpusError::Data(format!("tokenizer encode failed: {}", e)))
    }

    fn model_max_length(&self) -> usize {
        self.model_max_length
    }

    fn name(&self) -> &str {
        "huggingface"
    }
}

pub fn whitespace_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Token count of `text`, estimated by whitespace when encoding fails.
pub fn count_tokens(tokenizer: &dyn Tokenizer, text: &str) -> usize {
    match tokenizer.encode(text) {
        Ok(ids) => ids.len(),
        Err(e) => {
            let reason = e.to_string();
            tracing::warn!("{}", TokenizerFallback { reason: &reason });
            whitespace_count(text)
        }
    }
}

/// The tokenizer at `path`, or whitespace counting when there is none or it
/// cannot be loaded.
pub fn load_tokenizer(path: Option<&Path>, model_max_length: usize) -> Arc<dyn Tokenizer> {
    match path {
        Some(path) => match HfTokenizer::from_file(path, model_max_length) {
            Ok(tokenizer) => Arc::new(tokenizer),
            Err(e) => {
                let reason = e.to_string();
                tracing::warn!("{}", TokenizerFallback { reason: &reason });
                Arc::new(WhitespaceTokenizer::new(model_max_length))
            }
        },
        None => Arc::new(WhitespaceTokenizer::new(model_max_length)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct BrokenTokenizer;

    impl Tokenizer for BrokenTokenizer {
        fn encode(&self, _text: &str) -> Result<Vec<u32>> {
            Err(CorpusError::Data("vocabulary missing".into()))
        }

        fn model_max_length(&self) -> usize {
            16
        }

        fn name(&self) -> &str {
            "broken"
        }
    }

    #[test]
    fn test_whitespace_counts() {
        struct TestCase {
            name: &'static str,
            text: &'static str,
            expected: usize,
        }

        let test_cases = vec![
            TestCase {
                name: "empty",
                text: "",
                expected: 0,
            },
            TestCase {
                name: "only whitespace",
                text: " \n\t ",
                expected: 0,
            },
            TestCase {
                name: "mixed separators",
                text: "one two\nthree\tfour  five",
                expected: 5,
            },
        ];

        let tokenizer = WhitespaceTokenizer::new(100);
        for tc in test_cases {
            assert_eq!(
                count_tokens(&tokenizer, tc.text),
                tc.expected,
                "count mismatch for '{}'",
                tc.name
            );
        }
    }

    #[test]
    fn test_encode_failure_degrades_to_whitespace() {
        assert_eq!(count_tokens(&BrokenTokenizer, "still counted here"), 3);
    }

    #[test]
    fn test_missing_tokenizer_file_falls_back() {
        let tokenizer = load_tokenizer(Some(Path::new("/nonexistent/tokenizer.json")), 64);
        assert_eq!(tokenizer.name(), "whitespace");
        assert_eq!(tokenizer.model_max_length(), 64);
    }
}
