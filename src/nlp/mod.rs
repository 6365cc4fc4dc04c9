//! Language capabilities consumed by the tokenizer stage.
//!
//! The pipeline only depends on the `NlpToolkit` trait, so phrase handling and
//! stopword/underscore filtering can be tested with a stand-in toolkit.

pub mod emoji;
pub mod lemmatize;
pub mod stopwords;

use tracing::{info, warn};
use unicode_segmentation::UnicodeSegmentation;

use crate::config::TokenizeConfig;

pub use emoji::strip_emoji;
pub use lemmatize::{Lemmatizer, SuffixLemmatizer};
pub use stopwords::StopWords;

/// The narrow set of language operations the tokenizer needs.
pub trait NlpToolkit {
    fn strip_emoji(&self, text: &str) -> String;
    fn tokenize(&self, text: &str) -> Vec<String>;
    fn is_stopword(&self, word: &str) -> bool;
    fn lemmatize(&self, word: &str) -> String;
}

/// English toolkit: Unicode word segmentation, the NLTK stop word list and a
/// suffix-rule noun lemmatizer.
#[derive(Debug, Clone)]
pub struct EnglishToolkit {
    stop_words: StopWords,
    lemmatizer: SuffixLemmatizer,
}

impl EnglishToolkit {
    pub fn new() -> Self {
        Self {
            stop_words: StopWords::english().clone(),
            lemmatizer: SuffixLemmatizer::new(),
        }
    }

    pub fn with_stop_words(stop_words: StopWords) -> Self {
        Self {
            stop_words,
            lemmatizer: SuffixLemmatizer::new(),
        }
    }

    /// The configured stop word list if one is set, otherwise the English defaults.
    pub fn from_config(config: &TokenizeConfig) -> Self {
        let Some(words) = &config.stop_words else {
            return Self::new();
        };
        let stop_words = StopWords::new(words);
        if stop_words.is_empty() {
            warn!("Configured stop word list is empty, no words will be filtered");
        } else {
            info!("Using {} configured stop words", stop_words.len());
        }
        Self::with_stop_words(stop_words)
    }
}

impl Default for EnglishToolkit {
    fn default() -> Self {
        Self::new()
    }
}

impl NlpToolkit for EnglishToolkit {
    fn strip_emoji(&self, text: &str) -> String {
        strip_emoji(text)
    }

    fn tokenize(&self, text: &str) -> Vec<String> {
        text.unicode_words().map(str::to_string).collect()
    }

    fn is_stopword(&self, word: &str) -> bool {
        self.stop_words.contains(word)
    }

    fn lemmatize(&self, word: &str) -> String {
        self.lemmatizer.lemmatize(word)
    }
}
