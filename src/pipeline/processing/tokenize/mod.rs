use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use tracing::{debug, info, instrument};

use polars::prelude::DataFrame;

use crate::config::TokenizeConfig;
use crate::error::Result;
use crate::frame;
use crate::nlp::NlpToolkit;
use crate::observability::metrics;

static NON_TOKEN_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-zA-Z0-9_\s]+").expect("valid regex"));

/// A multi-word phrase and the single token it collapses to.
#[derive(Debug, Clone, PartialEq)]
struct Phrase {
    spaced: String,
    unspaced: String,
    token: String,
}

impl Phrase {
    fn new(phrase: &str) -> Self {
        let spaced = phrase.trim().to_lowercase();
        Self {
            unspaced: spaced.replace(' ', ""),
            token: spaced.replace(' ', "_"),
            spaced,
        }
    }
}

/// Turns free text into normalized word lists.
pub struct TextTokenizer<'a, T: NlpToolkit + ?Sized> {
    toolkit: &'a T,
    phrases: Vec<Phrase>,
}

impl<'a, T: NlpToolkit + ?Sized> TextTokenizer<'a, T> {
    pub fn new<S: AsRef<str>>(toolkit: &'a T, phrases: &[S]) -> Self {
        let phrases = phrases
            .iter()
            .map(|p| Phrase::new(p.as_ref()))
            .filter(|p| !p.spaced.is_empty())
            .collect();
        Self { toolkit, phrases }
    }

    /// Lowercase, merge phrases, strip emoji and punctuation, split, filter, lemmatize.
    pub fn tokenize(&self, text: &str) -> Vec<String> {
        let mut text = text.to_lowercase();
        // Phrases must be merged before splitting so they survive as one token
        for phrase in &self.phrases {
            text = text.replace(&phrase.spaced, &phrase.token);
            text = text.replace(&phrase.unspaced, &phrase.token);
        }
        let text = self.toolkit.strip_emoji(&text);
        let text = NON_TOKEN_CHARS.replace_all(&text, " ");

        self.toolkit
            .tokenize(&text)
            .into_iter()
            .filter(|tok| tok.contains('_') || !self.toolkit.is_stopword(tok))
            .filter(|tok| tok.contains('_') || tok.chars().all(char::is_alphabetic))
            .map(|tok| self.toolkit.lemmatize(&tok))
            .collect()
    }

    /// Tokenize a cell value. A missing value becomes an empty list.
    pub fn tokenize_value(&self, value: Option<&str>) -> Vec<String> {
        value.map(|s| self.tokenize(s)).unwrap_or_default()
    }
}

/// Counts reported by the tokenizer stage.
#[derive(Debug, Default, Clone, Serialize)]
pub struct TokenizeReport {
    pub columns: Vec<String>,
    pub cells_tokenized: usize,
    pub empty_cells: usize,
    pub tokens_emitted: usize,
}

/// Replace every cell of the free-text columns with its token list, written as a JSON array.
/// Non-text columns carrying the suffix hold no words and become empty lists.
#[instrument(skip_all, fields(rows = table.height()))]
pub fn tokenize_table<T: NlpToolkit + ?Sized>(
    table: &mut DataFrame,
    toolkit: &T,
    config: &TokenizeConfig,
) -> Result<TokenizeReport> {
    let tokenizer = TextTokenizer::new(toolkit, &config.phrases);
    let mut report = TokenizeReport::default();

    let text_columns: Vec<String> = frame::column_names(table)
        .into_iter()
        .filter(|name| name.ends_with(&config.text_suffix))
        .collect();

    for name in &text_columns {
        let values = if frame::is_text_column(table, name)? {
            frame::text_values(table, name)?
        } else {
            vec![None; table.height()]
        };

        let mut tokens_in_column = 0;
        let mut encoded = Vec::with_capacity(values.len());
        for value in &values {
            let tokens = tokenizer.tokenize_value(value.as_deref());
            report.cells_tokenized += 1;
            if tokens.is_empty() {
                report.empty_cells += 1;
            }
            tokens_in_column += tokens.len();
            encoded.push(Some(serde_json::to_string(&tokens)?));
        }
        table.with_column(frame::text_column(name, encoded))?;

        report.tokens_emitted += tokens_in_column;
        debug!(column = %name, tokens = tokens_in_column, "tokenized column");
        report.columns.push(name.clone());
    }

    metrics::tokenize::columns_tokenized(report.columns.len());
    metrics::tokenize::tokens_emitted(report.tokens_emitted);
    info!(
        "[tokenize] {} text columns, {} cells, {} tokens",
        report.columns.len(),
        report.cells_tokenized,
        report.tokens_emitted
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nlp::EnglishToolkit;
    use std::collections::HashSet;

    /// Whitespace splitting, a tiny stop list, identity lemmas.
    struct PlainToolkit {
        stop: HashSet<&'static str>,
    }

    impl NlpToolkit for PlainToolkit {
        fn strip_emoji(&self, text: &str) -> String {
            text.to_string()
        }
        fn tokenize(&self, text: &str) -> Vec<String> {
            text.split_whitespace().map(str::to_string).collect()
        }
        fn is_stopword(&self, word: &str) -> bool {
            self.stop.contains(word)
        }
        fn lemmatize(&self, word: &str) -> String {
            word.to_string()
        }
    }

    #[test]
    fn phrases_merge_in_both_spellings() {
        let toolkit = EnglishToolkit::new();
        let tokenizer = TextTokenizer::new(&toolkit, &["cedar point"]);
        let tokens = tokenizer.tokenize("I love Cedar Point and cedarpoint");

        assert_eq!(tokens.iter().filter(|t| *t == "cedar_point").count(), 2);
        assert!(!tokens.iter().any(|t| t == "cedar" || t == "point"));
        assert_eq!(tokens, vec!["love", "cedar_point", "cedar_point"]);
    }

    #[test]
    fn underscore_tokens_skip_stopword_filter() {
        let toolkit = PlainToolkit {
            stop: ["the", "end", "the_end"].into_iter().collect(),
        };
        let tokenizer = TextTokenizer::new(&toolkit, &["the end"]);
        assert_eq!(tokenizer.tokenize("The End is near"), vec!["the_end", "is", "near"]);
    }

    #[test]
    fn drops_numbers_punctuation_and_emoji() {
        let toolkit = EnglishToolkit::new();
        let tokenizer = TextTokenizer::<EnglishToolkit>::new(&toolkit, &[] as &[&str]);
        let tokens = tokenizer.tokenize("Rides!!! 🎢 were great, 10/10 would ride again... roller-coasters");
        assert_eq!(tokens, vec!["ride", "great", "would", "ride", "roller", "coaster"]);
    }

    #[test]
    fn missing_values_become_empty() {
        let toolkit = EnglishToolkit::new();
        let tokenizer = TextTokenizer::new(&toolkit, &["cedar point"]);
        assert!(tokenizer.tokenize_value(None).is_empty());
        assert!(tokenizer.tokenize_value(Some("!!! 42")).is_empty());
    }

    #[test]
    fn only_suffixed_columns_are_tokenized() {
        let mut table = frame::text_frame(
            &["qid1_text", "age"],
            &[&["Bubble Tea and boba tea", "19"], &["", "20"]],
        );
        table
            .with_column(frame::number_column("qid2_text", vec![Some(4.0), None]))
            .unwrap();
        let toolkit = EnglishToolkit::new();
        let report = tokenize_table(&mut table, &toolkit, &TokenizeConfig::default()).unwrap();

        assert_eq!(report.columns, vec!["qid1_text".to_string(), "qid2_text".to_string()]);
        assert_eq!(report.cells_tokenized, 4);
        assert_eq!(report.empty_cells, 3);
        assert_eq!(report.tokens_emitted, 2);

        let tokens = frame::text_values(&table, "qid1_text").unwrap();
        assert_eq!(tokens[0].as_deref(), Some(r#"["bubble_tea","boba_tea"]"#));
        assert_eq!(tokens[1].as_deref(), Some("[]"));
        assert_eq!(
            frame::text_values(&table, "qid2_text").unwrap(),
            vec![Some("[]".to_string()), Some("[]".to_string())]
        );
        assert_eq!(frame::text_values(&table, "age").unwrap()[0].as_deref(), Some("19"));
    }
}
