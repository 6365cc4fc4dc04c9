// Two-stage cleaning pipeline: raw export -> cleaned table -> tokenized table

pub mod processing;

use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, instrument};

use crate::config::PipelineConfig;
use crate::error::Result;
use crate::nlp::NlpToolkit;
use crate::observability::metrics;
use crate::storage::{StagedOutput, TableStore};

use processing::normalize::normalize_schema;
use processing::quality_gate::{QualityGate, QualityReport};
use processing::tokenize::{tokenize_table, TokenizeReport};

/// Result of the cleaning stage
#[derive(Debug, Serialize)]
pub struct CleanResult {
    pub input_file: PathBuf,
    pub cleaned_file: PathBuf,
    pub dictionary_file: PathBuf,
    pub columns_in: usize,
    pub columns_out: usize,
    pub dictionary_entries: usize,
    pub quality: QualityReport,
}

/// Result of the tokenizing stage
#[derive(Debug, Serialize)]
pub struct TokenizeResult {
    pub input_file: PathBuf,
    pub output_file: PathBuf,
    pub rows: usize,
    pub report: TokenizeReport,
}

pub struct Pipeline;

impl Pipeline {
    /// Read the raw export, normalize and filter it, then write the cleaned table and
    /// the column dictionary. Nothing is written unless every step succeeded.
    #[instrument(skip_all, fields(input = %config.paths.input))]
    pub fn clean(store: &dyn TableStore, config: &PipelineConfig) -> Result<CleanResult> {
        let started = Instant::now();
        let input = PathBuf::from(&config.paths.input);
        let cleaned_file = PathBuf::from(&config.paths.cleaned);
        let dictionary_file = PathBuf::from(&config.paths.dictionary);

        info!("📥 Reading raw export from {}", input.display());
        let raw = store.read_table(&input)?;
        let columns_in = raw.width();

        let schema = normalize_schema(raw)?;
        let mut table = schema.table;

        let gate = QualityGate::with_config(config.clean.clone());
        let quality = gate.run(&mut table)?;

        let dictionary: Vec<_> = schema
            .dictionary
            .into_iter()
            .skip(config.clean.dictionary_rows_skipped)
            .collect();

        store.write_outputs(&[
            StagedOutput::Table(&cleaned_file, &table),
            StagedOutput::Dictionary(&dictionary_file, &dictionary),
        ])?;
        info!("💾 Cleaned data saved to {}", cleaned_file.display());
        info!("💾 Column dictionary saved to {}", dictionary_file.display());

        metrics::pipeline::stage_duration("clean", started.elapsed().as_secs_f64());
        Ok(CleanResult {
            input_file: input,
            cleaned_file,
            dictionary_file,
            columns_in,
            columns_out: table.width(),
            dictionary_entries: dictionary.len(),
            quality,
        })
    }

    /// Read the cleaned table, replace free-text cells with token lists, and write it back out.
    #[instrument(skip_all, fields(input = %config.paths.cleaned))]
    pub fn tokenize<T: NlpToolkit + ?Sized>(
        store: &dyn TableStore,
        toolkit: &T,
        config: &PipelineConfig,
    ) -> Result<TokenizeResult> {
        let started = Instant::now();
        let input_file = PathBuf::from(&config.paths.cleaned);
        let output_file = PathBuf::from(&config.paths.tokenized);

        info!("📥 Reading cleaned data from {}", input_file.display());
        let mut table = store.read_table(&input_file)?;
        let report = tokenize_table(&mut table, toolkit, &config.tokenize)?;

        store.write_outputs(&[StagedOutput::Table(&output_file, &table)])?;
        info!("💾 Tokenized data saved to {}", output_file.display());

        metrics::pipeline::stage_duration("tokenize", started.elapsed().as_secs_f64());
        Ok(TokenizeResult {
            input_file,
            output_file,
            rows: table.height(),
            report,
        })
    }

    /// Run both stages back to back. The tokenizer reads what the cleaner wrote.
    pub fn run_all<T: NlpToolkit + ?Sized>(
        store: &dyn TableStore,
        toolkit: &T,
        config: &PipelineConfig,
    ) -> Result<(CleanResult, TokenizeResult)> {
        let cleaned = Self::clean(store, config)?;
        let tokenized = Self::tokenize(store, toolkit, config)?;
        Ok((cleaned, tokenized))
    }
}

/// Override a configured path when the caller supplied one.
pub fn override_path(slot: &mut String, value: Option<&Path>) {
    if let Some(path) = value {
        *slot = path.to_string_lossy().into_owned();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nlp::EnglishToolkit;
    use crate::storage::InMemoryTableStore;
    use crate::frame;
    use polars::prelude::DataFrame;

    fn raw_export() -> DataFrame {
        let mut columns: Vec<String> = ["StartDate", "EndDate", "Status", "Q_RecaptchaScore"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        columns.extend((1..=26).map(|i| format!("QID{}", i)));
        columns.push("QID30_TEXT".to_string());

        let label_row = columns.iter().map(|c| Some(format!("{} label", c))).collect();
        let id_row = columns
            .iter()
            .map(|c| Some(format!(r#"{{"ImportId":"{}"}}"#, c)))
            .collect();
        let mut rows: Vec<Vec<Option<String>>> = vec![label_row, id_row];
        for (i, score) in ["0.9", "0.1", "0.8"].iter().enumerate() {
            let mut row = vec![
                Some("2024-01-01 10:00:00".to_string()),
                Some("2024-01-01 10:20:00".to_string()),
                Some("IP Address".to_string()),
                Some(score.to_string()),
            ];
            row.extend((1..=26).map(|q| Some(format!("{}", q + i))));
            row.push(Some("Cedar Point rides!".to_string()));
            rows.push(row);
        }
        frame::from_rows(&columns, rows).unwrap()
    }

    fn config() -> PipelineConfig {
        let mut config = PipelineConfig::default();
        config.paths.input = "raw.csv".into();
        config.paths.cleaned = "cleaned.csv".into();
        config.paths.dictionary = "dictionary.csv".into();
        config.paths.tokenized = "tokenized.csv".into();
        config
    }

    #[test]
    fn run_all_through_memory_store() {
        let store = InMemoryTableStore::new();
        let config = config();
        store.insert(Path::new("raw.csv"), raw_export());

        let (cleaned, tokenized) =
            Pipeline::run_all(&store, &EnglishToolkit::new(), &config).unwrap();

        assert_eq!(cleaned.columns_in, 31);
        assert_eq!(cleaned.quality.rows_in, 3);
        assert_eq!(cleaned.quality.rows_out, 2);
        assert_eq!(cleaned.dictionary_entries, 31 - 25);
        let dictionary = store.dictionary(Path::new("dictionary.csv")).unwrap();
        assert_eq!(dictionary[0].original_column, "QID22");

        assert_eq!(tokenized.rows, 2);
        assert_eq!(tokenized.report.columns, vec!["qid30_text".to_string()]);
        let out = store.table(Path::new("tokenized.csv")).unwrap();
        let tokens = frame::text_values(&out, "qid30_text").unwrap();
        assert_eq!(tokens[0].as_deref(), Some(r#"["cedar_point","ride"]"#));
    }

    #[test]
    fn failed_read_writes_nothing() {
        let store = InMemoryTableStore::new();
        assert!(Pipeline::clean(&store, &config()).is_err());
        assert!(store.table(Path::new("cleaned.csv")).is_none());
        assert!(store.dictionary(Path::new("dictionary.csv")).is_none());
    }

    #[test]
    fn override_path_only_when_given() {
        let mut slot = "a.csv".to_string();
        override_path(&mut slot, None);
        assert_eq!(slot, "a.csv");
        override_path(&mut slot, Some(Path::new("b.csv")));
        assert_eq!(slot, "b.csv");
    }
}
