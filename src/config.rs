use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::constants::*;
use crate::error::{PrepError, Result};

/// Top-level pipeline configuration, loaded from TOML. Every field falls back to
/// the defaults in `constants` so an empty file (or no file) is valid.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct PipelineConfig {
    pub paths: PathsConfig,
    pub clean: CleanConfig,
    pub tokenize: TokenizeConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub input: String,
    pub cleaned: String,
    pub dictionary: String,
    pub tokenized: String,
    pub log_dir: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            input: DEFAULT_INPUT_PATH.to_string(),
            cleaned: DEFAULT_CLEANED_PATH.to_string(),
            dictionary: DEFAULT_DICTIONARY_PATH.to_string(),
            tokenized: DEFAULT_TOKENIZED_PATH.to_string(),
            log_dir: DEFAULT_LOG_DIR.to_string(),
        }
    }
}

/// Settings for the schema normalizer and the quality gate.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CleanConfig {
    pub bot_score_min: f64,
    pub min_duration_secs: f64,
    pub numeric_threshold: f64,
    /// Residual export columns removed positionally after all rules ran
    pub leading_columns_dropped: usize,
    /// Boilerplate entries removed from the head of the written dictionary
    pub dictionary_rows_skipped: usize,
    pub text_suffix: String,
    pub duplicate_text_column: String,
    pub duplicate_flag_column: String,
    pub status_column: String,
    pub preview_status: String,
    pub bot_score_column: String,
    pub start_column: String,
    pub end_column: String,
    pub recorded_column: String,
    pub drop_columns: Vec<String>,
    pub emit_row_index: bool,
}

impl Default for CleanConfig {
    fn default() -> Self {
        Self {
            bot_score_min: BOT_SCORE_MIN,
            min_duration_secs: MIN_DURATION_SECS,
            numeric_threshold: NUMERIC_THRESHOLD,
            leading_columns_dropped: LEADING_COLUMNS_DROPPED,
            dictionary_rows_skipped: DICTIONARY_ROWS_SKIPPED,
            text_suffix: TEXT_SUFFIX.to_string(),
            duplicate_text_column: DUPLICATE_TEXT_COLUMN.to_string(),
            duplicate_flag_column: DUPLICATE_FLAG_COLUMN.to_string(),
            status_column: STATUS_COLUMN.to_string(),
            preview_status: PREVIEW_STATUS.to_string(),
            bot_score_column: BOT_SCORE_COLUMN.to_string(),
            start_column: START_DATE_COLUMN.to_string(),
            end_column: END_DATE_COLUMN.to_string(),
            recorded_column: RECORDED_DATE_COLUMN.to_string(),
            drop_columns: DROP_COLUMNS.iter().map(|s| s.to_string()).collect(),
            emit_row_index: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TokenizeConfig {
    pub text_suffix: String,
    pub phrases: Vec<String>,
    /// Replaces the built-in English stop word list when set
    pub stop_words: Option<Vec<String>>,
}

impl Default for TokenizeConfig {
    fn default() -> Self {
        Self {
            text_suffix: TEXT_SUFFIX.to_string(),
            phrases: MULTI_WORD_PHRASES.iter().map(|s| s.to_string()).collect(),
            stop_words: None,
        }
    }
}

impl PipelineConfig {
    /// Load configuration from a TOML file.
    pub fn load(config_path: &Path) -> Result<Self> {
        let config_content = fs::read_to_string(config_path).map_err(|e| {
            PrepError::Config(format!(
                "Failed to read config file '{}': {}",
                config_path.display(),
                e
            ))
        })?;

        let config: PipelineConfig = toml::from_str(&config_content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path` when given, otherwise use the built-in defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => Ok(Self::default()),
        }
    }

    fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.clean.numeric_threshold) {
            return Err(PrepError::Config(format!(
                "clean.numeric_threshold must be within [0, 1], got {}",
                self.clean.numeric_threshold
            )));
        }
        if self.clean.text_suffix.is_empty() || self.tokenize.text_suffix.is_empty() {
            return Err(PrepError::Config("text_suffix must not be empty".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_yields_defaults() {
        let config: PipelineConfig = toml::from_str("").unwrap();
        assert_eq!(config.clean.bot_score_min, BOT_SCORE_MIN);
        assert_eq!(config.clean.leading_columns_dropped, 4);
        assert_eq!(config.clean.dictionary_rows_skipped, 25);
        assert_eq!(config.paths.input, DEFAULT_INPUT_PATH);
        assert!(config.tokenize.phrases.iter().any(|p| p == "cedar point"));
    }

    #[test]
    fn partial_override_keeps_other_defaults() {
        let config: PipelineConfig = toml::from_str(
            r#"
            [clean]
            bot_score_min = 0.5

            [tokenize]
            phrases = ["bubble tea"]
            "#,
        )
        .unwrap();
        assert_eq!(config.clean.bot_score_min, 0.5);
        assert_eq!(config.clean.min_duration_secs, MIN_DURATION_SECS);
        assert_eq!(config.tokenize.phrases, vec!["bubble tea".to_string()]);
        assert_eq!(config.tokenize.text_suffix, "_text");
        assert!(config.tokenize.stop_words.is_none());
    }

    #[test]
    fn stop_words_can_be_listed() {
        let config: PipelineConfig =
            toml::from_str("[tokenize]\nstop_words = [\"ride\", \"park\"]\n").unwrap();
        assert_eq!(
            config.tokenize.stop_words,
            Some(vec!["ride".to_string(), "park".to_string()])
        );
    }

    #[test]
    fn load_rejects_out_of_range_threshold() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[clean]\nnumeric_threshold = 1.5\n").unwrap();
        let err = PipelineConfig::load(&path).unwrap_err();
        assert!(matches!(err, PrepError::Config(_)));
    }

    #[test]
    fn missing_file_is_config_error() {
        let err = PipelineConfig::load(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, PrepError::Config(_)));
    }
}
