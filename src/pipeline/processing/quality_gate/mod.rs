pub mod timestamps;

use chrono::NaiveDateTime;
use once_cell::sync::Lazy;
use polars::prelude::{Column, DataFrame, NamedFrom};
use regex::Regex;
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use tracing::{debug, info, instrument};

use crate::config::CleanConfig;
use crate::constants::{DURATION_COLUMN, INDEX_COLUMN};
use crate::error::Result;
use crate::frame;
use crate::nlp::strip_emoji;
use crate::observability::metrics;
use crate::pipeline::processing::normalize::slugify;

pub use timestamps::{format_timestamp, parse_timestamp, resolve_column, TIMESTAMP_FORMAT};

// Original respondent positions, carried through the filters and emitted as `index`.
const ROW_POSITION: &str = "__row_position";

type Parsed = Vec<Option<NaiveDateTime>>;

static NUMERIC_LIKE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^-?[0-9]+(\.[0-9]+)?$").expect("valid regex"));
static NON_ALNUM: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-zA-Z0-9\s]").expect("valid regex"));

/// The quality rules, in the order they run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum QualityRule {
    DuplicateText,
    DuplicateRespondent,
    PreviewRows,
    BotScore,
    ParseTimestamps,
    ShortDuration,
    DropColumns,
    NumericCoercion,
    TextSanitization,
    LeadingColumns,
}

impl QualityRule {
    pub fn as_str(&self) -> &'static str {
        match self {
            QualityRule::DuplicateText => "duplicate_text",
            QualityRule::DuplicateRespondent => "duplicate_respondent",
            QualityRule::PreviewRows => "preview_rows",
            QualityRule::BotScore => "bot_score",
            QualityRule::ParseTimestamps => "parse_timestamps",
            QualityRule::ShortDuration => "short_duration",
            QualityRule::DropColumns => "drop_columns",
            QualityRule::NumericCoercion => "numeric_coercion",
            QualityRule::TextSanitization => "text_sanitization",
            QualityRule::LeadingColumns => "leading_columns",
        }
    }
}

impl fmt::Display for QualityRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What one rule did. `applied` is false when the column it needs is absent.
#[derive(Debug, Clone, Serialize)]
pub struct RuleOutcome {
    pub rule: QualityRule,
    pub applied: bool,
    /// Rows removed, or columns/cells touched for the non-filtering rules
    pub affected: usize,
}

impl RuleOutcome {
    fn applied(rule: QualityRule, affected: usize) -> Self {
        metrics::quality_gate::rule_applied(rule.as_str(), affected);
        Self {
            rule,
            applied: true,
            affected,
        }
    }

    fn skipped(rule: QualityRule) -> Self {
        debug!(rule = %rule, "precondition column absent, rule skipped");
        metrics::quality_gate::rule_skipped(rule.as_str());
        Self {
            rule,
            applied: false,
            affected: 0,
        }
    }
}

/// Summary of one quality gate run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct QualityReport {
    pub rows_in: usize,
    pub rows_out: usize,
    pub outcomes: Vec<RuleOutcome>,
    pub dropped_columns: Vec<String>,
    pub coerced_columns: Vec<String>,
}

impl QualityReport {
    #[cfg(test)]
    pub(crate) fn outcome(&self, rule: QualityRule) -> Option<&RuleOutcome> {
        self.outcomes.iter().find(|o| o.rule == rule)
    }

    pub fn rows_removed(&self) -> usize {
        self.rows_in - self.rows_out
    }
}

/// Row filters and column type coercion for a renamed survey table.
pub struct QualityGate {
    pub config: CleanConfig,
}

impl QualityGate {
    pub fn new() -> Self {
        Self {
            config: CleanConfig::default(),
        }
    }

    pub fn with_config(config: CleanConfig) -> Self {
        Self { config }
    }

    /// Apply every rule in its fixed order. Later rules rely on columns derived by
    /// earlier ones (the duration filter needs parsed timestamps), so the order matters.
    #[instrument(skip_all, fields(rows = table.height(), columns = table.width()))]
    pub fn run(&self, table: &mut DataFrame) -> Result<QualityReport> {
        let mut report = QualityReport {
            rows_in: table.height(),
            ..Default::default()
        };
        let positions: Vec<u64> = (0..table.height() as u64).collect();
        table.with_column(Column::new(ROW_POSITION.into(), positions))?;

        report.outcomes.push(self.drop_duplicate_text(table)?);
        report.outcomes.push(self.drop_duplicate_respondents(table)?);
        report.outcomes.push(self.drop_preview_rows(table)?);
        report.outcomes.push(self.drop_low_bot_scores(table)?);
        let (parsed, start, end) = self.parse_timestamps(table)?;
        report.outcomes.push(parsed);
        report.outcomes.push(self.drop_short_durations(table, start, end)?);

        let dropped = self.drop_denylisted_columns(table)?;
        report.outcomes.push(RuleOutcome::applied(QualityRule::DropColumns, dropped.len()));
        report.dropped_columns = dropped;

        let coerced = self.coerce_numeric_columns(table)?;
        report.outcomes.push(RuleOutcome::applied(QualityRule::NumericCoercion, coerced.len()));
        report.coerced_columns = coerced;

        report.outcomes.push(self.sanitize_text_columns(table)?);

        let removed = self.drop_leading_columns(table)?;
        report.outcomes.push(RuleOutcome::applied(QualityRule::LeadingColumns, removed));
        self.finish_index(table)?;

        report.rows_out = table.height();
        metrics::quality_gate::rows_processed(report.rows_in, report.rows_out);
        info!(
            "[quality] kept {} of {} rows, {} columns remain",
            report.rows_out,
            report.rows_in,
            table.width()
        );
        Ok(report)
    }

    // Blank answers normalize to one missing key, so only the first blank row survives.
    fn drop_duplicate_text(&self, table: &mut DataFrame) -> Result<RuleOutcome> {
        let rule = QualityRule::DuplicateText;
        let col = self.config.duplicate_text_column.as_str();
        if !frame::has_column(table, col) {
            return Ok(RuleOutcome::skipped(rule));
        }

        let normalized: Vec<Option<String>> = frame::text_values(table, col)?
            .into_iter()
            .map(|v| v.map(|s| s.trim().to_lowercase()).filter(|s| !s.is_empty()))
            .collect();
        let mut seen = HashSet::new();
        let keep: Vec<bool> = normalized.iter().map(|v| seen.insert(v.clone())).collect();

        table.with_column(frame::text_column(col, normalized))?;
        let removed = frame::retain_rows(table, &keep)?;
        info!("Dropped {} duplicate responses based on normalized {}", removed, col);
        Ok(RuleOutcome::applied(rule, removed))
    }

    fn drop_duplicate_respondents(&self, table: &mut DataFrame) -> Result<RuleOutcome> {
        let rule = QualityRule::DuplicateRespondent;
        let col = self.config.duplicate_flag_column.as_str();
        if !frame::has_column(table, col) {
            return Ok(RuleOutcome::skipped(rule));
        }
        let keep: Vec<bool> = frame::text_values(table, col)?
            .iter()
            .map(|v| {
                !v.as_deref()
                    .is_some_and(|v| v.trim().eq_ignore_ascii_case("true"))
            })
            .collect();
        let removed = frame::retain_rows(table, &keep)?;
        info!("Dropped {} rows flagged as duplicate respondents", removed);
        Ok(RuleOutcome::applied(rule, removed))
    }

    fn drop_preview_rows(&self, table: &mut DataFrame) -> Result<RuleOutcome> {
        let rule = QualityRule::PreviewRows;
        let col = self.config.status_column.as_str();
        if !frame::has_column(table, col) {
            return Ok(RuleOutcome::skipped(rule));
        }
        let preview = self.config.preview_status.as_str();
        let keep: Vec<bool> = frame::text_values(table, col)?
            .iter()
            .map(|v| v.as_deref() != Some(preview))
            .collect();
        let removed = frame::retain_rows(table, &keep)?;
        info!("Removed {} preview rows", removed);
        Ok(RuleOutcome::applied(rule, removed))
    }

    fn drop_low_bot_scores(&self, table: &mut DataFrame) -> Result<RuleOutcome> {
        let rule = QualityRule::BotScore;
        let col = self.config.bot_score_column.as_str();
        if !frame::has_column(table, col) {
            return Ok(RuleOutcome::skipped(rule));
        }

        let scores: Vec<Option<f64>> = frame::text_values(table, col)?
            .iter()
            .map(|v| {
                v.as_deref()
                    .and_then(|s| s.trim().parse::<f64>().ok())
                    .filter(|n| n.is_finite())
            })
            .collect();

        let min = self.config.bot_score_min;
        // A missing score is not evidence of a bot
        let keep: Vec<bool> = scores.iter().map(|s| s.unwrap_or(1.0) >= min).collect();
        table.with_column(frame::number_column(col, scores))?;
        let removed = frame::retain_rows(table, &keep)?;
        info!("Dropped {} rows with low bot score (<{})", removed, min);
        Ok(RuleOutcome::applied(rule, removed))
    }

    /// Rewrite start/end/recorded columns in the canonical layout, unparseable values
    /// becoming missing. Returns the parsed start and end values for the duration rule.
    fn parse_timestamps(
        &self,
        table: &mut DataFrame,
    ) -> Result<(RuleOutcome, Option<Parsed>, Option<Parsed>)> {
        let rule = QualityRule::ParseTimestamps;
        let start = resolve_column(table, &self.config.start_column);
        let end = resolve_column(table, &self.config.end_column);
        let recorded = resolve_column(table, &self.config.recorded_column);

        let start_values = start.as_deref().map(|c| parse_column(table, c)).transpose()?;
        let end_values = end.as_deref().map(|c| parse_column(table, c)).transpose()?;

        let mut parsed_columns = 0;
        for col in [&start, &end, &recorded].into_iter().flatten() {
            let parsed = parse_column(table, col)?;
            let unparseable = frame::text_values(table, col)?
                .iter()
                .zip(&parsed)
                .filter(|(raw, ts)| raw.is_some() && ts.is_none())
                .count();
            if unparseable > 0 {
                debug!(column = %col, unparseable, "unparseable timestamps set to missing");
            }
            let canonical = parsed.iter().map(|ts| ts.as_ref().map(format_timestamp)).collect();
            table.with_column(frame::text_column(col, canonical))?;
            parsed_columns += 1;
        }

        let outcome = if parsed_columns == 0 {
            RuleOutcome::skipped(rule)
        } else {
            RuleOutcome::applied(rule, parsed_columns)
        };
        Ok((outcome, start_values, end_values))
    }

    fn drop_short_durations(
        &self,
        table: &mut DataFrame,
        start: Option<Parsed>,
        end: Option<Parsed>,
    ) -> Result<RuleOutcome> {
        let rule = QualityRule::ShortDuration;
        let (Some(start), Some(end)) = (start, end) else {
            return Ok(RuleOutcome::skipped(rule));
        };

        let durations: Vec<Option<f64>> = start
            .iter()
            .zip(&end)
            .map(|pair| match pair {
                (Some(s), Some(e)) => Some((*e - *s).num_milliseconds() as f64 / 1000.0),
                _ => None,
            })
            .collect();

        if frame::has_column(table, DURATION_COLUMN) {
            table.drop_in_place(DURATION_COLUMN)?;
        }
        let min = self.config.min_duration_secs;
        let keep: Vec<bool> = durations.iter().map(|d| d.map_or(true, |secs| secs >= min)).collect();
        table.with_column(frame::number_column(DURATION_COLUMN, durations))?;

        let removed = frame::retain_rows(table, &keep)?;
        info!("[quality] dropped {} rows with duration < {}s", removed, min);
        Ok(RuleOutcome::applied(rule, removed))
    }

    /// Remove denylisted columns, matching by exact name, slug or lowercase name.
    fn drop_denylisted_columns(&self, table: &mut DataFrame) -> Result<Vec<String>> {
        let targets: HashSet<String> = self
            .config
            .drop_columns
            .iter()
            .flat_map(|c| [c.clone(), slugify(c), c.to_lowercase()])
            .collect();

        let doomed: Vec<String> = frame::column_names(table)
            .into_iter()
            .filter(|c| targets.contains(c) || targets.contains(&c.to_lowercase()))
            .collect();

        let mut dropped = frame::drop_columns(table, &doomed)?;
        dropped.sort();
        dropped.dedup();
        info!("[drop] dropped columns: {:?}", dropped);
        Ok(dropped)
    }

    /// Coerce text columns whose values are mostly numeric. Returns the coerced names.
    fn coerce_numeric_columns(&self, table: &mut DataFrame) -> Result<Vec<String>> {
        let mut coerced = Vec::new();
        for name in frame::column_names(table) {
            if name == ROW_POSITION || !frame::is_text_column(table, &name)? {
                continue;
            }
            let values = frame::text_values(table, &name)?;
            if !is_mostly_numeric(&values, self.config.numeric_threshold) {
                continue;
            }
            let numbers = values
                .iter()
                .map(|v| {
                    v.as_deref()
                        .map(str::trim)
                        .filter(|s| NUMERIC_LIKE.is_match(s))
                        .and_then(|s| s.parse::<f64>().ok())
                })
                .collect();
            table.with_column(frame::number_column(&name, numbers))?;
            coerced.push(name);
        }

        if !coerced.is_empty() {
            let preview: Vec<&String> = coerced.iter().take(12).collect();
            let more = if coerced.len() > 12 { " ..." } else { "" };
            info!("[types] coerced to numeric: {:?}{}", preview, more);
        }
        Ok(coerced)
    }

    /// Strip emoji and anything outside `[A-Za-z0-9\s]` from free-text columns.
    fn sanitize_text_columns(&self, table: &mut DataFrame) -> Result<RuleOutcome> {
        let rule = QualityRule::TextSanitization;
        let suffix = self.config.text_suffix.as_str();

        let mut changed = 0;
        for name in frame::column_names(table) {
            if !name.ends_with(suffix) || !frame::is_text_column(table, &name)? {
                continue;
            }
            let cleaned: Vec<Option<String>> = frame::text_values(table, &name)?
                .into_iter()
                .map(|v| {
                    v.map(|s| {
                        let cleaned = clean_special_characters(&s);
                        if cleaned != s {
                            changed += 1;
                        }
                        cleaned
                    })
                })
                .collect();
            table.with_column(frame::text_column(&name, cleaned))?;
        }
        debug!(cells = changed, "sanitized free-text cells");
        Ok(RuleOutcome::applied(rule, changed))
    }

    fn drop_leading_columns(&self, table: &mut DataFrame) -> Result<usize> {
        let leading: Vec<String> = frame::column_names(table)
            .into_iter()
            .filter(|c| c != ROW_POSITION)
            .take(self.config.leading_columns_dropped)
            .collect();
        Ok(frame::drop_columns(table, &leading)?.len())
    }

    // Replace the carried positions with a leading `index` column, or drop them.
    fn finish_index(&self, table: &mut DataFrame) -> Result<()> {
        let positions = table.drop_in_place(ROW_POSITION)?;
        if self.config.emit_row_index {
            if frame::has_column(table, INDEX_COLUMN) {
                table.drop_in_place(INDEX_COLUMN)?;
            }
            table.insert_column(0, positions.with_name(INDEX_COLUMN.into()))?;
        }
        Ok(())
    }
}

impl Default for QualityGate {
    fn default() -> Self {
        Self::new()
    }
}

pub fn clean_special_characters(text: &str) -> String {
    let without_emoji = strip_emoji(text);
    NON_ALNUM.replace_all(&without_emoji, "").into_owned()
}

fn parse_column(table: &DataFrame, col: &str) -> Result<Parsed> {
    Ok(frame::text_values(table, col)?
        .iter()
        .map(|v| v.as_deref().and_then(parse_timestamp))
        .collect())
}

fn is_mostly_numeric(values: &[Option<String>], threshold: f64) -> bool {
    let (present, numeric) = values
        .iter()
        .flatten()
        .fold((0usize, 0usize), |(present, numeric), v| {
            let hit = NUMERIC_LIKE.is_match(v.trim());
            (present + 1, numeric + usize::from(hit))
        });
    present > 0 && numeric as f64 / present as f64 >= threshold
}
