//! Prometheus metrics for the cleaning pipeline.
//!
//! Recording functions are grouped by stage. Before `init()` runs, the `metrics`
//! macros hit the no-op recorder, so library code and tests can call them freely.

use std::fmt;
use std::sync::OnceLock;

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Every metric name the pipeline records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricName {
    // Normalize
    NormalizeColumnsRenamed,
    NormalizeCollisionsResolved,

    // Quality gate
    QualityGateRowsIn,
    QualityGateRowsOut,
    QualityGateRuleAffected,
    QualityGateRuleSkipped,

    // Tokenize
    TokenizeColumnsTokenized,
    TokenizeTokensEmitted,

    // Pipeline
    PipelineStageDuration,
}

impl MetricName {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricName::NormalizeColumnsRenamed => "survey_prep_normalize_columns_renamed_total",
            MetricName::NormalizeCollisionsResolved => "survey_prep_normalize_collisions_resolved_total",
            MetricName::QualityGateRowsIn => "survey_prep_quality_gate_rows_in_total",
            MetricName::QualityGateRowsOut => "survey_prep_quality_gate_rows_out_total",
            MetricName::QualityGateRuleAffected => "survey_prep_quality_gate_rule_affected_total",
            MetricName::QualityGateRuleSkipped => "survey_prep_quality_gate_rule_skipped_total",
            MetricName::TokenizeColumnsTokenized => "survey_prep_tokenize_columns_tokenized_total",
            MetricName::TokenizeTokensEmitted => "survey_prep_tokenize_tokens_emitted_total",
            MetricName::PipelineStageDuration => "survey_prep_pipeline_stage_duration_seconds",
        }
    }

    #[cfg(test)]
    pub(crate) fn all_metrics() -> impl Iterator<Item = MetricName> {
        use MetricName::*;
        [
            NormalizeColumnsRenamed,
            NormalizeCollisionsResolved,
            QualityGateRowsIn,
            QualityGateRowsOut,
            QualityGateRuleAffected,
            QualityGateRuleSkipped,
            TokenizeColumnsTokenized,
            TokenizeTokensEmitted,
            PipelineStageDuration,
        ]
        .into_iter()
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the Prometheus recorder. Calling it twice is an error from the
/// `metrics` crate; callers in the binary only do it once.
pub fn init() -> Result<(), Box<dyn std::error::Error>> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {}", e))?;
    let _ = METRICS_HANDLE.set(handle);
    Ok(())
}

/// Render everything recorded so far in the Prometheus text format.
pub fn render() -> Option<String> {
    METRICS_HANDLE.get().map(|handle| handle.render())
}

// ============================================================================
// Normalize Metrics
// ============================================================================

pub mod normalize {
    use super::MetricName;

    pub fn columns_renamed(count: usize) {
        ::metrics::counter!(MetricName::NormalizeColumnsRenamed.as_str()).increment(count as u64);
    }

    /// Record names that needed a numeric suffix to stay unique
    pub fn collisions_resolved(count: usize) {
        ::metrics::counter!(MetricName::NormalizeCollisionsResolved.as_str()).increment(count as u64);
    }
}

// ============================================================================
// Quality Gate Metrics
// ============================================================================

pub mod quality_gate {
    use super::MetricName;

    pub fn rule_applied(rule: &'static str, affected: usize) {
        ::metrics::counter!(MetricName::QualityGateRuleAffected.as_str(), "rule" => rule)
            .increment(affected as u64);
    }

    pub fn rule_skipped(rule: &'static str) {
        ::metrics::counter!(MetricName::QualityGateRuleSkipped.as_str(), "rule" => rule).increment(1);
    }

    pub fn rows_processed(rows_in: usize, rows_out: usize) {
        ::metrics::counter!(MetricName::QualityGateRowsIn.as_str()).increment(rows_in as u64);
        ::metrics::counter!(MetricName::QualityGateRowsOut.as_str()).increment(rows_out as u64);
    }
}

// ============================================================================
// Tokenize Metrics
// ============================================================================

pub mod tokenize {
    use super::MetricName;

    pub fn columns_tokenized(count: usize) {
        ::metrics::counter!(MetricName::TokenizeColumnsTokenized.as_str()).increment(count as u64);
    }

    pub fn tokens_emitted(count: usize) {
        ::metrics::counter!(MetricName::TokenizeTokensEmitted.as_str()).increment(count as u64);
    }
}

// ============================================================================
// Pipeline Metrics
// ============================================================================

pub mod pipeline {
    use super::MetricName;

    /// Record wall-clock time of one stage
    pub fn stage_duration(stage: &'static str, secs: f64) {
        ::metrics::histogram!(MetricName::PipelineStageDuration.as_str(), "stage" => stage).record(secs);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn metric_names_are_unique_and_prefixed() {
        let names: HashSet<&str> = MetricName::all_metrics().map(|m| m.as_str()).collect();
        assert_eq!(names.len(), MetricName::all_metrics().count());
        assert!(names.iter().all(|n| n.starts_with("survey_prep_")));
    }

    #[test]
    fn recording_without_recorder_is_a_no_op() {
        normalize::columns_renamed(3);
        quality_gate::rule_applied("bot_score", 1);
        tokenize::tokens_emitted(10);
        pipeline::stage_duration("clean", 0.5);
    }
}
