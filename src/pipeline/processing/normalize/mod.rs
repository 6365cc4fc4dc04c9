//! Schema normalization: maps the export's cryptic column identifiers to short,
//! unique slugs and records the mapping in a column dictionary.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::HashSet;
use tracing::{debug, info, instrument};

use polars::prelude::DataFrame;

use crate::constants::{IMPORT_ID_MARKER, MAX_SLUG_LEN, METADATA_ROWS};
use crate::error::{PrepError, Result};
use crate::frame;
use crate::observability::metrics;

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));
static NON_SLUG_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^A-Za-z0-9_ \-]").expect("valid regex"));
static REPEATED_UNDERSCORES: Lazy<Regex> = Lazy::new(|| Regex::new(r"_+").expect("valid regex"));
static IMPORT_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""ImportId"\s*:\s*"([^"]+)""#).expect("valid regex"));

/// One row of the column dictionary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnDictionaryEntry {
    pub original_column: String,
    pub short_name: String,
    pub question_label: Option<String>,
    pub import_id: Option<String>,
}

impl ColumnDictionaryEntry {
    pub const HEADERS: &'static [&'static str] =
        &["original_column", "short_name", "question_label", "import_id"];
}

/// What the export tells us about one column.
#[derive(Debug, Clone, Copy)]
pub struct ColumnSource<'a> {
    pub original: &'a str,
    pub label: Option<&'a str>,
    pub import_id: Option<&'a str>,
}

/// Renamed respondent data plus the dictionary describing the rename.
#[derive(Debug, Clone)]
pub struct NormalizedSchema {
    pub table: DataFrame,
    pub dictionary: Vec<ColumnDictionaryEntry>,
}

/// Reduce arbitrary text to `[a-z0-9_]{0,60}` with no leading, trailing or doubled underscores.
pub fn slugify(text: &str) -> String {
    let collapsed = WHITESPACE.replace_all(text, " ");
    let stripped = NON_SLUG_CHARS.replace_all(collapsed.trim(), "");
    let underscored = stripped.to_ascii_lowercase().replace([' ', '-'], "_");
    let single = REPEATED_UNDERSCORES.replace_all(&underscored, "_");
    let truncated: String = single.chars().take(MAX_SLUG_LEN).collect();
    truncated.trim_matches('_').to_string()
}

/// Pull the import identifier out of an identifier-row value.
///
/// Values carrying the `ImportId` marker are JSON-ish fragments such as
/// `{"ImportId":"QID12_TEXT"}`; anything else non-empty is taken verbatim.
pub fn extract_import_id(raw: Option<&str>) -> Option<String> {
    let value = raw?;
    if value.contains(IMPORT_ID_MARKER) {
        IMPORT_ID.captures(value).map(|caps| caps[1].to_string())
    } else if !value.is_empty() {
        Some(value.to_string())
    } else {
        None
    }
}

/// Hands out unique short names for one normalization run.
#[derive(Debug, Default)]
pub struct ShortNameAllocator {
    used: HashSet<String>,
    collisions: usize,
}

impl ShortNameAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a name from the import id, else the label, else the original column name.
    pub fn allocate(&mut self, original: &str, import_id: Option<&str>, label: Option<&str>) -> String {
        let mut candidate = import_id
            .filter(|id| !id.is_empty() && !id.contains(IMPORT_ID_MARKER))
            .map(slugify)
            .unwrap_or_default();
        if candidate.is_empty() {
            candidate = match label.filter(|l| !l.is_empty()) {
                Some(l) => slugify(l),
                None => slugify(original),
            };
        }
        let base = if candidate.is_empty() {
            slugify(original)
        } else {
            candidate
        };

        let mut name = base.clone();
        let mut suffix = 2;
        while name.is_empty() || self.used.contains(&name) {
            name = with_suffix(&base, suffix);
            suffix += 1;
        }
        if name != base {
            self.collisions += 1;
            debug!(original, base = %base, resolved = %name, "short name collision resolved");
        }
        self.used.insert(name.clone());
        name
    }

    pub fn collisions(&self) -> usize {
        self.collisions
    }
}

// Shortens `base` so the suffixed name still fits the slug length bound.
fn with_suffix(base: &str, n: usize) -> String {
    let tail = format!("_{}", n);
    let room = MAX_SLUG_LEN.saturating_sub(tail.len());
    let head = if base.len() > room {
        base[..room].trim_end_matches('_')
    } else {
        base
    };
    format!("{}{}", head, tail)
}

/// Assign short names to columns in order, threading the used-name set through a fold.
pub fn assign_short_names<'a, I>(columns: I) -> (Vec<String>, usize)
where
    I: IntoIterator<Item = ColumnSource<'a>>,
{
    let (allocator, names) = columns.into_iter().fold(
        (ShortNameAllocator::new(), Vec::new()),
        |(mut allocator, mut names), col| {
            names.push(allocator.allocate(col.original, col.import_id, col.label));
            (allocator, names)
        },
    );
    (names, allocator.collisions())
}

/// Strip the two metadata rows, rename every column, and build the dictionary.
#[instrument(skip(raw), fields(columns = raw.width(), rows = raw.height()))]
pub fn normalize_schema(raw: DataFrame) -> Result<NormalizedSchema> {
    if raw.height() < METADATA_ROWS {
        return Err(PrepError::MalformedInput(format!(
            "expected {} metadata rows, found {}",
            METADATA_ROWS,
            raw.height()
        )));
    }

    let originals = frame::column_names(&raw);
    let metadata = raw.slice(0, METADATA_ROWS);
    let mut labels: Vec<Option<String>> = Vec::with_capacity(originals.len());
    let mut import_ids: Vec<Option<String>> = Vec::with_capacity(originals.len());
    for name in &originals {
        let values = frame::text_values(&metadata, name)?;
        labels.push(values[0].clone());
        import_ids.push(extract_import_id(values[1].as_deref()));
    }

    let sources = originals.iter().enumerate().map(|(i, original)| ColumnSource {
        original,
        label: labels[i].as_deref(),
        import_id: import_ids[i].as_deref(),
    });
    let (short_names, collisions) = assign_short_names(sources);

    let dictionary: Vec<ColumnDictionaryEntry> = originals
        .iter()
        .zip(&short_names)
        .zip(labels.into_iter().zip(import_ids))
        .map(|((original, short), (label, import_id))| ColumnDictionaryEntry {
            original_column: original.clone(),
            short_name: short.clone(),
            question_label: label,
            import_id,
        })
        .collect();

    let respondents = raw.slice(METADATA_ROWS as i64, raw.height() - METADATA_ROWS);
    let table = frame::rename_all(respondents, &short_names)?;

    metrics::normalize::columns_renamed(dictionary.len());
    metrics::normalize::collisions_resolved(collisions);
    info!(
        "[rename] {} columns mapped ({} collisions resolved)",
        dictionary.len(),
        collisions
    );
    for entry in dictionary.iter().take(5) {
        info!(
            original = %entry.original_column,
            short_name = %entry.short_name,
            import_id = entry.import_id.as_deref().unwrap_or(""),
            "[rename] preview"
        );
    }

    Ok(NormalizedSchema { table, dictionary })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_table(columns: &[&str], labels: &[&str], ids: &[&str], data: &[&[&str]]) -> DataFrame {
        let mut rows: Vec<&[&str]> = vec![labels, ids];
        rows.extend_from_slice(data);
        frame::text_frame(columns, &rows)
    }

    fn is_slug(name: &str) -> bool {
        name.len() <= MAX_SLUG_LEN
            && name
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
    }

    #[test]
    fn slugify_follows_the_rule() {
        assert_eq!(slugify("  Duration (in   seconds) "), "duration_in_seconds");
        assert_eq!(slugify("QID47_Operating System"), "qid47_operating_system");
        assert_eq!(slugify("__Hello--World__"), "hello_world");
        assert_eq!(slugify("Café ☕ time!"), "caf_time");
        assert_eq!(slugify("!!!"), "");
        assert_eq!(slugify(&"x".repeat(80)).len(), 60);
    }

    #[test]
    fn slugify_is_idempotent() {
        for text in ["Q1 - How was it?", "StartDate", "a  b__c", "Ends_with_ ", "ÀÉÎ 12"] {
            let once = slugify(text);
            assert_eq!(slugify(&once), once);
        }
    }

    #[test]
    fn extract_import_id_handles_embedded_and_plain_values() {
        assert_eq!(
            extract_import_id(Some(r#"{"ImportId":"QID48_TEXT"}"#)),
            Some("QID48_TEXT".to_string())
        );
        assert_eq!(
            extract_import_id(Some(r#"{"ImportId" : "startDate", "timeZone":"X"}"#)),
            Some("startDate".to_string())
        );
        assert_eq!(extract_import_id(Some("ImportId broken")), None);
        assert_eq!(extract_import_id(Some("plain_id")), Some("plain_id".to_string()));
        assert_eq!(extract_import_id(Some("")), None);
        assert_eq!(extract_import_id(None), None);
    }

    #[test]
    fn allocator_prefers_id_then_label_then_original() {
        let mut alloc = ShortNameAllocator::new();
        assert_eq!(alloc.allocate("Q1", Some("QID1"), Some("Label One")), "qid1");
        assert_eq!(alloc.allocate("Q2", None, Some("Label Two")), "label_two");
        assert_eq!(alloc.allocate("Q3", None, None), "q3");
        // id that slugifies to nothing falls through to the label
        assert_eq!(alloc.allocate("Q4", Some("???"), Some("Four")), "four");
    }

    #[test]
    fn allocator_suffixes_collisions_in_order() {
        let mut alloc = ShortNameAllocator::new();
        assert_eq!(alloc.allocate("A", Some("dup"), None), "dup");
        assert_eq!(alloc.allocate("B", Some("dup"), None), "dup_2");
        assert_eq!(alloc.allocate("C", Some("dup"), None), "dup_3");
        assert_eq!(alloc.allocate("D", Some("dup_2"), None), "dup_2_2");
        assert_eq!(alloc.collisions(), 3);
    }

    #[test]
    fn empty_column_gets_suffix_from_empty_string() {
        let mut alloc = ShortNameAllocator::new();
        assert_eq!(alloc.allocate("", None, None), "_2");
        assert_eq!(alloc.allocate("***", None, None), "_3");
        assert_eq!(alloc.collisions(), 2);
    }

    #[test]
    fn suffixed_names_stay_within_bound() {
        let mut alloc = ShortNameAllocator::new();
        let long = "y".repeat(70);
        let first = alloc.allocate(&long, None, None);
        let second = alloc.allocate(&long, None, None);
        assert_eq!(first.len(), 60);
        assert!(second.len() <= 60);
        assert!(second.ends_with("_2"));
        assert_ne!(first, second);
    }

    #[test]
    fn normalize_schema_renames_and_builds_dictionary() {
        let raw = raw_table(
            &["StartDate", "Q1", "Q1.1", "Unnamed: 3"],
            &["Start Date", "What did you like?", "What did you like?", ""],
            &[
                r#"{"ImportId":"startDate","timeZone":"America/New_York"}"#,
                r#"{"ImportId":"QID48_TEXT"}"#,
                r#"{"ImportId":"QID48_TEXT"}"#,
                "",
            ],
            &[&["2024-01-01 10:00:00", "rides", "food", "x"]],
        );
        let out = normalize_schema(raw).unwrap();

        assert_eq!(
            frame::column_names(&out.table),
            vec!["startdate", "qid48_text", "qid48_text_2", "unnamed_3"]
        );
        assert_eq!(out.table.height(), 1);
        assert_eq!(
            frame::text_values(&out.table, "qid48_text").unwrap(),
            vec![Some("rides".to_string())]
        );

        assert_eq!(out.dictionary.len(), 4);
        assert_eq!(out.dictionary[1].original_column, "Q1");
        assert_eq!(out.dictionary[1].import_id.as_deref(), Some("QID48_TEXT"));
        assert_eq!(
            out.dictionary[1].question_label.as_deref(),
            Some("What did you like?")
        );
        assert_eq!(out.dictionary[3].question_label, None);
    }

    #[test]
    fn normalize_schema_requires_metadata_rows() {
        let raw = frame::text_frame(&["a"], &[&["label"]]);
        assert!(matches!(
            normalize_schema(raw),
            Err(PrepError::MalformedInput(_))
        ));
    }

    #[test]
    fn short_names_are_unique_and_slug_shaped() {
        let columns = [
            "Q1", "Q1", "q1", "Q 1", "", "!!", "Q1_2", "Duration (in seconds)", "Duration-in-seconds",
        ];
        let sources = columns.iter().map(|c| ColumnSource {
            original: c,
            label: None,
            import_id: None,
        });
        let (names, _) = assign_short_names(sources);
        let unique: HashSet<&String> = names.iter().collect();
        assert_eq!(unique.len(), names.len());
        assert!(names.iter().all(|n| is_slug(n)), "{:?}", names);
    }

    #[test]
    fn renormalizing_output_is_idempotent() {
        let raw = raw_table(
            &["Q1", "Q2", "Q3", "Q4"],
            &["Favorite ride", "Favorite ride", "Age", "Comments"],
            &[
                r#"{"ImportId":"QID1"}"#,
                r#"{"ImportId":"QID1"}"#,
                "",
                r#"{"ImportId":"QID9_TEXT"}"#,
            ],
            &[&["a", "b", "19", "great"]],
        );
        let first = normalize_schema(raw).unwrap();
        let owned = frame::column_names(&first.table);
        let names: Vec<&str> = owned.iter().map(String::as_str).collect();

        let again = raw_table(&names, &names, &names, &[&["a", "b", "19", "great"]]);
        let second = normalize_schema(again).unwrap();
        assert_eq!(frame::column_names(&second.table), owned);
    }
}
