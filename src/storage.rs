use crate::error::{PrepError, Result};
use crate::frame;
use crate::pipeline::processing::normalize::ColumnDictionaryEntry;
use csv::{ReaderBuilder, Writer};
use polars::prelude::{CsvWriter, DataFrame, SerWriter};
use std::collections::{HashMap, HashSet};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::debug;

/// One output of a stage, staged in full before anything touches disk.
#[derive(Debug, Clone, Copy)]
pub enum StagedOutput<'a> {
    Table(&'a Path, &'a DataFrame),
    Dictionary(&'a Path, &'a [ColumnDictionaryEntry]),
}

impl StagedOutput<'_> {
    pub fn path(&self) -> &Path {
        match self {
            StagedOutput::Table(path, _) | StagedOutput::Dictionary(path, _) => path,
        }
    }
}

/// Storage trait for reading and persisting pipeline tables
pub trait TableStore {
    fn read_table(&self, path: &Path) -> Result<DataFrame>;

    /// Persist every output or none of them.
    fn write_outputs(&self, outputs: &[StagedOutput<'_>]) -> Result<()>;
}

/// Delimited-text storage. The header row holds column names; empty fields are missing.
#[derive(Debug, Clone, Copy, Default)]
pub struct CsvTableStore;

impl CsvTableStore {
    pub fn new() -> Self {
        Self
    }

    fn render(output: &StagedOutput<'_>) -> Result<Vec<u8>> {
        match output {
            StagedOutput::Table(_, df) => {
                let mut buf = Vec::new();
                let mut df = (*df).clone();
                CsvWriter::new(&mut buf)
                    .include_header(true)
                    .finish(&mut df)?;
                Ok(buf)
            }
            StagedOutput::Dictionary(_, entries) => {
                let mut wtr = Writer::from_writer(Vec::new());
                if entries.is_empty() {
                    wtr.write_record(ColumnDictionaryEntry::HEADERS)?;
                }
                for entry in entries.iter() {
                    wtr.serialize(entry)?;
                }
                wtr.into_inner().map_err(|e| PrepError::Io(e.into_error()))
            }
        }
    }

    fn ensure_parent(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        Ok(())
    }

    fn temp_sibling(path: &Path) -> PathBuf {
        let mut name = path.file_name().unwrap_or_default().to_os_string();
        name.push(".tmp");
        path.with_file_name(name)
    }
}

// Repeated header names get `.1`, `.2`, ... so every column name is unique.
fn dedupe_headers(headers: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    headers
        .into_iter()
        .map(|name| {
            let mut unique = name.clone();
            let mut n = 1;
            while !seen.insert(unique.clone()) {
                unique = format!("{}.{}", name, n);
                n += 1;
            }
            unique
        })
        .collect()
}

impl TableStore for CsvTableStore {
    fn read_table(&self, path: &Path) -> Result<DataFrame> {
        let file = File::open(path).map_err(|e| {
            PrepError::MalformedInput(format!("cannot open '{}': {}", path.display(), e))
        })?;
        let mut rdr = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true) // ragged rows are reported by frame::from_rows with their position
            .from_reader(file);

        let headers: Vec<String> = rdr.headers()?.iter().map(|h| h.to_string()).collect();
        if headers.is_empty() {
            return Err(PrepError::MalformedInput(format!(
                "'{}' has no header row",
                path.display()
            )));
        }
        let columns = dedupe_headers(headers);

        let mut rows = Vec::new();
        for result in rdr.records() {
            let record = result?;
            rows.push(
                record
                    .iter()
                    .map(|field| (!field.is_empty()).then(|| field.to_string()))
                    .collect(),
            );
        }

        debug!(path = %path.display(), columns = columns.len(), rows = rows.len(), "read table");
        frame::from_rows(&columns, rows)
    }

    fn write_outputs(&self, outputs: &[StagedOutput<'_>]) -> Result<()> {
        let mut rendered = Vec::with_capacity(outputs.len());
        for output in outputs {
            rendered.push((output.path(), Self::render(output)?));
        }

        for (path, _) in &rendered {
            Self::ensure_parent(path)?;
        }

        let mut staged = Vec::with_capacity(rendered.len());
        for (path, bytes) in &rendered {
            let tmp = Self::temp_sibling(path);
            if let Err(e) = fs::write(&tmp, bytes) {
                let _ = fs::remove_file(&tmp);
                for (leftover, _) in &staged {
                    let _ = fs::remove_file(leftover);
                }
                return Err(e.into());
            }
            staged.push((tmp, *path));
        }

        for (tmp, path) in &staged {
            fs::rename(tmp, path)?;
            debug!(path = %path.display(), "wrote output");
        }
        Ok(())
    }
}

/// In-memory storage implementation for testing
#[derive(Default, Clone)]
pub struct InMemoryTableStore {
    tables: Arc<Mutex<HashMap<String, DataFrame>>>,
    dictionaries: Arc<Mutex<HashMap<String, Vec<ColumnDictionaryEntry>>>>,
}

impl InMemoryTableStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, path: &Path, table: DataFrame) {
        let mut tables = self.tables.lock().unwrap_or_else(|e| e.into_inner());
        tables.insert(path.display().to_string(), table);
    }

    pub fn table(&self, path: &Path) -> Option<DataFrame> {
        let tables = self.tables.lock().unwrap_or_else(|e| e.into_inner());
        tables.get(&path.display().to_string()).cloned()
    }

    pub fn dictionary(&self, path: &Path) -> Option<Vec<ColumnDictionaryEntry>> {
        let dictionaries = self.dictionaries.lock().unwrap_or_else(|e| e.into_inner());
        dictionaries.get(&path.display().to_string()).cloned()
    }
}

impl TableStore for InMemoryTableStore {
    fn read_table(&self, path: &Path) -> Result<DataFrame> {
        self.table(path).ok_or_else(|| {
            PrepError::MalformedInput(format!("no table stored at '{}'", path.display()))
        })
    }

    fn write_outputs(&self, outputs: &[StagedOutput<'_>]) -> Result<()> {
        for output in outputs {
            match output {
                StagedOutput::Table(path, df) => self.insert(path, (*df).clone()),
                StagedOutput::Dictionary(path, entries) => {
                    let mut dictionaries =
                        self.dictionaries.lock().unwrap_or_else(|e| e.into_inner());
                    dictionaries.insert(path.display().to_string(), entries.to_vec());
                }
            }
        }
        Ok(())
    }
}
