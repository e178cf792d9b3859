//! CSV upload ingest.
//!
//! Uploaded files are validated against a fixed column set per upload kind,
//! parsed off the async runtime, and appended to the store in one
//! transaction per file. Columns outside the schema are ignored and reported.

pub mod index_file;
pub mod option_file;
pub mod parse;

use std::collections::HashMap;

use csv::{ReaderBuilder, StringRecord, Trim};
use serde::Serialize;
use tracing::{info, warn};

use crate::db::Db;
use crate::error::{Error, Result};

pub use index_file::{parse_index_csv, IndexRecord};
pub use option_file::parse_option_csv;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadKind {
    Index,
    Option,
}

impl UploadKind {
    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "index" => Ok(Self::Index),
            "option" | "options" => Ok(Self::Option),
            other => Err(Error::InvalidRequest(format!("unknown upload type: {}", other))),
        }
    }

    pub fn table(&self) -> &'static str {
        match self {
            Self::Index => crate::constants::INDEX_TABLE,
            Self::Option => crate::constants::OPTION_TABLE,
        }
    }
}

pub struct UploadedFile {
    pub name: String,
    pub data: Vec<u8>,
}

/// Rows that survived validation plus the bookkeeping for the report.
#[derive(Debug, Clone)]
pub struct Parsed<T> {
    pub rows: Vec<T>,
    pub original_rows: usize,
    pub dropped_rows: usize,
    pub ignored_columns: Vec<String>,
}

impl<T> Parsed<T> {
    fn new(ignored_columns: Vec<String>) -> Self {
        Self {
            rows: Vec::new(),
            original_rows: 0,
            dropped_rows: 0,
            ignored_columns,
        }
    }

    pub fn processed_rows(&self) -> usize {
        self.rows.len()
    }

    fn stats(&self) -> LoadStats {
        LoadStats {
            original_rows: self.original_rows,
            processed_rows: self.processed_rows(),
            dropped_rows: self.dropped_rows,
            ignored_columns: self.ignored_columns.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoadStats {
    pub original_rows: usize,
    pub processed_rows: usize,
    pub dropped_rows: usize,
    pub ignored_columns: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum FileStatus {
    Loaded(LoadStats),
    Failed { reason: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct FileReport {
    pub file_name: String,
    #[serde(flatten)]
    pub status: FileStatus,
}

impl FileReport {
    pub fn is_loaded(&self) -> bool {
        matches!(self.status, FileStatus::Loaded(_))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct UploadSummary {
    pub kind: UploadKind,
    pub files: Vec<FileReport>,
}

impl UploadSummary {
    pub fn success_count(&self) -> usize {
        self.files.iter().filter(|f| f.is_loaded()).count()
    }

    pub fn failure_count(&self) -> usize {
        self.files.len() - self.success_count()
    }
}

/// Load every file of one upload. A failing file never stops the others.
pub async fn ingest_upload(db: &Db, kind: UploadKind, files: Vec<UploadedFile>) -> UploadSummary {
    let mut reports = Vec::with_capacity(files.len());

    for file in files {
        let file_name = file.name.clone();
        let status = if !file_name.to_lowercase().ends_with(".csv") {
            FileStatus::Failed {
                reason: "Not a CSV".to_string(),
            }
        } else {
            match ingest_file(db, kind, file).await {
                Ok(stats) => {
                    info!(
                        "Loaded {} into {}: {} → {} rows ({} invalid)",
                        file_name,
                        kind.table(),
                        stats.original_rows,
                        stats.processed_rows,
                        stats.dropped_rows
                    );
                    FileStatus::Loaded(stats)
                }
                Err(Error::Ingest(reason)) => FileStatus::Failed { reason },
                Err(e) => FileStatus::Failed {
                    reason: format!("Processing failed: {}", e),
                },
            }
        };

        if let FileStatus::Failed { reason } = &status {
            warn!("Upload of {} failed: {}", file_name, reason);
        }
        reports.push(FileReport { file_name, status });
    }

    UploadSummary {
        kind,
        files: reports,
    }
}

async fn ingest_file(db: &Db, kind: UploadKind, file: UploadedFile) -> Result<LoadStats> {
    let data = file.data;
    match kind {
        UploadKind::Index => {
            let parsed = run_parser(move || parse_index_csv(&data)).await?;
            ensure_rows(&parsed)?;
            db.insert_index_records(&parsed.rows).await?;
            Ok(parsed.stats())
        }
        UploadKind::Option => {
            let parsed = run_parser(move || parse_option_csv(&data)).await?;
            ensure_rows(&parsed)?;
            db.insert_option_quotes(&parsed.rows).await?;
            Ok(parsed.stats())
        }
    }
}

async fn run_parser<T, F>(parse: F) -> Result<Parsed<T>>
where
    F: FnOnce() -> Result<Parsed<T>> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(parse)
        .await
        .map_err(|e| Error::Other(format!("parser task failed: {}", e)))?
}

fn ensure_rows<T>(parsed: &Parsed<T>) -> Result<()> {
    if parsed.rows.is_empty() {
        return Err(Error::Ingest("No valid rows after preprocessing".to_string()));
    }
    Ok(())
}

fn reader(data: &[u8]) -> csv::Reader<&[u8]> {
    ReaderBuilder::new()
        .flexible(true)
        .trim(Trim::All)
        .from_reader(data)
}

/// Header positions, matched case-insensitively.
struct ColumnMap {
    positions: HashMap<String, usize>,
    ignored: Vec<String>,
}

impl ColumnMap {
    fn new(headers: &StringRecord, required: &[&str], optional: &[&str]) -> Result<Self> {
        let mut positions = HashMap::new();
        for (i, name) in headers.iter().enumerate() {
            positions.entry(name.to_lowercase()).or_insert(i);
        }

        if let Some(missing) = required
            .iter()
            .find(|c| !positions.contains_key(&c.to_lowercase()))
        {
            return Err(Error::Ingest(format!("Missing required column: {}", missing)));
        }

        let known: Vec<String> = required
            .iter()
            .chain(optional)
            .map(|c| c.to_lowercase())
            .collect();
        let ignored = headers
            .iter()
            .filter(|h| !h.is_empty() && !known.contains(&h.to_lowercase()))
            .map(str::to_string)
            .collect();

        Ok(Self { positions, ignored })
    }

    fn get<'r>(&self, row: &'r StringRecord, column: &str) -> Option<&'r str> {
        self.positions
            .get(&column.to_lowercase())
            .and_then(|&i| row.get(i))
    }
}
