use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use csv::ReaderBuilder;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::core::{AccountSnapshot, ColumnMapping, RawHoldingRow};

#[derive(Debug, Error)]
pub enum ReaderError {
    #[error("cannot open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("bad record {row} in {path}: {source}")]
    Record {
        path: PathBuf,
        row: usize,
        #[source]
        source: csv::Error,
    },
    #[error("{path} has no rows")]
    Empty { path: PathBuf },
}

/// Where one brokerage account's export lives and how to read its columns.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountSource {
    pub id: String,
    pub path: PathBuf,
    #[serde(default)]
    pub header_row: bool,
    pub mapping: ColumnMapping,
}

/// Produces the raw rows of every configured account. A failing account is
/// reported in place and never hides the others.
pub trait AccountReader: Send + Sync {
    fn read_accounts(&self) -> BTreeMap<String, Result<AccountSnapshot, ReaderError>>;
}

pub struct CsvAccountReader {
    sources: Vec<AccountSource>,
}

impl CsvAccountReader {
    pub fn new(sources: Vec<AccountSource>) -> Self {
        Self { sources }
    }
}

fn read_records(path: &Path) -> Result<Vec<RawHoldingRow>, ReaderError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|source| ReaderError::Open {
            path: path.to_path_buf(),
            source,
        })?;

    reader
        .records()
        .enumerate()
        .map(|(row, record)| {
            record
                .map(|r| r.iter().collect())
                .map_err(|source| ReaderError::Record {
                    path: path.to_path_buf(),
                    row,
                    source,
                })
        })
        .collect()
}

pub fn read_account(source: &AccountSource) -> Result<AccountSnapshot, ReaderError> {
    let mut rows = read_records(&source.path)?;
    let headers = if source.header_row && !rows.is_empty() {
        Some(rows.remove(0).cells)
    } else {
        None
    };
    if rows.is_empty() {
        return Err(ReaderError::Empty {
            path: source.path.clone(),
        });
    }

    debug!(account = %source.id, rows = rows.len(), "read account export");
    Ok(AccountSnapshot {
        headers,
        rows,
        mapping: source.mapping.clone(),
    })
}

impl AccountReader for CsvAccountReader {
    fn read_accounts(&self) -> BTreeMap<String, Result<AccountSnapshot, ReaderError>> {
        self.sources
            .iter()
            .map(|source| {
                let snapshot = read_account(source);
                if let Err(e) = &snapshot {
                    warn!(account = %source.id, error = %e, "failed to read account export");
                }
                (source.id.clone(), snapshot)
            })
            .collect()
    }
}
