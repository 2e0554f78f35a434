//! Tabular input: CSV or the first sheet of a workbook. The header row names the fields, each
//! data row becomes one [`WorkItem`].
//!
//! Opening the file and reading the header are the only fatal steps. A row that cannot be
//! decoded is yielded as a [`RowError`] under its own id, so ids always match row positions.

use calamine::{Data, Reader, open_workbook_auto};
use csv::{ReaderBuilder, StringRecordsIntoIter};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::vec;

use crate::WorkItem;
use crate::error::{RowError, SourceError};
use crate::pipeline::SourceRow;

pub struct CsvSource<R: Read = File> {
    headers: Vec<String>,
    records: StringRecordsIntoIter<R>,
    next_id: u64,
    done: bool,
}

impl CsvSource<File> {
    /// Open `path` and read its header row.
    pub fn open(path: &Path) -> Result<Self, SourceError> {
        let reader = ReaderBuilder::new()
            .flexible(true)
            .from_path(path)
            .map_err(|source| SourceError::Open {
                path: path.to_path_buf(),
                source,
            })?;
        Self::from_csv_reader(reader, path)
    }
}

impl<R: Read> CsvSource<R> {
    /// Read CSV from any reader (in-memory data, stdin, ...).
    pub fn from_reader(reader: R) -> Result<Self, SourceError> {
        let reader = ReaderBuilder::new().flexible(true).from_reader(reader);
        Self::from_csv_reader(reader, Path::new("<reader>"))
    }

    fn from_csv_reader(mut reader: csv::Reader<R>, path: &Path) -> Result<Self, SourceError> {
        let headers = reader
            .headers()
            .map_err(|source| SourceError::Header {
                path: PathBuf::from(path),
                source,
            })?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();
        Ok(Self {
            headers,
            records: reader.into_records(),
            next_id: 0,
            done: false,
        })
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    fn field_name(&self, index: usize) -> String {
        self.headers
            .get(index)
            .cloned()
            .unwrap_or_else(|| format!("column_{index}"))
    }
}

impl<R: Read> Iterator for CsvSource<R> {
    type Item = SourceRow;

    fn next(&mut self) -> Option<SourceRow> {
        if self.done {
            return None;
        }
        let record = self.records.next()?;
        let id = self.next_id;
        self.next_id += 1;
        match record {
            Ok(record) => {
                let fields = record
                    .iter()
                    .enumerate()
                    .map(|(i, value)| (self.field_name(i), value.to_string()))
                    .collect();
                Some(Ok(WorkItem::new(id, fields)))
            }
            Err(e) => {
                // An I/O error leaves the reader in an unknown position: stop after reporting it.
                if e.is_io_error() {
                    self.done = true;
                }
                Some(Err(RowError {
                    id,
                    reason: e.to_string(),
                }))
            }
        }
    }
}

/// First worksheet of an Excel or OpenDocument workbook, loaded at open time.
///
/// Cells are rendered with their display form: `3.0` becomes `3`, empty cells become `""`.
#[derive(Debug)]
pub struct ExcelSource {
    headers: Vec<String>,
    rows: vec::IntoIter<Vec<String>>,
    next_id: u64,
}

impl ExcelSource {
    pub fn open(path: &Path) -> Result<Self, SourceError> {
        let workbook_error = |source| SourceError::Workbook {
            path: path.to_path_buf(),
            source,
        };
        let mut workbook = open_workbook_auto(path).map_err(workbook_error)?;
        let range = workbook
            .worksheet_range_at(0)
            .ok_or_else(|| SourceError::NoSheet {
                path: path.to_path_buf(),
            })?
            .map_err(workbook_error)?;

        let mut rows = range.rows().map(|row| row.iter().map(cell_text).collect::<Vec<_>>());
        let headers = rows
            .next()
            .map(|header| header.iter().map(|h| h.trim().to_string()).collect())
            .unwrap_or_default();
        let rows: Vec<Vec<String>> = rows.collect();
        Ok(Self {
            headers,
            rows: rows.into_iter(),
            next_id: 0,
        })
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Data rows not yet yielded.
    pub fn remaining(&self) -> usize {
        self.rows.len()
    }
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        other => other.to_string(),
    }
}

impl Iterator for ExcelSource {
    type Item = SourceRow;

    fn next(&mut self) -> Option<SourceRow> {
        let row = self.rows.next()?;
        let id = self.next_id;
        self.next_id += 1;
        let fields = row
            .into_iter()
            .enumerate()
            .map(|(i, value)| {
                let name = self
                    .headers
                    .get(i)
                    .cloned()
                    .unwrap_or_else(|| format!("column_{i}"));
                (name, value)
            })
            .collect();
        Some(Ok(WorkItem::new(id, fields)))
    }
}

/// Extensions opened as workbooks. Anything else is read as CSV.
pub const WORKBOOK_EXTENSIONS: &[&str] = &["xlsx", "xlsm", "xlsb", "xls", "ods"];

/// Source picked from the input file extension.
pub enum TableSource {
    Csv(CsvSource),
    Excel(ExcelSource),
}

impl TableSource {
    pub fn open(path: &Path) -> Result<Self, SourceError> {
        let is_workbook = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| {
                WORKBOOK_EXTENSIONS
                    .iter()
                    .any(|known| ext.eq_ignore_ascii_case(known))
            });
        if is_workbook {
            ExcelSource::open(path).map(TableSource::Excel)
        } else {
            CsvSource::open(path).map(TableSource::Csv)
        }
    }

    pub fn headers(&self) -> &[String] {
        match self {
            TableSource::Csv(source) => source.headers(),
            TableSource::Excel(source) => source.headers(),
        }
    }

    /// Row count when known up front (workbooks). CSV is streamed and not pre-counted.
    pub fn len_hint(&self) -> Option<usize> {
        match self {
            TableSource::Csv(_) => None,
            TableSource::Excel(source) => Some(source.remaining()),
        }
    }
}

impl Iterator for TableSource {
    type Item = SourceRow;

    fn next(&mut self) -> Option<SourceRow> {
        match self {
            TableSource::Csv(source) => source.next(),
            TableSource::Excel(source) => source.next(),
        }
    }
}
