//! CSV directory record source.
//!
//! Reads every `.csv` file in one directory, in lexical file-name order, and
//! yields fixed-size chunks of mapped rows. Unreadable rows are skipped with
//! a warning; the rest of the file keeps flowing.

use std::collections::VecDeque;
use std::ffi::OsStr;
use std::path::Path;

use cap_std::{ambient_authority, fs::Dir, fs::File};
use csv::{ErrorKind, Reader, ReaderBuilder, StringRecord};
use tracing::{debug, warn};

use super::column_mapping::ColumnMapping;
use crate::domain::ports::{RecordChunk, UserRecordSource, UserRecordSourceError};
use crate::domain::{RawUserRow, field};

/// Default number of rows per chunk.
pub const DEFAULT_CHUNK_SIZE: usize = 1000;

/// Record source over the CSV files of one directory.
pub struct CsvDirectorySource {
    directory: Dir,
    pending_files: VecDeque<String>,
    mapping: ColumnMapping,
    chunk_size: usize,
    current: Option<OpenCsvFile>,
}

impl CsvDirectorySource {
    /// Open `path` and queue its CSV files.
    ///
    /// A `chunk_size` of zero is treated as one.
    ///
    /// # Errors
    ///
    /// Returns [`UserRecordSourceError::Read`] when the directory cannot be
    /// opened or listed.
    pub fn open(
        path: &Path,
        mapping: ColumnMapping,
        chunk_size: usize,
    ) -> Result<Self, UserRecordSourceError> {
        let directory = Dir::open_ambient_dir(path, ambient_authority())
            .map_err(|error| read_error(&path.display().to_string(), &error))?;
        let pending_files = list_csv_files(&directory)
            .map_err(|error| read_error(&path.display().to_string(), &error))?;
        debug!(
            directory = %path.display(),
            files = pending_files.len(),
            "queued CSV files"
        );

        Ok(Self {
            directory,
            pending_files: pending_files.into(),
            mapping,
            chunk_size: chunk_size.max(1),
            current: None,
        })
    }

    /// File names still waiting to be opened.
    pub fn pending_files(&self) -> impl Iterator<Item = &str> {
        self.pending_files.iter().map(String::as_str)
    }
}

impl UserRecordSource for CsvDirectorySource {
    fn next_chunk(&mut self) -> Result<Option<RecordChunk>, UserRecordSourceError> {
        loop {
            if let Some(file) = self.current.as_mut() {
                if let Some(chunk) = file.read_chunk(self.chunk_size)? {
                    return Ok(Some(chunk));
                }
                self.current = None;
            }

            let Some(name) = self.pending_files.pop_front() else {
                return Ok(None);
            };
            self.current = Some(OpenCsvFile::open(&self.directory, name, &self.mapping)?);
        }
    }
}

struct OpenCsvFile {
    name: String,
    reader: Reader<File>,
    columns: Vec<Option<String>>,
    chunks_read: usize,
    rows_read: u64,
}

impl OpenCsvFile {
    fn open(
        directory: &Dir,
        name: String,
        mapping: &ColumnMapping,
    ) -> Result<Self, UserRecordSourceError> {
        let file = directory
            .open(&name)
            .map_err(|error| read_error(&name, &error))?;
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(file);
        let headers = reader
            .headers()
            .map_err(|error| read_error(&name, &error))?;
        let columns = headers
            .iter()
            .map(|header| mapping.canonical(header.trim()).map(str::to_owned))
            .collect::<Vec<_>>();

        if !columns.iter().flatten().any(|column| column == field::EMAIL) {
            let column = mapping.source_column(field::EMAIL).unwrap_or(field::EMAIL);
            return Err(UserRecordSourceError::missing_column(name, column));
        }

        debug!(file = %name, "opened CSV file");
        Ok(Self {
            name,
            reader,
            columns,
            chunks_read: 0,
            rows_read: 0,
        })
    }

    fn read_chunk(
        &mut self,
        chunk_size: usize,
    ) -> Result<Option<RecordChunk>, UserRecordSourceError> {
        let mut rows = Vec::with_capacity(chunk_size);
        let mut record = StringRecord::new();

        while rows.len() < chunk_size {
            let position = self.rows_read;
            match self.reader.read_record(&mut record) {
                Ok(false) => break,
                Ok(true) => {
                    self.rows_read += 1;
                    if record.len() > self.columns.len() {
                        warn!(
                            file = %self.name,
                            position,
                            fields = record.len(),
                            expected = self.columns.len(),
                            "skipping row with too many fields"
                        );
                        continue;
                    }
                    rows.push(self.map_row(position, &record));
                }
                Err(error) if is_row_error(error.kind()) => {
                    self.rows_read += 1;
                    warn!(file = %self.name, position, %error, "skipping unreadable row");
                }
                Err(error) => return Err(read_error(&self.name, &error)),
            }
        }

        if rows.is_empty() {
            return Ok(None);
        }
        self.chunks_read += 1;
        Ok(Some(RecordChunk {
            label: format!("{}#{}", self.name, self.chunks_read),
            rows,
        }))
    }

    fn map_row(&self, position: u64, record: &StringRecord) -> RawUserRow {
        let mut row = RawUserRow::new(position);
        for (column, value) in self.columns.iter().zip(record.iter()) {
            if let Some(canonical) = column {
                row.insert(canonical, value);
            }
        }
        row
    }
}

fn list_csv_files(directory: &Dir) -> std::io::Result<Vec<String>> {
    let mut names = Vec::new();
    for listed in directory.entries()? {
        let entry = listed?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
            warn!(file = ?entry.file_name(), "skipping non UTF-8 file name");
            continue;
        };
        if has_csv_extension(&name) {
            names.push(name);
        }
    }
    names.sort();
    Ok(names)
}

fn has_csv_extension(name: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(OsStr::to_str)
        .is_some_and(|extension| extension.eq_ignore_ascii_case("csv"))
}

fn is_row_error(kind: &ErrorKind) -> bool {
    matches!(
        kind,
        ErrorKind::Utf8 { .. } | ErrorKind::UnequalLengths { .. }
    )
}

fn read_error(origin: &str, error: &impl std::fmt::Display) -> UserRecordSourceError {
    UserRecordSourceError::read(format!("{origin}: {error}"))
}

#[cfg(test)]
#[path = "csv_source_tests.rs"]
mod tests;
