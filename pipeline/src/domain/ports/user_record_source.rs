//! Driving port for extracted user rows.
//!
//! Extraction adapters hand the pipeline one chunk at a time. Column names
//! have already been mapped onto canonical field names.

use crate::domain::RawUserRow;

use super::define_port_error;

/// One batch worth of extracted rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordChunk {
    /// Human-readable origin, for example `users_2023.csv#2`.
    pub label: String,
    /// Rows in source order.
    pub rows: Vec<RawUserRow>,
}

define_port_error! {
    /// Errors raised while extracting rows.
    pub enum UserRecordSourceError {
        /// The underlying input could not be listed, opened, or read.
        Read { message: String } =>
            "user record source read failed: {message}",
        /// The input lacks a column required by the pipeline.
        MissingColumn { source_name: String, column: String } =>
            "{source_name} has no '{column}' column",
        /// The column mapping is unusable.
        Mapping { message: String } =>
            "invalid column mapping: {message}",
    }
}

/// Port yielding extracted chunks until the input is exhausted.
#[cfg_attr(test, mockall::automock)]
pub trait UserRecordSource {
    /// Return the next chunk, or `None` once every input has been read.
    fn next_chunk(&mut self) -> Result<Option<RecordChunk>, UserRecordSourceError>;
}
