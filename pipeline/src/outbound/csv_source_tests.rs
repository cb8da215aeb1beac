//! Tests for CSV directory listing, chunking, mapping, and row skipping.

use std::path::Path;

use cap_std::{ambient_authority, fs::Dir};
use rstest::{fixture, rstest};
use tempfile::TempDir;

use super::CsvDirectorySource;
use crate::domain::field;
use crate::domain::ports::{RecordChunk, UserRecordSource, UserRecordSourceError};
use crate::outbound::column_mapping::ColumnMapping;
use crate::test_support::cap_fs::write_file;

#[fixture]
fn directory() -> TempDir {
    tempfile::tempdir().expect("temp dir")
}

fn write(directory: &TempDir, name: &str, contents: &[u8]) {
    write_file(&directory.path().join(name), contents).expect("write fixture");
}

fn open(directory: &TempDir, chunk_size: usize) -> CsvDirectorySource {
    CsvDirectorySource::open(directory.path(), ColumnMapping::identity(), chunk_size)
        .expect("directory opens")
}

fn drain(source: &mut CsvDirectorySource) -> Vec<RecordChunk> {
    let mut chunks = Vec::new();
    while let Some(chunk) = source.next_chunk().expect("chunk reads") {
        chunks.push(chunk);
    }
    chunks
}

fn emails(chunk: &RecordChunk) -> Vec<&str> {
    chunk
        .rows
        .iter()
        .filter_map(|row| row.get(field::EMAIL))
        .collect()
}

#[rstest]
fn chunks_respect_the_configured_size(directory: TempDir) {
    write(
        &directory,
        "users.csv",
        b"email,ip_address\na@x.com,1.1.1.1\nb@x.com,\nc@x.com,\nd@x.com,\ne@x.com,\n",
    );
    let mut source = open(&directory, 2);

    let chunks = drain(&mut source);

    let shape = chunks
        .iter()
        .map(|chunk| (chunk.label.as_str(), chunk.rows.len()))
        .collect::<Vec<_>>();
    assert_eq!(
        shape,
        vec![("users.csv#1", 2), ("users.csv#2", 2), ("users.csv#3", 1)]
    );
    let first = chunks.first().expect("first chunk");
    assert_eq!(emails(first), vec!["a@x.com", "b@x.com"]);
    assert_eq!(
        first.rows.first().and_then(|row| row.get(field::IP_ADDRESS)),
        Some("1.1.1.1")
    );
}

#[rstest]
fn reads_csv_files_in_lexical_order(directory: TempDir) {
    write(&directory, "b.csv", b"email\nb@x.com\n");
    write(&directory, "a.CSV", b"email\na@x.com\n");
    write(&directory, "notes.txt", b"email\nnot@x.com\n");
    Dir::create_ambient_dir_all(directory.path().join("nested.csv"), ambient_authority())
        .expect("nested dir");
    let mut source = open(&directory, 10);

    assert_eq!(source.pending_files().collect::<Vec<_>>(), vec!["a.CSV", "b.csv"]);
    let labels = drain(&mut source)
        .into_iter()
        .map(|chunk| chunk.label)
        .collect::<Vec<_>>();
    assert_eq!(labels, vec!["a.CSV#1", "b.csv#1"]);
}

#[rstest]
fn maps_source_columns_and_ignores_the_rest(directory: TempDir) {
    write(
        &directory,
        "export.csv",
        b"Email Address,Notes,Last Seen IP\nada@example.com,likes maths,8.8.8.8\n",
    );
    let mapping = ColumnMapping::from_json_str(
        r#"{"Email Address": "email", "Last Seen IP": "ip_address"}"#,
    )
    .expect("valid mapping");
    let mut source =
        CsvDirectorySource::open(directory.path(), mapping, 10).expect("directory opens");

    let chunks = drain(&mut source);

    let row = chunks
        .first()
        .and_then(|chunk| chunk.rows.first())
        .expect("one row");
    assert_eq!(row.get(field::EMAIL), Some("ada@example.com"));
    assert_eq!(row.get(field::IP_ADDRESS), Some("8.8.8.8"));
    assert_eq!(row.get("Notes"), None);
}

#[rstest]
fn skips_unreadable_rows(directory: TempDir) {
    let mut contents = b"email,status\na@x.com,true\nb@x.com,true,extra\n".to_vec();
    contents.extend_from_slice(b"c@x.com,\xff\xfe\nd@x.com,false\n");
    write(&directory, "users.csv", &contents);
    let mut source = open(&directory, 10);

    let chunks = drain(&mut source);

    let chunk = chunks.first().expect("one chunk");
    assert_eq!(emails(chunk), vec!["a@x.com", "d@x.com"]);
    let positions = chunk.rows.iter().map(|row| row.position()).collect::<Vec<_>>();
    assert_eq!(positions, vec![0, 3], "positions count skipped rows");
}

#[rstest]
fn short_rows_leave_trailing_fields_absent(directory: TempDir) {
    write(&directory, "users.csv", b"email,ip_address,status\na@x.com\n");
    let mut source = open(&directory, 10);

    let chunks = drain(&mut source);

    let row = chunks
        .first()
        .and_then(|chunk| chunk.rows.first())
        .expect("one row");
    assert_eq!(row.get(field::EMAIL), Some("a@x.com"));
    assert_eq!(row.get(field::STATUS), None);
}

#[rstest]
fn header_only_files_yield_no_chunks(directory: TempDir) {
    write(&directory, "a.csv", b"email,ip_address\n");
    write(&directory, "b.csv", b"email\nb@x.com\n");
    let mut source = open(&directory, 10);

    let labels = drain(&mut source)
        .into_iter()
        .map(|chunk| chunk.label)
        .collect::<Vec<_>>();

    assert_eq!(labels, vec!["b.csv#1"]);
}

#[rstest]
fn files_without_the_email_column_fail(directory: TempDir) {
    write(&directory, "legacy.csv", b"mail,ip_address\na@x.com,1.1.1.1\n");
    let mut source = open(&directory, 10);

    let error = source.next_chunk().expect_err("email column is required");

    assert_eq!(
        error,
        UserRecordSourceError::missing_column("legacy.csv", "email")
    );
}

#[rstest]
fn missing_directories_are_read_errors(directory: TempDir) {
    let missing = directory.path().join("absent");

    let result = CsvDirectorySource::open(Path::new(&missing), ColumnMapping::identity(), 10);

    assert!(matches!(result, Err(UserRecordSourceError::Read { .. })));
}
