//! Source-column to canonical-field name mapping.
//!
//! Exports name their columns freely; the pipeline only understands the
//! canonical names in [`crate::domain::field`]. A mapping is a JSON object
//! of `"source column": "canonical field"` pairs. Columns it does not name
//! are ignored.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use cap_std::{ambient_authority, fs::Dir};

use crate::domain::field;
use crate::domain::ports::UserRecordSourceError;

/// Validated column rename table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMapping {
    renames: BTreeMap<String, String>,
}

impl ColumnMapping {
    /// Mapping where every canonical field name maps to itself.
    pub fn identity() -> Self {
        Self {
            renames: field::ALL
                .iter()
                .map(|name| ((*name).to_owned(), (*name).to_owned()))
                .collect(),
        }
    }

    /// Build a mapping from source-to-canonical pairs.
    ///
    /// # Errors
    ///
    /// Returns [`UserRecordSourceError::Mapping`] when a target is not a
    /// canonical field, two columns share a target, or no column maps to
    /// the email field.
    pub fn new(renames: BTreeMap<String, String>) -> Result<Self, UserRecordSourceError> {
        let mut targets = BTreeSet::new();
        for (source, target) in &renames {
            if source.trim().is_empty() {
                return Err(UserRecordSourceError::mapping(
                    "source column names must not be blank",
                ));
            }
            if !field::is_known(target) {
                return Err(UserRecordSourceError::mapping(format!(
                    "column '{source}' maps to unknown field '{target}'"
                )));
            }
            if !targets.insert(target.as_str()) {
                return Err(UserRecordSourceError::mapping(format!(
                    "more than one column maps to '{target}'"
                )));
            }
        }
        if !targets.contains(field::EMAIL) {
            return Err(UserRecordSourceError::mapping(format!(
                "no column maps to '{}'",
                field::EMAIL
            )));
        }
        Ok(Self { renames })
    }

    /// Parse a JSON object of source-to-canonical pairs.
    ///
    /// # Examples
    /// ```
    /// use user_migration::outbound::column_mapping::ColumnMapping;
    ///
    /// let mapping = ColumnMapping::from_json_str(r#"{"Email Address": "email"}"#)?;
    /// assert_eq!(mapping.canonical("Email Address"), Some("email"));
    /// assert_eq!(mapping.canonical("Notes"), None);
    /// # Ok::<(), user_migration::domain::ports::UserRecordSourceError>(())
    /// ```
    ///
    /// # Errors
    ///
    /// Returns [`UserRecordSourceError::Mapping`] for invalid JSON or an
    /// invalid mapping.
    pub fn from_json_str(json: &str) -> Result<Self, UserRecordSourceError> {
        let renames: BTreeMap<String, String> = serde_json::from_str(json).map_err(|error| {
            UserRecordSourceError::mapping(format!(
                "mapping is not a JSON object of strings: {error}"
            ))
        })?;
        Self::new(renames)
    }

    /// Read and parse a mapping file.
    ///
    /// # Errors
    ///
    /// Returns [`UserRecordSourceError::Read`] when the file cannot be read
    /// and [`UserRecordSourceError::Mapping`] when its contents are invalid.
    pub fn load(path: &Path) -> Result<Self, UserRecordSourceError> {
        let parent = parent_directory(path);
        let file_name = path.file_name().ok_or_else(|| {
            UserRecordSourceError::read(format!("{} does not name a file", path.display()))
        })?;
        let contents = Dir::open_ambient_dir(parent, ambient_authority())
            .and_then(|directory| directory.read_to_string(Path::new(file_name)))
            .map_err(|error| {
                UserRecordSourceError::read(format!("{}: {error}", path.display()))
            })?;
        Self::from_json_str(&contents)
    }

    /// Canonical field for a source column, if mapped.
    pub fn canonical(&self, source_column: &str) -> Option<&str> {
        self.renames.get(source_column).map(String::as_str)
    }

    /// Source column mapped onto `canonical_field`, if any.
    pub fn source_column(&self, canonical_field: &str) -> Option<&str> {
        self.renames
            .iter()
            .find(|(_, target)| target.as_str() == canonical_field)
            .map(|(source, _)| source.as_str())
    }
}

/// Directory holding `path`; a bare file name resolves to `.`.
fn parent_directory(path: &Path) -> &Path {
    path.parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
}

impl Default for ColumnMapping {
    fn default() -> Self {
        Self::identity()
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::test_support::cap_fs::write_file;

    #[test]
    fn identity_maps_every_canonical_field_to_itself() {
        let mapping = ColumnMapping::identity();
        for name in field::ALL {
            assert_eq!(mapping.canonical(name), Some(name));
        }
        assert_eq!(mapping.canonical("Email"), None, "matching is exact");
    }

    #[test]
    fn renames_source_columns() {
        let mapping = ColumnMapping::from_json_str(
            r#"{"Email Address": "email", "Last Seen IP": "ip_address"}"#,
        )
        .expect("valid mapping");

        assert_eq!(mapping.canonical("Last Seen IP"), Some("ip_address"));
        assert_eq!(mapping.source_column("email"), Some("Email Address"));
        assert_eq!(mapping.source_column("status"), None);
    }

    #[rstest]
    #[case::not_json("email")]
    #[case::not_strings(r#"{"Email": 1}"#)]
    #[case::unknown_target(r#"{"Email": "email", "Nick": "nickname"}"#)]
    #[case::shared_target(r#"{"Email": "email", "Mail": "email"}"#)]
    #[case::no_email(r#"{"IP": "ip_address"}"#)]
    #[case::blank_source(r#"{" ": "email"}"#)]
    fn rejects_invalid_mappings(#[case] json: &str) {
        let error = ColumnMapping::from_json_str(json).expect_err("mapping is invalid");
        assert!(
            matches!(error, UserRecordSourceError::Mapping { .. }),
            "expected a mapping error, got {error:?}"
        );
    }

    #[test]
    fn loads_mapping_files() {
        let directory = tempfile::tempdir().expect("temp dir");
        let path = directory.path().join("mapping.json");
        write_file(&path, br#"{"E-mail": "email"}"#).expect("write mapping");

        let mapping = ColumnMapping::load(&path).expect("mapping loads");

        assert_eq!(mapping.canonical("E-mail"), Some("email"));
    }

    #[rstest]
    #[case("column_mapping.json", ".")]
    #[case("config/column_mapping.json", "config")]
    #[case("/etc/migration/column_mapping.json", "/etc/migration")]
    fn bare_file_names_resolve_against_the_working_directory(
        #[case] path: &str,
        #[case] expected: &str,
    ) {
        assert_eq!(parent_directory(Path::new(path)), Path::new(expected));
    }

    #[test]
    fn bare_file_names_are_read_from_the_working_directory() {
        // Tests run from the package root, where the manifest is not a mapping.
        let error = ColumnMapping::load(Path::new("Cargo.toml")).expect_err("not JSON");

        assert!(
            matches!(error, UserRecordSourceError::Mapping { .. }),
            "the file should be found and parsed, got {error:?}"
        );
    }

    #[test]
    fn missing_mapping_files_are_read_errors() {
        let directory = tempfile::tempdir().expect("temp dir");

        let error = ColumnMapping::load(&directory.path().join("absent.json"))
            .expect_err("file is missing");

        assert!(matches!(error, UserRecordSourceError::Read { .. }));
    }
}
