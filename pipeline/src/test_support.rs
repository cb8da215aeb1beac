//! Test utilities for the migration crate.
//!
//! Shared doubles for unit tests (in `src/`) and integration tests (in
//! `tests/`). Compiled for tests and behind the `test-support` feature.

pub mod cap_fs {
    //! Capability-safe filesystem helpers for tests.
    //!
    //! The crate avoids direct `std::fs` calls. These helpers write fixture
    //! files through `cap_std::fs::Dir` so test suites share one policy.

    use std::ffi::OsString;
    use std::io;
    use std::path::Path;

    use cap_std::{ambient_authority, fs::Dir};

    /// Write bytes to a file through `cap_std`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use user_migration::test_support::cap_fs::write_file;
    ///
    /// let path = std::env::temp_dir().join("cap-fs-write-example.csv");
    /// write_file(&path, b"email\nada@example.com\n")?;
    /// # Ok::<(), std::io::Error>(())
    /// ```
    pub fn write_file(path: &Path, contents: &[u8]) -> io::Result<()> {
        let (parent, file_name) = parent_and_file_name(path)?;
        let directory = Dir::open_ambient_dir(parent, ambient_authority())?;
        directory.write(Path::new(&file_name), contents)
    }

    fn parent_and_file_name(path: &Path) -> io::Result<(&Path, OsString)> {
        let parent = path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let file_name = path.file_name().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                "path must include a file name",
            )
        })?;
        Ok((parent, file_name.to_os_string()))
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn bare_file_names_use_the_working_directory() {
            let (parent, file_name) =
                parent_and_file_name(Path::new("users.csv")).expect("file name present");
            assert_eq!(parent, Path::new("."));
            assert_eq!(file_name, OsString::from("users.csv"));
        }
    }
}

pub mod clock;
pub mod geolocation;
pub mod user_store;

pub use clock::FixedClock;
pub use geolocation::{ImmediateSleeper, RecordingSleeper, ScriptedGeolocationSource};
pub use user_store::{InMemoryUserStore, StoreOperation, new_user};
