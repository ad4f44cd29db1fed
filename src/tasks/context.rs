//! Per-task file bookkeeping

use crate::file_space::FileSpace;
use std::path::PathBuf;

/// Files a data-table task has created so far.
///
/// At any exit the retained outputs are (edited CSV, attachments zip) when
/// both exist, the raw CSV alone, or nothing; [`cleanup_files`] deletes
/// whatever the context still references. Mutated only by the owning task.
///
/// [`cleanup_files`]: DownloadTaskContext::cleanup_files
#[derive(Debug, Default)]
pub(crate) struct DownloadTaskContext {
    /// Raw CSV exported from the table query
    pub(crate) csv_file: Option<PathBuf>,
    /// Zip of attachments referenced from the CSV
    pub(crate) bulk_download_file: Option<PathBuf>,
    /// CSV rewritten so attachment cells name files inside the zip
    pub(crate) edited_csv_file: Option<PathBuf>,
}

impl DownloadTaskContext {
    /// Delete every referenced file that exists on disk.
    ///
    /// References to files that were never written, or that an earlier
    /// cleanup already removed, are skipped, so calling this twice is a
    /// no-op the second time. Deletion failures are logged and swallowed;
    /// cleanup runs on the task's error path and must not mask the
    /// original error.
    pub(crate) fn cleanup_files(&self, file_space: &dyn FileSpace) {
        let referenced = [
            &self.csv_file,
            &self.bulk_download_file,
            &self.edited_csv_file,
        ];
        for path in referenced.into_iter().flatten() {
            if file_space.exists(path) {
                if let Err(e) = file_space.delete_file(path) {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "failed to delete task file during cleanup"
                    );
                }
            }
        }
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::file_space::InMemoryFileSpace;
    use std::path::Path;

    struct Fixture {
        file_space: InMemoryFileSpace,
        tmp_dir: PathBuf,
        context: DownloadTaskContext,
    }

    impl Fixture {
        fn new() -> Self {
            let file_space = InMemoryFileSpace::new();
            let tmp_dir = file_space.create_temp_dir().unwrap();
            Self {
                file_space,
                tmp_dir,
                context: DownloadTaskContext::default(),
            }
        }

        fn touched_file(&self, name: &str) -> PathBuf {
            let path = self.file_space.new_file(&self.tmp_dir, name);
            self.file_space.write(&path, b"").unwrap();
            path
        }

        fn unwritten_file(&self, name: &str) -> PathBuf {
            self.file_space.new_file(&self.tmp_dir, name)
        }

        /// Run cleanup, then verify only the temp dir remains.
        fn run_and_verify(&self) {
            self.context.cleanup_files(&self.file_space);
            self.file_space.delete_dir(&self.tmp_dir).unwrap();
            assert!(self.file_space.is_empty());
        }
    }

    #[test]
    fn no_files() {
        let fixture = Fixture::new();
        fixture.run_and_verify();
    }

    #[test]
    fn csv_only() {
        let mut fixture = Fixture::new();
        fixture.context.csv_file = Some(fixture.touched_file("csv.csv"));
        fixture.run_and_verify();
    }

    #[test]
    fn csv_and_bulk_download() {
        let mut fixture = Fixture::new();
        fixture.context.csv_file = Some(fixture.touched_file("csv.csv"));
        fixture.context.bulk_download_file = Some(fixture.touched_file("download.zip"));
        fixture.run_and_verify();
    }

    #[test]
    fn csv_and_edited_csv() {
        let mut fixture = Fixture::new();
        fixture.context.csv_file = Some(fixture.touched_file("csv.csv"));
        fixture.context.edited_csv_file = Some(fixture.touched_file("csv-edited.csv"));
        fixture.run_and_verify();
    }

    #[test]
    fn all_three_files() {
        let mut fixture = Fixture::new();
        fixture.context.csv_file = Some(fixture.touched_file("csv.csv"));
        fixture.context.bulk_download_file = Some(fixture.touched_file("download.zip"));
        fixture.context.edited_csv_file = Some(fixture.touched_file("csv-edited.csv"));
        fixture.run_and_verify();
    }

    #[test]
    fn referenced_but_never_written_files_are_skipped() {
        let mut fixture = Fixture::new();
        fixture.context.csv_file = Some(fixture.unwritten_file("csv.csv"));
        fixture.context.bulk_download_file = Some(fixture.unwritten_file("download.zip"));
        fixture.context.edited_csv_file = Some(fixture.unwritten_file("csv-edited.csv"));
        fixture.run_and_verify();
    }

    #[test]
    fn cleanup_twice_is_a_no_op() {
        let mut fixture = Fixture::new();
        fixture.context.csv_file = Some(fixture.touched_file("csv.csv"));
        fixture.context.cleanup_files(&fixture.file_space);
        // Second pass sees no existing files and touches nothing.
        fixture.context.cleanup_files(&fixture.file_space);
        assert!(!fixture
            .file_space
            .exists(Path::new("/in-memory/tmp-1/csv.csv")));
        fixture.run_and_verify();
    }
}
