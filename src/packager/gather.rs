//! Outcome gathering and error-log collation

use crate::error::{Error, Result};
use crate::file_space::FileSpace;
use crate::tasks::TaskOutcome;
use std::path::{Path, PathBuf};

/// Joined task outcomes, split into files and error buffers
pub(crate) struct GatheredOutcomes {
    pub(crate) data_files: Vec<PathBuf>,
    pub(crate) survey_files: Vec<PathBuf>,
    pub(crate) data_errors: Vec<(String, Error)>,
    pub(crate) survey_errors: Vec<(String, Error)>,
}

/// Sort every outcome into the file lists and error buffers.
///
/// A failed task contributes its table id and error; a successful task
/// contributes whatever files it produced (possibly none). Buffers are
/// sorted by table id so log contents don't depend on completion order.
pub(crate) fn gather_outcomes(outcomes: Vec<TaskOutcome>) -> GatheredOutcomes {
    let mut gathered = GatheredOutcomes {
        data_files: Vec::new(),
        survey_files: Vec::new(),
        data_errors: Vec::new(),
        survey_errors: Vec::new(),
    };

    for outcome in outcomes {
        match outcome {
            TaskOutcome::Table { table_id, result } => match result {
                Ok(result) => gathered.data_files.extend(result.files().cloned()),
                Err(e) => {
                    tracing::error!(table_id = %table_id, error = %e, "data table download failed");
                    gathered.data_errors.push((table_id, e));
                }
            },
            TaskOutcome::Survey { table_id, result } => match result {
                Ok(file) => gathered.survey_files.push(file),
                Err(e) => {
                    tracing::error!(table_id = %table_id, error = %e, "survey table download failed");
                    gathered.survey_errors.push((table_id, e));
                }
            },
        }
    }

    gathered.data_files.sort();
    gathered.survey_files.sort();
    gathered.data_errors.sort_by(|a, b| a.0.cmp(&b.0));
    gathered.survey_errors.sort_by(|a, b| a.0.cmp(&b.0));
    gathered
}

/// Render the error buffer as human-readable text.
///
/// One block per failure: a header naming the table, the error message,
/// and the error's debug form, separated by blank lines. Not a stable
/// machine-readable format.
pub(crate) fn format_error_log(entries: &[(String, Error)]) -> String {
    let mut content = String::new();
    for (table_id, error) in entries {
        content.push_str(&format!(
            "Error downloading table {table_id}:\n{error}\n{error:?}\n\n"
        ));
    }
    content
}

/// Write the error buffer to a named file inside the temp directory.
pub(crate) fn write_error_log(
    file_space: &dyn FileSpace,
    temp_dir: &Path,
    file_name: &str,
    entries: &[(String, Error)],
) -> Result<PathBuf> {
    let path = file_space.new_file(temp_dir, file_name);
    file_space.write(&path, format_error_log(entries).as_bytes())?;
    tracing::info!(
        file = %path.display(),
        failures = entries.len(),
        "wrote error log"
    );
    Ok(path)
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::TableDownloadResult;

    #[test]
    fn error_log_names_every_failed_table() {
        let entries = vec![
            (
                "error-table-1".to_string(),
                Error::Service("test exception 1".into()),
            ),
            (
                "error-table-2".to_string(),
                Error::Service("test exception 2".into()),
            ),
        ];
        let content = format_error_log(&entries);
        assert!(content.contains("Error downloading table error-table-1:"));
        assert!(content.contains("test exception 1"));
        assert!(content.contains("Error downloading table error-table-2:"));
        assert!(content.contains("test exception 2"));
    }

    #[test]
    fn gather_splits_files_and_errors_by_task_kind() {
        let outcomes = vec![
            TaskOutcome::Table {
                table_id: "t1".into(),
                result: Ok(TableDownloadResult {
                    csv_file: Some("t1-edited.csv".into()),
                    bulk_download_file: Some("t1-attachments.zip".into()),
                }),
            },
            TaskOutcome::Table {
                table_id: "t2".into(),
                result: Ok(TableDownloadResult::default()),
            },
            TaskOutcome::Table {
                table_id: "t3".into(),
                result: Err(Error::Service("boom".into())),
            },
            TaskOutcome::Survey {
                table_id: "s1".into(),
                result: Ok("s1.csv".into()),
            },
            TaskOutcome::Survey {
                table_id: "s2".into(),
                result: Err(Error::Timeout { tries: 3 }),
            },
        ];

        let gathered = gather_outcomes(outcomes);
        assert_eq!(
            gathered.data_files,
            [PathBuf::from("t1-attachments.zip"), PathBuf::from("t1-edited.csv")]
        );
        assert_eq!(gathered.survey_files, [PathBuf::from("s1.csv")]);
        assert_eq!(gathered.data_errors.len(), 1);
        assert_eq!(gathered.data_errors[0].0, "t3");
        assert_eq!(gathered.survey_errors.len(), 1);
        assert_eq!(gathered.survey_errors[0].0, "s2");
    }

    #[test]
    fn gathered_buffers_are_sorted_by_table_id() {
        let outcomes = vec![
            TaskOutcome::Table {
                table_id: "zz".into(),
                result: Err(Error::Service("late".into())),
            },
            TaskOutcome::Table {
                table_id: "aa".into(),
                result: Err(Error::Service("early".into())),
            },
        ];
        let gathered = gather_outcomes(outcomes);
        assert_eq!(gathered.data_errors[0].0, "aa");
        assert_eq!(gathered.data_errors[1].0, "zz");
    }
}
