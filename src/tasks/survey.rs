//! Survey metadata download task

use super::export_query_to_file_handle;
use crate::error::Result;
use crate::file_space::FileSpace;
use crate::poller::JobPoller;
use crate::table_service::TableService;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

/// Parameters for one survey download
#[derive(Clone, Debug)]
pub struct SurveyDownloadParams {
    /// Remote table holding the survey metadata
    pub table_id: String,
    /// Request temp directory the CSV is written into
    pub temp_dir: PathBuf,
}

/// One-shot task that downloads a survey metadata table as CSV.
///
/// The whole table is exported (`SELECT * FROM <tableId>`) and written to
/// `<tempDir>/<tableName>.csv`, named after the table's display name.
pub struct SurveyDownloadTask {
    params: SurveyDownloadParams,
    file_space: Arc<dyn FileSpace>,
    table_service: Arc<dyn TableService>,
    poller: JobPoller,
}

impl SurveyDownloadTask {
    /// Create a task for the given survey table.
    pub fn new(
        params: SurveyDownloadParams,
        file_space: Arc<dyn FileSpace>,
        table_service: Arc<dyn TableService>,
        poller: JobPoller,
    ) -> Self {
        Self {
            params,
            file_space,
            table_service,
            poller,
        }
    }

    /// Execute the task, returning the downloaded CSV path.
    ///
    /// If anything fails after the target file may have been created, the
    /// file is deleted before the error propagates.
    pub async fn run(self) -> Result<PathBuf> {
        let table_id = &self.params.table_id;

        let table = self.table_service.get_table(table_id).await?;
        let survey_file = self
            .file_space
            .new_file(&self.params.temp_dir, &format!("{}.csv", table.name));

        let start = Instant::now();
        let download_result = self.download_survey(&survey_file).await;
        let duration_ms = start.elapsed().as_secs_f64() * 1000.0;

        match download_result {
            Ok(()) => {
                tracing::info!(
                    table_id = %table_id,
                    file = %survey_file.display(),
                    duration_ms,
                    "downloaded survey table"
                );
                Ok(survey_file)
            }
            Err(e) => {
                tracing::info!(
                    table_id = %table_id,
                    file = %survey_file.display(),
                    duration_ms,
                    "survey table download failed"
                );
                // The download may have written part of the file before failing.
                if self.file_space.exists(&survey_file) {
                    if let Err(delete_err) = self.file_space.delete_file(&survey_file) {
                        tracing::warn!(
                            file = %survey_file.display(),
                            error = %delete_err,
                            "failed to delete partial survey file"
                        );
                    }
                }
                Err(e)
            }
        }
    }

    async fn download_survey(&self, dest: &Path) -> Result<()> {
        // We want the whole survey table.
        let query = format!("SELECT * FROM {}", self.params.table_id);
        let file_handle_id = export_query_to_file_handle(
            &self.table_service,
            &self.poller,
            &query,
            &self.params.table_id,
        )
        .await?;
        self.table_service
            .download_file_handle(&file_handle_id, dest)
            .await
    }
}
