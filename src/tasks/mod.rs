//! Per-table download tasks
//!
//! Split into focused submodules:
//! - [`context`] - per-task file bookkeeping and cleanup
//! - [`survey`] - one-shot survey metadata download
//! - [`table`] - scoped data-table download with attachment handling
//!
//! Each task is independent: it talks to the table service, writes only
//! files it created inside the request's temp directory, and either returns
//! its output files to the packager or deletes everything it wrote.

mod context;
mod survey;
mod table;

pub use survey::{SurveyDownloadParams, SurveyDownloadTask};
pub use table::{TableDownloadParams, TableDownloadTask};

use crate::error::Result;
use crate::poller::JobPoller;
use crate::table_service::{BulkDownloadRequest, BulkDownloadResponse, TableService};
use std::path::PathBuf;
use std::sync::Arc;

/// Output of a finished data-table task
///
/// Either both files are present (CSV rewritten against a companion
/// attachments zip), only the CSV is (no attachments referenced), or
/// neither is (the query matched no rows).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TableDownloadResult {
    /// The exported (possibly rewritten) CSV
    pub csv_file: Option<PathBuf>,
    /// Zip of attachments referenced from the CSV
    pub bulk_download_file: Option<PathBuf>,
}

impl TableDownloadResult {
    /// Files to include in the master archive
    pub fn files(&self) -> impl Iterator<Item = &PathBuf> {
        self.csv_file.iter().chain(self.bulk_download_file.iter())
    }
}

/// Joined result of one submitted task, tagged with its table id
#[derive(Debug)]
pub enum TaskOutcome {
    /// A data-table task finished
    Table {
        /// Remote table the task ran against
        table_id: String,
        /// Task result or error
        result: Result<TableDownloadResult>,
    },
    /// A survey-metadata task finished
    Survey {
        /// Remote table the task ran against
        table_id: String,
        /// Downloaded CSV path or error
        result: Result<PathBuf>,
    },
}

/// Run a CSV export job to completion and return the result's file handle.
pub(crate) async fn export_query_to_file_handle(
    table_service: &Arc<dyn TableService>,
    poller: &JobPoller,
    query: &str,
    table_id: &str,
) -> Result<String> {
    let job_token = table_service.start_csv_export(query, table_id).await?;
    let result = poller
        .poll(|| {
            let table_service = Arc::clone(table_service);
            let job_token = job_token.clone();
            let table_id = table_id.to_string();
            async move { table_service.poll_csv_export(&job_token, &table_id).await }
        })
        .await?;
    Ok(result.results_file_handle_id)
}

/// Run a bulk attachment download job to completion.
pub(crate) async fn run_bulk_download(
    table_service: &Arc<dyn TableService>,
    poller: &JobPoller,
    request: &BulkDownloadRequest,
) -> Result<BulkDownloadResponse> {
    let job_token = table_service.start_bulk_download(request).await?;
    poller
        .poll(|| {
            let table_service = Arc::clone(table_service);
            let job_token = job_token.clone();
            async move { table_service.poll_bulk_download(&job_token).await }
        })
        .await
}
