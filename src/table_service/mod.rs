//! Remote table service client
//!
//! The table service hosts the study's data and survey tables. Queries are
//! exported to CSV through asynchronous jobs (start returns a token, poll
//! returns the result once ready), and attachments referenced from table
//! cells are fetched in bulk as a single zip. [`TableService`] is the seam
//! the download tasks run against; [`RestTableService`] is the production
//! HTTP implementation.

mod rest;

pub use rest::RestTableService;

use crate::error::Result;
use crate::poller::PollState;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A resolved table entity
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableEntity {
    /// Remote table id
    pub id: String,
    /// Human-readable display name
    pub name: String,
}

/// Result of a finished CSV export job
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CsvExportResult {
    /// File handle holding the query results in CSV form
    pub results_file_handle_id: String,
}

/// Request for a bulk download of file handles associated with a table
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkDownloadRequest {
    /// Table the file handles are associated with
    pub table_id: String,
    /// File handles to download
    pub file_handle_ids: Vec<String>,
}

/// Per-handle outcome inside a bulk download response
///
/// Exactly one of `zip_entry_name` and `failure_code` is set: either the
/// file made it into the zip at that entry path, or it failed with a code.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileSummary {
    /// The requested file handle
    pub file_handle_id: String,
    /// Path of the file inside the result zip, when the download succeeded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zip_entry_name: Option<String>,
    /// Failure code, when the download failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_code: Option<String>,
}

/// Result of a finished bulk download job
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkDownloadResponse {
    /// File handle of the zip containing the downloaded files
    pub result_zip_file_handle_id: String,
    /// Outcome for each requested file handle
    pub files: Vec<FileSummary>,
}

/// Client for the remote table service. Thread-safe; calls are stateless.
#[async_trait]
pub trait TableService: Send + Sync {
    /// Resolve a table entity (id and display name).
    async fn get_table(&self, table_id: &str) -> Result<TableEntity>;

    /// Start an asynchronous CSV export of a query. Returns a job token.
    ///
    /// The export writes a header row and omits row id/version metadata.
    async fn start_csv_export(&self, query: &str, table_id: &str) -> Result<String>;

    /// Poll a CSV export job by token.
    async fn poll_csv_export(
        &self,
        job_token: &str,
        table_id: &str,
    ) -> Result<PollState<CsvExportResult>>;

    /// Download a file handle's content to a local path.
    async fn download_file_handle(&self, file_handle_id: &str, dest: &Path) -> Result<()>;

    /// Start an asynchronous bulk download of file handles. Returns a job token.
    async fn start_bulk_download(&self, request: &BulkDownloadRequest) -> Result<String>;

    /// Poll a bulk download job by token.
    async fn poll_bulk_download(&self, job_token: &str) -> Result<PollState<BulkDownloadResponse>>;
}
