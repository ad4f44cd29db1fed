//! HTTP implementation of the table service client

use super::{
    BulkDownloadRequest, BulkDownloadResponse, CsvExportResult, TableEntity, TableService,
};
use crate::error::{Error, Result};
use crate::file_space::FileSpace;
use crate::poller::PollState;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use url::Url;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CsvExportBody<'a> {
    sql: &'a str,
    write_header: bool,
    include_row_metadata: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobToken {
    job_token: String,
}

/// [`TableService`] backed by the table service's REST API.
///
/// Asynchronous jobs respond with HTTP 202 while still running, which maps
/// to [`PollState::NotReady`]. File downloads are streamed chunk by chunk
/// through a [`FileSpace`] writer.
pub struct RestTableService {
    client: reqwest::Client,
    base_url: Url,
    file_space: Arc<dyn FileSpace>,
}

impl RestTableService {
    /// Create a client against `base_url` (e.g. `https://tables.example.org/api/`).
    pub fn new(base_url: &str, file_space: Arc<dyn FileSpace>) -> Result<Self> {
        let base_url = Url::parse(base_url).map_err(|e| Error::Config {
            message: format!("invalid table service base URL: {e}"),
            key: Some("table_service.base_url".into()),
        })?;
        Ok(Self {
            client: reqwest::Client::new(),
            base_url,
            file_space,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| Error::Internal(format!("invalid endpoint path {path}: {e}")))
    }
}

#[async_trait]
impl TableService for RestTableService {
    async fn get_table(&self, table_id: &str) -> Result<TableEntity> {
        let url = self.endpoint(&format!("tables/{table_id}"))?;
        let response = self.client.get(url).send().await?.error_for_status()?;
        Ok(response.json().await?)
    }

    async fn start_csv_export(&self, query: &str, table_id: &str) -> Result<String> {
        let url = self.endpoint(&format!("tables/{table_id}/csv-export"))?;
        let body = CsvExportBody {
            sql: query,
            write_header: true,
            include_row_metadata: false,
        };
        let response = self
            .client
            .post(url)
            .json(&body)
            .send()
            .await?
            .error_for_status()?;
        let token: JobToken = response.json().await?;
        Ok(token.job_token)
    }

    async fn poll_csv_export(
        &self,
        job_token: &str,
        table_id: &str,
    ) -> Result<PollState<CsvExportResult>> {
        let url = self.endpoint(&format!("tables/{table_id}/csv-export/{job_token}"))?;
        let response = self.client.get(url).send().await?;
        if response.status() == StatusCode::ACCEPTED {
            return Ok(PollState::NotReady);
        }
        let response = response.error_for_status()?;
        Ok(PollState::Ready(response.json().await?))
    }

    async fn download_file_handle(&self, file_handle_id: &str, dest: &Path) -> Result<()> {
        let url = self.endpoint(&format!("file-handles/{file_handle_id}/content"))?;
        let mut response = self.client.get(url).send().await?.error_for_status()?;

        let mut writer = self.file_space.writer(dest)?;
        let mut bytes_written = 0u64;
        while let Some(chunk) = response.chunk().await? {
            writer.write_all(&chunk)?;
            bytes_written += chunk.len() as u64;
        }
        writer.flush()?;

        tracing::debug!(
            file_handle_id,
            dest = %dest.display(),
            bytes = bytes_written,
            "downloaded file handle"
        );
        Ok(())
    }

    async fn start_bulk_download(&self, request: &BulkDownloadRequest) -> Result<String> {
        let url = self.endpoint("file-handles/bulk-download")?;
        let response = self
            .client
            .post(url)
            .json(request)
            .send()
            .await?
            .error_for_status()?;
        let token: JobToken = response.json().await?;
        Ok(token.job_token)
    }

    async fn poll_bulk_download(&self, job_token: &str) -> Result<PollState<BulkDownloadResponse>> {
        let url = self.endpoint(&format!("file-handles/bulk-download/{job_token}"))?;
        let response = self.client.get(url).send().await?;
        if response.status() == StatusCode::ACCEPTED {
            return Ok(PollState::NotReady);
        }
        let response = response.error_for_status()?;
        Ok(PollState::Ready(response.json().await?))
    }
}
