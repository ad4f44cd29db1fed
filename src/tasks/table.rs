//! Data-table download task -- scoped CSV export plus attachment handling

use super::context::DownloadTaskContext;
use super::{export_query_to_file_handle, run_bulk_download, TableDownloadResult};
use crate::error::Result;
use crate::file_space::FileSpace;
use crate::poller::JobPoller;
use crate::schema::UploadSchema;
use crate::table_service::{BulkDownloadRequest, BulkDownloadResponse, TableService};
use chrono::NaiveDate;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Parameters for one data-table download
#[derive(Clone, Debug)]
pub struct TableDownloadParams {
    /// Remote table to query
    pub table_id: String,
    /// Schema describing the table's columns
    pub schema: UploadSchema,
    /// Health code keying the user's rows
    pub health_code: String,
    /// Start of the inclusive date range
    pub start_date: NaiveDate,
    /// End of the inclusive date range
    pub end_date: NaiveDate,
    /// Request temp directory all files are written into
    pub temp_dir: PathBuf,
}

/// One-shot task that downloads a user's rows from one data table.
///
/// The task exports the subset of the table belonging to the health code
/// within the date range. When the schema declares attachment columns and
/// any exported row references a file handle, the referenced attachments
/// are fetched in bulk as a zip and the CSV is rewritten so attachment
/// cells name local files inside that zip, making the archive
/// self-contained.
pub struct TableDownloadTask {
    params: TableDownloadParams,
    file_space: Arc<dyn FileSpace>,
    table_service: Arc<dyn TableService>,
    poller: JobPoller,
}

/// What a single pass over the raw CSV found
struct CsvScan {
    data_rows: usize,
    attachment_columns: Vec<usize>,
    file_handle_ids: BTreeSet<String>,
}

impl TableDownloadTask {
    /// Create a task for the given table.
    pub fn new(
        params: TableDownloadParams,
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

    /// Execute the task.
    ///
    /// On any error, every file the task has created so far is deleted
    /// before the error propagates.
    pub async fn run(self) -> Result<TableDownloadResult> {
        let mut context = DownloadTaskContext::default();
        match self.run_inner(&mut context).await {
            Ok(result) => Ok(result),
            Err(e) => {
                tracing::warn!(
                    table_id = %self.params.table_id,
                    error = %e,
                    "table download failed, cleaning up task files"
                );
                context.cleanup_files(self.file_space.as_ref());
                Err(e)
            }
        }
    }

    async fn run_inner(&self, context: &mut DownloadTaskContext) -> Result<TableDownloadResult> {
        let table_id = &self.params.table_id;

        // Phase 1: export the scoped query and download the CSV
        let query = self.build_query();
        let file_handle_id =
            export_query_to_file_handle(&self.table_service, &self.poller, &query, table_id)
                .await?;
        let csv_path = self
            .file_space
            .new_file(&self.params.temp_dir, &format!("{table_id}.csv"));
        context.csv_file = Some(csv_path.clone());
        self.table_service
            .download_file_handle(&file_handle_id, &csv_path)
            .await?;

        // Phase 2: scan for rows and attachment references
        let attachment_fields = self.params.schema.attachment_field_names();
        let scan = scan_csv(self.file_space.as_ref(), &csv_path, &attachment_fields)?;

        if scan.data_rows == 0 {
            tracing::info!(table_id = %table_id, "query returned no rows, discarding empty export");
            self.file_space.delete_file(&csv_path)?;
            context.csv_file = None;
            return Ok(TableDownloadResult::default());
        }

        if scan.file_handle_ids.is_empty() {
            return Ok(TableDownloadResult {
                csv_file: Some(csv_path),
                bulk_download_file: None,
            });
        }

        tracing::info!(
            table_id = %table_id,
            rows = scan.data_rows,
            attachments = scan.file_handle_ids.len(),
            "table references attachments, starting bulk download"
        );

        // Phase 3: bulk-download the referenced attachments
        let bulk_request = BulkDownloadRequest {
            table_id: table_id.clone(),
            file_handle_ids: scan.file_handle_ids.iter().cloned().collect(),
        };
        let bulk_response =
            run_bulk_download(&self.table_service, &self.poller, &bulk_request).await?;
        let bulk_path = self
            .file_space
            .new_file(&self.params.temp_dir, &format!("{table_id}-attachments.zip"));
        context.bulk_download_file = Some(bulk_path.clone());
        self.table_service
            .download_file_handle(&bulk_response.result_zip_file_handle_id, &bulk_path)
            .await?;

        // Phase 4: rewrite attachment cells to local paths inside the zip
        let edited_path = self
            .file_space
            .new_file(&self.params.temp_dir, &format!("{table_id}-edited.csv"));
        context.edited_csv_file = Some(edited_path.clone());
        rewrite_attachment_cells(
            self.file_space.as_ref(),
            &csv_path,
            &edited_path,
            &scan.attachment_columns,
            &bulk_response,
        )?;

        // The raw CSV is superseded by the edited one.
        self.file_space.delete_file(&csv_path)?;
        context.csv_file = None;

        Ok(TableDownloadResult {
            csv_file: Some(edited_path),
            bulk_download_file: Some(bulk_path),
        })
    }

    fn build_query(&self) -> String {
        format!(
            "SELECT * FROM {} WHERE healthCode='{}' AND uploadDate >= '{}' AND uploadDate <= '{}'",
            self.params.table_id,
            self.params.health_code,
            self.params.start_date,
            self.params.end_date,
        )
    }
}

/// Single pass over the raw CSV: count data rows, locate attachment columns
/// by header name, and collect the file-handle ids they reference.
fn scan_csv(
    file_space: &dyn FileSpace,
    csv_path: &Path,
    attachment_fields: &HashSet<&str>,
) -> Result<CsvScan> {
    let mut reader = csv::Reader::from_reader(file_space.reader(csv_path)?);

    let mut attachment_columns = Vec::new();
    if !attachment_fields.is_empty() {
        for (index, column) in reader.headers()?.iter().enumerate() {
            if attachment_fields.contains(column) {
                attachment_columns.push(index);
            }
        }
    }

    let mut data_rows = 0;
    let mut file_handle_ids = BTreeSet::new();
    for record in reader.records() {
        let record = record?;
        data_rows += 1;
        for &index in &attachment_columns {
            if let Some(cell) = record.get(index) {
                if !cell.is_empty() {
                    file_handle_ids.insert(cell.to_string());
                }
            }
        }
    }

    Ok(CsvScan {
        data_rows,
        attachment_columns,
        file_handle_ids,
    })
}

/// Stream the raw CSV into the edited CSV, replacing attachment cells with
/// the bulk response's zip entry paths (or a failure placeholder).
fn rewrite_attachment_cells(
    file_space: &dyn FileSpace,
    raw_path: &Path,
    edited_path: &Path,
    attachment_columns: &[usize],
    bulk_response: &BulkDownloadResponse,
) -> Result<()> {
    let mut replacements: HashMap<&str, String> = HashMap::new();
    for summary in &bulk_response.files {
        let replacement = match &summary.zip_entry_name {
            Some(entry) => entry.clone(),
            None => format!(
                "[failed: {}]",
                summary.failure_code.as_deref().unwrap_or("UNKNOWN")
            ),
        };
        replacements.insert(summary.file_handle_id.as_str(), replacement);
    }

    let mut reader = csv::Reader::from_reader(file_space.reader(raw_path)?);
    let headers = reader.headers()?.clone();

    let mut writer = csv::Writer::from_writer(file_space.writer(edited_path)?);
    writer.write_record(&headers)?;

    for record in reader.records() {
        let record = record?;
        let mut row: Vec<String> = record.iter().map(str::to_string).collect();
        for &index in attachment_columns {
            if let Some(cell) = row.get_mut(index) {
                if cell.is_empty() {
                    continue;
                }
                let replacement = replacements.get(cell.as_str()).cloned();
                if let Some(replacement) = replacement {
                    *cell = replacement;
                }
            }
        }
        writer.write_record(&row)?;
    }

    writer.flush()?;
    Ok(())
}
