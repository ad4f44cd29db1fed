//! Request orchestration -- fan-out, gathering, archiving, upload
//!
//! The packager turns one validated request into (at most) one uploaded
//! archive and a pre-signed URL. It owns the request's temp directory for
//! its whole life: created on entry, deleted on every exit path, whether
//! the request succeeds, partially fails, or aborts.

mod gather;

use crate::clock::Clock;
use crate::config::Config;
use crate::error::Result;
use crate::file_space::{random_suffix, FileSpace};
use crate::object_store::ObjectStore;
use crate::poller::JobPoller;
use crate::schema::{SurveyTableSet, TableMapping};
use crate::table_service::TableService;
use crate::tasks::{
    SurveyDownloadParams, SurveyDownloadTask, TableDownloadParams, TableDownloadTask, TaskOutcome,
};
use crate::types::{PackageRequest, PresignedUrlInfo};
use crate::worker_pool::{TaskFuture, WorkerPool};
use crate::zip_helper::ZipHelper;
use gather::{gather_outcomes, write_error_log};
use std::path::Path;
use std::sync::Arc;

/// Archive entry collecting data-table task failures
pub const ERROR_LOG_FILE_NAME: &str = "error.log";
/// Archive entry collecting survey task failures
pub const METADATA_ERROR_LOG_FILE_NAME: &str = "metadata-error.log";

/// Packages one user's study data into a downloadable archive.
///
/// Collaborators are injected so tests can swap in in-memory
/// implementations; see the crate docs for production wiring.
pub struct Packager {
    config: Config,
    file_space: Arc<dyn FileSpace>,
    table_service: Arc<dyn TableService>,
    object_store: Arc<dyn ObjectStore>,
    worker_pool: Arc<dyn WorkerPool>,
    clock: Arc<dyn Clock>,
}

impl Packager {
    /// Create a packager. Fails if the configuration is invalid.
    pub fn new(
        config: Config,
        file_space: Arc<dyn FileSpace>,
        table_service: Arc<dyn TableService>,
        object_store: Arc<dyn ObjectStore>,
        worker_pool: Arc<dyn WorkerPool>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            file_space,
            table_service,
            object_store,
            worker_pool,
            clock,
        })
    }

    /// Package the user's data and return a pre-signed download URL.
    ///
    /// One data-table task runs per entry in `table_to_schema` and one
    /// survey task per id in `survey_table_ids`. Individual task failures
    /// don't fail the request; their errors are collated into log files
    /// inside the archive. Returns `None` when there is no user data to
    /// package (no tables, or every data task came back empty and
    /// error-free).
    pub async fn package_user_data(
        &self,
        table_to_schema: &TableMapping,
        health_code: &str,
        request: &PackageRequest,
        survey_table_ids: &SurveyTableSet,
    ) -> Result<Option<PresignedUrlInfo>> {
        request.validate()?;

        if table_to_schema.is_empty() && survey_table_ids.is_empty() {
            tracing::info!(
                study_id = request.study_id(),
                user_id = request.user_id(),
                "nothing to package, no data tables or survey tables"
            );
            return Ok(None);
        }

        let temp_dir = self.file_space.create_temp_dir()?;
        tracing::info!(
            study_id = request.study_id(),
            user_id = request.user_id(),
            start_date = %request.start_date(),
            end_date = %request.end_date(),
            data_tables = table_to_schema.len(),
            survey_tables = survey_table_ids.len(),
            temp_dir = %temp_dir.display(),
            "packaging user data"
        );

        let result = self
            .package_inner(&temp_dir, table_to_schema, health_code, request, survey_table_ids)
            .await;

        if let Err(e) = self.file_space.delete_dir(&temp_dir) {
            tracing::warn!(
                temp_dir = %temp_dir.display(),
                error = %e,
                "failed to delete request temp directory"
            );
        }

        result
    }

    async fn package_inner(
        &self,
        temp_dir: &Path,
        table_to_schema: &TableMapping,
        health_code: &str,
        request: &PackageRequest,
        survey_table_ids: &SurveyTableSet,
    ) -> Result<Option<PresignedUrlInfo>> {
        // Phase 1: fan out one task per table and join them all
        let tasks =
            self.build_tasks(table_to_schema, health_code, request, survey_table_ids, temp_dir);
        let outcomes = self.worker_pool.run_all(tasks).await?;
        let gathered = gather_outcomes(outcomes);

        // Phase 2: collate failures into the error logs
        let mut archive_files = gathered.data_files;
        if !gathered.data_errors.is_empty() {
            archive_files.push(write_error_log(
                self.file_space.as_ref(),
                temp_dir,
                ERROR_LOG_FILE_NAME,
                &gathered.data_errors,
            )?);
        }
        if !gathered.survey_errors.is_empty() {
            archive_files.push(write_error_log(
                self.file_space.as_ref(),
                temp_dir,
                METADATA_ERROR_LOG_FILE_NAME,
                &gathered.survey_errors,
            )?);
        }

        // Phase 3: with no data files and no failures, there is nothing
        // worth uploading; survey metadata alone is not a user-data archive.
        if archive_files.is_empty() {
            tracing::info!(
                study_id = request.study_id(),
                user_id = request.user_id(),
                "no user data found, skipping upload"
            );
            return Ok(None);
        }
        archive_files.extend(gathered.survey_files);

        // Phase 4: assemble the master archive
        let archive_name = master_archive_name(request);
        let archive_path = self.file_space.new_file(temp_dir, &archive_name);
        ZipHelper::new(Arc::clone(&self.file_space)).zip_files(&archive_files, &archive_path)?;

        // Phase 5: upload and mint the download URL
        let bucket = &self.config.storage.userdata_bucket;
        self.object_store
            .put_file(bucket, &archive_name, &archive_path)
            .await?;

        let expires_at =
            self.clock.now() + chrono::Duration::hours(self.config.storage.url_expiration_hours);
        let url = self
            .object_store
            .generate_presigned_url(bucket, &archive_name, expires_at)
            .await?;

        tracing::info!(
            study_id = request.study_id(),
            user_id = request.user_id(),
            key = %archive_name,
            entries = archive_files.len(),
            expires_at = %expires_at,
            "user data archive uploaded"
        );
        Ok(Some(PresignedUrlInfo { url, expires_at }))
    }

    fn build_tasks(
        &self,
        table_to_schema: &TableMapping,
        health_code: &str,
        request: &PackageRequest,
        survey_table_ids: &SurveyTableSet,
        temp_dir: &Path,
    ) -> Vec<TaskFuture> {
        let poller = JobPoller::from_config(&self.config.poll);
        let mut tasks: Vec<TaskFuture> =
            Vec::with_capacity(table_to_schema.len() + survey_table_ids.len());

        for (table_id, schema) in table_to_schema.iter() {
            let task = TableDownloadTask::new(
                TableDownloadParams {
                    table_id: table_id.clone(),
                    schema: schema.clone(),
                    health_code: health_code.to_string(),
                    start_date: request.start_date(),
                    end_date: request.end_date(),
                    temp_dir: temp_dir.to_path_buf(),
                },
                Arc::clone(&self.file_space),
                Arc::clone(&self.table_service),
                poller,
            );
            let table_id = table_id.clone();
            tasks.push(Box::pin(async move {
                TaskOutcome::Table {
                    table_id,
                    result: task.run().await,
                }
            }));
        }

        for table_id in survey_table_ids {
            let task = SurveyDownloadTask::new(
                SurveyDownloadParams {
                    table_id: table_id.clone(),
                    temp_dir: temp_dir.to_path_buf(),
                },
                Arc::clone(&self.file_space),
                Arc::clone(&self.table_service),
                poller,
            );
            let table_id = table_id.clone();
            tasks.push(Box::pin(async move {
                TaskOutcome::Survey {
                    table_id,
                    result: task.run().await,
                }
            }));
        }

        tasks
    }
}

/// `userdata-<start>-to-<end>-<suffix>.zip`, with a short unguessable suffix
fn master_archive_name(request: &PackageRequest) -> String {
    format!(
        "userdata-{}-to-{}-{}.zip",
        request.start_date(),
        request.end_date(),
        random_suffix()
    )
}
