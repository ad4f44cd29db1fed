//! # userdata-packager
//!
//! Backend library that packages one study participant's data -- rows from
//! many remote tabular tables plus any binary attachments they reference,
//! and survey metadata tables -- into a single zip archive, uploads it to
//! object storage, and returns a time-limited pre-signed download URL.
//!
//! ## Design Philosophy
//!
//! - **Library-first** - No CLI or server, purely a Rust crate for embedding
//!   in a request-processing worker
//! - **Partial success is the happy path** - One table's failure never
//!   cancels the others; failures become error logs inside the archive
//! - **No residue** - The per-request temp directory is deleted on every
//!   exit path, success or failure
//! - **Swappable seams** - Filesystem, table service, object store, worker
//!   pool, and clock are all injected traits, so the core is fully
//!   testable in memory
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use userdata_packager::{
//!     BoundedWorkerPool, Config, DiskFileSpace, PackageRequest, Packager, RestTableService,
//!     S3ObjectStore, SurveyTableSet, SystemClock, TableMapping,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut config = Config::default();
//!     config.storage.userdata_bucket = "org-userdata".to_string();
//!
//!     let file_space = Arc::new(DiskFileSpace::new(config.packager.temp_root.clone()));
//!     let table_service = Arc::new(RestTableService::new(
//!         "https://tables.example.org/api/",
//!         file_space.clone(),
//!     )?);
//!     let object_store = Arc::new(S3ObjectStore::new().await);
//!     let worker_pool = Arc::new(BoundedWorkerPool::new(config.packager.max_concurrent_tasks));
//!
//!     let packager = Packager::new(
//!         config,
//!         file_space,
//!         table_service,
//!         object_store,
//!         worker_pool,
//!         Arc::new(SystemClock),
//!     )?;
//!
//!     let request: PackageRequest = serde_json::from_str(
//!         r#"{"studyId":"sleep-study","userId":"user-123",
//!             "startDate":"2026-01-01","endDate":"2026-01-31"}"#,
//!     )?;
//!     let url_info = packager
//!         .package_user_data(
//!             &TableMapping::new(),
//!             "participant-health-code",
//!             &request,
//!             &SurveyTableSet::new(),
//!         )
//!         .await?;
//!     println!("{url_info:?}");
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Clock abstraction for URL expiration
pub mod clock;
/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// Working-directory abstraction
pub mod file_space;
/// Object storage for the finished archive
pub mod object_store;
/// Request orchestration (decomposed into focused submodules)
pub mod packager;
/// Bounded polling for remote asynchronous jobs
pub mod poller;
/// Upload schemas and table-to-schema resolution
pub mod schema;
/// Remote table service client
pub mod table_service;
/// Per-table download tasks
pub mod tasks;
/// Core request and result types
pub mod types;
/// Worker pool for download tasks
pub mod worker_pool;
/// Master archive assembly
pub mod zip_helper;

// Re-export commonly used types
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{Config, PackagerConfig, PollConfig, StorageConfig};
pub use error::{Error, Result};
pub use file_space::{DiskFileSpace, FileSpace, InMemoryFileSpace};
pub use object_store::{InMemoryObjectStore, ObjectStore, S3ObjectStore};
pub use packager::{Packager, ERROR_LOG_FILE_NAME, METADATA_ERROR_LOG_FILE_NAME};
pub use poller::{JobPoller, PollState};
pub use schema::{
    FieldDefinition, FieldType, SchemaKey, SurveyTableSet, TableMapping, UploadSchema,
};
pub use table_service::{
    BulkDownloadRequest, BulkDownloadResponse, CsvExportResult, FileSummary, RestTableService,
    TableEntity, TableService,
};
pub use tasks::{
    SurveyDownloadParams, SurveyDownloadTask, TableDownloadParams, TableDownloadResult,
    TableDownloadTask, TaskOutcome,
};
pub use types::{AccountInfo, PackageRequest, PresignedUrlInfo};
pub use worker_pool::{BoundedWorkerPool, TaskFuture, WorkerPool};
pub use zip_helper::ZipHelper;
