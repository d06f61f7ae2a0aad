//! Catalog of asynchronous job types.

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::TransportError;

/// Category of asynchronous work submitted to the platform.
///
/// Only used for routing inside a transport and for log/error messages; the
/// orchestrator attaches no behavior to it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    TableQuery,
    TableQueryNextPage,
    TableTransaction,
    TableAppendRowSet,
    TableCsvUpload,
    TableCsvUploadPreview,
    TableCsvDownload,
    BulkFileDownload,
    AddToDownloadList,
    QueryDownloadList,
    DownloadListManifest,
    DownloadPackageList,
    CreateJsonSchema,
    GetValidationSchema,
    ViewColumnModelRequest,
    DoiMint,
    S3FileCopy,
    MigrationBackup,
    MigrationRestore,
    /// Job type outside the catalog, identified by a non-empty name.
    Custom {
        #[serde(deserialize_with = "non_empty_kind")]
        kind: String,
    },
}

impl JobKind {
    /// Build a job type outside the catalog. Blank names are rejected.
    pub fn custom(kind: impl Into<String>) -> Result<Self, TransportError> {
        let kind = kind.into();
        if kind.trim().is_empty() {
            return Err(TransportError::BadRequest("empty job kind".into()));
        }
        Ok(Self::Custom { kind })
    }

    pub fn type_name(&self) -> &str {
        match self {
            JobKind::TableQuery => "table_query",
            JobKind::TableQueryNextPage => "table_query_next_page",
            JobKind::TableTransaction => "table_transaction",
            JobKind::TableAppendRowSet => "table_append_row_set",
            JobKind::TableCsvUpload => "table_csv_upload",
            JobKind::TableCsvUploadPreview => "table_csv_upload_preview",
            JobKind::TableCsvDownload => "table_csv_download",
            JobKind::BulkFileDownload => "bulk_file_download",
            JobKind::AddToDownloadList => "add_to_download_list",
            JobKind::QueryDownloadList => "query_download_list",
            JobKind::DownloadListManifest => "download_list_manifest",
            JobKind::DownloadPackageList => "download_package_list",
            JobKind::CreateJsonSchema => "create_json_schema",
            JobKind::GetValidationSchema => "get_validation_schema",
            JobKind::ViewColumnModelRequest => "view_column_model_request",
            JobKind::DoiMint => "doi_mint",
            JobKind::S3FileCopy => "s3_file_copy",
            JobKind::MigrationBackup => "migration_backup",
            JobKind::MigrationRestore => "migration_restore",
            JobKind::Custom { kind } => kind,
        }
    }

    /// Table-backed jobs may answer "table unavailable" while the index builds.
    pub fn is_table_job(&self) -> bool {
        matches!(
            self,
            JobKind::TableQuery
                | JobKind::TableQueryNextPage
                | JobKind::TableTransaction
                | JobKind::TableAppendRowSet
                | JobKind::TableCsvUpload
                | JobKind::TableCsvUploadPreview
                | JobKind::TableCsvDownload
        )
    }
}

fn non_empty_kind<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let kind = String::deserialize(deserializer)?;
    if kind.trim().is_empty() {
        return Err(serde::de::Error::custom("empty job kind"));
    }
    Ok(kind)
}

impl core::fmt::Display for JobKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.type_name())
    }
}
