//! Job manifests: one JSON record per upload under `uploads/jobs/{jobId}.json`.
//!
//! The manifest is a side record. Retrieval never reads it; the directory
//! tree stays the source of truth for what exists.

use crate::config::ServerConfig;
use crate::error::ConvertError;
use crate::pipeline::render::{PageOutcome, PageSetReport};
use crate::storage::UploadedFile;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;
use uuid::Uuid;

/// State of one pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageStatus {
    Pending,
    Done,
    Failed,
    Skipped,
}

/// The three stages every job passes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Upload,
    Pdf,
    Rasterize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stages {
    pub upload: StageStatus,
    pub pdf: StageStatus,
    pub rasterize: StageStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobManifest {
    pub job_id: Uuid,
    pub original_name: String,
    pub stored_path: PathBuf,
    pub base_name: String,
    pub pdf_path: Option<PathBuf>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub stages: Stages,
    pub pages: Vec<PageOutcome>,
    /// Message of the error that ended the job, if it failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl JobManifest {
    /// A fresh manifest for a stored upload: upload done, everything else pending.
    pub fn new(job_id: Uuid, upload: &UploadedFile) -> Self {
        let now = Utc::now();
        Self {
            job_id,
            original_name: upload.original_name.clone(),
            stored_path: upload.stored_path.clone(),
            base_name: upload.base_name(),
            pdf_path: None,
            created_at: now,
            updated_at: now,
            stages: Stages {
                upload: StageStatus::Done,
                pdf: StageStatus::Pending,
                rasterize: StageStatus::Pending,
            },
            pages: Vec::new(),
            error: None,
        }
    }

    pub fn set_stage(&mut self, stage: Stage, status: StageStatus) {
        let slot = match stage {
            Stage::Upload => &mut self.stages.upload,
            Stage::Pdf => &mut self.stages.pdf,
            Stage::Rasterize => &mut self.stages.rasterize,
        };
        *slot = status;
        self.updated_at = Utc::now();
    }

    pub fn record_pdf(&mut self, path: &Path) {
        self.pdf_path = Some(path.to_path_buf());
        self.set_stage(Stage::Pdf, StageStatus::Done);
    }

    pub fn record_pages(&mut self, report: &PageSetReport) {
        self.pages = report.outcomes.clone();
        let status = if report.is_complete() {
            StageStatus::Done
        } else {
            StageStatus::Failed
        };
        self.set_stage(Stage::Rasterize, status);
    }

    /// Mark `stage` failed and every later pending stage skipped.
    pub fn fail(&mut self, stage: Stage, error: &ConvertError) {
        self.error = Some(error.to_string());
        self.set_stage(stage, StageStatus::Failed);
        if stage == Stage::Pdf && self.stages.rasterize == StageStatus::Pending {
            self.set_stage(Stage::Rasterize, StageStatus::Skipped);
        }
    }

    /// Write the manifest, replacing any previous version atomically.
    pub async fn save(&self, config: &ServerConfig) -> Result<(), ConvertError> {
        let dir = config.jobs_dir();
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| ConvertError::storage(&dir, e))?;

        let json = serde_json::to_vec_pretty(self).map_err(|e| ConvertError::Manifest {
            job_id: self.job_id.to_string(),
            detail: e.to_string(),
        })?;

        let path = manifest_path(config, &self.job_id);
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &json)
            .await
            .map_err(|e| ConvertError::storage(&tmp, e))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| ConvertError::storage(&path, e))?;

        debug!("Saved manifest {}", path.display());
        Ok(())
    }

    /// Load the manifest for `job_id`. Anything that is not a UUID is not found.
    pub async fn load(config: &ServerConfig, job_id: &str) -> Result<Self, ConvertError> {
        let not_found = || ConvertError::JobNotFound {
            job_id: job_id.to_string(),
        };
        let id = Uuid::parse_str(job_id).map_err(|_| not_found())?;

        let path = manifest_path(config, &id);
        let bytes = match tokio::fs::read(&path).await {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(not_found()),
            Err(e) => return Err(ConvertError::storage(&path, e)),
        };

        serde_json::from_slice(&bytes).map_err(|e| ConvertError::Manifest {
            job_id: job_id.to_string(),
            detail: e.to_string(),
        })
    }
}

fn manifest_path(config: &ServerConfig, job_id: &Uuid) -> PathBuf {
    config.jobs_dir().join(format!("{job_id}.json"))
}
