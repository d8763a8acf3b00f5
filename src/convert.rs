//! Conversion entry points: one stored upload → PDF → page images.
//!
//! [`Converter`] owns the engines, the per-base-name locks and the config,
//! and is shared by the HTTP server and the CLI. A job runs its stages
//! strictly in order:
//!
//! ```text
//! lock(base) ─▶ store ─▶ dispatch ─▶ manifest ─▶ produce ─▶ rasterize ─▶ manifest
//! ```
//!
//! The lock is held from before the upload is written until the page set is
//! final: a `.pdf` upload is stored at the same path as the PDF artifact of
//! any other job with that base name. Unsupported extensions fail at
//! dispatch, before a manifest is written or any engine starts. Manifest writes are best-effort: a failure to record
//! progress is logged and never fails the conversion itself.

use crate::config::ServerConfig;
use crate::error::ConvertError;
use crate::locks::BaseNameLocks;
use crate::manifest::{JobManifest, Stage};
use crate::pipeline::dispatch::{base_name_of, SourceKind};
use crate::pipeline::engine::{ChromiumPrinter, EnginePool, HtmlPrinter, SofficeEngine, WordEngine};
use crate::pipeline::produce::produce_pdf;
use crate::pipeline::render::{rasterize_pdf, PageSetReport, PdfArtifact};
use crate::progress::ProgressHandle;
use crate::storage::{mime_for_path, receive_upload, sanitize_file_name, UploadedFile};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};
use uuid::Uuid;

/// The outcome of one successful conversion.
#[derive(Debug, Clone)]
pub struct ConversionJob {
    pub job_id: Uuid,
    pub source: UploadedFile,
    pub pdf: PdfArtifact,
    pub pages: PageSetReport,
}

impl ConversionJob {
    /// Public URLs of the page images, page 1 first.
    pub fn images(&self) -> Vec<String> {
        self.pages.urls()
    }
}

/// Runs conversions against one upload root.
#[derive(Clone)]
pub struct Converter {
    config: Arc<ServerConfig>,
    word: Arc<dyn WordEngine>,
    printer: Arc<dyn HtmlPrinter>,
    locks: BaseNameLocks,
}

impl Converter {
    /// A converter using `soffice` and Chromium, sharing one [`EnginePool`].
    pub fn new(config: ServerConfig) -> Self {
        let pool = EnginePool::from_config(&config);
        let word = Arc::new(SofficeEngine::new(config.soffice_bin.clone(), pool.clone()));
        let printer = Arc::new(ChromiumPrinter::new(config.chrome_bin.clone(), pool));
        Self::with_engines(config, word, printer)
    }

    /// A converter with caller-supplied engines.
    pub fn with_engines(
        config: ServerConfig,
        word: Arc<dyn WordEngine>,
        printer: Arc<dyn HtmlPrinter>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            word,
            printer,
            locks: BaseNameLocks::new(),
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Store an upload and convert it, holding the base-name lock for both.
    ///
    /// # Errors
    /// As [`Converter::convert_upload`], plus [`ConvertError::InvalidFileName`]
    /// and storage errors from [`receive_upload`].
    pub async fn store_and_convert(
        &self,
        original_name: &str,
        mime_type: &str,
        bytes: &[u8],
        progress: Option<ProgressHandle>,
    ) -> Result<ConversionJob, ConvertError> {
        let name = sanitize_file_name(original_name)?;
        let _guard = self.locks.lock(&base_name_of(Path::new(&name))).await;

        let upload = receive_upload(&self.config, &name, mime_type, bytes).await?;
        self.run(upload, progress).await
    }

    /// Convert an upload that [`receive_upload`] already stored.
    ///
    /// # Errors
    /// - [`ConvertError::UnsupportedFormat`] before anything runs
    /// - the producer's error if no PDF could be made
    /// - [`ConvertError::RasterisationFailed`] if any page failed; the
    ///   partial page set has been removed by then
    pub async fn convert_upload(
        &self,
        upload: UploadedFile,
        progress: Option<ProgressHandle>,
    ) -> Result<ConversionJob, ConvertError> {
        let _guard = self.locks.lock(&upload.base_name()).await;
        self.run(upload, progress).await
    }

    /// The pipeline proper. The caller holds the lock for the base name.
    async fn run(
        &self,
        upload: UploadedFile,
        progress: Option<ProgressHandle>,
    ) -> Result<ConversionJob, ConvertError> {
        let start = Instant::now();
        let kind = SourceKind::from_extension(&upload.extension)?;
        let job_id = Uuid::new_v4();
        let base_name = upload.base_name();
        info!(
            "Job {}: converting '{}' as {:?}",
            job_id, upload.original_name, kind
        );

        let mut manifest = JobManifest::new(job_id, &upload);
        self.save_manifest(&manifest).await;

        // ── Step 1: Produce the PDF ──────────────────────────────────────
        let pdf = match produce_pdf(&upload, &self.config, self.word.as_ref(), self.printer.as_ref())
            .await
        {
            Ok(pdf) => pdf,
            Err(e) => {
                manifest.fail(Stage::Pdf, &e);
                self.save_manifest(&manifest).await;
                return Err(e);
            }
        };
        manifest.record_pdf(&pdf.path);
        self.save_manifest(&manifest).await;

        // ── Step 2: Rasterise ────────────────────────────────────────────
        let pages = match rasterize_pdf(&pdf, &self.config, progress).await {
            Ok(report) => report,
            Err(e) => {
                manifest.fail(Stage::Rasterize, &e);
                self.save_manifest(&manifest).await;
                return Err(e);
            }
        };
        manifest.record_pages(&pages);

        if let Some(failure) = pages.failure() {
            let e = ConvertError::RasterisationFailed {
                page: failure.page(),
                total: pages.total_pages,
                detail: failure.to_string(),
            };
            manifest.error = Some(e.to_string());
            self.save_manifest(&manifest).await;
            return Err(e);
        }
        self.save_manifest(&manifest).await;

        info!(
            "Job {}: {} page(s) for '{}' in {}ms",
            job_id,
            pages.rendered_count(),
            base_name,
            start.elapsed().as_millis()
        );

        Ok(ConversionJob {
            job_id,
            source: upload,
            pdf,
            pages,
        })
    }

    /// Store a local file as if it had been uploaded, then convert it.
    pub async fn convert_path(
        &self,
        path: &Path,
        progress: Option<ProgressHandle>,
    ) -> Result<ConversionJob, ConvertError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| ConvertError::storage(path, e))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        self.store_and_convert(&name, mime_for_path(path), &bytes, progress)
            .await
    }

    async fn save_manifest(&self, manifest: &JobManifest) {
        if let Err(e) = manifest.save(&self.config).await {
            warn!("Job {}: could not save manifest: {}", manifest.job_id, e);
        }
    }
}
