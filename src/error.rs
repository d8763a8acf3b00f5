//! Error types for the doc2pages library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`ConvertError`]: **fatal**, the job cannot proceed (unsupported file
//!   type, engine crash, unreadable workbook). Returned as `Err(ConvertError)`
//!   from [`crate::Converter::convert_upload`] and the pipeline stages.
//!
//! * [`PageError`]: a single page failed to render or encode. It is stored
//!   inside [`crate::pipeline::render::PageOutcome::Failed`] so the job
//!   manifest records exactly which page broke, even though the job as a
//!   whole is reported as failed.
//!
//! The HTTP layer maps every `ConvertError` to a status class through
//! [`ConvertError::kind`]; engine details never leave the server.

use std::path::PathBuf;
use thiserror::Error;

/// Coarse classification used by the HTTP layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The client sent something we will not process (400).
    BadInput,
    /// The requested artifact does not exist (404).
    NotFound,
    /// Anything that went wrong on our side (500).
    Internal,
}

/// All fatal errors returned by the doc2pages library.
#[derive(Debug, Error)]
pub enum ConvertError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// The request carried no `file` field.
    #[error("No file uploaded")]
    MissingFile,

    /// File extension is not one of .doc, .docx, .xlsx, .xls, .pdf.
    #[error("Unsupported file format: '{extension}'")]
    UnsupportedFormat { extension: String },

    /// The client-supplied file name cannot be used as a storage key.
    #[error("Invalid file name: {name:?}")]
    InvalidFileName { name: String },

    /// The spreadsheet renderer was handed a non-spreadsheet file.
    #[error("Uploaded file is not an Excel file: '{path}'")]
    NotASpreadsheet { path: PathBuf },

    // ── Lookup errors ─────────────────────────────────────────────────────
    /// No page-image directory for the requested base name.
    #[error("No images found for '{base_name}'")]
    ImagesNotFound { base_name: String },

    /// No `{base_name}.pdf` in the artifact directory.
    #[error("PDF file not found: '{base_name}'")]
    PdfNotFound { base_name: String },

    /// No manifest for the requested job id.
    #[error("Job not found: '{job_id}'")]
    JobNotFound { job_id: String },

    // ── Producer errors ───────────────────────────────────────────────────
    /// The workbook could not be opened or a sheet could not be read.
    #[error("Failed to parse spreadsheet '{path}': {detail}")]
    SpreadsheetParse { path: PathBuf, detail: String },

    /// The document engine (soffice) failed.
    #[error("Word to PDF conversion failed: {detail}")]
    WordConversion { detail: String },

    /// Rendering or printing the spreadsheet HTML failed.
    #[error("Excel to PDF conversion failed: {detail}")]
    SpreadsheetConversion { detail: String },

    /// An external engine could not be started at all.
    #[error("Failed to launch '{program}': {source}")]
    EngineLaunch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// An external engine exceeded the configured timeout and was killed.
    #[error("'{program}' timed out after {secs}s")]
    EngineTimeout { program: String, secs: u64 },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{path}' is corrupt: {detail}")]
    CorruptPdf { path: PathBuf, detail: String },

    /// Rendering stopped at `page`; earlier pages were rolled back.
    #[error("Rasterisation failed at page {page} of {total}: {detail}")]
    RasterisationFailed {
        page: usize,
        total: usize,
        detail: String,
    },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\
Place libpdfium next to the binary, install it system-wide, or set PDFIUM_LIB_PATH."
    )]
    PdfiumBindingFailed(String),

    // ── I/O errors ────────────────────────────────────────────────────────
    /// A file or directory under the upload root could not be written.
    #[error("Storage error at '{path}': {source}")]
    Storage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A job manifest could not be encoded or decoded.
    #[error("Manifest error for job '{job_id}': {detail}")]
    Manifest { job_id: String, detail: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ConvertError {
    /// Shorthand for [`ConvertError::Storage`].
    pub fn storage(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ConvertError::Storage {
            path: path.into(),
            source,
        }
    }

    /// Which HTTP status class this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ConvertError::MissingFile
            | ConvertError::UnsupportedFormat { .. }
            | ConvertError::InvalidFileName { .. } => ErrorKind::BadInput,
            ConvertError::ImagesNotFound { .. }
            | ConvertError::PdfNotFound { .. }
            | ConvertError::JobNotFound { .. } => ErrorKind::NotFound,
            _ => ErrorKind::Internal,
        }
    }
}

/// A failure confined to a single page.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
pub enum PageError {
    /// pdfium could not load or render the page.
    #[error("Page {page}: rasterisation failed: {detail}")]
    RenderFailed { page: usize, detail: String },

    /// The bitmap could not be PNG-encoded.
    #[error("Page {page}: PNG encoding failed: {detail}")]
    EncodeFailed { page: usize, detail: String },

    /// The PNG could not be written to disk.
    #[error("Page {page}: write failed: {detail}")]
    WriteFailed { page: usize, detail: String },
}

impl PageError {
    /// 1-indexed page number the error belongs to.
    pub fn page(&self) -> usize {
        match self {
            PageError::RenderFailed { page, .. }
            | PageError::EncodeFailed { page, .. }
            | PageError::WriteFailed { page, .. } => *page,
        }
    }
}
