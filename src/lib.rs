//! # doc2pages
//!
//! Turn uploaded Word, Excel and PDF documents into one PNG image per page,
//! served over HTTP.
//!
//! ## Pipeline Overview
//!
//! ```text
//! upload
//!  │
//!  ├─ 1. Store     type-routed directory under the upload root
//!  ├─ 2. Dispatch  by lower-cased extension (.doc .docx .xlsx .xls .pdf)
//!  ├─ 3. Produce   soffice (Word) │ calamine → HTML → chromium (Excel) │ as-is (PDF)
//!  ├─ 4. Render    pdfium at 2.0×, one PNG per page (spawn_blocking)
//!  └─ 5. Respond   ordered page URLs + job manifest
//! ```
//!
//! Earlier results are looked up by base name straight from the directory
//! tree: `GET /fileConverter/{name}` lists the page images, `GET
//! /get-pdf/{name}` returns the PDF's URL.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use doc2pages::{Converter, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig::builder().upload_root("uploads").build()?;
//!     let converter = Converter::new(config);
//!     let job = converter
//!         .convert_path(std::path::Path::new("report.xlsx"), None)
//!         .await?;
//!     for url in job.images() {
//!         println!("{url}");
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `doc2pages` binary (clap + anyhow + tracing-subscriber + indicatif + dotenvy) |
//!
//! ## External engines
//!
//! | Engine | Used for | Configured by |
//! |--------|----------|---------------|
//! | `soffice` | `.doc` / `.docx` → PDF | `soffice_bin` |
//! | Chromium | spreadsheet HTML → PDF | `chrome_bin` |
//! | libpdfium | PDF → PNG | `pdfium_lib_dir` / `PDFIUM_LIB_PATH` |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod locks;
pub mod manifest;
pub mod pipeline;
pub mod progress;
pub mod server;
pub mod storage;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ServerConfig, ServerConfigBuilder};
pub use convert::{ConversionJob, Converter};
pub use error::{ConvertError, ErrorKind, PageError};
pub use manifest::{JobManifest, StageStatus};
pub use pipeline::dispatch::SourceKind;
pub use pipeline::render::{PageOutcome, PageSetReport, PdfArtifact};
pub use progress::{NoopProgress, ProgressHandle, RenderProgress, TracingProgress};
pub use server::{router, serve, AppState};
pub use storage::UploadedFile;
