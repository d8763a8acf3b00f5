//! Pipeline stages for document-to-page-image conversion.
//!
//! Each submodule implements one transformation step and is tested on its
//! own; the external engines sit behind traits so tests never spawn them.
//!
//! ## Data Flow
//!
//! ```text
//! dispatch ──▶ produce ──────────────────────────────▶ render
//! (extension)  Word: soffice                          (pdfium → PNG)
//!              Spreadsheet: calamine → HTML → chromium
//!              PDF: as-is
//! ```
//!
//! 1. [`dispatch`]: pick the producer from the lower-cased extension
//! 2. [`spreadsheet`]: workbook → one HTML document of tables
//! 3. [`engine`]: bounded, timed child processes for soffice and chromium
//! 4. [`produce`]: write `pdf-images/{base}.pdf` (or reuse the uploaded PDF)
//! 5. [`render`]: rasterise every page in `spawn_blocking` because pdfium is
//!    not async-safe

pub mod dispatch;
pub mod engine;
pub mod produce;
pub mod render;
pub mod spreadsheet;
