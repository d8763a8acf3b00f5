//! PDF producers: turn a stored upload into `pdf-images/{base}.pdf`.
//!
//! | Source      | Producer                                         |
//! |-------------|--------------------------------------------------|
//! | Word        | [`WordEngine`] writes the PDF directly           |
//! | Spreadsheet | calamine → HTML tables → [`HtmlPrinter`] (A4 landscape) |
//! | PDF         | used in place, nothing written                   |
//!
//! Producer failures are collapsed into one error per source kind; the
//! underlying cause is logged, never returned to the client.

use super::dispatch::SourceKind;
use super::engine::{HtmlPrinter, WordEngine};
use super::render::PdfArtifact;
use super::spreadsheet::spreadsheet_to_html;
use crate::config::ServerConfig;
use crate::error::ConvertError;
use crate::storage::{pdf_path, UploadedFile};
use std::path::Path;
use tracing::{error, info};

/// Produce the PDF for `upload`.
///
/// Word and spreadsheet output lands at [`pdf_path`]; a PDF upload is
/// returned as-is. An unsupported extension fails before any engine runs.
pub async fn produce_pdf(
    upload: &UploadedFile,
    config: &ServerConfig,
    word: &dyn WordEngine,
    printer: &dyn HtmlPrinter,
) -> Result<PdfArtifact, ConvertError> {
    let kind = SourceKind::from_extension(&upload.extension)?;
    let base_name = upload.base_name();

    let path = match kind {
        SourceKind::Pdf => {
            info!("'{}' is already a PDF", upload.original_name);
            upload.stored_path.clone()
        }
        SourceKind::Word => {
            let out = pdf_path(config, &base_name);
            word_to_pdf(&upload.stored_path, &out, word).await?;
            out
        }
        SourceKind::Spreadsheet => {
            let out = pdf_path(config, &base_name);
            spreadsheet_to_pdf(&upload.stored_path, &out, printer).await?;
            out
        }
    };

    Ok(PdfArtifact { path, base_name })
}

async fn word_to_pdf(
    input: &Path,
    output: &Path,
    word: &dyn WordEngine,
) -> Result<(), ConvertError> {
    word.convert_to_pdf(input, output).await.map_err(|e| {
        error!("Word to PDF conversion failed for {}: {}", input.display(), e);
        match e {
            ConvertError::WordConversion { .. } => e,
            other => ConvertError::WordConversion {
                detail: other.to_string(),
            },
        }
    })
}

async fn spreadsheet_to_pdf(
    input: &Path,
    output: &Path,
    printer: &dyn HtmlPrinter,
) -> Result<(), ConvertError> {
    print_workbook(input, output, printer).await.map_err(|e| {
        error!("Excel to PDF conversion failed for {}: {}", input.display(), e);
        match e {
            ConvertError::SpreadsheetConversion { .. } => e,
            other => ConvertError::SpreadsheetConversion {
                detail: other.to_string(),
            },
        }
    })
}

async fn print_workbook(
    input: &Path,
    output: &Path,
    printer: &dyn HtmlPrinter,
) -> Result<(), ConvertError> {
    let source = input.to_path_buf();
    let html = tokio::task::spawn_blocking(move || spreadsheet_to_html(&source))
        .await
        .map_err(|e| ConvertError::Internal(format!("Workbook task panicked: {}", e)))??;
    printer.print_to_pdf(&html, output).await
}
