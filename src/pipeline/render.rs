//! PDF rasterisation: write one PNG per page into the page-set directory.
//!
//! pdfium is not async-safe, so the whole document is processed inside
//! `spawn_blocking`. Pages are rendered strictly in ascending order at a fixed
//! scale (2.0 by default) relative to the page's point size.
//!
//! The first page that fails stops the run; later pages are reported as
//! skipped. A page set on disk is either complete or absent: after a failure
//! the directory is removed again and the report says so.

use crate::config::ServerConfig;
use crate::error::{ConvertError, PageError};
use crate::progress::{NoopProgress, ProgressHandle, RenderProgress};
use crate::storage::{page_file_name, page_set_dir, page_url};
use image::DynamicImage;
use pdfium_render::prelude::*;
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A PDF ready for rasterisation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PdfArtifact {
    pub path: PathBuf,
    /// File name without `.pdf`; names the page-set directory and files.
    pub base_name: String,
}

/// What happened to one page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum PageOutcome {
    Rendered { page: usize, url: String },
    Failed { page: usize, error: PageError },
    Skipped { page: usize },
}

impl PageOutcome {
    pub fn page(&self) -> usize {
        match self {
            PageOutcome::Rendered { page, .. }
            | PageOutcome::Failed { page, .. }
            | PageOutcome::Skipped { page } => *page,
        }
    }
}

/// Per-page results of one rasterisation run, in page order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageSetReport {
    pub base_name: String,
    pub total_pages: usize,
    pub outcomes: Vec<PageOutcome>,
    /// True when a failure caused the written pages to be deleted again.
    pub rolled_back: bool,
}

impl PageSetReport {
    /// URLs of rendered pages, ascending.
    pub fn urls(&self) -> Vec<String> {
        self.outcomes
            .iter()
            .filter_map(|o| match o {
                PageOutcome::Rendered { url, .. } => Some(url.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn rendered_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, PageOutcome::Rendered { .. }))
            .count()
    }

    /// The page error that stopped the run, if any.
    pub fn failure(&self) -> Option<&PageError> {
        self.outcomes.iter().find_map(|o| match o {
            PageOutcome::Failed { error, .. } => Some(error),
            _ => None,
        })
    }

    pub fn is_complete(&self) -> bool {
        self.rendered_count() == self.total_pages
    }
}

/// A paged document that can be rendered one page at a time.
pub trait PageSource {
    fn page_count(&self) -> usize;

    /// Render page `index` (0-based) to a bitmap.
    fn render_page(&mut self, index: usize) -> Result<DynamicImage, String>;
}

/// [`PageSource`] over a pdfium document.
pub struct PdfiumPages<'a> {
    document: PdfDocument<'a>,
    render_config: PdfRenderConfig,
}

impl<'a> PdfiumPages<'a> {
    pub fn new(document: PdfDocument<'a>, scale: f32) -> Self {
        Self {
            document,
            render_config: PdfRenderConfig::new().scale_page_by_factor(scale),
        }
    }
}

impl PageSource for PdfiumPages<'_> {
    fn page_count(&self) -> usize {
        self.document.pages().len() as usize
    }

    fn render_page(&mut self, index: usize) -> Result<DynamicImage, String> {
        let idx = u16::try_from(index)
            .map_err(|_| format!("page index {index} exceeds pdfium's 65535 limit"))?;
        let page = self
            .document
            .pages()
            .get(idx)
            .map_err(|e| format!("{:?}", e))?;
        let bitmap = page
            .render_with_config(&self.render_config)
            .map_err(|e| format!("{:?}", e))?;
        Ok(bitmap.as_image())
    }
}

/// Rasterise every page of `pdf` into `pdf-images/{base}/{base}_page_{i}.png`.
///
/// Returns `Err` only when the document cannot be opened at all. Page-level
/// failures come back as an incomplete [`PageSetReport`] with
/// `rolled_back = true`.
pub async fn rasterize_pdf(
    pdf: &PdfArtifact,
    config: &ServerConfig,
    progress: Option<ProgressHandle>,
) -> Result<PageSetReport, ConvertError> {
    let pdf = pdf.clone();
    let config = config.clone();
    let progress = progress.unwrap_or_else(|| Arc::new(NoopProgress));

    tokio::task::spawn_blocking(move || rasterize_blocking(&pdf, &config, progress))
        .await
        .map_err(|e| ConvertError::Internal(format!("Render task panicked: {}", e)))?
}

fn rasterize_blocking(
    pdf: &PdfArtifact,
    config: &ServerConfig,
    progress: ProgressHandle,
) -> Result<PageSetReport, ConvertError> {
    let pdfium = bind_pdfium(config.pdfium_lib_dir.as_deref())?;
    let document = pdfium
        .load_pdf_from_file(&pdf.path, None)
        .map_err(|e| ConvertError::CorruptPdf {
            path: pdf.path.clone(),
            detail: format!("{:?}", e),
        })?;

    // Created only once the document opened, so a bad PDF leaves no empty set.
    // Pages from an earlier, longer run of the same base name are cleared.
    let out_dir = page_set_dir(config, &pdf.base_name);
    fresh_page_set_dir(&out_dir)?;

    let mut pages = PdfiumPages::new(document, config.render_scale);
    info!(
        "PDF loaded: {} ({} pages, scale {})",
        pdf.path.display(),
        pages.page_count(),
        config.render_scale
    );

    let report = write_page_set(
        &mut pages,
        &out_dir,
        &pdf.base_name,
        |page| page_url(config, &pdf.base_name, page),
        progress.as_ref(),
    );

    Ok(finish(report, &out_dir))
}

/// Replace whatever sits at `out_dir` with an empty directory.
///
/// An extensionless upload is stored under the same name as a page set, so
/// a plain file may be in the way.
fn fresh_page_set_dir(out_dir: &Path) -> Result<(), ConvertError> {
    match std::fs::symlink_metadata(out_dir) {
        Ok(meta) if meta.is_dir() => std::fs::remove_dir_all(out_dir),
        Ok(_) => {
            warn!("Replacing file {} with a page set", out_dir.display());
            std::fs::remove_file(out_dir)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
    .map_err(|e| ConvertError::storage(out_dir, e))?;
    std::fs::create_dir_all(out_dir).map_err(|e| ConvertError::storage(out_dir, e))
}

/// Remove a partially written page set.
fn finish(mut report: PageSetReport, out_dir: &Path) -> PageSetReport {
    if report.is_complete() {
        return report;
    }
    match std::fs::remove_dir_all(out_dir) {
        Ok(()) => {
            warn!(
                "Rolled back {} page(s) of '{}' after failure",
                report.rendered_count(),
                report.base_name
            );
            report.rolled_back = true;
        }
        Err(e) => warn!("Could not roll back {}: {}", out_dir.display(), e),
    }
    report
}

/// Render, encode and write pages 1..=N in order, stopping at the first failure.
pub fn write_page_set(
    source: &mut dyn PageSource,
    out_dir: &Path,
    base_name: &str,
    url_for: impl Fn(usize) -> String,
    progress: &dyn RenderProgress,
) -> PageSetReport {
    let total = source.page_count();
    progress.on_render_start(total);

    let mut outcomes = Vec::with_capacity(total);
    let mut failed = false;

    for page in 1..=total {
        if failed {
            outcomes.push(PageOutcome::Skipped { page });
            continue;
        }

        match write_one_page(source, out_dir, base_name, page) {
            Ok(bytes) => {
                debug!("Wrote {} ({} bytes)", page_file_name(base_name, page), bytes);
                progress.on_page_rendered(page, total);
                outcomes.push(PageOutcome::Rendered {
                    page,
                    url: url_for(page),
                });
            }
            Err(error) => {
                progress.on_page_failed(page, total, &error.to_string());
                outcomes.push(PageOutcome::Failed { page, error });
                failed = true;
            }
        }
    }

    let report = PageSetReport {
        base_name: base_name.to_string(),
        total_pages: total,
        outcomes,
        rolled_back: false,
    };
    progress.on_render_complete(total, report.rendered_count());
    report
}

fn write_one_page(
    source: &mut dyn PageSource,
    out_dir: &Path,
    base_name: &str,
    page: usize,
) -> Result<usize, PageError> {
    let image = source
        .render_page(page - 1)
        .map_err(|detail| PageError::RenderFailed { page, detail })?;

    let mut buf = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .map_err(|e| PageError::EncodeFailed {
            page,
            detail: e.to_string(),
        })?;

    let path = out_dir.join(page_file_name(base_name, page));
    std::fs::write(&path, &buf).map_err(|e| PageError::WriteFailed {
        page,
        detail: e.to_string(),
    })?;
    Ok(buf.len())
}

/// Bind libpdfium from `lib_dir`, else the working directory, else the system path.
fn bind_pdfium(lib_dir: Option<&Path>) -> Result<Pdfium, ConvertError> {
    let bindings = match lib_dir {
        Some(dir) => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(dir)),
        None => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
            .or_else(|_| Pdfium::bind_to_system_library()),
    }
    .map_err(|e| ConvertError::PdfiumBindingFailed(format!("{:?}", e)))?;
    Ok(Pdfium::new(bindings))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    /// Solid-colour pages; optionally fails on one page (1-indexed).
    struct FakePages {
        count: usize,
        fail_on: Option<usize>,
        rendered: Vec<usize>,
    }

    impl FakePages {
        fn new(count: usize, fail_on: Option<usize>) -> Self {
            Self {
                count,
                fail_on,
                rendered: Vec::new(),
            }
        }
    }

    impl PageSource for FakePages {
        fn page_count(&self) -> usize {
            self.count
        }

        fn render_page(&mut self, index: usize) -> Result<DynamicImage, String> {
            self.rendered.push(index + 1);
            if self.fail_on == Some(index + 1) {
                return Err("simulated render failure".into());
            }
            Ok(DynamicImage::ImageRgba8(RgbaImage::from_pixel(
                8,
                12,
                Rgba([255, 255, 255, 255]),
            )))
        }
    }

    fn url(page: usize) -> String {
        format!("/uploads/pdf-images/memo/memo_page_{page}.png")
    }

    #[test]
    fn writes_one_png_per_page_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let mut pages = FakePages::new(3, None);

        let report = write_page_set(&mut pages, dir.path(), "memo", url, &NoopProgress);

        assert!(report.is_complete());
        assert_eq!(pages.rendered, vec![1, 2, 3]);
        assert_eq!(report.urls(), vec![url(1), url(2), url(3)]);
        for page in 1..=3 {
            let bytes = std::fs::read(dir.path().join(format!("memo_page_{page}.png"))).unwrap();
            assert!(bytes.starts_with(b"\x89PNG"), "page {page} is a PNG");
        }
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 3);
    }

    #[test]
    fn failure_stops_remaining_pages() {
        let dir = tempfile::tempdir().unwrap();
        let mut pages = FakePages::new(5, Some(3));

        let report = write_page_set(&mut pages, dir.path(), "memo", url, &NoopProgress);

        assert!(!report.is_complete());
        assert_eq!(pages.rendered, vec![1, 2, 3], "pages 4–5 never attempted");
        assert_eq!(report.rendered_count(), 2);
        assert_eq!(report.failure().map(|e| e.page()), Some(3));
        assert!(matches!(report.outcomes[3], PageOutcome::Skipped { page: 4 }));
        assert!(matches!(report.outcomes[4], PageOutcome::Skipped { page: 5 }));
    }

    #[test]
    fn failed_run_is_rolled_back() {
        let root = tempfile::tempdir().unwrap();
        let set = root.path().join("memo");
        std::fs::create_dir_all(&set).unwrap();
        let mut pages = FakePages::new(4, Some(2));

        let report = write_page_set(&mut pages, &set, "memo", url, &NoopProgress);
        assert!(set.join("memo_page_1.png").exists());

        let report = finish(report, &set);
        assert!(report.rolled_back);
        assert!(!set.exists(), "partial page set removed");
    }

    #[test]
    fn complete_run_is_kept() {
        let root = tempfile::tempdir().unwrap();
        let set = root.path().join("memo");
        std::fs::create_dir_all(&set).unwrap();
        let mut pages = FakePages::new(2, None);

        let report = finish(
            write_page_set(&mut pages, &set, "memo", url, &NoopProgress),
            &set,
        );
        assert!(!report.rolled_back);
        assert_eq!(std::fs::read_dir(&set).unwrap().count(), 2);
    }

    #[test]
    fn stale_pages_are_cleared_before_a_run() {
        let root = tempfile::tempdir().unwrap();
        let set = root.path().join("memo");
        std::fs::create_dir_all(&set).unwrap();
        std::fs::write(set.join("memo_page_9.png"), b"old").unwrap();

        fresh_page_set_dir(&set).unwrap();
        assert!(set.is_dir());
        assert_eq!(std::fs::read_dir(&set).unwrap().count(), 0);
    }

    #[test]
    fn plain_file_in_place_of_page_set_is_replaced() {
        let root = tempfile::tempdir().unwrap();
        let set = root.path().join("report");
        std::fs::write(&set, b"extensionless upload").unwrap();

        fresh_page_set_dir(&set).unwrap();
        assert!(set.is_dir());
    }

    #[test]
    fn empty_document_yields_empty_report() {
        let dir = tempfile::tempdir().unwrap();
        let mut pages = FakePages::new(0, None);
        let report = write_page_set(&mut pages, dir.path(), "blank", url, &NoopProgress);
        assert!(report.is_complete());
        assert!(report.urls().is_empty());
    }

    #[test]
    fn outcomes_serialise_with_status_tag() {
        let o = PageOutcome::Rendered {
            page: 1,
            url: url(1),
        };
        let json = serde_json::to_value(&o).unwrap();
        assert_eq!(json["status"], "rendered");
        assert_eq!(json["page"], 1);
    }
}
