//! The on-disk layout: receiving uploads and looking up earlier results.
//!
//! ```text
//! uploads/
//!   excel/{originalname}                              MIME contains "excel"
//!   pdf-images/{originalname}                         every other upload
//!   pdf-images/{baseName}.pdf                         PDF artifact
//!   pdf-images/{baseName}/{baseName}_page_{i}.png     page set
//! ```
//!
//! The directory tree is the only index: lookups are plain existence checks
//! and directory listings keyed by the caller-supplied name.

use crate::config::ServerConfig;
use crate::error::ConvertError;
use crate::pipeline::dispatch::{base_name_of, extension_of};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// An upload as persisted by [`receive_upload`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedFile {
    /// Client file name after [`sanitize_file_name`].
    pub original_name: String,
    pub stored_path: PathBuf,
    pub mime_type: String,
    /// Lower-cased, with leading dot (`.docx`), or empty.
    pub extension: String,
}

impl UploadedFile {
    /// `original_name` without its extension.
    pub fn base_name(&self) -> String {
        base_name_of(Path::new(&self.original_name))
    }
}

/// Reduce a client-supplied name to a safe single path component.
///
/// Directory parts are dropped (`../../etc/passwd` → `passwd`,
/// `C:\tmp\a.pdf` → `a.pdf`); the name is otherwise kept verbatim.
pub fn sanitize_file_name(raw: &str) -> Result<String, ConvertError> {
    let name = raw.rsplit(['/', '\\']).next().unwrap_or("");
    if name.is_empty() || name == "." || name == ".." || name.contains('\0') {
        return Err(ConvertError::InvalidFileName {
            name: raw.to_string(),
        });
    }
    Ok(name.to_string())
}

/// A lookup key is usable only if it names a single component below the root.
fn is_safe_key(name: &str) -> bool {
    !(name.is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\', '\0']))
}

/// Where an upload of `mime_type` is stored.
pub fn destination_dir(config: &ServerConfig, mime_type: &str) -> PathBuf {
    if mime_type.contains("excel") {
        config.excel_dir()
    } else {
        config.pdf_images_dir()
    }
}

/// Best-effort MIME type for a local file, used when no client supplied one.
pub fn mime_for_path(path: &Path) -> &'static str {
    match extension_of(path).as_str() {
        ".xls" => "application/vnd.ms-excel",
        ".xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        ".doc" => "application/msword",
        ".docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        ".pdf" => "application/pdf",
        _ => "application/octet-stream",
    }
}

/// Create `excel/` and `pdf-images/` if missing. Safe to call repeatedly.
pub async fn ensure_layout(config: &ServerConfig) -> Result<(), ConvertError> {
    for dir in [config.excel_dir(), config.pdf_images_dir()] {
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| ConvertError::storage(&dir, e))?;
    }
    Ok(())
}

/// Persist an uploaded file under its original name.
///
/// An existing file with the same name is overwritten.
pub async fn receive_upload(
    config: &ServerConfig,
    original_name: &str,
    mime_type: &str,
    bytes: &[u8],
) -> Result<UploadedFile, ConvertError> {
    let name = sanitize_file_name(original_name)?;
    ensure_layout(config).await?;

    let stored_path = destination_dir(config, mime_type).join(&name);
    tokio::fs::write(&stored_path, bytes)
        .await
        .map_err(|e| ConvertError::storage(&stored_path, e))?;

    info!(
        "Stored upload '{}' ({} bytes, {}) → {}",
        name,
        bytes.len(),
        mime_type,
        stored_path.display()
    );

    Ok(UploadedFile {
        extension: extension_of(Path::new(&name)),
        original_name: name,
        stored_path,
        mime_type: mime_type.to_string(),
    })
}

/// `pdf-images/{base_name}.pdf`
pub fn pdf_path(config: &ServerConfig, base_name: &str) -> PathBuf {
    config.pdf_images_dir().join(format!("{base_name}.pdf"))
}

/// `pdf-images/{base_name}/`
pub fn page_set_dir(config: &ServerConfig, base_name: &str) -> PathBuf {
    config.pdf_images_dir().join(base_name)
}

/// `{base_name}_page_{page}.png`
pub fn page_file_name(base_name: &str, page: usize) -> String {
    format!("{base_name}_page_{page}.png")
}

/// Public URL of page `page` of `base_name`.
pub fn page_url(config: &ServerConfig, base_name: &str, page: usize) -> String {
    config.pdf_images_url(&format!("{base_name}/{}", page_file_name(base_name, page)))
}

static RE_PAGE_FILE: Lazy<Regex> = Lazy::new(|| Regex::new(r"_page_(\d+)\.png$").unwrap());

/// List the page images previously produced for `file_name`.
///
/// Any extension on `file_name` is stripped, so `report.xlsx` and `report`
/// find the same set. Pages are returned in page-number order.
pub async fn list_page_images(
    config: &ServerConfig,
    file_name: &str,
) -> Result<Vec<String>, ConvertError> {
    let base_name = base_name_of(Path::new(file_name));
    let not_found = || ConvertError::ImagesNotFound {
        base_name: base_name.clone(),
    };
    if !is_safe_key(file_name) || !is_safe_key(&base_name) {
        return Err(not_found());
    }

    // An extensionless upload can sit at the same path as a plain file.
    let dir = page_set_dir(config, &base_name);
    match tokio::fs::metadata(&dir).await {
        Ok(meta) if meta.is_dir() => {}
        _ => return Err(not_found()),
    }

    let mut entries = tokio::fs::read_dir(&dir)
        .await
        .map_err(|e| ConvertError::storage(&dir, e))?;
    let mut files: Vec<String> = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| ConvertError::storage(&dir, e))?
    {
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.ends_with(".png") {
            files.push(name);
        }
    }

    files.sort_by(|a, b| page_sort_key(a).cmp(&page_sort_key(b)));
    debug!("Found {} page image(s) for '{}'", files.len(), base_name);

    Ok(files
        .into_iter()
        .map(|f| config.pdf_images_url(&format!("{base_name}/{f}")))
        .collect())
}

/// Numbered pages first in numeric order, anything else after by name.
fn page_sort_key(name: &str) -> (usize, String) {
    let page = RE_PAGE_FILE
        .captures(name)
        .and_then(|c| c[1].parse::<usize>().ok())
        .unwrap_or(usize::MAX);
    (page, name.to_string())
}

/// Public URL of `{base_name}.pdf` if it exists.
pub async fn find_pdf(config: &ServerConfig, base_name: &str) -> Result<String, ConvertError> {
    let not_found = || ConvertError::PdfNotFound {
        base_name: base_name.to_string(),
    };
    if !is_safe_key(base_name) {
        return Err(not_found());
    }

    let path = pdf_path(config, base_name);
    match tokio::fs::metadata(&path).await {
        Ok(meta) if meta.is_file() => {}
        _ => return Err(not_found()),
    }
    Ok(config.pdf_images_url(&format!("{base_name}.pdf")))
}
