//! Type dispatch: decide which producer turns an upload into a PDF.
//!
//! The decision is made from the stored file's extension alone, lower-cased.
//! There is no fallback: anything outside the five known extensions is
//! rejected before any engine is touched.

use crate::error::ConvertError;
use std::path::Path;

/// What kind of source document an upload is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// `.doc` / `.docx` → document engine.
    Word,
    /// `.xlsx` / `.xls` → HTML table → browser print.
    Spreadsheet,
    /// `.pdf` → used as-is.
    Pdf,
}

impl SourceKind {
    /// Map a lower-cased extension (with leading dot) to a source kind.
    pub fn from_extension(ext: &str) -> Result<Self, ConvertError> {
        match ext {
            ".doc" | ".docx" => Ok(SourceKind::Word),
            ".xlsx" | ".xls" => Ok(SourceKind::Spreadsheet),
            ".pdf" => Ok(SourceKind::Pdf),
            other => Err(ConvertError::UnsupportedFormat {
                extension: other.to_string(),
            }),
        }
    }

    /// Classify a path by its extension.
    pub fn from_path(path: &Path) -> Result<Self, ConvertError> {
        Self::from_extension(&extension_of(path))
    }
}

/// Lower-cased extension including the leading dot, or `""` when absent.
///
/// `report.XLSX` → `.xlsx`, `archive.tar.gz` → `.gz`, `README` → `""`.
pub fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e.to_lowercase()))
        .unwrap_or_default()
}

/// File name without its final extension: `report.xlsx` → `report`.
pub fn base_name_of(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn supported_extensions_route_to_their_producer() {
        assert_eq!(SourceKind::from_extension(".doc").unwrap(), SourceKind::Word);
        assert_eq!(SourceKind::from_extension(".docx").unwrap(), SourceKind::Word);
        assert_eq!(
            SourceKind::from_extension(".xlsx").unwrap(),
            SourceKind::Spreadsheet
        );
        assert_eq!(
            SourceKind::from_extension(".xls").unwrap(),
            SourceKind::Spreadsheet
        );
        assert_eq!(SourceKind::from_extension(".pdf").unwrap(), SourceKind::Pdf);
    }

    #[test]
    fn everything_else_is_rejected() {
        for ext in [".txt", ".csv", ".pptx", ".png", "", ".PDF"] {
            let err = SourceKind::from_extension(ext).unwrap_err();
            assert!(
                matches!(err, ConvertError::UnsupportedFormat { .. }),
                "{ext:?} should be unsupported"
            );
        }
    }

    #[test]
    fn from_path_lowercases() {
        assert_eq!(
            SourceKind::from_path(Path::new("Q3 Report.XLSX")).unwrap(),
            SourceKind::Spreadsheet
        );
        assert_eq!(
            SourceKind::from_path(Path::new("memo.DocX")).unwrap(),
            SourceKind::Word
        );
        assert!(SourceKind::from_path(Path::new("notes.txt")).is_err());
        assert!(SourceKind::from_path(Path::new("Makefile")).is_err());
    }

    #[test]
    fn extension_and_base_name() {
        assert_eq!(extension_of(Path::new("a/b/report.xlsx")), ".xlsx");
        assert_eq!(extension_of(Path::new("README")), "");
        assert_eq!(base_name_of(Path::new("report.xlsx")), "report");
        assert_eq!(base_name_of(Path::new("v1.2.final.pdf")), "v1.2.final");
    }
}
