//! Spreadsheet → HTML: serialise every sheet of a workbook as an HTML table.
//!
//! `.xlsx` and `.xls` are parsed by different calamine readers. Both sit
//! behind [`WorkbookSource`] ("ordered sheets → ordered rows → ordered cell
//! strings") so [`render_html`] has a single contract to satisfy.
//!
//! Rows are anchored at A1: calamine trims a sheet's range to the first used
//! cell, so leading empty rows and columns are padded back in. Trailing empty
//! cells of a row are dropped, which makes a fully blank row an empty `<tr>`.

use super::dispatch::extension_of;
use crate::error::ConvertError;
use calamine::{open_workbook, Data, Range, Reader, Xls, Xlsx};
use std::fmt::Write as _;
use std::io::{Read, Seek};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Inline stylesheet for a readable default table, printed A4 landscape.
const TABLE_STYLE: &str = "\
@page { size: A4 landscape; margin: 20px; }
body { font-family: Arial, sans-serif; margin: 0; padding: 20px; \
-webkit-print-color-adjust: exact; print-color-adjust: exact; }
h1 { text-align: center; }
table { width: 100%; border-collapse: collapse; table-layout: fixed; }
td, th { border: 1px solid #ccc; padding: 8px; word-wrap: break-word; }";

/// One worksheet, already flattened to cell strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sheet {
    pub name: String,
    pub rows: Vec<Vec<String>>,
}

/// Read access to a workbook, independent of the file format.
pub trait WorkbookSource {
    /// All sheets in workbook order.
    fn sheets(&mut self) -> Result<Vec<Sheet>, ConvertError>;
}

/// `.xlsx` adapter.
pub struct XlsxSource {
    path: PathBuf,
}

/// `.xls` adapter.
pub struct XlsSource {
    path: PathBuf,
}

impl WorkbookSource for XlsxSource {
    fn sheets(&mut self) -> Result<Vec<Sheet>, ConvertError> {
        let mut workbook: Xlsx<_> =
            open_workbook(&self.path).map_err(|e: calamine::XlsxError| parse_error(&self.path, e))?;
        collect_sheets(&mut workbook, &self.path)
    }
}

impl WorkbookSource for XlsSource {
    fn sheets(&mut self) -> Result<Vec<Sheet>, ConvertError> {
        let mut workbook: Xls<_> =
            open_workbook(&self.path).map_err(|e: calamine::XlsError| parse_error(&self.path, e))?;
        collect_sheets(&mut workbook, &self.path)
    }
}

/// Pick the adapter for `path` by extension.
pub fn open_source(path: &Path) -> Result<Box<dyn WorkbookSource>, ConvertError> {
    match extension_of(path).as_str() {
        ".xlsx" => Ok(Box::new(XlsxSource {
            path: path.to_path_buf(),
        })),
        ".xls" => Ok(Box::new(XlsSource {
            path: path.to_path_buf(),
        })),
        _ => Err(ConvertError::NotASpreadsheet {
            path: path.to_path_buf(),
        }),
    }
}

/// Read the workbook at `path` and render it as one HTML document.
pub fn spreadsheet_to_html(path: &Path) -> Result<String, ConvertError> {
    let mut source = open_source(path)?;
    let sheets = source.sheets()?;
    debug!(
        "Read {} sheet(s) from {}",
        sheets.len(),
        path.display()
    );
    Ok(render_html(&sheets))
}

/// Render sheets as `<h1>name</h1><table>…</table><br/>` blocks inside a
/// styled HTML document.
pub fn render_html(sheets: &[Sheet]) -> String {
    let mut html = String::with_capacity(4096);
    html.push_str("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<style>\n");
    html.push_str(TABLE_STYLE);
    html.push_str("\n</style>\n</head>\n<body>\n");

    for sheet in sheets {
        let _ = write!(html, "<h1>{}</h1><table>", escape_html(&sheet.name));
        for row in &sheet.rows {
            html.push_str("<tr>");
            for cell in row {
                let _ = write!(html, "<td>{}</td>", escape_html(cell));
            }
            html.push_str("</tr>");
        }
        html.push_str("</table><br/>\n");
    }

    html.push_str("</body>\n</html>\n");
    html
}

fn collect_sheets<R, RS>(workbook: &mut R, path: &Path) -> Result<Vec<Sheet>, ConvertError>
where
    R: Reader<RS>,
    RS: Read + Seek,
    R::Error: std::fmt::Display,
{
    let names = workbook.sheet_names();
    let mut sheets = Vec::with_capacity(names.len());
    for name in names {
        let range = workbook
            .worksheet_range(&name)
            .map_err(|e| parse_error(path, format!("sheet '{name}': {e}")))?;
        sheets.push(Sheet {
            rows: anchored_rows(&range),
            name,
        });
    }
    Ok(sheets)
}

/// Flatten a range into rows of cell strings, starting at A1.
fn anchored_rows(range: &Range<Data>) -> Vec<Vec<String>> {
    let Some((row0, col0)) = range.start() else {
        return Vec::new();
    };

    let mut rows: Vec<Vec<String>> = vec![Vec::new(); row0 as usize];
    for row in range.rows() {
        let used = row
            .iter()
            .rposition(|c| !matches!(c, Data::Empty))
            .map_or(0, |i| i + 1);
        if used == 0 {
            rows.push(Vec::new());
            continue;
        }
        let mut cells = vec![String::new(); col0 as usize];
        cells.extend(row[..used].iter().map(cell_text));
        rows.push(cells);
    }
    rows
}

/// The cell value as the parser resolved it.
fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) => f.to_string(),
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => dt
            .as_datetime()
            .map(|d| d.format("%Y-%m-%dT%H:%M:%S").to_string())
            .unwrap_or_else(|| dt.as_f64().to_string()),
        Data::Error(e) => e.to_string(),
    }
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

fn parse_error(path: &Path, e: impl std::fmt::Display) -> ConvertError {
    ConvertError::SpreadsheetParse {
        path: path.to_path_buf(),
        detail: e.to_string(),
    }
}
