//! Renders user attachments into the file-context block of the prompt.

use calamine::{Data, Reader, open_workbook_auto};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

/// Placeholder context when the user attached nothing.
pub const NO_FILES_CONTEXT: &str = "No files were provided as context.";

/// A file the user attached to a generation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    /// Display name used in the START/END markers.
    pub name: String,
    pub path: PathBuf,
}

impl Attachment {
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());
        Self { name, path }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AttachmentKind {
    Csv,
    Spreadsheet,
    Text,
    Unsupported,
}

fn classify(path: &Path) -> AttachmentKind {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "csv" => AttachmentKind::Csv,
        "xlsx" | "xlsm" | "xls" | "ods" => AttachmentKind::Spreadsheet,
        "txt" | "py" => AttachmentKind::Text,
        _ => AttachmentKind::Unsupported,
    }
}

/// Concatenate every attachment between START/END markers.
///
/// Read failures are rendered inline; this function never fails.
pub fn render_attachments(attachments: &[Attachment]) -> String {
    if attachments.is_empty() {
        return NO_FILES_CONTEXT.to_string();
    }

    let mut out = String::new();
    for attachment in attachments {
        let _ = writeln!(out, "--- START OF FILE: {} ---", attachment.name);
        let body = match classify(&attachment.path) {
            AttachmentKind::Csv => render_csv(&attachment.path),
            AttachmentKind::Spreadsheet => render_workbook(&attachment.path),
            AttachmentKind::Text => {
                std::fs::read_to_string(&attachment.path).map_err(|e| e.to_string())
            }
            AttachmentKind::Unsupported => Ok("Unsupported file type.".to_string()),
        };
        match body {
            Ok(text) => {
                out.push_str(&text);
                out.push('\n');
            }
            Err(e) => {
                tracing::warn!(file = %attachment.path.display(), error = %e, "attachment unreadable");
                let _ = writeln!(out, "Error reading file: {}", e);
            }
        }
        let _ = write!(out, "--- END OF FILE: {} ---\n\n", attachment.name);
    }
    out
}

fn render_csv(path: &Path) -> Result<String, String> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .has_headers(false)
        .from_path(path)
        .map_err(|e| e.to_string())?;
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| e.to_string())?;
        rows.push(record.iter().map(str::to_string).collect());
    }
    Ok(render_table(&rows))
}

fn render_workbook(path: &Path) -> Result<String, String> {
    let mut workbook = open_workbook_auto(path).map_err(|e| e.to_string())?;
    let mut out = String::new();
    for (i, sheet) in workbook.sheet_names().into_iter().enumerate() {
        if i > 0 {
            let _ = write!(out, "\n\n--- Content of sheet: {} ---\n", sheet);
        }
        let range = workbook
            .worksheet_range(&sheet)
            .map_err(|e| e.to_string())?;
        let rows: Vec<Vec<String>> = range
            .rows()
            .map(|row| row.iter().map(cell_text).collect())
            .collect();
        out.push_str(&render_table(&rows));
    }
    Ok(out)
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        other => other.to_string(),
    }
}

/// Left-aligned columns separated by two spaces. The first row is the header.
fn render_table(rows: &[Vec<String>]) -> String {
    if rows.is_empty() {
        return "(empty)".to_string();
    }
    let columns = rows.iter().map(Vec::len).max().unwrap_or(0);
    let mut widths = vec![0usize; columns];
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            widths[i] = widths[i].max(cell.chars().count());
        }
    }

    rows.iter()
        .map(|row| {
            let line = (0..columns)
                .map(|i| {
                    let cell = row.get(i).map_or("", String::as_str);
                    format!("{:<width$}", cell, width = widths[i])
                })
                .collect::<Vec<_>>()
                .join("  ");
            line.trim_end().to_string()
        })
        .collect::<Vec<_>>()
        .join("\n")
}
