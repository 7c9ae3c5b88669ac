//! Attachment preprocessing
//!
//! Classifies a selected file by declared media type, enforces the size cap,
//! and produces the best-effort local text extraction (spreadsheet preview or
//! UTF-8 read) that is held until send time.

use calamine::{Reader, open_workbook_auto_from_rs};
use std::io::Cursor;
use std::path::Path;
use thiserror::Error;
use tracing::warn;

pub const MAX_ATTACHMENT_BYTES: u64 = 10_485_760; // 10 MiB
pub const EXTRACTED_TEXT_CEILING: usize = 6000;
pub const TRUNCATION_MARKER: &str = "\n... (truncated)";
pub const PREVIEW_ROW_CAP: usize = 20;
pub const PREVIEW_ROW_NOTICE: &str = "Only the first 20 rows are shown.";

pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp", "bmp", "svg"];
pub const SPREADSHEET_EXTENSIONS: &[&str] = &["xlsx", "xls", "csv"];
pub const TEXT_EXTENSIONS: &[&str] = &["txt", "md", "log"];

const SPREADSHEET_MEDIA_TYPES: &[&str] = &[
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    "application/vnd.ms-excel",
    "text/csv",
];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PreprocessError {
    #[error("File is too large: {size_bytes} bytes (limit {max_bytes})")]
    TooLarge { size_bytes: u64, max_bytes: u64 },

    #[error("Failed to read workbook: {0}")]
    Workbook(String),
}

/// How an attachment is routed by the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentKind {
    Image,
    Spreadsheet,
    PlainText,
    Opaque,
}

/// Classify by declared media type, falling back to the file extension.
pub fn classify(name: &str, media_type: &str) -> AttachmentKind {
    let media_type = media_type.to_lowercase();
    let extension = extension_of(name);

    if media_type.starts_with("image/") || IMAGE_EXTENSIONS.contains(&extension.as_str()) {
        return AttachmentKind::Image;
    }
    if SPREADSHEET_MEDIA_TYPES.contains(&media_type.as_str())
        || SPREADSHEET_EXTENSIONS.contains(&extension.as_str())
    {
        return AttachmentKind::Spreadsheet;
    }
    if media_type.starts_with("text/") || TEXT_EXTENSIONS.contains(&extension.as_str()) {
        return AttachmentKind::PlainText;
    }
    AttachmentKind::Opaque
}

/// A file the user picked for the next send.
#[derive(Debug, Clone)]
pub struct SelectedFile {
    pub name: String,
    pub media_type: String,
    pub bytes: Vec<u8>,
}

impl SelectedFile {
    pub fn new(name: impl Into<String>, media_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            media_type: media_type.into(),
            bytes,
        }
    }

    pub fn size_bytes(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn kind(&self) -> AttachmentKind {
        classify(&self.name, &self.media_type)
    }
}

/// A validated selection plus whatever text was extracted locally, held
/// until the next send.
#[derive(Debug, Clone)]
pub struct StagedAttachment {
    pub file: SelectedFile,
    pub extracted_text: Option<String>,
}

/// Enforce the attachment size cap.
pub fn validate(file: &SelectedFile) -> Result<(), PreprocessError> {
    let size_bytes = file.size_bytes();
    if size_bytes > MAX_ATTACHMENT_BYTES {
        return Err(PreprocessError::TooLarge {
            size_bytes,
            max_bytes: MAX_ATTACHMENT_BYTES,
        });
    }
    Ok(())
}

/// Validate a selection and run local extraction.
///
/// Only the size cap is fatal; an unreadable workbook degrades to "no local
/// extraction" so the send can still defer to the remote extractor.
pub fn stage(file: SelectedFile) -> Result<StagedAttachment, PreprocessError> {
    validate(&file)?;
    let extracted_text = match extract_local(&file) {
        Ok(text) => text,
        Err(error) => {
            warn!(file = %file.name, error = %error, "Local extraction failed");
            None
        }
    };
    Ok(StagedAttachment {
        file,
        extracted_text,
    })
}

/// Best-effort local extraction by attachment kind.
///
/// Images and opaque documents return `None`: images go to vision, opaque
/// types to the remote extractor, both at send time.
pub fn extract_local(file: &SelectedFile) -> Result<Option<String>, PreprocessError> {
    match file.kind() {
        AttachmentKind::Image | AttachmentKind::Opaque => Ok(None),
        AttachmentKind::PlainText => {
            Ok(Some(String::from_utf8_lossy(&file.bytes).into_owned()))
        }
        AttachmentKind::Spreadsheet => spreadsheet_preview(file).map(Some),
    }
}

/// Render a bounded tabular preview of a spreadsheet attachment.
fn spreadsheet_preview(file: &SelectedFile) -> Result<String, PreprocessError> {
    let is_csv =
        file.media_type.eq_ignore_ascii_case("text/csv") || extension_of(&file.name) == "csv";
    if is_csv {
        let rows = csv_rows(&String::from_utf8_lossy(&file.bytes));
        return Ok(preview_from_sheets(&[(String::new(), rows)]));
    }

    let mut workbook = open_workbook_auto_from_rs(Cursor::new(file.bytes.as_slice()))
        .map_err(|e| PreprocessError::Workbook(e.to_string()))?;
    let sheets: Vec<(String, Vec<Vec<String>>)> = workbook
        .worksheets()
        .into_iter()
        .map(|(name, range)| {
            let rows = range
                .rows()
                .map(|row| row.iter().map(|cell| cell.to_string()).collect())
                .collect();
            (name, rows)
        })
        .collect();
    Ok(preview_from_sheets(&sheets))
}

/// Plain comma split. Quoted fields are not interpreted; the preview is a
/// hint for the assistant, not a faithful CSV parse.
fn csv_rows(text: &str) -> Vec<Vec<String>> {
    text.lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.split(',').map(|cell| cell.trim().to_string()).collect())
        .collect()
}

/// Assemble the notice plus one pipe grid per non-empty sheet.
fn preview_from_sheets(sheets: &[(String, Vec<Vec<String>>)]) -> String {
    let mut sections = Vec::new();
    for (name, rows) in sheets {
        let table = grid(rows);
        if table.is_empty() {
            continue;
        }
        if name.is_empty() {
            sections.push(table);
        } else {
            sections.push(format!("Sheet: {}\n{}", name, table));
        }
    }
    if sections.is_empty() {
        return String::new();
    }
    format!("{}\n\n{}", PREVIEW_ROW_NOTICE, sections.join("\n"))
}

/// Pipe-delimited grid: header row, separator row, then at most
/// [`PREVIEW_ROW_CAP`] data rows.
fn grid(rows: &[Vec<String>]) -> String {
    let Some((header, data)) = rows.split_first() else {
        return String::new();
    };
    let mut out = String::new();
    out.push_str(&format!("| {} |\n", header.join(" | ")));
    out.push_str(&format!("| {} |\n", vec!["---"; header.len()].join(" | ")));
    for row in data.iter().take(PREVIEW_ROW_CAP) {
        out.push_str(&format!("| {} |\n", row.join(" | ")));
    }
    out
}

/// Cut extracted text to the prompt ceiling, marking the cut.
pub fn truncate_extracted(text: &str) -> String {
    if text.chars().count() <= EXTRACTED_TEXT_CEILING {
        return text.to_string();
    }
    let cut: String = text.chars().take(EXTRACTED_TEXT_CEILING).collect();
    format!("{}{}", cut, TRUNCATION_MARKER)
}

/// Declared media type for a path, from its extension.
pub fn media_type_for_path(path: &Path) -> String {
    let extension = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        "svg" => "image/svg+xml",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "xls" => "application/vnd.ms-excel",
        "csv" => "text/csv",
        "txt" | "log" => "text/plain",
        "md" => "text/markdown",
        "html" => "text/html",
        "json" => "application/json",
        "pdf" => "application/pdf",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        _ => "application/octet-stream",
    }
    .to_string()
}

fn extension_of(name: &str) -> String {
    Path::new(name)
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn csv_file(data_rows: usize) -> SelectedFile {
        let mut text = String::from("name,amount\n");
        for i in 0..data_rows {
            text.push_str(&format!("row{},{}\n", i, i * 10));
        }
        SelectedFile::new("sales.csv", "text/csv", text.into_bytes())
    }

    #[test]
    fn test_classify_by_media_type() {
        assert_eq!(classify("photo", "image/png"), AttachmentKind::Image);
        assert_eq!(classify("data", "text/csv"), AttachmentKind::Spreadsheet);
        assert_eq!(classify("notes", "text/plain"), AttachmentKind::PlainText);
        assert_eq!(
            classify("paper", "application/pdf"),
            AttachmentKind::Opaque
        );
    }

    #[test]
    fn test_classify_falls_back_to_extension() {
        assert_eq!(
            classify("photo.JPG", "application/octet-stream"),
            AttachmentKind::Image
        );
        assert_eq!(
            classify("report.xlsx", "application/octet-stream"),
            AttachmentKind::Spreadsheet
        );
        assert_eq!(
            classify("readme.md", "application/octet-stream"),
            AttachmentKind::PlainText
        );
        assert_eq!(
            classify("archive.zip", "application/octet-stream"),
            AttachmentKind::Opaque
        );
    }

    #[test]
    fn test_validate_rejects_oversized_file() {
        let file = SelectedFile::new(
            "big.bin",
            "application/octet-stream",
            vec![0u8; (MAX_ATTACHMENT_BYTES + 1) as usize],
        );
        assert_eq!(
            validate(&file),
            Err(PreprocessError::TooLarge {
                size_bytes: MAX_ATTACHMENT_BYTES + 1,
                max_bytes: MAX_ATTACHMENT_BYTES,
            })
        );
    }

    #[test]
    fn test_validate_accepts_file_at_limit() {
        let file = SelectedFile::new("ok.txt", "text/plain", vec![0u8; 16]);
        assert!(validate(&file).is_ok());
    }

    #[test]
    fn test_spreadsheet_preview_caps_data_rows() {
        let staged = stage(csv_file(30)).unwrap();
        let preview = staged.extracted_text.unwrap();

        assert!(preview.contains(PREVIEW_ROW_NOTICE));
        assert!(preview.contains("| name | amount |"));
        assert!(preview.contains("| --- | --- |"));

        let data_rows = preview
            .lines()
            .filter(|line| line.starts_with("| row"))
            .count();
        assert_eq!(data_rows, PREVIEW_ROW_CAP);
        assert!(preview.contains("| row19 | 190 |"));
        assert!(!preview.contains("| row20 | 200 |"));
    }

    #[test]
    fn test_small_spreadsheet_keeps_all_rows() {
        let staged = stage(csv_file(3)).unwrap();
        let preview = staged.extracted_text.unwrap();
        assert!(preview.contains("| row2 | 20 |"));
    }

    #[test]
    fn test_plain_text_reads_utf8_lossy() {
        let mut bytes = b"hello ".to_vec();
        bytes.push(0xFF);
        let staged = stage(SelectedFile::new("notes.txt", "text/plain", bytes)).unwrap();
        let text = staged.extracted_text.unwrap();
        assert!(text.starts_with("hello "));
    }

    #[test]
    fn test_opaque_and_image_skip_local_extraction() {
        let pdf = stage(SelectedFile::new("a.pdf", "application/pdf", vec![1, 2, 3])).unwrap();
        assert!(pdf.extracted_text.is_none());

        let image = stage(SelectedFile::new("a.png", "image/png", vec![1, 2, 3])).unwrap();
        assert!(image.extracted_text.is_none());
    }

    #[test]
    fn test_truncate_extracted_applies_ceiling_and_marker() {
        let text = "x".repeat(EXTRACTED_TEXT_CEILING + 500);
        let cut = truncate_extracted(&text);
        assert_eq!(
            cut.chars().count(),
            EXTRACTED_TEXT_CEILING + TRUNCATION_MARKER.chars().count()
        );
        assert!(cut.ends_with(TRUNCATION_MARKER));

        let short = "short enough";
        assert_eq!(truncate_extracted(short), short);
    }

    #[test]
    fn test_media_type_for_path() {
        assert_eq!(media_type_for_path(Path::new("a/b/photo.PNG")), "image/png");
        assert_eq!(media_type_for_path(Path::new("data.csv")), "text/csv");
        assert_eq!(
            media_type_for_path(Path::new("unknown.xyz")),
            "application/octet-stream"
        );
    }
}
