use serde::{Deserialize, Serialize};
use std::path::Path;

/// Extensions whose content is searched by decoding the raw bytes as text.
const TEXT_EXTENSIONS: &[&str] = &[
    "txt", "md", "markdown", "rst", "adoc", "log", "csv", "tsv",
    "rs", "py", "js", "ts", "jsx", "tsx", "java", "c", "cpp", "cxx", "cc", "h", "hpp",
    "go", "rb", "php", "swift", "kt", "scala", "cs", "lua", "pl", "r", "sql",
    "sh", "bash", "zsh", "ps1", "bat", "cmd",
    "html", "htm", "xml", "xhtml", "css", "scss", "less", "svg", "vue",
    "json", "jsonl", "yaml", "yml", "toml", "ini", "cfg", "conf", "config", "properties",
    "env", "tex", "bib", "org",
];

const DOCUMENT_EXTENSIONS: &[&str] = &[".doc", ".docx", ".txt", ".pdf", ".xls", ".xlsx", ".ppt", ".pptx"];
const IMAGE_EXTENSIONS: &[&str] = &[".jpg", ".jpeg", ".png", ".gif", ".bmp", ".tiff", ".webp"];
const VIDEO_EXTENSIONS: &[&str] = &[".mp4", ".avi", ".mov", ".mkv", ".flv", ".wmv", ".mpg"];
const AUDIO_EXTENSIONS: &[&str] = &[".mp3", ".wav", ".flac", ".aac", ".ogg", ".wma"];
const EXECUTABLE_EXTENSIONS: &[&str] = &[".exe", ".msi", ".bat", ".cmd"];
const ARCHIVE_EXTENSIONS: &[&str] = &[".zip", ".rar", ".7z", ".tar", ".gz"];

/// The content-extraction strategy for a file, chosen by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    PlainText,
    Pdf,
    WordDocument,
    Spreadsheet,
    Unsupported,
}

impl ContentKind {
    pub fn for_path(path: &Path) -> Self {
        let Some(ext) = extension_of(path) else {
            return ContentKind::Unsupported;
        };
        match ext.as_str() {
            ".pdf" => ContentKind::Pdf,
            ".docx" => ContentKind::WordDocument,
            ".xlsx" => ContentKind::Spreadsheet,
            other if TEXT_EXTENSIONS.contains(&&other[1..]) => ContentKind::PlainText,
            _ => ContentKind::Unsupported,
        }
    }
}

/// Preset groups offered for the file-type filter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileTypeClass {
    #[default]
    All,
    Documents,
    Images,
    Video,
    Audio,
    Executables,
    Archives,
    /// Uses the user-supplied extension list.
    Custom,
}

impl FileTypeClass {
    /// Preset extensions; empty for `All` and `Custom`.
    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            FileTypeClass::All | FileTypeClass::Custom => &[],
            FileTypeClass::Documents => DOCUMENT_EXTENSIONS,
            FileTypeClass::Images => IMAGE_EXTENSIONS,
            FileTypeClass::Video => VIDEO_EXTENSIONS,
            FileTypeClass::Audio => AUDIO_EXTENSIONS,
            FileTypeClass::Executables => EXECUTABLE_EXTENSIONS,
            FileTypeClass::Archives => ARCHIVE_EXTENSIONS,
        }
    }
}

/// Lower-cased extension of `path` including the leading dot.
pub fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| format!(".{}", ext.to_lowercase()))
}

/// Normalizes user input such as `PY`, `.py` or ` .Py ` to `.py`.
pub fn normalize_extension(raw: &str) -> Option<String> {
    let trimmed = raw.trim().trim_start_matches('.');
    if trimmed.is_empty() {
        None
    } else {
        Some(format!(".{}", trimmed.to_lowercase()))
    }
}

/// Parses a `;`-separated list like `.py;.java;.cpp`.
pub fn parse_extension_list(raw: &str) -> Vec<String> {
    raw.split(';').filter_map(normalize_extension).collect()
}
