//! Best-effort extraction of a bounded text prefix for content search.
//!
//! Plain-text files are decoded with an ordered list of candidate encodings.
//! Document formats go through pluggable [`DocumentReader`]s; when no reader
//! is installed for a format the raw bytes are decoded as text instead.
//! Nothing in here ever fails a scan: every problem becomes `None`.

use crate::utils::file_types::ContentKind;
use encoding_rs::Encoding;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Maximum number of characters inspected per file.
pub const DEFAULT_CONTENT_BUDGET: usize = 3000;

pub const DEFAULT_ENCODINGS: &[&str] = &["utf-8", "gbk", "latin-1"];

/// A capability that can pull text out of one document format.
pub trait DocumentReader: Send + Sync {
    /// Returns the document text, stopping once roughly `budget` characters
    /// have been collected. The caller truncates to the exact budget.
    fn read_text(&self, path: &Path, budget: usize) -> anyhow::Result<String>;
}

pub struct ContentExtractor {
    budget: usize,
    encodings: Vec<&'static Encoding>,
    pdf: Option<Box<dyn DocumentReader>>,
    word: Option<Box<dyn DocumentReader>>,
    spreadsheet: Option<Box<dyn DocumentReader>>,
}

impl Default for ContentExtractor {
    fn default() -> Self {
        Self::new(DEFAULT_CONTENT_BUDGET)
    }
}

impl std::fmt::Debug for ContentExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentExtractor")
            .field("budget", &self.budget)
            .field(
                "encodings",
                &self.encodings.iter().map(|e| e.name()).collect::<Vec<_>>(),
            )
            .field("pdf", &self.pdf.is_some())
            .field("word", &self.word.is_some())
            .field("spreadsheet", &self.spreadsheet.is_some())
            .finish()
    }
}

impl ContentExtractor {
    /// Creates an extractor with the default encodings and every built-in
    /// document reader this build was compiled with.
    pub fn new(budget: usize) -> Self {
        let extractor = Self {
            budget,
            encodings: Vec::new(),
            pdf: None,
            word: None,
            spreadsheet: None,
        }
        .with_encodings(DEFAULT_ENCODINGS);

        #[cfg(feature = "office")]
        let extractor = extractor
            .with_word_reader(Box::new(office::DocxReader))
            .with_spreadsheet_reader(Box::new(office::XlsxReader));

        #[cfg(feature = "pdf")]
        let extractor = extractor.with_pdf_reader(Box::new(pdf::PdfReader));

        extractor
    }

    /// Replaces the candidate encodings. Unknown labels are skipped.
    pub fn with_encodings<S: AsRef<str>>(mut self, labels: &[S]) -> Self {
        self.encodings = labels
            .iter()
            .filter_map(|label| {
                let label = label.as_ref();
                let encoding = Encoding::for_label(label.trim().as_bytes());
                if encoding.is_none() {
                    tracing::warn!("Ignoring unknown text encoding '{}'", label);
                }
                encoding
            })
            .collect();
        self
    }

    pub fn with_pdf_reader(mut self, reader: Box<dyn DocumentReader>) -> Self {
        self.pdf = Some(reader);
        self
    }

    pub fn with_word_reader(mut self, reader: Box<dyn DocumentReader>) -> Self {
        self.word = Some(reader);
        self
    }

    pub fn with_spreadsheet_reader(mut self, reader: Box<dyn DocumentReader>) -> Self {
        self.spreadsheet = Some(reader);
        self
    }

    /// Drops every document reader, forcing the raw-bytes fallback.
    pub fn without_document_readers(mut self) -> Self {
        self.pdf = None;
        self.word = None;
        self.spreadsheet = None;
        self
    }

    pub fn with_budget(mut self, budget: usize) -> Self {
        self.budget = budget;
        self
    }

    pub fn budget(&self) -> usize {
        self.budget
    }

    /// Whether a dedicated reader is installed for `kind`.
    pub fn has_reader(&self, kind: ContentKind) -> bool {
        match kind {
            ContentKind::Pdf => self.pdf.is_some(),
            ContentKind::WordDocument => self.word.is_some(),
            ContentKind::Spreadsheet => self.spreadsheet.is_some(),
            ContentKind::PlainText | ContentKind::Unsupported => false,
        }
    }

    /// Returns at most `budget` characters of text from `path`, or `None`
    /// when the format is unsupported or the file cannot be read.
    pub fn extract(&self, path: &Path) -> Option<String> {
        match ContentKind::for_path(path) {
            ContentKind::Unsupported => None,
            ContentKind::PlainText => self.read_text_prefix(path),
            ContentKind::Pdf => self.read_document(self.pdf.as_deref(), path),
            ContentKind::WordDocument => self.read_document(self.word.as_deref(), path),
            ContentKind::Spreadsheet => self.read_document(self.spreadsheet.as_deref(), path),
        }
    }

    fn read_document(&self, reader: Option<&dyn DocumentReader>, path: &Path) -> Option<String> {
        let Some(reader) = reader else {
            return self.read_text_prefix(path);
        };
        match reader.read_text(path, self.budget) {
            Ok(text) => Some(truncate_chars(text, self.budget)),
            Err(e) => {
                tracing::debug!("Content extraction failed for {}: {:#}", path.display(), e);
                None
            }
        }
    }

    /// Decodes the start of any file as text, whatever its extension.
    pub fn read_text_prefix(&self, path: &Path) -> Option<String> {
        // Four bytes per character covers the widest UTF-8 sequence.
        let limit = (self.budget as u64).saturating_mul(4);
        let mut bytes = Vec::new();
        let read = File::open(path).and_then(|file| file.take(limit).read_to_end(&mut bytes));
        if let Err(e) = read {
            tracing::debug!("Cannot read {} for content search: {}", path.display(), e);
            return None;
        }
        let truncated = bytes.len() as u64 == limit;
        Some(self.decode_prefix(&bytes, truncated))
    }

    /// Decodes with the first encoding that accepts the bytes without errors.
    /// If none does, undecodable bytes are dropped.
    pub fn decode_prefix(&self, bytes: &[u8], truncated: bool) -> String {
        // A prefix cut at the limit may end inside a multi-byte sequence.
        let max_trim = if truncated { 3.min(bytes.len()) } else { 0 };

        for encoding in &self.encodings {
            for trim in 0..=max_trim {
                let slice = &bytes[..bytes.len() - trim];
                if let Some(text) = encoding.decode_without_bom_handling_and_without_replacement(slice)
                {
                    let text = text.trim_start_matches('\u{feff}').to_string();
                    return truncate_chars(text, self.budget);
                }
            }
        }

        let lossy: String = String::from_utf8_lossy(bytes)
            .chars()
            .filter(|c| *c != char::REPLACEMENT_CHARACTER)
            .collect();
        truncate_chars(lossy, self.budget)
    }
}

fn truncate_chars(mut text: String, budget: usize) -> String {
    if let Some((index, _)) = text.char_indices().nth(budget) {
        text.truncate(index);
    }
    text
}

#[cfg(feature = "pdf")]
pub mod pdf {
    //! Page-by-page text extraction for PDF documents.

    use super::DocumentReader;
    use lopdf::Document;
    use std::path::Path;

    pub struct PdfReader;

    impl DocumentReader for PdfReader {
        fn read_text(&self, path: &Path, budget: usize) -> anyhow::Result<String> {
            let document = Document::load(path)?;
            let mut text = String::new();

            for page_number in document.get_pages().into_keys() {
                match document.extract_text(&[page_number]) {
                    Ok(page) => text.push_str(&page),
                    // One unreadable page does not spoil the rest of the document.
                    Err(e) => tracing::debug!(
                        "Skipping page {} of {}: {}",
                        page_number,
                        path.display(),
                        e
                    ),
                }
                if text.chars().count() >= budget {
                    break;
                }
            }
            Ok(text)
        }
    }
}

#[cfg(feature = "office")]
pub mod office {
    //! Readers for the zipped XML office formats.

    use super::DocumentReader;
    use std::fs::File;
    use std::io::{BufReader, Read};
    use std::path::Path;
    use xml::reader::{EventReader, XmlEvent};
    use zip::result::ZipError;
    use zip::ZipArchive;

    /// Concatenates `.docx` paragraph text.
    pub struct DocxReader;

    /// Concatenates `.xlsx` cell values row by row, sheet by sheet.
    pub struct XlsxReader;

    fn open_archive(path: &Path) -> anyhow::Result<ZipArchive<BufReader<File>>> {
        let file = File::open(path)?;
        Ok(ZipArchive::new(BufReader::new(file))?)
    }

    impl DocumentReader for DocxReader {
        fn read_text(&self, path: &Path, budget: usize) -> anyhow::Result<String> {
            let mut archive = open_archive(path)?;
            let document = archive.by_name("word/document.xml")?;

            let mut text = String::new();
            let mut paragraph = String::new();
            let mut in_run_text = false;

            for event in EventReader::new(BufReader::new(document)) {
                match event? {
                    XmlEvent::StartElement { name, .. } if name.local_name == "t" => {
                        in_run_text = true;
                    }
                    XmlEvent::EndElement { name } if name.local_name == "t" => {
                        in_run_text = false;
                    }
                    XmlEvent::Characters(chars) | XmlEvent::Whitespace(chars) if in_run_text => {
                        paragraph.push_str(&chars);
                    }
                    XmlEvent::EndElement { name } if name.local_name == "p" => {
                        text.push_str(&paragraph);
                        text.push(' ');
                        paragraph.clear();
                        if text.chars().count() > budget {
                            break;
                        }
                    }
                    _ => {}
                }
            }
            Ok(text)
        }
    }

    fn read_shared_strings<R: Read>(reader: R) -> anyhow::Result<Vec<String>> {
        let mut strings = Vec::new();
        let mut current = String::new();
        let mut in_text = false;

        for event in EventReader::new(BufReader::new(reader)) {
            match event? {
                XmlEvent::StartElement { name, .. } if name.local_name == "t" => in_text = true,
                XmlEvent::EndElement { name } if name.local_name == "t" => in_text = false,
                XmlEvent::Characters(chars) | XmlEvent::Whitespace(chars) if in_text => {
                    current.push_str(&chars);
                }
                XmlEvent::EndElement { name } if name.local_name == "si" => {
                    strings.push(std::mem::take(&mut current));
                }
                _ => {}
            }
        }
        Ok(strings)
    }

    impl DocumentReader for XlsxReader {
        fn read_text(&self, path: &Path, budget: usize) -> anyhow::Result<String> {
            let mut archive = open_archive(path)?;

            let shared = match archive.by_name("xl/sharedStrings.xml") {
                Ok(entry) => read_shared_strings(entry)?,
                Err(ZipError::FileNotFound) => Vec::new(),
                Err(e) => return Err(e.into()),
            };

            let mut sheets: Vec<(u32, String)> = archive
                .file_names()
                .filter_map(|name| {
                    let number = name
                        .strip_prefix("xl/worksheets/sheet")?
                        .strip_suffix(".xml")?
                        .parse()
                        .ok()?;
                    Some((number, name.to_string()))
                })
                .collect();
            sheets.sort();

            let mut text = String::new();
            'sheets: for (_, sheet_name) in sheets {
                let sheet = archive.by_name(&sheet_name)?;
                let mut cell_type: Option<String> = None;
                let mut in_value = false;
                let mut value = String::new();

                for event in EventReader::new(BufReader::new(sheet)) {
                    match event? {
                        XmlEvent::StartElement { name, attributes, .. } if name.local_name == "c" => {
                            cell_type = attributes
                                .into_iter()
                                .find(|attr| attr.name.local_name == "t")
                                .map(|attr| attr.value);
                        }
                        XmlEvent::StartElement { name, .. }
                            if name.local_name == "v" || name.local_name == "t" =>
                        {
                            in_value = true;
                            value.clear();
                        }
                        XmlEvent::Characters(chars) | XmlEvent::Whitespace(chars) if in_value => {
                            value.push_str(&chars);
                        }
                        XmlEvent::EndElement { name }
                            if name.local_name == "v" || name.local_name == "t" =>
                        {
                            in_value = false;
                            let cell = if name.local_name == "v" && cell_type.as_deref() == Some("s") {
                                value
                                    .trim()
                                    .parse::<usize>()
                                    .ok()
                                    .and_then(|index| shared.get(index))
                                    .cloned()
                                    .unwrap_or_default()
                            } else {
                                value.clone()
                            };
                            if !cell.is_empty() {
                                text.push_str(&cell);
                                text.push(' ');
                            }
                        }
                        XmlEvent::EndElement { name } if name.local_name == "row" => {
                            if text.chars().count() > budget {
                                break 'sheets;
                            }
                        }
                        _ => {}
                    }
                }
            }
            Ok(text)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    struct FixedReader(&'static str);

    impl DocumentReader for FixedReader {
        fn read_text(&self, _path: &Path, _budget: usize) -> anyhow::Result<String> {
            Ok(self.0.to_string())
        }
    }

    struct FailingReader;

    impl DocumentReader for FailingReader {
        fn read_text(&self, _path: &Path, _budget: usize) -> anyhow::Result<String> {
            anyhow::bail!("corrupt document")
        }
    }

    #[test]
    fn test_plain_text_is_capped_at_budget() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("long.txt");
        fs::write(&path, "a".repeat(5000)).unwrap();

        let text = ContentExtractor::default().extract(&path).unwrap();
        assert_eq!(text.chars().count(), DEFAULT_CONTENT_BUDGET);
    }

    #[test]
    fn test_gbk_fallback_when_utf8_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        // "中文" encoded as GBK.
        fs::write(&path, [0xD6, 0xD0, 0xCE, 0xC4]).unwrap();

        let text = ContentExtractor::default().extract(&path).unwrap();
        assert_eq!(text, "中文");
    }

    #[test]
    fn test_truncated_multibyte_tail_still_decodes_as_utf8() {
        let extractor = ContentExtractor::new(10);
        let mut bytes = "héllo".as_bytes().to_vec();
        bytes.push(0xC3); // first half of another "é"
        assert_eq!(extractor.decode_prefix(&bytes, true), "héllo");
    }

    #[test]
    fn test_undecodable_bytes_are_dropped_without_fallback_encoding() {
        let extractor = ContentExtractor::new(100).with_encodings(&["utf-8"]);
        assert_eq!(extractor.decode_prefix(b"ab\xFFcd", false), "abcd");
    }

    #[test]
    fn test_unsupported_type_yields_none() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("photo.jpg");
        fs::write(&path, "final version").unwrap();
        assert!(ContentExtractor::default().extract(&path).is_none());
    }

    #[test]
    fn test_missing_reader_falls_back_to_raw_bytes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("scan.pdf");
        fs::write(&path, "%PDF-1.4 plain quarterly figures").unwrap();

        let extractor = ContentExtractor::default().without_document_readers();
        assert!(!extractor.has_reader(ContentKind::Pdf));
        let text = extractor.extract(&path).unwrap();
        assert!(text.contains("quarterly figures"));
    }

    #[test]
    fn test_installed_reader_is_used_and_failures_become_none() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("scan.pdf");
        fs::write(&path, "raw").unwrap();

        let extractor = ContentExtractor::new(5).with_pdf_reader(Box::new(FixedReader("page one text")));
        assert_eq!(extractor.extract(&path).as_deref(), Some("page "));

        let extractor = ContentExtractor::default().with_pdf_reader(Box::new(FailingReader));
        assert!(extractor.extract(&path).is_none());
    }

    #[test]
    fn test_missing_file_yields_none() {
        let dir = tempdir().unwrap();
        assert!(ContentExtractor::default()
            .extract(&dir.path().join("gone.txt"))
            .is_none());
    }

    #[cfg(feature = "office")]
    mod office_formats {
        use super::*;
        use std::io::Write;
        use zip::write::FileOptions;
        use zip::ZipWriter;

        fn write_zip(path: &Path, entries: &[(&str, &str)]) {
            let mut writer = ZipWriter::new(fs::File::create(path).unwrap());
            for (name, body) in entries {
                writer.start_file(*name, FileOptions::default()).unwrap();
                writer.write_all(body.as_bytes()).unwrap();
            }
            writer.finish().unwrap();
        }

        #[test]
        fn test_docx_paragraphs() {
            let dir = tempdir().unwrap();
            let path = dir.path().join("letter.docx");
            write_zip(
                &path,
                &[(
                    "word/document.xml",
                    r#"<?xml version="1.0"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>
<w:p><w:r><w:t>Final</w:t></w:r><w:r><w:t xml:space="preserve"> version</w:t></w:r></w:p>
<w:p><w:r><w:t>Second paragraph</w:t></w:r></w:p>
</w:body></w:document>"#,
                )],
            );

            let text = ContentExtractor::default().extract(&path).unwrap();
            assert_eq!(text, "Final version Second paragraph ");
        }

        #[test]
        fn test_xlsx_cells_with_shared_strings() {
            let dir = tempdir().unwrap();
            let path = dir.path().join("budget.xlsx");
            write_zip(
                &path,
                &[
                    (
                        "xl/sharedStrings.xml",
                        r#"<sst xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><si><t>Revenue</t></si><si><t>Costs</t></si></sst>"#,
                    ),
                    (
                        "xl/worksheets/sheet2.xml",
                        r#"<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData><row r="1"><c r="A1" t="inlineStr"><is><t>Second sheet</t></is></c></row></sheetData></worksheet>"#,
                    ),
                    (
                        "xl/worksheets/sheet1.xml",
                        r#"<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData><row r="1"><c r="A1" t="s"><v>0</v></c><c r="B1"><v>1200</v></c></row><row r="2"><c r="A2" t="s"><v>1</v></c></row></sheetData></worksheet>"#,
                    ),
                ],
            );

            let text = ContentExtractor::default().extract(&path).unwrap();
            assert_eq!(text, "Revenue 1200 Costs Second sheet ");
        }

        #[test]
        fn test_corrupt_docx_is_a_non_match() {
            let dir = tempdir().unwrap();
            let path = dir.path().join("broken.docx");
            fs::write(&path, "not a zip archive").unwrap();
            assert!(ContentExtractor::default().extract(&path).is_none());
        }
    }

    #[cfg(feature = "pdf")]
    mod pdf_documents {
        use super::*;
        use lopdf::content::{Content, Operation};
        use lopdf::{dictionary, Document, Object, Stream};

        /// Writes a PDF with one text line per page, compressed streams included.
        fn write_pdf(path: &Path, pages: &[&str]) {
            let mut doc = Document::with_version("1.5");
            let pages_id = doc.new_object_id();
            let font_id = doc.add_object(dictionary! {
                "Type" => "Font",
                "Subtype" => "Type1",
                "BaseFont" => "Courier",
            });
            let resources_id = doc.add_object(dictionary! {
                "Font" => dictionary! { "F1" => font_id },
            });

            let mut kids = Vec::new();
            for line in pages {
                let content = Content {
                    operations: vec![
                        Operation::new("BT", vec![]),
                        Operation::new("Tf", vec!["F1".into(), 24.into()]),
                        Operation::new("Td", vec![72.into(), 700.into()]),
                        Operation::new("Tj", vec![Object::string_literal(*line)]),
                        Operation::new("ET", vec![]),
                    ],
                };
                let content_id =
                    doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
                let page_id = doc.add_object(dictionary! {
                    "Type" => "Page",
                    "Parent" => pages_id,
                    "Contents" => content_id,
                    "Resources" => resources_id,
                });
                kids.push(page_id.into());
            }

            doc.objects.insert(
                pages_id,
                Object::Dictionary(dictionary! {
                    "Type" => "Pages",
                    "Kids" => kids,
                    "Count" => pages.len() as i64,
                    "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
                }),
            );
            let catalog_id = doc.add_object(dictionary! {
                "Type" => "Catalog",
                "Pages" => pages_id,
            });
            doc.trailer.set("Root", catalog_id);
            doc.compress();
            doc.save(path).unwrap();
        }

        #[test]
        fn test_default_extractor_reads_pdf_text() {
            let dir = tempdir().unwrap();
            let path = dir.path().join("minutes.pdf");
            write_pdf(&path, &["Quarterly figures approved"]);

            let extractor = ContentExtractor::default();
            assert!(extractor.has_reader(ContentKind::Pdf));
            let text = extractor.extract(&path).unwrap();
            assert!(text.contains("Quarterly figures approved"), "got {text:?}");
        }

        #[test]
        fn test_pdf_pages_stop_at_budget() {
            let dir = tempdir().unwrap();
            let path = dir.path().join("book.pdf");
            write_pdf(&path, &["alpha", "beta", "gamma"]);

            let text = pdf::PdfReader.read_text(&path, 3).unwrap();
            assert!(text.contains("alpha"));
            assert!(!text.contains("beta"));

            let all = pdf::PdfReader.read_text(&path, 1000).unwrap();
            assert!(all.contains("beta") && all.contains("gamma"));
        }

        #[test]
        fn test_corrupt_pdf_is_a_non_match() {
            let dir = tempdir().unwrap();
            let path = dir.path().join("broken.pdf");
            fs::write(&path, "not really a pdf").unwrap();
            assert!(ContentExtractor::default().extract(&path).is_none());
        }
    }
}
