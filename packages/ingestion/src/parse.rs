//! Content-type dispatch and text extraction.
//!
//! Parsing never fails the pipeline: backend errors are recorded under
//! the `error` key of `parser_info` and yield empty extracted text,
//! which the engine counts as a parse failure.

use std::collections::BTreeMap;
use std::io::Read;
use std::sync::{Arc, LazyLock};

use regex::Regex;
use tracing::debug;

use crate::error::ParseError;
use crate::text::{collapse_whitespace, decode_entities, strip_tags, truncate_chars};
use crate::types::RawDocument;

/// Character cap for PDF-extracted text.
const PDF_TEXT_MAX_CHARS: usize = 2_000_000;

/// Character cap for unrecognized bodies decoded as text.
const PLAIN_TEXT_MAX_CHARS: usize = 200_000;

static RE_HTML_BLOCKS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<(script|style|nav|header|footer)[^>]*>.*?</(script|style|nav|header|footer)>")
        .unwrap()
});

/// Pluggable PDF text backend.
///
/// PDF extraction is opaque to the pipeline; production wires a real
/// backend here, tests use a canned one, and with no backend installed
/// every PDF records a parse failure and flows on with empty text.
pub trait PdfTextExtractor: Send + Sync {
    fn extract_text(&self, bytes: &[u8]) -> Result<String, ParseError>;
}

/// Body-derived fields of a parsed document.
#[derive(Debug, Clone, Default)]
pub struct ParsedContent {
    pub extracted_text: String,
    pub snapshot_html: Option<String>,
    pub parser_info: BTreeMap<String, String>,
}

impl ParsedContent {
    /// Whether the parser recorded a failure for this body.
    pub fn failed(&self) -> bool {
        self.parser_info.contains_key("error")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BodyKind {
    Pdf,
    Html,
    Docx,
    Other,
}

pub struct ParseService {
    pdf_backend: Option<Arc<dyn PdfTextExtractor>>,
}

impl Default for ParseService {
    fn default() -> Self {
        Self::new()
    }
}

impl ParseService {
    pub fn new() -> Self {
        Self { pdf_backend: None }
    }

    pub fn with_pdf_backend(mut self, backend: Arc<dyn PdfTextExtractor>) -> Self {
        self.pdf_backend = Some(backend);
        self
    }

    /// Extract normalized text (and, for HTML, a page snapshot) from a
    /// fetched body.
    pub fn parse(&self, raw: &RawDocument) -> ParsedContent {
        let kind = body_kind(raw.content_type.as_deref(), &raw.source_url);
        debug!(url = %raw.source_url, kind = ?kind, bytes = raw.body.len(), "parsing body");

        match kind {
            BodyKind::Pdf => self.parse_pdf(raw),
            BodyKind::Html => parse_html(raw),
            BodyKind::Docx => parse_docx(raw),
            BodyKind::Other => parse_plain(raw),
        }
    }

    fn parse_pdf(&self, raw: &RawDocument) -> ParsedContent {
        let mut content = ParsedContent::default();
        content.parser_info.insert("parser".into(), "pdf".into());

        match &self.pdf_backend {
            None => {
                content
                    .parser_info
                    .insert("error".into(), "pdf backend unavailable".into());
            }
            Some(backend) => match backend.extract_text(&raw.body) {
                Ok(text) => {
                    content.extracted_text =
                        truncate_chars(&collapse_whitespace(&text), PDF_TEXT_MAX_CHARS);
                }
                Err(e) => {
                    content.parser_info.insert("error".into(), e.to_string());
                }
            },
        }
        content
    }
}

fn parse_html(raw: &RawDocument) -> ParsedContent {
    let html = String::from_utf8_lossy(&raw.body);

    let without_blocks = RE_HTML_BLOCKS.replace_all(&html, " ");
    let text = decode_entities(&collapse_whitespace(&strip_tags(&without_blocks)));

    let mut content = ParsedContent {
        extracted_text: text,
        snapshot_html: Some(html.into_owned()),
        parser_info: BTreeMap::new(),
    };
    content.parser_info.insert("parser".into(), "html".into());
    content
}

fn parse_docx(raw: &RawDocument) -> ParsedContent {
    let mut content = ParsedContent::default();
    content.parser_info.insert("parser".into(), "docx".into());

    match docx_document_xml(&raw.body) {
        Ok(xml) => {
            let with_breaks = xml.replace("</w:p>", "\n");
            content.extracted_text = collapse_whitespace(&strip_tags(&with_breaks));
        }
        Err(e) => {
            content.parser_info.insert("error".into(), e.to_string());
        }
    }
    content
}

fn parse_plain(raw: &RawDocument) -> ParsedContent {
    let mut content = ParsedContent {
        extracted_text: truncate_chars(&String::from_utf8_lossy(&raw.body), PLAIN_TEXT_MAX_CHARS),
        snapshot_html: None,
        parser_info: BTreeMap::new(),
    };
    content.parser_info.insert("parser".into(), "raw".into());
    content
}

/// Read `word/document.xml` out of a DOCX container.
fn docx_document_xml(bytes: &[u8]) -> Result<String, ParseError> {
    let cursor = std::io::Cursor::new(bytes);
    let mut archive = zip::ZipArchive::new(cursor).map_err(|e| ParseError::Backend {
        format: "docx".into(),
        message: format!("not a zip container: {e}"),
    })?;
    let mut file = archive
        .by_name("word/document.xml")
        .map_err(|e| ParseError::Backend {
            format: "docx".into(),
            message: format!("missing word/document.xml: {e}"),
        })?;
    let mut xml = String::new();
    file.read_to_string(&mut xml).map_err(|e| ParseError::Backend {
        format: "docx".into(),
        message: format!("unreadable document.xml: {e}"),
    })?;
    Ok(xml)
}

/// Dispatch on content-type substring, falling back to the URL suffix.
fn body_kind(content_type: Option<&str>, url: &str) -> BodyKind {
    let ct = content_type.unwrap_or("").to_ascii_lowercase();
    if ct.contains("pdf") {
        return BodyKind::Pdf;
    }
    if ct.contains("html") {
        return BodyKind::Html;
    }
    if ct.contains("wordprocessingml") || ct.contains("msword") {
        return BodyKind::Docx;
    }

    let path = url.split(['?', '#']).next().unwrap_or("").to_ascii_lowercase();
    if path.ends_with(".pdf") {
        BodyKind::Pdf
    } else if path.ends_with(".htm") || path.ends_with(".html") {
        BodyKind::Html
    } else if path.ends_with(".docx") || path.ends_with(".doc") {
        BodyKind::Docx
    } else {
        BodyKind::Other
    }
}
