//! Shared HTML discovery driver.
//!
//! Scans each configured index page for anchor links, keeps a cleaned
//! ±240-character context window around every anchor, and runs the
//! high-signal candidate filter before emitting a [`DocumentRef`]. The
//! filter is the precision-critical surface of the whole pipeline: it
//! decides which links on a heterogeneous listing are policy documents
//! worth fetching at all.

use std::collections::HashSet;
use std::sync::LazyLock;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use regex::Regex;
use tracing::{debug, info, warn};
use url::Url;

use crate::adapters::client::PoliteHttpClient;
use crate::adapters::{Discovery, RfmoAdapter};
use crate::error::{DiscoveryError, FetchError};
use crate::text::{clean_text, truncate_chars};
use crate::types::{DocumentCategory, DocumentRef, ParsedDocument, RawDocument};

static RE_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<a[^>]+href=["']([^"']+)["'][^>]*>(.*?)</a>"#).unwrap()
});
static RE_TITLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<title[^>]*>(.*?)</title>").unwrap());
static RE_DATE_ISO: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(20\d{2}-\d{2}-\d{2})").unwrap());
static RE_DATE_DMY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([0-3]?\d/[0-1]?\d/20\d{2})").unwrap());
static RE_DATE_LONG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)([0-3]?\d\s+(?:January|February|March|April|May|June|July|August|September|October|November|December)\s+20\d{2})",
    )
    .unwrap()
});
static RE_DOC_NUMBER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:CMM|REC|RES|Recommendation|Resolution)\s*[-:]?\s*([0-9]{4}[-/][0-9]{1,3})\b")
        .unwrap()
});
static RE_MEETING_REF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:COM|WCPFC|IOTC)[-_ ]?(?:\d{1,2}|20\d{2})\b").unwrap());
static RE_POLICY_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:CMM|REC|RES|Recommendation|Resolution|Circular)\s*[-:]?\s*(?:\d{4}[-/]\d{1,3}|[A-Z]{1,4}-\d{2,4})\b",
    )
    .unwrap()
});

/// Any of these anywhere in url+text+context vetoes the link outright.
const EXCLUDE_TERMS: &[&str] = &[
    "news",
    "press",
    "newsletter",
    "manual",
    "guide",
    "brochure",
    "training",
    "faq",
    "photo",
    "gallery",
    "video",
    "event",
    "workshop",
    "vacancy",
    "procurement",
    "tender",
    "media",
    "twitter",
    "facebook",
];

const POLICY_TERMS: &[&str] = &[
    "conservation and management measure",
    "management measure",
    "recommendation",
    "resolution",
    "circular",
    "iuu",
    "quota",
    "allocation",
    "catch limit",
    "closure",
    "closed area",
    "prohibited",
    "ban",
    "meeting",
    "decision",
];

const COMPLIANCE_TERMS: &[&str] = &[
    "shall",
    "must",
    "required",
    "deadline",
    "reporting",
    "obligation",
    "compliance",
    "entry into force",
    "effective",
    "implementation",
];

const ACTIONABLE_EXTENSIONS: &[&str] =
    &[".pdf", ".doc", ".docx", ".xls", ".xlsx", ".htm", ".html"];

/// How many characters of surrounding raw HTML feed each anchor's
/// context window.
const CONTEXT_WINDOW_CHARS: usize = 240;

/// Cap on cleaned titles and hints.
const TITLE_MAX_CHARS: usize = 240;

/// HTML-listing adapter, specialized per RFMO by its category index map.
#[derive(Debug)]
pub struct HtmlAdapter {
    name: String,
    rfmo: String,
    category_indexes: Vec<(DocumentCategory, Vec<String>)>,
    client: PoliteHttpClient,
}

struct AnchorHit {
    href: String,
    text: String,
    context: String,
}

impl HtmlAdapter {
    pub fn new(
        name: impl Into<String>,
        rfmo: impl Into<String>,
        category_indexes: Vec<(DocumentCategory, Vec<String>)>,
        user_agent: &str,
    ) -> Self {
        Self {
            name: name.into(),
            rfmo: rfmo.into(),
            category_indexes,
            client: PoliteHttpClient::new(user_agent),
        }
    }

    /// Replace the HTTP client (custom rate limits, robots opt-out).
    pub fn with_client(mut self, client: PoliteHttpClient) -> Self {
        self.client = client;
        self
    }

    fn default_region(&self) -> String {
        match self.rfmo.as_str() {
            "ICCAT" => "Atlantic Ocean".to_string(),
            "WCPFC" => "Western and Central Pacific Ocean".to_string(),
            "IOTC" => "Indian Ocean".to_string(),
            other => other.to_string(),
        }
    }

    fn extract_anchors(html: &str) -> Vec<AnchorHit> {
        let mut hits = Vec::new();
        for captures in RE_LINK.captures_iter(html) {
            let whole = captures.get(0).unwrap();
            let href = captures.get(1).map(|m| m.as_str().trim().to_string());
            let Some(href) = href else { continue };

            let start = chars_before(html, whole.start(), CONTEXT_WINDOW_CHARS);
            let end = chars_after(html, whole.end(), CONTEXT_WINDOW_CHARS);

            hits.push(AnchorHit {
                href,
                text: clean_text(captures.get(2).map(|m| m.as_str()).unwrap_or("")),
                context: clean_text(&html[start..end]),
            });
        }
        hits
    }
}

#[async_trait]
impl RfmoAdapter for HtmlAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn rfmo(&self) -> &str {
        &self.rfmo
    }

    async fn list_documents(&self) -> Result<Discovery, DiscoveryError> {
        let mut refs = Vec::new();
        let mut seen_urls: HashSet<String> = HashSet::new();
        let mut scanned: u64 = 0;
        let mut filtered_out: u64 = 0;
        let mut indexes_total = 0usize;
        let mut indexes_failed = 0usize;

        for (category, index_urls) in &self.category_indexes {
            for index_url in index_urls {
                indexes_total += 1;
                let raw = match self.client.fetch(index_url).await {
                    Ok(raw) => raw,
                    Err(e) => {
                        warn!(adapter = %self.name, index = %index_url, error = %e, "index fetch failed");
                        indexes_failed += 1;
                        continue;
                    }
                };
                let html = String::from_utf8_lossy(&raw.body);
                let index_defrag = defragment(index_url);

                for anchor in Self::extract_anchors(&html) {
                    scanned += 1;
                    let Some(absolute) = resolve_href(index_url, &anchor.href) else {
                        filtered_out += 1;
                        continue;
                    };
                    if seen_urls.contains(&absolute) {
                        continue;
                    }
                    if Some(absolute.as_str()) == index_defrag.as_deref() {
                        filtered_out += 1;
                        continue;
                    }
                    if !is_document_candidate(&absolute, &anchor.text, &anchor.context) {
                        filtered_out += 1;
                        continue;
                    }

                    let hint_scope = format!("{} {}", anchor.text, anchor.context);
                    let title_hint = {
                        let cleaned = truncate_chars(&anchor.text, TITLE_MAX_CHARS);
                        if cleaned.is_empty() {
                            filename_from_url(&absolute).unwrap_or_else(|| self.rfmo.clone())
                        } else {
                            cleaned
                        }
                    };

                    seen_urls.insert(absolute.clone());
                    refs.push(DocumentRef {
                        rfmo: self.rfmo.clone(),
                        source_url: absolute,
                        document_type: *category,
                        index_url: Some(index_url.clone()),
                        title_hint: Some(title_hint),
                        published_date: extract_date(&anchor.context),
                        document_number: extract_document_number(&hint_scope),
                        meeting_reference: extract_meeting_reference(&hint_scope),
                        rfmo_region: Some(self.default_region()),
                        discovered_at: Utc::now(),
                        metadata: Default::default(),
                    });
                }
            }
        }

        if indexes_total > 0 && indexes_failed == indexes_total {
            return Err(DiscoveryError::AllIndexesFailed {
                adapter: self.name.clone(),
                count: indexes_total,
            });
        }

        info!(
            adapter = %self.name,
            candidates = refs.len(),
            links_scanned = scanned,
            links_filtered_out = filtered_out,
            "discovery pass complete"
        );

        Ok(Discovery {
            refs,
            links_scanned: scanned,
            links_filtered_out: filtered_out,
        })
    }

    async fn fetch_document(&self, doc_ref: &DocumentRef) -> Result<RawDocument, FetchError> {
        self.client.fetch(&doc_ref.source_url).await
    }

    fn extract_metadata(&self, raw: &RawDocument, doc_ref: &DocumentRef) -> ParsedDocument {
        let content_type = raw
            .content_type
            .as_deref()
            .unwrap_or("")
            .to_ascii_lowercase();

        let mut title = doc_ref
            .title_hint
            .clone()
            .filter(|t| !t.is_empty())
            .or_else(|| filename_from_url(&doc_ref.source_url))
            .unwrap_or_else(|| self.rfmo.clone());
        let mut publication_date = doc_ref.published_date;

        if content_type.contains("html") {
            let html = String::from_utf8_lossy(&raw.body);
            if let Some(page_title) = extract_html_title(&html) {
                title = page_title;
            }
            if publication_date.is_none() {
                publication_date = extract_date(&html);
            }
        }

        debug!(url = %doc_ref.source_url, title = %title, "metadata extracted");

        ParsedDocument {
            title,
            publication_date,
            document_category: doc_ref.document_type,
            document_number: doc_ref.document_number.clone(),
            meeting_reference: doc_ref.meeting_reference.clone(),
            rfmo_region: doc_ref.rfmo_region.clone(),
            extracted_text: String::new(),
            snapshot_html: None,
            parser_info: Default::default(),
        }
    }
}

/// The high-signal policy filter.
///
/// Accept iff an explicit policy identifier is present together with an
/// actionable extension or a policy term, or a policy term co-occurs
/// with a compliance term on a document-like URL. Any exclude term
/// vetoes everything.
pub fn is_document_candidate(url: &str, link_text: &str, context: &str) -> bool {
    if url.starts_with("mailto:") || url.starts_with("javascript:") {
        return false;
    }

    let lowered = format!("{} {} {}", url, link_text, context).to_lowercase();
    if EXCLUDE_TERMS.iter().any(|t| lowered.contains(t)) {
        return false;
    }

    let has_policy_signal = POLICY_TERMS.iter().any(|t| lowered.contains(t));
    let has_compliance_signal = COMPLIANCE_TERMS.iter().any(|t| lowered.contains(t));
    let identifier_scope = format!("{} {}", link_text, context);
    let has_policy_identifier = RE_POLICY_ID.is_match(&identifier_scope);
    let has_actionable_extension = ACTIONABLE_EXTENSIONS.iter().any(|ext| lowered.contains(ext));

    if has_policy_identifier {
        return has_actionable_extension || has_policy_signal;
    }
    if has_policy_signal && has_compliance_signal {
        return has_actionable_extension
            || lowered.contains("measure/")
            || lowered.contains("document/");
    }
    false
}

/// Resolve an href against its index page and drop any fragment.
fn resolve_href(index_url: &str, href: &str) -> Option<String> {
    let base = Url::parse(index_url).ok()?;
    let mut resolved = base.join(href).ok()?;
    resolved.set_fragment(None);
    Some(resolved.to_string())
}

fn defragment(url: &str) -> Option<String> {
    let mut parsed = Url::parse(url).ok()?;
    parsed.set_fragment(None);
    Some(parsed.to_string())
}

/// First date in `text`, trying ISO, then `DD/MM/YYYY`, then
/// `DD MonthName YYYY`.
pub fn extract_date(text: &str) -> Option<NaiveDate> {
    if let Some(m) = RE_DATE_ISO.find(text) {
        if let Ok(date) = NaiveDate::parse_from_str(m.as_str(), "%Y-%m-%d") {
            return Some(date);
        }
    }
    if let Some(m) = RE_DATE_DMY.find(text) {
        let mut parts = m.as_str().split('/');
        let day = parts.next()?.parse::<u32>().ok()?;
        let month = parts.next()?.parse::<u32>().ok()?;
        let year = parts.next()?.parse::<i32>().ok()?;
        if let Some(date) = NaiveDate::from_ymd_opt(year, month, day) {
            return Some(date);
        }
    }
    if let Some(m) = RE_DATE_LONG.find(text) {
        if let Ok(date) = NaiveDate::parse_from_str(m.as_str(), "%d %B %Y") {
            return Some(date);
        }
    }
    None
}

/// Numeric part of a `CMM/REC/RES/Recommendation/Resolution` identifier.
pub fn extract_document_number(text: &str) -> Option<String> {
    RE_DOC_NUMBER
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// First `COM`/`WCPFC`/`IOTC` session reference.
pub fn extract_meeting_reference(text: &str) -> Option<String> {
    RE_MEETING_REF.find(text).map(|m| m.as_str().to_string())
}

fn filename_from_url(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let tail = parsed
        .path()
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or("")
        .to_string();
    (!tail.is_empty()).then_some(tail)
}

fn extract_html_title(html: &str) -> Option<String> {
    let captured = RE_TITLE.captures(html)?.get(1)?;
    let cleaned = truncate_chars(&clean_text(captured.as_str()), TITLE_MAX_CHARS);
    (!cleaned.is_empty()).then_some(cleaned)
}

/// Byte offset `count` characters before `index` (a char boundary).
fn chars_before(s: &str, index: usize, count: usize) -> usize {
    s[..index]
        .char_indices()
        .rev()
        .take(count)
        .last()
        .map(|(offset, _)| offset)
        .unwrap_or(index)
}

/// Byte offset `count` characters after `index` (a char boundary).
fn chars_after(s: &str, index: usize, count: usize) -> usize {
    s[index..]
        .char_indices()
        .nth(count)
        .map(|(offset, _)| index + offset)
        .unwrap_or(s.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_rejects_press_release() {
        assert!(!is_document_candidate(
            "https://example.org/news/press-release",
            "Press release on workshop",
            "media update event",
        ));
    }

    #[test]
    fn test_filter_accepts_cmm_pdf() {
        assert!(is_document_candidate(
            "https://example.org/docs/CMM-2024-03.pdf",
            "CMM 2024-03 Tropical tuna measure",
            "shall enter into force on 2024-06-01",
        ));
    }

    #[test]
    fn test_filter_rejects_mailto_and_javascript() {
        assert!(!is_document_candidate(
            "mailto:secretariat@example.org",
            "Resolution 2024/01",
            "resolution shall apply",
        ));
        assert!(!is_document_candidate(
            "javascript:void(0)",
            "Resolution 2024/01",
            "resolution shall apply",
        ));
    }

    #[test]
    fn test_filter_exclude_term_vetoes_identifier() {
        // A real identifier cannot rescue a link surrounded by gallery
        // chrome.
        assert!(!is_document_candidate(
            "https://example.org/gallery/CMM-2024-03.pdf",
            "CMM 2024-03",
            "photo gallery of the session",
        ));
    }

    #[test]
    fn test_filter_policy_and_compliance_on_document_url() {
        assert!(is_document_candidate(
            "https://example.org/document/quota-update",
            "Quota update",
            "members shall report allocation changes",
        ));
    }

    #[test]
    fn test_filter_policy_term_alone_is_not_enough() {
        assert!(!is_document_candidate(
            "https://example.org/about-quotas",
            "About quota management",
            "background reading",
        ));
    }

    #[test]
    fn test_filter_identifier_with_policy_term_but_no_extension() {
        assert!(is_document_candidate(
            "https://example.org/measures/view?id=7",
            "Recommendation 2023-12",
            "recommendation adopted by the commission",
        ));
    }

    #[test]
    fn test_extract_date_iso_wins() {
        let date = extract_date("adopted 2024-06-01, circulated 12/07/2024").unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2024, 6, 1).unwrap());
    }

    #[test]
    fn test_extract_date_dmy() {
        let date = extract_date("submit reports by 12/03/2026").unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2026, 3, 12).unwrap());
    }

    #[test]
    fn test_extract_date_long_form() {
        let date = extract_date("adopted on 3 February 2025 in session").unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2025, 2, 3).unwrap());
    }

    #[test]
    fn test_extract_date_none() {
        assert!(extract_date("no dates here").is_none());
    }

    #[test]
    fn test_extract_document_number() {
        assert_eq!(
            extract_document_number("CMM 2024-03 Tropical tuna"),
            Some("2024-03".to_string())
        );
        assert_eq!(
            extract_document_number("Resolution: 2023/11 on sharks"),
            Some("2023/11".to_string())
        );
        assert_eq!(extract_document_number("Annual report"), None);
    }

    #[test]
    fn test_extract_meeting_reference() {
        assert_eq!(
            extract_meeting_reference("adopted at WCPFC-2023 annual session"),
            Some("WCPFC-2023".to_string())
        );
        assert_eq!(
            extract_meeting_reference("see COM 15 working paper"),
            Some("COM 15".to_string())
        );
        assert_eq!(extract_meeting_reference("no reference"), None);
    }

    #[test]
    fn test_extract_anchors_context_window() {
        let html = format!(
            "{}<a href=\"/docs/CMM-2024-01.pdf\">CMM 2024-01</a>{}",
            "x".repeat(300),
            "entry into force 2024-09-01"
        );
        let anchors = HtmlAdapter::extract_anchors(&html);
        assert_eq!(anchors.len(), 1);
        assert_eq!(anchors[0].href, "/docs/CMM-2024-01.pdf");
        assert_eq!(anchors[0].text, "CMM 2024-01");
        // Context keeps only the ±240 characters around the anchor.
        assert!(anchors[0].context.contains("entry into force"));
        assert!(anchors[0].context.len() < html.len());
    }

    #[test]
    fn test_context_window_counts_characters_not_bytes() {
        // 300 two-byte characters on each side; the window must still
        // span 240 characters of each.
        let html = format!(
            "{}<a href=\"/docs/CMM-2024-01.pdf\">CMM 2024-01</a>{}",
            "é".repeat(300),
            "û".repeat(300),
        );
        let anchors = HtmlAdapter::extract_anchors(&html);
        assert_eq!(anchors.len(), 1);
        let context = &anchors[0].context;
        assert_eq!(context.chars().filter(|c| *c == 'é').count(), 240);
        assert_eq!(context.chars().filter(|c| *c == 'û').count(), 240);
    }

    #[test]
    fn test_resolve_href_defragments() {
        assert_eq!(
            resolve_href("https://example.org/en/list.html", "doc.pdf#page=2"),
            Some("https://example.org/en/doc.pdf".to_string())
        );
        assert_eq!(
            resolve_href("https://example.org/en/", "mailto:info@example.org"),
            Some("mailto:info@example.org".to_string())
        );
    }

    #[test]
    fn test_extract_html_title() {
        let html = "<html><head><title> CMM 2024-03 &amp; annex </title></head></html>";
        assert_eq!(
            extract_html_title(html),
            Some("CMM 2024-03 & annex".to_string())
        );
        assert!(extract_html_title("<html><body>none</body></html>").is_none());
    }

    #[test]
    fn test_filename_from_url() {
        assert_eq!(
            filename_from_url("https://example.org/docs/CMM-2024-03.pdf"),
            Some("CMM-2024-03.pdf".to_string())
        );
        assert_eq!(filename_from_url("https://example.org/"), None);
    }
}
