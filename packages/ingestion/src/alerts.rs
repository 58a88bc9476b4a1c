//! Rule-driven alert generation over the persisted corpus.
//!
//! A read-only consumer of the artifact store: walks every
//! `metadata.json`, pairs it with its sibling `extracted.txt`, and
//! classifies each document into at most one actionable alert. First
//! match wins, so a circular that both sets a reporting deadline and
//! touches quotas surfaces as the deadline alert.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use chrono::{NaiveDate, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::types::DocumentCategory;

static RE_DEADLINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:deadline|due(?:\s+date)?|submit(?:\s+\w+){0,4}\s+by)\D{0,16}([0-3]?\d/[0-1]?\d/20\d{2}|20\d{2}-\d{2}-\d{2})\b",
    )
    .unwrap()
});

const QUOTA_TERMS: &[&str] = &["quota", "allocated catch limits", "allocation", "catch limit", "tac"];
const MEETING_TERMS: &[&str] = &["meeting", "session", "intersessional", "review of cmm"];
const COMPLIANCE_TERMS: &[&str] = &[
    "dfad register",
    "vms",
    "observer",
    "transshipment",
    "compliance monitoring",
    "labour standards",
];

/// Raw artifact names probed for `stored_path`, in preference order.
const RAW_CANDIDATES: &[&str] = &["raw.pdf", "raw.html", "raw.docx", "raw.bin"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlertType {
    #[serde(rename = "REPORTING_DEADLINE")]
    ReportingDeadline,
    #[serde(rename = "QUOTA_OR_ALLOCATION_NOTICE")]
    QuotaOrAllocationNotice,
    #[serde(rename = "MEETING_DECISION_OR_PROCESS_UPDATE")]
    MeetingDecisionOrProcessUpdate,
    #[serde(rename = "COMPLIANCE_SYSTEM_CHANGE")]
    ComplianceSystemChange,
    #[serde(rename = "NEW_MEASURE_PUBLISHED")]
    NewMeasurePublished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    High,
    Medium,
}

/// One actionable alert derived from a persisted document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub rfmo: Option<String>,
    pub alert_type: AlertType,
    pub severity: AlertSeverity,
    pub document_type: String,
    pub title: String,
    pub document_number: Option<String>,
    pub published_date: Option<String>,
    pub due_date: Option<String>,
    pub what_changed: String,
    pub action_required: String,
    pub source_url: Option<String>,
    pub stored_path: Option<String>,
    pub extracted_text_path: String,
}

pub struct AlertGenerator {
    storage_root: PathBuf,
}

impl AlertGenerator {
    pub fn new(storage_root: impl Into<PathBuf>) -> Self {
        Self {
            storage_root: storage_root.into(),
        }
    }

    /// Alerts for documents published within the last `days` days
    /// (0 disables the date filter), newest first.
    pub fn generate(&self, days: i64) -> Vec<Alert> {
        let since_date =
            (days > 0).then(|| (Utc::now() - chrono::Duration::days(days)).date_naive());

        // BTreeSet gives the walk a stable order across platforms.
        let metadata_files: BTreeSet<PathBuf> = WalkDir::new(&self.storage_root)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file() && entry.file_name() == "metadata.json")
            .map(|entry| entry.into_path())
            .collect();

        let mut alerts = Vec::new();
        for meta_path in metadata_files {
            let Some(metadata) = load_metadata(&meta_path) else {
                warn!(path = %meta_path.display(), "unreadable metadata sidecar, skipping");
                continue;
            };

            let published = metadata
                .get("published_date")
                .and_then(|v| v.as_str())
                .and_then(|v| NaiveDate::parse_from_str(v, "%Y-%m-%d").ok());
            if let (Some(since), Some(published)) = (since_date, published) {
                if published < since {
                    debug!(path = %meta_path.display(), "outside alert window");
                    continue;
                }
            }

            let extracted_path = meta_path.with_file_name("extracted.txt");
            let extracted_text = std::fs::read(&extracted_path)
                .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
                .unwrap_or_default();

            let artifact_dir = meta_path.parent().unwrap_or(Path::new(""));
            if let Some(alert) =
                build_alert(&metadata, &extracted_text, &extracted_path, artifact_dir)
            {
                alerts.push(alert);
            }
        }

        // Newest first, undated documents last.
        alerts.sort_by(|a, b| b.published_date.cmp(&a.published_date));
        alerts
    }
}

fn load_metadata(path: &Path) -> Option<serde_json::Value> {
    let text = std::fs::read_to_string(path).ok()?;
    serde_json::from_str(&text).ok()
}

fn build_alert(
    metadata: &serde_json::Value,
    extracted_text: &str,
    extracted_path: &Path,
    artifact_dir: &Path,
) -> Option<Alert> {
    let title = metadata
        .get("title")
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .trim()
        .to_string();
    let lowered = format!("{}\n{}", title, extracted_text).to_lowercase();
    let document_type = metadata
        .get("document_type")
        .and_then(|v| v.as_str())
        .unwrap_or(DocumentCategory::Other.as_str())
        .to_string();
    let category = DocumentCategory::parse(&document_type).unwrap_or(DocumentCategory::Other);
    let document_number = string_field(metadata, "document_number");
    let due_date = extract_due_date(&title, extracted_text);

    let (alert_type, severity) = if due_date.is_some()
        || lowered.contains("mandatory reporting")
        || (lowered.contains("reporting") && lowered.contains("deadline"))
    {
        (AlertType::ReportingDeadline, AlertSeverity::High)
    } else if QUOTA_TERMS.iter().any(|t| lowered.contains(t)) {
        (AlertType::QuotaOrAllocationNotice, AlertSeverity::High)
    } else if category == DocumentCategory::MeetingDecisions
        || MEETING_TERMS.iter().any(|t| lowered.contains(t))
    {
        (AlertType::MeetingDecisionOrProcessUpdate, AlertSeverity::Medium)
    } else if COMPLIANCE_TERMS.iter().any(|t| lowered.contains(t)) {
        (AlertType::ComplianceSystemChange, AlertSeverity::Medium)
    } else if category.is_actionable() {
        (AlertType::NewMeasurePublished, AlertSeverity::Medium)
    } else {
        return None;
    };

    Some(Alert {
        rfmo: string_field(metadata, "rfmo"),
        alert_type,
        severity,
        document_type,
        what_changed: what_changed(alert_type, &title, document_number.as_deref(), due_date.as_deref()),
        action_required: action_required(alert_type, due_date.as_deref()),
        title,
        document_number,
        published_date: string_field(metadata, "published_date"),
        due_date,
        source_url: string_field(metadata, "source_url"),
        stored_path: raw_artifact_path(artifact_dir),
        extracted_text_path: extracted_path.display().to_string(),
    })
}

fn what_changed(
    alert_type: AlertType,
    title: &str,
    document_number: Option<&str>,
    due_date: Option<&str>,
) -> String {
    match alert_type {
        AlertType::ReportingDeadline => {
            let deadline_text = due_date
                .map(|d| format!(" Deadline: {d}."))
                .unwrap_or_default();
            format!("Reporting obligation update detected in '{title}'.{deadline_text}")
        }
        AlertType::QuotaOrAllocationNotice => {
            format!("Quota/allocation update detected in '{title}'.")
        }
        AlertType::ComplianceSystemChange => {
            format!("Compliance process/system update detected in '{title}'.")
        }
        AlertType::MeetingDecisionOrProcessUpdate => {
            format!("Meeting decision/process update detected in '{title}'.")
        }
        AlertType::NewMeasurePublished => {
            let number = document_number
                .map(|n| format!(" ({n})"))
                .unwrap_or_default();
            format!("New or revised RFMO measure detected{number}: '{title}'.")
        }
    }
}

fn action_required(alert_type: AlertType, due_date: Option<&str>) -> String {
    match alert_type {
        AlertType::ReportingDeadline => match due_date {
            Some(due) => format!("Assign owner and submit required reporting package before {due}."),
            None => "Assign owner, confirm reporting scope, and submit required reporting package by deadline.".to_string(),
        },
        AlertType::QuotaOrAllocationNotice => {
            "Update national allocation tables and notify fleet operators of updated catch limits."
                .to_string()
        }
        AlertType::ComplianceSystemChange => {
            "Update compliance SOPs and onboard operations/monitoring teams to the new requirement."
                .to_string()
        }
        AlertType::MeetingDecisionOrProcessUpdate => {
            "Prepare policy brief and track follow-on amendments or implementation decisions."
                .to_string()
        }
        AlertType::NewMeasurePublished => {
            "Review legal text, map impacted fleets/species/areas, and issue implementation guidance."
                .to_string()
        }
    }
}

/// First deadline-shaped date near a deadline keyword, as ISO.
fn extract_due_date(title: &str, body: &str) -> Option<String> {
    let combined = format!("{title}\n{body}");
    let captured = RE_DEADLINE.captures(&combined)?.get(1)?.as_str();

    if captured.contains('/') {
        let mut parts = captured.split('/');
        let day = parts.next()?.parse::<u32>().ok()?;
        let month = parts.next()?.parse::<u32>().ok()?;
        let year = parts.next()?.parse::<i32>().ok()?;
        NaiveDate::from_ymd_opt(year, month, day).map(|d| d.to_string())
    } else {
        Some(captured.to_string())
    }
}

fn string_field(metadata: &serde_json::Value, key: &str) -> Option<String> {
    metadata
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
}

fn raw_artifact_path(artifact_dir: &Path) -> Option<String> {
    RAW_CANDIDATES
        .iter()
        .map(|name| artifact_dir.join(name))
        .find(|candidate| candidate.exists())
        .map(|path| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;

    fn write_artifacts(
        root: &Path,
        rel_dir: &str,
        metadata: serde_json::Value,
        extracted: &str,
        raw_ext: &str,
    ) {
        let dir = root.join(rel_dir);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("metadata.json"), metadata.to_string()).unwrap();
        fs::write(dir.join("extracted.txt"), extracted).unwrap();
        fs::write(dir.join(format!("raw{raw_ext}")), "raw").unwrap();
    }

    #[test]
    fn test_reporting_deadline_alert() {
        let tmp = tempfile::tempdir().unwrap();
        write_artifacts(
            tmp.path(),
            "iotc/2026/doc1/v1",
            json!({
                "rfmo": "IOTC",
                "document_type": "circular_letters",
                "title": "Mandatory reporting notice",
                "document_number": null,
                "published_date": "2026-02-10",
                "source_url": "https://iotc.org/documents/x",
            }),
            "Members shall submit reports by 12/03/2026.",
            ".html",
        );

        let alerts = AlertGenerator::new(tmp.path()).generate(0);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].alert_type, AlertType::ReportingDeadline);
        assert_eq!(alerts[0].severity, AlertSeverity::High);
        assert_eq!(alerts[0].due_date.as_deref(), Some("2026-03-12"));
        assert!(alerts[0].stored_path.as_deref().unwrap().ends_with("raw.html"));
    }

    #[test]
    fn test_quota_allocation_alert() {
        let tmp = tempfile::tempdir().unwrap();
        write_artifacts(
            tmp.path(),
            "iotc/2026/doc2/v1",
            json!({
                "rfmo": "IOTC",
                "document_type": "circular_letters",
                "title": "Allocated catch limits for 2026",
                "published_date": "2026-01-20",
                "source_url": "https://iotc.org/documents/y",
            }),
            "This communication updates allocated catch limits.",
            ".html",
        );

        let alerts = AlertGenerator::new(tmp.path()).generate(0);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].alert_type, AlertType::QuotaOrAllocationNotice);
        assert_eq!(alerts[0].severity, AlertSeverity::High);
    }

    #[test]
    fn test_meeting_decision_alert() {
        let tmp = tempfile::tempdir().unwrap();
        write_artifacts(
            tmp.path(),
            "wcpfc/2026/doc3/v1",
            json!({
                "rfmo": "WCPFC",
                "document_type": "meeting_decisions",
                "title": "Commission outcomes document",
                "document_number": "2018-04",
                "published_date": "2026-04-08",
                "source_url": "https://meetings.wcpfc.int/meetings/x",
            }),
            "Outcomes of the twentieth regular gathering.",
            ".pdf",
        );

        let alerts = AlertGenerator::new(tmp.path()).generate(0);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].alert_type, AlertType::MeetingDecisionOrProcessUpdate);
        assert_eq!(alerts[0].severity, AlertSeverity::Medium);
    }

    #[test]
    fn test_compliance_and_new_measure_fallbacks() {
        let tmp = tempfile::tempdir().unwrap();
        write_artifacts(
            tmp.path(),
            "iotc/2026/doc4/v1",
            json!({
                "rfmo": "IOTC",
                "document_type": "circular_letters",
                "title": "Updated dFAD register rules",
                "published_date": "2026-03-01",
            }),
            "The dfad register now requires registration of buoys.",
            ".html",
        );
        write_artifacts(
            tmp.path(),
            "iccat/2026/doc5/v1",
            json!({
                "rfmo": "ICCAT",
                "document_type": "conservation_management_measures",
                "title": "Bigeye tuna conservation text",
                "document_number": "2026-02",
                "published_date": "2026-03-05",
            }),
            "Text of the adopted conservation text.",
            ".pdf",
        );

        let alerts = AlertGenerator::new(tmp.path()).generate(0);
        assert_eq!(alerts.len(), 2);
        // Sorted newest first.
        assert_eq!(alerts[0].alert_type, AlertType::NewMeasurePublished);
        assert!(alerts[0].what_changed.contains("(2026-02)"));
        assert_eq!(alerts[1].alert_type, AlertType::ComplianceSystemChange);
    }

    #[test]
    fn test_other_document_produces_no_alert() {
        let tmp = tempfile::tempdir().unwrap();
        write_artifacts(
            tmp.path(),
            "iotc/2026/doc6/v1",
            json!({
                "rfmo": "IOTC",
                "document_type": "other",
                "title": "Secretariat contact sheet",
                "published_date": "2026-01-01",
            }),
            "Phone numbers and addresses.",
            ".html",
        );

        assert!(AlertGenerator::new(tmp.path()).generate(0).is_empty());
    }

    #[test]
    fn test_days_filter_drops_old_documents() {
        let tmp = tempfile::tempdir().unwrap();
        write_artifacts(
            tmp.path(),
            "iotc/2020/doc7/v1",
            json!({
                "rfmo": "IOTC",
                "document_type": "circular_letters",
                "title": "Allocated catch limits for 2020",
                "published_date": "2020-01-01",
            }),
            "Historic quota notice.",
            ".html",
        );

        assert_eq!(AlertGenerator::new(tmp.path()).generate(0).len(), 1);
        assert!(AlertGenerator::new(tmp.path()).generate(7).is_empty());
    }

    #[test]
    fn test_corrupt_metadata_is_skipped() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("iotc/2026/doc8/v1");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("metadata.json"), "{not json").unwrap();

        assert!(AlertGenerator::new(tmp.path()).generate(0).is_empty());
    }

    #[test]
    fn test_sorting_puts_undated_last() {
        let tmp = tempfile::tempdir().unwrap();
        write_artifacts(
            tmp.path(),
            "iotc/2026/doc9/v1",
            json!({
                "rfmo": "IOTC",
                "document_type": "circular_letters",
                "title": "Quota notice",
                "published_date": "2026-01-15",
            }),
            "quota",
            ".html",
        );
        write_artifacts(
            tmp.path(),
            "iotc/2026/doc10/v1",
            json!({
                "rfmo": "IOTC",
                "document_type": "circular_letters",
                "title": "Undated quota notice",
                "published_date": null,
            }),
            "quota",
            ".html",
        );

        let alerts = AlertGenerator::new(tmp.path()).generate(0);
        assert_eq!(alerts.len(), 2);
        assert_eq!(alerts[0].published_date.as_deref(), Some("2026-01-15"));
        assert!(alerts[1].published_date.is_none());
    }
}
