//! Built-in RFMO adapters.
//!
//! Each is the shared [`HtmlAdapter`] specialized by its static
//! category → index-URL map.

use crate::adapters::html::HtmlAdapter;
use crate::types::DocumentCategory;

/// International Commission for the Conservation of Atlantic Tunas.
pub fn iccat(user_agent: &str) -> HtmlAdapter {
    HtmlAdapter::new(
        "iccat",
        "ICCAT",
        vec![
            (
                DocumentCategory::ConservationManagementMeasures,
                vec![
                    "https://www.iccat.int/en/RecRes.asp".to_string(),
                    "https://www.iccat.int/en/decisions.asp".to_string(),
                ],
            ),
            (
                DocumentCategory::RecommendationsResolutions,
                vec!["https://www.iccat.int/en/RecRes.asp".to_string()],
            ),
            (
                DocumentCategory::MeetingDecisions,
                vec!["https://www.iccat.int/en/meetings.asp".to_string()],
            ),
            (
                DocumentCategory::IuuVesselLists,
                vec!["https://www.iccat.int/en/IUU.asp".to_string()],
            ),
        ],
        user_agent,
    )
}

/// Western and Central Pacific Fisheries Commission.
pub fn wcpfc(user_agent: &str) -> HtmlAdapter {
    HtmlAdapter::new(
        "wcpfc",
        "WCPFC",
        vec![
            (
                DocumentCategory::ConservationManagementMeasures,
                vec![
                    "https://www.wcpfc.int/conservation-and-management-measures".to_string(),
                    "https://cmm.wcpfc.int".to_string(),
                ],
            ),
            (
                DocumentCategory::CircularLetters,
                vec!["https://circs.wcpfc.int".to_string()],
            ),
            (
                DocumentCategory::MeetingDecisions,
                vec!["https://meetings.wcpfc.int".to_string()],
            ),
            (
                DocumentCategory::IuuVesselLists,
                vec!["https://www.wcpfc.int/iuu-vessel-list".to_string()],
            ),
            (
                DocumentCategory::QuotaAllocationTables,
                vec!["https://www.wcpfc.int/annual-catch-limits".to_string()],
            ),
        ],
        user_agent,
    )
}

/// Indian Ocean Tuna Commission.
pub fn iotc(user_agent: &str) -> HtmlAdapter {
    HtmlAdapter::new(
        "iotc",
        "IOTC",
        vec![
            (
                DocumentCategory::ConservationManagementMeasures,
                vec!["https://iotc.org/cmm".to_string()],
            ),
            (
                DocumentCategory::RecommendationsResolutions,
                vec![
                    "https://iotc.org/recommendations".to_string(),
                    "https://iotc.org/resolutions".to_string(),
                ],
            ),
            (
                DocumentCategory::CircularLetters,
                vec!["https://iotc.org/documents/circulars".to_string()],
            ),
            (
                DocumentCategory::MeetingDecisions,
                vec!["https://iotc.org/meetings".to_string()],
            ),
            (
                DocumentCategory::IuuVesselLists,
                vec!["https://iotc.org/iuu-list".to_string()],
            ),
            (
                DocumentCategory::QuotaAllocationTables,
                vec!["https://iotc.org/quota-allocation".to_string()],
            ),
        ],
        user_agent,
    )
}
