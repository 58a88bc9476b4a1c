//! Small text-normalization helpers shared by discovery and parsing.

use std::sync::LazyLock;

use regex::Regex;

static RE_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").unwrap());

/// Replace every HTML tag with a space.
pub(crate) fn strip_tags(value: &str) -> String {
    RE_TAG.replace_all(value, " ").into_owned()
}

/// Collapse all whitespace runs to single spaces and trim.
pub(crate) fn collapse_whitespace(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Decode the handful of entities that show up in listing markup.
pub(crate) fn decode_entities(value: &str) -> String {
    value
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
}

/// Strip tags, collapse whitespace, decode entities.
pub(crate) fn clean_text(value: &str) -> String {
    decode_entities(&collapse_whitespace(&strip_tags(value)))
}

/// Truncate on a character boundary.
pub(crate) fn truncate_chars(value: &str, max_chars: usize) -> String {
    match value.char_indices().nth(max_chars) {
        Some((idx, _)) => value[..idx].to_string(),
        None => value.to_string(),
    }
}
