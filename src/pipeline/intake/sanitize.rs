// Clean operator-entered case text before it is embedded in a prompt.
// Removes template-breaking brackets, collapses whitespace, expands abbreviations.

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::{Captures, Regex};

use super::tables::ABBREVIATIONS;

static BLOCKED_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[<>{}\[\]\\]").expect("valid blocklist regex"));

static WHITESPACE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));

/// One alternation over every abbreviation so a single pass never re-matches
/// text produced by an earlier expansion.
static ABBREVIATION_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    let alternatives: Vec<String> = ABBREVIATIONS
        .iter()
        .map(|(abbrev, _)| word_pattern(abbrev))
        .collect();
    Regex::new(&format!(r"(?i)(?:{})", alternatives.join("|")))
        .expect("valid abbreviation regex")
});

/// `\b` only makes sense next to a word character ("y.o." ends in a period).
fn word_pattern(abbrev: &str) -> String {
    let escaped = regex::escape(abbrev);
    let lead = if abbrev.starts_with(|c: char| c.is_alphanumeric()) {
        r"\b"
    } else {
        ""
    };
    let trail = if abbrev.ends_with(|c: char| c.is_alphanumeric()) {
        r"\b"
    } else {
        ""
    };
    format!("{lead}{escaped}{trail}")
}

/// Strip bracket/backslash characters and collapse all whitespace runs to
/// single spaces. Total: never fails.
pub fn sanitize_case_text(text: &str) -> String {
    let stripped = BLOCKED_CHARS.replace_all(text, "");
    WHITESPACE_RUN.replace_all(&stripped, " ").trim().to_string()
}

/// Expand known medical abbreviations, whole-word and case-insensitive.
pub fn clean_case_text(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }

    let expanded: Cow<'_, str> = ABBREVIATION_PATTERN.replace_all(text, |caps: &Captures| {
        let matched = caps[0].to_lowercase();
        ABBREVIATIONS
            .iter()
            .find(|(abbrev, _)| *abbrev == matched)
            .map(|(_, full)| (*full).to_string())
            .unwrap_or_else(|| caps[0].to_string())
    });
    expanded.into_owned()
}
