// Weak structured signals pulled from free-text cases: approximate age and
// candidate procedure names. Used for validation and UI hints only.

use std::sync::LazyLock;

use regex::Regex;

use super::tables::{
    AGE_BUCKETS, DECADE_PATTERN, NUMERIC_AGE_PATTERNS, PROCEDURE_PLACEHOLDER,
    PROCEDURE_SYNONYMS, PROCEDURE_WINDOW_CHARS,
};

static DECADE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(DECADE_PATTERN).expect("valid decade regex"));

static NUMERIC_AGE_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    NUMERIC_AGE_PATTERNS
        .iter()
        .map(|p| Regex::new(p).expect("valid age regex"))
        .collect()
});

/// "PROCEDURES REQUESTED:" / "Requested procedures" heading, with optional
/// inline remainder in group 1.
static PROCEDURE_HEADING_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(?:procedures?\s+requested|requested\s+procedures?)\b\s*:?\s*(.*)$")
        .expect("valid heading regex")
});

/// Leading "1." / "2)" / "3 -" list numbering.
static LIST_NUMBERING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*\d+(?:\s*(?:[.)]|-\s)|\s)\s*").expect("valid numbering regex"));

/// Extract an approximate age token.
///
/// Priority: coarse buckets ("elderly" → "65+"), then decades ("60s"), then
/// explicit numbers. First match wins; conflicting signals are not reconciled.
pub fn extract_age(text: &str) -> Option<String> {
    let lower = text.to_lowercase();

    for (keywords, bucket) in AGE_BUCKETS {
        if keywords.iter().all(|k| lower.contains(k)) {
            return Some((*bucket).to_string());
        }
    }

    if let Some(caps) = DECADE_RE.captures(&lower) {
        return Some(format!("{}s", &caps[1]));
    }

    NUMERIC_AGE_RES
        .iter()
        .find_map(|re| re.captures(&lower).map(|caps| caps[1].to_string()))
}

/// Extract candidate procedure names, in order.
///
/// An explicit "procedures requested" list wins. Otherwise the synonym table
/// is scanned and a short window around the first hit of each concept is
/// kept. Returns the placeholder only if nothing was isolated but the word
/// "procedure" appears; otherwise an empty list.
pub fn extract_procedures(text: &str) -> Vec<String> {
    let listed = extract_listed_procedures(text);
    if !listed.is_empty() {
        return listed;
    }

    let lower = text.to_lowercase();
    let matched = extract_synonym_procedures(&lower);
    if !matched.is_empty() {
        return matched;
    }

    if lower.contains("procedure") {
        return vec![PROCEDURE_PLACEHOLDER.to_string()];
    }

    Vec::new()
}

/// Lines after the heading until the first blank line (or end of text).
fn extract_listed_procedures(text: &str) -> Vec<String> {
    let mut lines = text.lines();
    let mut procedures = Vec::new();

    let Some(inline) = lines
        .by_ref()
        .find_map(|line| PROCEDURE_HEADING_RE.captures(line).map(|c| c[1].trim().to_string()))
    else {
        return procedures;
    };

    if let Some(item) = strip_numbering(&inline) {
        procedures.push(item);
    }

    for line in lines {
        if line.trim().is_empty() {
            if procedures.is_empty() {
                continue;
            }
            break;
        }
        if let Some(item) = strip_numbering(line) {
            procedures.push(item);
        }
    }

    procedures
}

fn strip_numbering(line: &str) -> Option<String> {
    let item = LIST_NUMBERING_RE.replace(line.trim(), "");
    let item = item.trim();
    (!item.is_empty()).then(|| item.to_string())
}

fn extract_synonym_procedures(lower: &str) -> Vec<String> {
    let mut procedures: Vec<String> = Vec::new();

    for (_concept, synonyms) in PROCEDURE_SYNONYMS {
        let hit = synonyms
            .iter()
            .find_map(|syn| lower.find(syn).map(|start| (start, start + syn.len())));

        if let Some((start, end)) = hit {
            let window = window_around(lower, start, end);
            if !window.is_empty() && !procedures.contains(&window) {
                procedures.push(window);
            }
        }
    }

    procedures
}

fn is_window_break(c: char) -> bool {
    matches!(c, '.' | '\n' | ';')
}

/// Sentence fragment around `[start, end)`, at most `PROCEDURE_WINDOW_CHARS`
/// characters on each side, with any leading "label:" dropped.
fn window_around(text: &str, start: usize, end: usize) -> String {
    let mut from = start;
    for (taken, (idx, ch)) in text[..start].char_indices().rev().enumerate() {
        if taken >= PROCEDURE_WINDOW_CHARS || is_window_break(ch) {
            break;
        }
        from = idx;
    }

    let mut to = end;
    for (taken, (idx, ch)) in text[end..].char_indices().enumerate() {
        if taken >= PROCEDURE_WINDOW_CHARS || is_window_break(ch) {
            break;
        }
        to = end + idx + ch.len_utf8();
    }

    let fragment = &text[from..to];
    // The label itself may be the hit ("procedure: ..."), keep the value side
    // only when the match sits after the colon.
    let fragment = match fragment.rfind(':') {
        Some(colon) if from + colon < start => &fragment[colon + 1..],
        _ => fragment,
    };

    fragment
        .trim()
        .trim_matches(|c: char| c == ',' || c == '-')
        .trim()
        .to_string()
}
