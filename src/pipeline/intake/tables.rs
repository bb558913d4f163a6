// Static lookup tables for case-text normalization.
// Plain ordered data: extend here without touching the matching code.

/// Medical abbreviations expanded by `clean_case_text` (whole word, case-insensitive).
/// Order matters only for display; each rule is applied once per input.
pub const ABBREVIATIONS: &[(&str, &str)] = &[
    ("abd", "abdomen"),
    ("htn", "hypertension"),
    ("dm", "diabetes mellitus"),
    ("mi", "myocardial infarction"),
    ("sob", "shortness of breath"),
    ("yo", "years old"),
    ("y.o.", "years old"),
];

/// Canonical procedure concept → surface synonyms (lowercase).
pub const PROCEDURE_SYNONYMS: &[(&str, &[&str])] = &[
    ("heart", &["cardiac", "cardio", "heart", "coronary"]),
    ("brain", &["brain", "head", "cerebral", "cranial", "neuro"]),
    ("scan", &["scan", "imaging", "test", "study"]),
    ("monitor", &["monitor", "monitoring", "holter", "event monitor"]),
    (
        "stress test",
        &["stress test", "treadmill", "exercise test", "cardiac stress"],
    ),
    ("mri", &["mri", "magnetic resonance", "mr imaging"]),
    ("ct", &["ct", "cat scan", "computed tomography"]),
    ("ultrasound", &["ultrasound", "echo", "sonogram", "doppler"]),
];

/// Coarse age buckets, checked before any numeric pattern.
/// Every keyword in the slice must be present for the bucket to match.
pub const AGE_BUCKETS: &[(&[&str], &str)] = &[
    (&["elderly"], "65+"),
    (&["senior"], "65+"),
    (&["middle", "age"], "45-65"),
    (&["young adult"], "18-35"),
];

/// Decade form such as "60s".
pub const DECADE_PATTERN: &str = r"\b([1-9]0)s\b";

/// Explicit numeric ages, tried in order against lowercased text.
/// Capture group 1 is the age.
pub const NUMERIC_AGE_PATTERNS: &[&str] = &[
    r"\b(\d{1,3})\s*(?:years?\s*old|yo\b|y\.o\.)",
    r"\b(\d{1,3})\s*[,-]\s*(?:male|female|m|f)\b",
    r"\bage\s*:?\s*(\d{1,3})\b",
];

/// Placeholder used when a procedure is mentioned but no name could be isolated.
pub const PROCEDURE_PLACEHOLDER: &str = "Procedure mentioned in text";

/// Characters of context kept on each side of a synonym match.
pub const PROCEDURE_WINDOW_CHARS: usize = 40;

#[cfg(test)]
mod tests {
    use super::*;
    use regex::Regex;

    #[test]
    fn age_patterns_compile() {
        Regex::new(DECADE_PATTERN).unwrap();
        for pattern in NUMERIC_AGE_PATTERNS {
            let re = Regex::new(pattern).unwrap();
            assert_eq!(re.captures_len(), 2, "pattern needs one capture: {pattern}");
        }
    }

    #[test]
    fn tables_are_lowercase() {
        for (abbrev, _) in ABBREVIATIONS {
            assert_eq!(*abbrev, abbrev.to_lowercase());
        }
        for (_, synonyms) in PROCEDURE_SYNONYMS {
            for s in *synonyms {
                assert_eq!(*s, s.to_lowercase());
            }
        }
    }

    #[test]
    fn chest_pain_abbreviation_not_in_table() {
        assert!(ABBREVIATIONS.iter().all(|(a, _)| *a != "cp"));
    }
}
