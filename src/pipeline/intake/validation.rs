// Gatekeeping for operator-entered case text: length bounds plus the two
// signals (age, procedure) a case needs before it is worth a model call.

use std::fmt;

use serde::Serialize;

use super::extract::{extract_age, extract_procedures};
use super::sanitize::{clean_case_text, sanitize_case_text};
use super::InputError;
use crate::config::NormalizerConfig;

/// What validation found in an analyzable case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CaseSummary {
    pub age: String,
    pub procedures: Vec<String>,
}

impl fmt::Display for CaseSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Found age: {}, procedure(s): {}",
            self.age,
            self.procedures.len()
        )
    }
}

/// Case text ready for the authorization engine.
#[derive(Debug, Clone, Serialize)]
pub struct PreparedCase {
    /// Sanitized and abbreviation-expanded text.
    pub text: String,
    pub age: String,
    pub procedures: Vec<String>,
}

/// Input normalizer: pure functions over the supplied text, parameterised by
/// length bounds.
#[derive(Debug, Clone, Copy, Default)]
pub struct InputNormalizer {
    config: NormalizerConfig,
}

impl InputNormalizer {
    pub fn new(config: NormalizerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> NormalizerConfig {
        self.config
    }

    pub fn sanitize(&self, text: &str) -> String {
        sanitize_case_text(text)
    }

    pub fn clean(&self, text: &str) -> String {
        clean_case_text(text)
    }

    /// Check length bounds, then age, then procedure. First failure wins.
    ///
    /// The `Ok` summary is informational; callers should not parse its text.
    pub fn validate(&self, text: &str) -> Result<CaseSummary, InputError> {
        if text.trim().chars().count() < self.config.min_length {
            return Err(InputError::TooShort {
                min: self.config.min_length,
            });
        }
        if text.chars().count() > self.config.max_length {
            return Err(InputError::TooLong {
                max: self.config.max_length,
            });
        }

        let age = extract_age(text).ok_or(InputError::MissingAge)?;

        let procedures = extract_procedures(text);
        if procedures.is_empty() {
            return Err(InputError::MissingProcedure);
        }

        Ok(CaseSummary { age, procedures })
    }

    /// Every missing item at once, for inline form hints. Empty when the
    /// minimum requirements are met.
    pub fn validation_feedback(&self, text: &str) -> Vec<String> {
        let mut feedback = Vec::new();

        if text.trim().chars().count() < self.config.min_length {
            feedback.push(format!(
                "Need at least {} characters",
                self.config.min_length
            ));
        }
        if text.chars().count() > self.config.max_length {
            feedback.push(format!(
                "Limit the description to {} characters",
                self.config.max_length
            ));
        }
        if extract_age(text).is_none() {
            feedback.push("Add patient age (exact or approximate)".to_string());
        }
        if extract_procedures(text).is_empty() {
            feedback.push("Mention the requested procedure".to_string());
        }

        feedback
    }

    /// Validate the raw text, then sanitize and expand it for the prompt.
    pub fn prepare_case(&self, text: &str) -> Result<PreparedCase, InputError> {
        let summary = self.validate(text).inspect_err(|e| {
            tracing::debug!(
                input_len = text.len(),
                reason = ?e,
                "Case text rejected by validation"
            );
        })?;

        let cleaned = clean_case_text(&sanitize_case_text(text));
        // Expansion can grow the text past the bound the raw input met.
        if cleaned.chars().count() > self.config.max_length {
            tracing::debug!(
                input_len = text.len(),
                cleaned_len = cleaned.len(),
                "Cleaned case text exceeds length bound"
            );
            return Err(InputError::TooLong {
                max: self.config.max_length,
            });
        }

        tracing::debug!(
            input_len = text.len(),
            cleaned_len = cleaned.len(),
            procedure_count = summary.procedures.len(),
            "Case text prepared"
        );

        Ok(PreparedCase {
            text: cleaned,
            age: summary.age,
            procedures: summary.procedures,
        })
    }
}

/// Human-readable age label for an extracted age token.
pub fn format_age_for_display(age: Option<&str>) -> String {
    match age {
        None | Some("") => "Age not specified".to_string(),
        Some("65+") => "Elderly (65+)".to_string(),
        Some("45-65") => "Middle-aged (45-65)".to_string(),
        Some("18-35") => "Young adult (18-35)".to_string(),
        Some(other) => format!("{other} years old"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normalizer() -> InputNormalizer {
        InputNormalizer::default()
    }

    #[test]
    fn empty_and_blank_are_too_short() {
        assert_eq!(
            normalizer().validate(""),
            Err(InputError::TooShort { min: 15 })
        );
        assert_eq!(
            normalizer().validate(" "),
            Err(InputError::TooShort { min: 15 })
        );
        let msg = normalizer().validate(" ").unwrap_err().to_string();
        assert!(msg.contains("too short"), "got: {msg}");
    }

    #[test]
    fn over_max_is_too_long() {
        let text = format!("Age: 58, Male. Procedure: MRI. {}", "x".repeat(5000));
        let err = normalizer().validate(&text).unwrap_err();
        assert_eq!(err, InputError::TooLong { max: 5000 });
        assert!(err.to_string().contains("too long"));
    }

    #[test]
    fn procedure_without_age_is_missing_age() {
        let err = normalizer()
            .validate("Procedure: MRI brain, no age given")
            .unwrap_err();
        assert_eq!(err, InputError::MissingAge);
        assert!(err.to_string().contains("missing age"));
    }

    #[test]
    fn age_without_procedure_is_missing_procedure() {
        let err = normalizer()
            .validate("Age: 44, female, feeling fine today")
            .unwrap_err();
        assert_eq!(err, InputError::MissingProcedure);
        assert!(err.to_string().contains("missing procedure"));
    }

    #[test]
    fn valid_case_reports_findings() {
        let summary = normalizer()
            .validate("Age: 58, Male\nComplaint: palpitations\nProcedure: Heart monitor")
            .unwrap();
        assert_eq!(summary.age, "58");
        assert_eq!(summary.procedures.len(), 1);
        assert_eq!(summary.to_string(), "Found age: 58, procedure(s): 1");
    }

    #[test]
    fn custom_bounds_are_respected() {
        let strict = InputNormalizer::new(NormalizerConfig {
            min_length: 50,
            max_length: 60,
        });
        assert!(matches!(
            strict.validate("Age: 58, Procedure: MRI"),
            Err(InputError::TooShort { min: 50 })
        ));
    }

    #[test]
    fn feedback_lists_everything_missing() {
        let feedback = normalizer().validation_feedback("hello");
        assert_eq!(feedback.len(), 3);
        assert!(feedback[0].contains("15"));
        assert!(normalizer()
            .validation_feedback("Age: 58, Male. Procedure: CT head")
            .is_empty());
    }

    #[test]
    fn prepare_case_sanitizes_and_expands() {
        let prepared = normalizer()
            .prepare_case("Age: 67, Male\nHistory: htn, dm <b>\nProcedure: Cardiac stress test")
            .unwrap();
        assert_eq!(
            prepared.text,
            "Age: 67, Male History: hypertension, diabetes mellitus b Procedure: Cardiac stress test"
        );
        assert_eq!(prepared.age, "67");
        assert!(!prepared.procedures.is_empty());
    }

    #[test]
    fn prepare_case_propagates_validation_error() {
        assert_eq!(
            normalizer().prepare_case("short").unwrap_err(),
            InputError::TooShort { min: 15 }
        );
    }

    #[test]
    fn expanded_text_is_held_to_max_length() {
        let mut case = String::from("Age: 58, Male\nProcedure: CT head\nHistory: ");
        while case.chars().count() + 3 <= 4990 {
            case.push_str("dm ");
        }
        assert!(normalizer().validate(&case).is_ok());
        assert_eq!(
            normalizer().prepare_case(&case).unwrap_err(),
            InputError::TooLong { max: 5000 }
        );
    }

    #[test]
    fn age_display_labels() {
        assert_eq!(format_age_for_display(Some("65+")), "Elderly (65+)");
        assert_eq!(format_age_for_display(Some("45-65")), "Middle-aged (45-65)");
        assert_eq!(format_age_for_display(Some("18-35")), "Young adult (18-35)");
        assert_eq!(format_age_for_display(Some("58")), "58 years old");
        assert_eq!(format_age_for_display(None), "Age not specified");
    }
}
