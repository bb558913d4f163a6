use serde_json::{Map, Value};

use super::types::{
    clamp_confidence, Decision, DecisionBody, DecisionCore, DifferentialDiagnosis,
    JustificationReview, MultiDecision, ProcedureDecision, SingleDecision,
};
use super::EngineError;

/// Shape-validated and normalized analysis output.
#[derive(Debug, Clone)]
pub struct ParsedDecision {
    pub body: DecisionBody,
    /// Unrecognized decision values and similar vocabulary drift.
    pub anomalies: Vec<String>,
}

/// Parse the model's analysis reply.
///
/// Errors are `JsonParsing` for text that is not a JSON object and
/// `MalformedResponse` for a JSON object missing the keys its shape requires.
/// Both are worth a fresh model call.
pub fn parse_decision_response(raw: &str) -> Result<ParsedDecision, EngineError> {
    let value: Value = serde_json::from_str(strip_code_fence(raw))
        .map_err(|e| EngineError::JsonParsing(e.to_string()))?;

    let Value::Object(obj) = value else {
        return Err(EngineError::JsonParsing("top-level value is not an object".into()));
    };

    let mut anomalies = Vec::new();
    let body = if obj.get("multiple_procedures").is_some_and(is_truthy_flag) {
        DecisionBody::Multiple(parse_multi(&obj, &mut anomalies)?)
    } else {
        DecisionBody::Single(parse_single(&obj, &mut anomalies)?)
    };

    Ok(ParsedDecision { body, anomalies })
}

/// Parse the justification-review reply. No key validation: absent fields get
/// neutral values, a missing `new_decision` echoes the prior one.
pub fn parse_justification_response(
    raw: &str,
    prior: &DecisionCore,
) -> Result<JustificationReview, EngineError> {
    let value: Value = serde_json::from_str(strip_code_fence(raw))
        .map_err(|e| EngineError::JsonParsing(e.to_string()))?;

    let Value::Object(obj) = value else {
        return Err(EngineError::JsonParsing("top-level value is not an object".into()));
    };

    Ok(JustificationReview {
        new_decision: obj
            .get("new_decision")
            .and_then(Value::as_str)
            .map(Decision::from)
            .unwrap_or_else(|| prior.decision.clone()),
        confidence: obj.get("confidence").and_then(number_value).unwrap_or(0),
        justification_assessment: string_field(&obj, "justification_assessment").unwrap_or_default(),
        reasoning: string_field(&obj, "reasoning").unwrap_or_default(),
        still_needed: string_list(obj.get("still_needed")),
        decision_changed: obj
            .get("decision_changed")
            .and_then(Value::as_bool)
            .unwrap_or(false),
        error: false,
    })
}

/// `true`, a non-zero number, or the string "true" (any case).
fn is_truthy_flag(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => s.trim().eq_ignore_ascii_case("true"),
        _ => false,
    }
}

/// JSON mode normally returns bare JSON; tolerate a ```json fence anyway.
fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

fn parse_single(
    obj: &Map<String, Value>,
    anomalies: &mut Vec<String>,
) -> Result<SingleDecision, EngineError> {
    let missing: Vec<&str> = ["decision", "confidence", "reasoning"]
        .into_iter()
        .filter(|key| !obj.contains_key(*key))
        .collect();
    if !missing.is_empty() {
        return Err(EngineError::MalformedResponse(format!(
            "missing required keys: {}",
            missing.join(", ")
        )));
    }

    let core = parse_core(obj, None, anomalies)?;

    Ok(SingleDecision {
        core,
        procedure_type: string_field(obj, "procedure_type"),
        clinical_indication: string_field(obj, "clinical_indication"),
        urgency: string_field(obj, "urgency"),
        estimated_cost: string_field(obj, "estimated_cost"),
        risk_factors: string_list(obj.get("risk_factors")),
        missing_info: string_list(obj.get("missing_info")),
        alternatives: string_list(obj.get("alternatives")),
        guidelines_referenced: string_list(obj.get("guidelines_referenced")),
        differential_diagnosis: parse_differentials(obj.get("differential_diagnosis")),
    })
}

fn parse_multi(
    obj: &Map<String, Value>,
    anomalies: &mut Vec<String>,
) -> Result<MultiDecision, EngineError> {
    let Some(items) = obj.get("procedures").and_then(Value::as_array) else {
        return Err(EngineError::MalformedResponse(
            "multi-procedure response without a procedures list".into(),
        ));
    };

    let mut procedures = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        let Value::Object(entry) = item else {
            anomalies.push(format!("procedure #{} is not an object; skipped", index + 1));
            continue;
        };

        // Per-procedure entries are not shape-checked: missing confidence reads as 0.
        let core = parse_core(entry, Some(0), anomalies).unwrap_or_else(|e| {
            anomalies.push(format!("procedure #{}: {e}", index + 1));
            DecisionCore::new(Decision::Unrecognized(String::new()), 0, "")
        });

        procedures.push(ProcedureDecision {
            procedure_name: string_field(entry, "procedure_name")
                .unwrap_or_else(|| format!("Procedure {}", index + 1)),
            core,
            urgency: string_field(entry, "urgency"),
            estimated_cost: string_field(entry, "estimated_cost"),
            missing_info: string_list(entry.get("missing_info")),
        });
    }

    Ok(MultiDecision {
        overall_summary: string_field(obj, "overall_summary").unwrap_or_default(),
        procedures,
        differential_diagnosis: parse_differentials(obj.get("differential_diagnosis")),
    })
}

/// Decision, clamped confidence and reasoning from one JSON object.
/// Without a `default_confidence` a non-numeric confidence is an error.
fn parse_core(
    obj: &Map<String, Value>,
    default_confidence: Option<i64>,
    anomalies: &mut Vec<String>,
) -> Result<DecisionCore, EngineError> {
    let decision = match obj.get("decision") {
        Some(Value::String(raw)) => Decision::from(raw.as_str()),
        Some(other) => Decision::Unrecognized(other.to_string()),
        None => return Err(EngineError::MalformedResponse("missing decision".into())),
    };
    if !decision.is_recognized() {
        anomalies.push(format!("unrecognized decision value: {decision}"));
    }

    let confidence = obj
        .get("confidence")
        .and_then(number_value)
        .or(default_confidence)
        .ok_or_else(|| EngineError::MalformedResponse("confidence is not a number".into()))?;

    Ok(DecisionCore {
        decision,
        confidence: clamp_confidence(confidence),
        reasoning: string_field(obj, "reasoning").unwrap_or_default(),
    })
}

/// Integer, float (rounded) or numeric string.
fn number_value(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f.round() as i64)),
        Value::String(s) => s
            .trim()
            .trim_end_matches('%')
            .trim()
            .parse::<f64>()
            .ok()
            .map(|f| f.round() as i64),
        _ => None,
    }
}

fn string_field(obj: &Map<String, Value>, key: &str) -> Option<String> {
    match obj.get(key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Array of strings, leniently: non-string items are skipped, a bare string
/// becomes a one-element list.
fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        Some(Value::String(s)) if !s.trim().is_empty() => vec![s.trim().to_string()],
        _ => Vec::new(),
    }
}

fn parse_differentials(value: Option<&Value>) -> Vec<DifferentialDiagnosis> {
    let Some(Value::Array(items)) = value else {
        return Vec::new();
    };

    items
        .iter()
        .filter_map(Value::as_object)
        .filter_map(|entry| {
            Some(DifferentialDiagnosis {
                diagnosis: string_field(entry, "diagnosis")?,
                icd10: string_field(entry, "icd10"),
                confidence: entry
                    .get("confidence")
                    .and_then(number_value)
                    .map(clamp_confidence),
            })
        })
        .collect()
}
