use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::EngineError;

/// Canonical authorization outcome for one procedure.
///
/// Anything else the model emits is kept verbatim in `Unrecognized` so the
/// caller can surface it instead of silently mapping it onto a real outcome.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Decision {
    Approved,
    Denied,
    PendingAdditionalInfo,
    Unrecognized(String),
}

impl Decision {
    pub fn as_str(&self) -> &str {
        match self {
            Decision::Approved => "APPROVED",
            Decision::Denied => "DENIED",
            Decision::PendingAdditionalInfo => "PENDING_ADDITIONAL_INFO",
            Decision::Unrecognized(raw) => raw,
        }
    }

    pub fn is_recognized(&self) -> bool {
        !matches!(self, Decision::Unrecognized(_))
    }
}

impl From<String> for Decision {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "APPROVED" => Decision::Approved,
            "DENIED" => Decision::Denied,
            "PENDING_ADDITIONAL_INFO" => Decision::PendingAdditionalInfo,
            _ => Decision::Unrecognized(raw),
        }
    }
}

impl From<&str> for Decision {
    fn from(raw: &str) -> Self {
        Decision::from(raw.to_string())
    }
}

impl From<Decision> for String {
    fn from(decision: Decision) -> Self {
        decision.as_str().to_string()
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fields every decision carries, single result or per-procedure entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionCore {
    pub decision: Decision,
    /// Always within 0..=100.
    pub confidence: u8,
    pub reasoning: String,
}

impl DecisionCore {
    pub fn new(decision: Decision, confidence: i64, reasoning: impl Into<String>) -> Self {
        Self {
            decision,
            confidence: clamp_confidence(confidence),
            reasoning: reasoning.into(),
        }
    }
}

/// Clamp a raw model confidence into 0..=100.
pub fn clamp_confidence(raw: i64) -> u8 {
    raw.clamp(0, 100) as u8
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DifferentialDiagnosis {
    pub diagnosis: String,
    pub icd10: Option<String>,
    pub confidence: Option<u8>,
}

/// Decision for a case that requested one procedure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SingleDecision {
    #[serde(flatten)]
    pub core: DecisionCore,
    pub procedure_type: Option<String>,
    pub clinical_indication: Option<String>,
    /// ROUTINE / URGENT / EMERGENT as reported by the model.
    pub urgency: Option<String>,
    /// LOW / MODERATE / HIGH / VERY_HIGH as reported by the model.
    pub estimated_cost: Option<String>,
    #[serde(default)]
    pub risk_factors: Vec<String>,
    #[serde(default)]
    pub missing_info: Vec<String>,
    #[serde(default)]
    pub alternatives: Vec<String>,
    #[serde(default)]
    pub guidelines_referenced: Vec<String>,
    #[serde(default)]
    pub differential_diagnosis: Vec<DifferentialDiagnosis>,
}

impl SingleDecision {
    pub fn from_core(core: DecisionCore) -> Self {
        Self {
            core,
            procedure_type: None,
            clinical_indication: None,
            urgency: None,
            estimated_cost: None,
            risk_factors: Vec::new(),
            missing_info: Vec::new(),
            alternatives: Vec::new(),
            guidelines_referenced: Vec::new(),
            differential_diagnosis: Vec::new(),
        }
    }
}

/// One entry of a multi-procedure decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcedureDecision {
    pub procedure_name: String,
    #[serde(flatten)]
    pub core: DecisionCore,
    pub urgency: Option<String>,
    pub estimated_cost: Option<String>,
    #[serde(default)]
    pub missing_info: Vec<String>,
}

/// Decision for a case that requested several procedures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiDecision {
    pub overall_summary: String,
    pub procedures: Vec<ProcedureDecision>,
    #[serde(default)]
    pub differential_diagnosis: Vec<DifferentialDiagnosis>,
}

/// The two response shapes, discriminated explicitly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum DecisionBody {
    Single(SingleDecision),
    Multiple(MultiDecision),
}

impl DecisionBody {
    /// Every decision core in display order.
    pub fn cores(&self) -> Vec<&DecisionCore> {
        match self {
            DecisionBody::Single(single) => vec![&single.core],
            DecisionBody::Multiple(multi) => multi.procedures.iter().map(|p| &p.core).collect(),
        }
    }
}

/// Result of one analysis call. Every exit path of the engine produces one,
/// failures included (`error == true`, decision pending, confidence 0).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionResult {
    pub body: DecisionBody,
    pub analyzed_at: DateTime<Utc>,
    #[serde(default)]
    pub error: bool,
    /// Model output that did not fit the expected vocabulary.
    #[serde(default)]
    pub anomalies: Vec<String>,
}

impl DecisionResult {
    pub fn new(body: DecisionBody, anomalies: Vec<String>) -> Self {
        Self {
            body,
            analyzed_at: Utc::now(),
            error: false,
            anomalies,
        }
    }

    /// Pending, zero-confidence result carrying the failure in its reasoning.
    pub fn fallback(reason: impl Into<String>) -> Self {
        let core = DecisionCore::new(Decision::PendingAdditionalInfo, 0, reason);
        Self {
            body: DecisionBody::Single(SingleDecision::from_core(core)),
            analyzed_at: Utc::now(),
            error: true,
            anomalies: Vec::new(),
        }
    }

    pub fn is_multiple(&self) -> bool {
        matches!(self.body, DecisionBody::Multiple(_))
    }

    /// The single-procedure core, if this is a single-procedure result.
    pub fn single(&self) -> Option<&SingleDecision> {
        match &self.body {
            DecisionBody::Single(single) => Some(single),
            DecisionBody::Multiple(_) => None,
        }
    }

    pub fn procedures(&self) -> &[ProcedureDecision] {
        match &self.body {
            DecisionBody::Single(_) => &[],
            DecisionBody::Multiple(multi) => &multi.procedures,
        }
    }
}

/// Outcome of a justification review. Never merged automatically.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JustificationReview {
    pub new_decision: Decision,
    /// As reported by the model; not clamped on this path.
    pub confidence: i64,
    pub justification_assessment: String,
    pub reasoning: String,
    #[serde(default)]
    pub still_needed: Vec<String>,
    pub decision_changed: bool,
    #[serde(default)]
    pub error: bool,
}

impl JustificationReview {
    /// Echo the prior decision unchanged, with the failure in the assessment.
    pub fn fallback(prior: &DecisionCore, assessment: impl Into<String>) -> Self {
        Self {
            new_decision: prior.decision.clone(),
            confidence: 0,
            justification_assessment: assessment.into(),
            reasoning: "Unable to process additional information".to_string(),
            still_needed: Vec::new(),
            decision_changed: false,
            error: true,
        }
    }
}

/// Generation parameters sent with every model call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationOptions {
    /// Low for reproducible decisions.
    pub temperature: f32,
    /// Generous so multi-procedure analyses are not truncated.
    pub max_output_tokens: u32,
    pub response_mime_type: String,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            temperature: 0.1,
            max_output_tokens: 4000,
            response_mime_type: "application/json".to_string(),
        }
    }
}

/// Text-generation collaborator (allows mocking).
pub trait LlmClient {
    fn generate(&self, prompt: &str, options: &GenerationOptions) -> Result<String, EngineError>;

    fn model_name(&self) -> &str;
}

/// Snapshot of the engine's one-time initialization outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EngineStatus {
    pub initialized: bool,
    pub model: Option<String>,
    pub error: Option<String>,
}
