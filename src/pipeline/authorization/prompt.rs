use super::types::DecisionCore;

pub const ANALYSIS_ROLE: &str = "You are a medical AI for insurance procedure authorization. \
Analyze this case and provide a JSON response.";

/// Build the analysis prompt: role, case text verbatim, and both response
/// shapes. The model picks the shape from the number of procedures requested.
pub fn build_analysis_prompt(case_text: &str) -> String {
    format!(
        r#"{ANALYSIS_ROLE}

PATIENT DATA:
{case_text}

RESPONSE FORMAT:
If ONE procedure was requested, respond with:
{{
    "decision": "APPROVED | DENIED | PENDING_ADDITIONAL_INFO",
    "confidence": 85,
    "procedure_type": "specific procedure name",
    "clinical_indication": "primary medical reason",
    "reasoning": "detailed medical justification with evidence",
    "risk_factors": ["risk1", "risk2"],
    "guidelines_referenced": ["guideline1"],
    "alternatives": ["alternative if denied"],
    "urgency": "ROUTINE | URGENT | EMERGENT",
    "estimated_cost": "LOW | MODERATE | HIGH | VERY_HIGH",
    "missing_info": ["what is needed if pending"],
    "differential_diagnosis": [
        {{"diagnosis": "Condition 1", "icd10": "ICD10-CODE", "confidence": 85}}
    ]
}}

If MULTIPLE procedures were requested, respond with:
{{
    "multiple_procedures": true,
    "overall_summary": "brief summary",
    "procedures": [
        {{
            "procedure_name": "CT Abdomen",
            "decision": "APPROVED | DENIED | PENDING_ADDITIONAL_INFO",
            "confidence": 90,
            "reasoning": "medical justification",
            "urgency": "ROUTINE | URGENT | EMERGENT",
            "estimated_cost": "LOW | MODERATE | HIGH | VERY_HIGH",
            "missing_info": []
        }}
    ],
    "differential_diagnosis": [
        {{"diagnosis": "Condition", "icd10": "CODE", "confidence": 85}}
    ]
}}

The "decision" value MUST be exactly one of APPROVED, DENIED, PENDING_ADDITIONAL_INFO.
"confidence" is an integer from 0 to 100.
Base decisions on medical necessity, clinical guidelines, and insurance best practices.
"#
    )
}

/// Build the follow-up prompt for one procedure's prior decision and the
/// provider's new justification.
pub fn build_justification_prompt(
    original_case: &str,
    prior: &DecisionCore,
    justification_text: &str,
) -> String {
    let reasoning = if prior.reasoning.trim().is_empty() {
        "None provided"
    } else {
        prior.reasoning.as_str()
    };

    format!(
        r#"Review this medical authorization that was {decision}.

ORIGINAL CASE: {original_case}
ORIGINAL DECISION: {decision}
ORIGINAL REASONING: {reasoning}

NEW JUSTIFICATION FROM PROVIDER: {justification_text}

Based on this additional information, provide a JSON response:
{{
    "new_decision": "APPROVED | DENIED | PENDING_ADDITIONAL_INFO",
    "confidence": 85,
    "justification_assessment": "assessment of the new justification",
    "reasoning": "updated reasoning based on new information",
    "still_needed": ["what else is needed if still pending or denied"],
    "decision_changed": true
}}

Consider whether the additional justification provides sufficient medical evidence
to change THIS SPECIFIC PROCEDURE'S decision. Do not consider other procedures.
"#,
        decision = prior.decision,
    )
}
