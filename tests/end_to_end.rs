//! Full flow through the public API: validate, prepare, analyze, justify.

use std::sync::Arc;
use std::time::Duration;

use priorauth_lib::config::{EngineConfig, NormalizerConfig};
use priorauth_lib::pipeline::authorization::{
    AuthorizationEngine, Decision, EngineError, MockLlmClient, RecordingSleeper,
};
use priorauth_lib::pipeline::intake::{InputError, InputNormalizer};
use priorauth_lib::session::{CaseSession, ReviewOutcome};

fn engine(client: Arc<MockLlmClient>, sleeper: Arc<RecordingSleeper>) -> AuthorizationEngine {
    AuthorizationEngine::with_client(Box::new(client), EngineConfig::default())
        .with_sleeper(Box::new(sleeper))
}

#[test]
fn routine_checkup_mri_is_denied_in_one_call() {
    let raw = "Age: 25, Male\nComplaint: routine checkup\nHistory: healthy\nProcedure: full body MRI";
    let normalizer = InputNormalizer::new(NormalizerConfig::default());

    let prepared = normalizer.prepare_case(raw).unwrap();
    assert_eq!(prepared.age, "25");
    assert_eq!(prepared.procedures, vec!["full body mri".to_string()]);

    let client = Arc::new(MockLlmClient::new(
        r#"{"decision":"DENIED","confidence":92,"reasoning":"No clinical indication"}"#,
    ));
    let sleeper = Arc::new(RecordingSleeper::new());
    let result = engine(client.clone(), sleeper.clone()).analyze_case(&prepared.text);

    let single = result.single().unwrap();
    assert_eq!(single.core.decision, Decision::Denied);
    assert_eq!(single.core.confidence, 92);
    assert_eq!(single.core.reasoning, "No clinical indication");
    assert!(!result.error);
    assert_eq!(client.call_count(), 1);
    assert!(sleeper.delays().is_empty());
}

#[test]
fn abbreviations_reach_the_model_expanded() {
    let raw = "58 yo male with htn and dm, sob on exertion. Procedure: stress test";
    let normalizer = InputNormalizer::new(NormalizerConfig::default());
    let prepared = normalizer.prepare_case(raw).unwrap();

    let client = Arc::new(MockLlmClient::new(
        r#"{"decision":"APPROVED","confidence":80,"reasoning":"Exertional dyspnea"}"#,
    ));
    engine(client.clone(), Arc::new(RecordingSleeper::new())).analyze_case(&prepared.text);

    let prompt = &client.prompts()[0];
    assert!(prompt.contains("hypertension"));
    assert!(prompt.contains("diabetes mellitus"));
    assert!(prompt.contains("shortness of breath"));
}

#[test]
fn invalid_case_never_reaches_the_engine() {
    let normalizer = InputNormalizer::new(NormalizerConfig::default());
    assert_eq!(
        normalizer.prepare_case("Procedure: knee arthroscopy").unwrap_err(),
        InputError::MissingAge
    );
    assert_eq!(
        normalizer.prepare_case("too short").unwrap_err(),
        InputError::TooShort { min: 15 }
    );
}

#[test]
fn multi_procedure_workup_with_justification() {
    let raw = "Patient in 60s with weight loss and abdominal pain.\n\
               Procedures requested:\n\
               1. CT Abdomen\n\
               2. PET scan\n";
    let normalizer = InputNormalizer::new(NormalizerConfig::default());
    let prepared = normalizer.prepare_case(raw).unwrap();
    assert_eq!(prepared.age, "60s");
    assert_eq!(prepared.procedures, vec!["CT Abdomen", "PET scan"]);

    let client = Arc::new(MockLlmClient::scripted(vec![
        Err(EngineError::RateLimited("quota exceeded".into())),
        Ok(r#"{"multiple_procedures":true,"overall_summary":"Malignancy workup",
              "procedures":[
                {"procedure_name":"CT Abdomen","decision":"APPROVED","confidence":88,"reasoning":"Weight loss"},
                {"procedure_name":"PET scan","decision":"DENIED","confidence":140,"reasoning":"CT first"}]}"#
            .into()),
        Ok(r#"{"new_decision":"APPROVED","confidence":75,"justification_assessment":"Adequate",
              "reasoning":"CT showed indeterminate mass","still_needed":[],"decision_changed":true}"#
            .into()),
    ]));
    let sleeper = Arc::new(RecordingSleeper::new());
    let engine = engine(client.clone(), sleeper.clone());

    let result = engine.analyze_case(&prepared.text);
    assert!(result.is_multiple());
    assert_eq!(result.procedures()[1].core.confidence, 100);
    assert_eq!(sleeper.delays(), vec![Duration::from_secs(10)]);

    let mut session = CaseSession::new();
    session.record_analysis(prepared.text.clone(), result);
    assert_eq!(session.summary().needs_attention(), 1);

    let prior = session.decision_for(Some(1)).unwrap().clone();
    let review = engine.justify_case(&prepared.text, &prior, "CT showed indeterminate mass");
    let outcome = session
        .apply_review(Some(1), "CT showed indeterminate mass", review)
        .unwrap();

    assert_eq!(outcome, ReviewOutcome::Approved);
    assert_eq!(session.summary().approved, 2);
    assert_eq!(session.summary().needs_attention(), 0);
    assert_eq!(client.call_count(), 3);
}
