use std::time::Duration;

use uuid::Uuid;

use super::gemini::GeminiClient;
use super::parser::{parse_decision_response, parse_justification_response};
use super::prompt::{build_analysis_prompt, build_justification_prompt};
use super::retry::{FailureKind, RetryPolicy, RetryStep, Sleeper, ThreadSleeper};
use super::types::{
    DecisionCore, DecisionResult, EngineStatus, GenerationOptions, JustificationReview, LlmClient,
};
use super::EngineError;
use crate::config::{EngineConfig, API_KEY_ENV};

/// Characters of an error message kept in a user-visible fallback.
const ANALYSIS_ERROR_CHARS: usize = 100;
const JUSTIFICATION_ERROR_CHARS: usize = 50;

/// One-time initialization outcome. Written once, never retried.
enum EngineState {
    Ready(Box<dyn LlmClient + Send + Sync>),
    Failed(String),
}

/// Drives analysis and justification calls against the model collaborator.
///
/// Never returns an error across `analyze_case` / `justify_case`: every path
/// yields a decision-shaped value, failures degrade to "more information
/// needed".
pub struct AuthorizationEngine {
    state: EngineState,
    policy: RetryPolicy,
    options: GenerationOptions,
    sleeper: Box<dyn Sleeper + Send + Sync>,
}

impl AuthorizationEngine {
    /// Read the API key from the environment and build a Gemini client.
    pub fn from_env(config: EngineConfig) -> Self {
        Self::with_api_key(std::env::var(API_KEY_ENV).ok(), config)
    }

    pub fn with_api_key(api_key: Option<String>, config: EngineConfig) -> Self {
        let client = api_key
            .filter(|key| !key.trim().is_empty())
            .ok_or(EngineError::MissingApiKey)
            .and_then(|key| GeminiClient::new(key.trim(), &config));

        match client {
            Ok(client) => Self::with_client(Box::new(client), config),
            Err(e) => Self::failed(e.to_string(), config),
        }
    }

    pub fn with_client(client: Box<dyn LlmClient + Send + Sync>, config: EngineConfig) -> Self {
        tracing::info!(model = client.model_name(), "Authorization engine ready");
        Self::build(EngineState::Ready(client), &config)
    }

    pub fn failed(message: impl Into<String>, config: EngineConfig) -> Self {
        let message = message.into();
        tracing::error!(error = %message, "Authorization engine failed to initialize");
        Self::build(EngineState::Failed(message), &config)
    }

    fn build(state: EngineState, config: &EngineConfig) -> Self {
        Self {
            state,
            policy: RetryPolicy::new(
                config.max_retries,
                Duration::from_secs(config.rate_limit_base_secs),
            ),
            options: GenerationOptions {
                temperature: config.temperature,
                max_output_tokens: config.max_output_tokens,
                ..GenerationOptions::default()
            },
            sleeper: Box::new(ThreadSleeper),
        }
    }

    /// Replace the backoff sleeper (tests record delays instead of blocking).
    pub fn with_sleeper(mut self, sleeper: Box<dyn Sleeper + Send + Sync>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.state, EngineState::Ready(_))
    }

    pub fn status(&self) -> EngineStatus {
        match &self.state {
            EngineState::Ready(client) => EngineStatus {
                initialized: true,
                model: Some(client.model_name().to_string()),
                error: None,
            },
            EngineState::Failed(message) => EngineStatus {
                initialized: false,
                model: None,
                error: Some(message.clone()),
            },
        }
    }

    /// Analyze already-validated, cleaned case text.
    ///
    /// Malformed replies are retried immediately, rate limits and other
    /// failures after a backoff, up to the configured attempt ceiling.
    pub fn analyze_case(&self, cleaned_text: &str) -> DecisionResult {
        let client = match &self.state {
            EngineState::Ready(client) => client,
            EngineState::Failed(message) => {
                return DecisionResult::fallback(format!("AI system not initialized: {message}"));
            }
        };

        let call_id = Uuid::new_v4();
        let _span = tracing::info_span!(
            "analyze_case",
            call_id = %call_id,
            input_len = cleaned_text.len()
        )
        .entered();

        let prompt = build_analysis_prompt(cleaned_text);
        let max_attempts = self.policy.max_attempts();

        for attempt in 1..=max_attempts {
            let error = match client.generate(&prompt, &self.options) {
                Ok(raw) => match parse_decision_response(&raw) {
                    Ok(parsed) => {
                        if !parsed.anomalies.is_empty() {
                            tracing::warn!(
                                attempt,
                                anomaly_count = parsed.anomalies.len(),
                                "Model response contained unexpected values"
                            );
                        }
                        let result = DecisionResult::new(parsed.body, parsed.anomalies);
                        tracing::info!(
                            attempt,
                            multiple = result.is_multiple(),
                            "Analysis completed"
                        );
                        return result;
                    }
                    Err(e) => e,
                },
                Err(e) => e,
            };

            let kind = FailureKind::classify(&error);
            match self.policy.next_step(kind, attempt) {
                RetryStep::RetryNow => {
                    tracing::warn!(attempt, ?kind, error = %error, "Analysis attempt failed, retrying");
                }
                RetryStep::RetryAfter(delay) => {
                    tracing::warn!(
                        attempt,
                        ?kind,
                        delay_secs = delay.as_secs(),
                        error = %error,
                        "Analysis attempt failed, backing off"
                    );
                    self.sleeper.sleep(delay);
                }
                RetryStep::GiveUp => {
                    tracing::error!(attempt, ?kind, error = %error, "Analysis attempts exhausted");
                    return DecisionResult::fallback(exhausted_reason(kind, &error));
                }
            }
        }

        DecisionResult::fallback("Maximum retries exceeded - please try again later")
    }

    /// Ask whether new justification changes one procedure's decision.
    ///
    /// Single call, no retry. Failures echo the prior decision unchanged.
    pub fn justify_case(
        &self,
        original_case: &str,
        prior: &DecisionCore,
        justification_text: &str,
    ) -> JustificationReview {
        let client = match &self.state {
            EngineState::Ready(client) => client,
            EngineState::Failed(message) => {
                return JustificationReview::fallback(
                    prior,
                    format!("AI system not initialized: {message}"),
                );
            }
        };

        let _span = tracing::info_span!(
            "justify_case",
            prior_decision = %prior.decision,
            justification_len = justification_text.len()
        )
        .entered();

        let prompt = build_justification_prompt(original_case, prior, justification_text);
        let review = client
            .generate(&prompt, &self.options)
            .and_then(|raw| parse_justification_response(&raw, prior));

        match review {
            Ok(review) => {
                tracing::info!(
                    decision_changed = review.decision_changed,
                    new_decision = %review.new_decision,
                    "Justification reviewed"
                );
                review
            }
            Err(e) => {
                tracing::warn!(error = %e, "Justification review failed");
                JustificationReview::fallback(
                    prior,
                    format!(
                        "Error processing justification: {}",
                        truncate_chars(&e.to_string(), JUSTIFICATION_ERROR_CHARS)
                    ),
                )
            }
        }
    }
}

fn exhausted_reason(kind: FailureKind, error: &EngineError) -> String {
    match kind {
        FailureKind::Malformed => {
            "Unable to process the AI response - please try again".to_string()
        }
        FailureKind::RateLimited | FailureKind::Transient => format!(
            "Analysis failed: {}",
            truncate_chars(&error.to_string(), ANALYSIS_ERROR_CHARS)
        ),
    }
}

fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}
