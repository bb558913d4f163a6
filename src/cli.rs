use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use serde_json::json;

use crate::config::NormalizerConfig;
use crate::pipeline::authorization::{AuthorizationEngine, DecisionResult};
use crate::pipeline::intake::{format_age_for_display, InputNormalizer};
use crate::session::CaseSession;

#[derive(Parser, Debug)]
#[command(name = "priorauth")]
#[command(about = "Prior-authorization decisions for free-text patient cases", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check that a case description has an age and a procedure
    Validate {
        /// Case file ("-" or omitted for stdin)
        file: Option<PathBuf>,
    },
    /// Analyze a case and print the decision as JSON
    Analyze {
        /// Case file ("-" or omitted for stdin)
        file: Option<PathBuf>,
    },
    /// Re-review one decision with additional justification
    Justify {
        /// Original case file
        #[arg(long)]
        case: PathBuf,
        /// Decision JSON previously printed by `analyze`
        #[arg(long)]
        decision_json: PathBuf,
        /// Procedure index for multi-procedure results (0-based)
        #[arg(long)]
        procedure: Option<usize>,
        /// New justification from the provider
        justification: String,
    },
    /// Print engine initialization status
    Status,
}

/// Read case text from a file, or stdin for `None` / `-`.
pub fn read_input(file: Option<&Path>) -> anyhow::Result<String> {
    match file {
        Some(path) if path != Path::new("-") => std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display())),
        _ => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("reading stdin")?;
            Ok(buf)
        }
    }
}

/// Run one command against the given engine, writing results to `out`.
pub fn execute(
    command: Commands,
    engine: &AuthorizationEngine,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    let normalizer = InputNormalizer::new(NormalizerConfig::default());

    match command {
        Commands::Validate { file } => {
            let text = read_input(file.as_deref())?;
            match normalizer.validate(&text) {
                Ok(summary) => {
                    writeln!(out, "✓ {summary}")?;
                    writeln!(out, "  age: {}", format_age_for_display(Some(&summary.age)))?;
                    for procedure in &summary.procedures {
                        writeln!(out, "  procedure: {procedure}")?;
                    }
                }
                Err(e) => {
                    for hint in normalizer.validation_feedback(&text) {
                        writeln!(out, "- {hint}")?;
                    }
                    bail!(e);
                }
            }
        }
        Commands::Analyze { file } => {
            let text = read_input(file.as_deref())?;
            let prepared = normalizer.prepare_case(&text)?;
            let result = engine.analyze_case(&prepared.text);
            serde_json::to_writer_pretty(&mut *out, &result)?;
            writeln!(out)?;
        }
        Commands::Justify {
            case,
            decision_json,
            procedure,
            justification,
        } => {
            if justification.trim().is_empty() {
                bail!("justification text is empty");
            }
            let case_text = read_input(Some(&case))?;
            let prior: DecisionResult = serde_json::from_str(&read_input(Some(&decision_json))?)
                .with_context(|| format!("parsing decision JSON {}", decision_json.display()))?;

            let mut session = CaseSession::new();
            session.record_analysis(case_text, prior);

            let prior_core = session.decision_for(procedure)?.clone();
            let review = engine.justify_case(
                session.case_text().unwrap_or_default(),
                &prior_core,
                &justification,
            );
            let outcome = session.apply_review(procedure, justification, review.clone())?;

            let report = json!({
                "review": review,
                "outcome": outcome,
                "summary": session.summary(),
                "result": session.result(),
            });
            serde_json::to_writer_pretty(&mut *out, &report)?;
            writeln!(out)?;
        }
        Commands::Status => {
            serde_json::to_writer_pretty(&mut *out, &engine.status())?;
            writeln!(out)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::config::EngineConfig;
    use crate::pipeline::authorization::{MockLlmClient, RecordingSleeper};

    fn mock_engine(response: &str) -> AuthorizationEngine {
        AuthorizationEngine::with_client(
            Box::new(MockLlmClient::new(response)),
            EngineConfig::default(),
        )
        .with_sleeper(Box::new(Arc::new(RecordingSleeper::new())))
    }

    fn write_temp(dir: &tempfile::TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn cli_parses_justify() {
        let cli = Cli::try_parse_from([
            "priorauth",
            "justify",
            "--case",
            "case.txt",
            "--decision-json",
            "d.json",
            "--procedure",
            "2",
            "failed PT",
        ])
        .unwrap();
        match cli.command {
            Commands::Justify { procedure, justification, .. } => {
                assert_eq!(procedure, Some(2));
                assert_eq!(justification, "failed PT");
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn read_input_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_temp(&dir, "case.txt", "Age: 58, Male\nProcedure: MRI");
        assert_eq!(read_input(Some(&path)).unwrap(), "Age: 58, Male\nProcedure: MRI");
        assert!(read_input(Some(&dir.path().join("missing.txt"))).is_err());
    }

    #[test]
    fn validate_reports_findings() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_temp(&dir, "case.txt", "Age: 58, Male\nProcedure: Brain MRI");
        let mut out = Vec::new();
        execute(
            Commands::Validate { file: Some(path) },
            &mock_engine("{}"),
            &mut out,
        )
        .unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("Found age: 58"));
        assert!(text.contains("58 years old"));
    }

    #[test]
    fn validate_failure_lists_feedback() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_temp(&dir, "case.txt", "hi");
        let mut out = Vec::new();
        let err = execute(
            Commands::Validate { file: Some(path) },
            &mock_engine("{}"),
            &mut out,
        )
        .unwrap_err();
        assert!(err.to_string().contains("too short"));
        assert!(String::from_utf8(out).unwrap().contains("Add patient age"));
    }

    #[test]
    fn analyze_prints_decision_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_temp(&dir, "case.txt", "Age: 25, Male\nProcedure: full body MRI");
        let mut out = Vec::new();
        execute(
            Commands::Analyze { file: Some(path) },
            &mock_engine(r#"{"decision":"DENIED","confidence":92,"reasoning":"No indication"}"#),
            &mut out,
        )
        .unwrap();
        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value["body"]["decision"], "DENIED");
        assert_eq!(value["body"]["confidence"], 92);
    }

    #[test]
    fn justify_merges_approval() {
        let dir = tempfile::tempdir().unwrap();
        let case = write_temp(&dir, "case.txt", "Age: 58, Male\nProcedure: Brain MRI");
        let prior = DecisionResult::fallback("need more info");
        let decision_json = write_temp(&dir, "d.json", &serde_json::to_string(&prior).unwrap());

        let engine = mock_engine(
            r#"{"new_decision":"APPROVED","confidence":85,"justification_assessment":"ok",
                "reasoning":"focal deficit documented","decision_changed":true}"#,
        );
        let mut out = Vec::new();
        execute(
            Commands::Justify {
                case,
                decision_json,
                procedure: None,
                justification: "new focal weakness".into(),
            },
            &engine,
            &mut out,
        )
        .unwrap();

        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value["outcome"], "approved");
        assert_eq!(value["result"]["body"]["decision"], "APPROVED");
        assert_eq!(value["summary"]["approved"], 1);
    }

    #[test]
    fn status_prints_json() {
        let mut out = Vec::new();
        execute(Commands::Status, &mock_engine("{}"), &mut out).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value["initialized"], true);
        assert_eq!(value["model"], "mock");
    }
}
