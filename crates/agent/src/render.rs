//! Console text for the interactive session and the batch runner.

use std::fmt::Write as _;

use archeck_bedrock::TokenUsage;
use archeck_core::{ApplicationError, Finding, GuardrailFinding};
use serde_json::Value;

use crate::commands::COMMANDS;
use crate::provider::GuardrailStage;
use crate::session::SessionSettings;

pub const RULE: &str = "----------------------------------------";

pub fn banner(adapter: &str) -> String {
    format!(
        "Starting interactive session ({adapter}).\nType your message and press Enter. Use /help for commands, /quit to exit.\n{}\n",
        "-".repeat(60)
    )
}

pub fn help(adapter: &str, settings: &SessionSettings) -> String {
    let mut text = String::from("\nInteractive Automated Reasoning Policy Tester\n");
    let _ = writeln!(text, "Integration: {adapter}\n\nCommands:");
    for (token, description) in COMMANDS {
        let _ = writeln!(text, "  {token:<8} - {description}");
    }
    let _ = writeln!(
        text,
        "\nModel: {}\nGuardrail: {} (version {})\n\nType a message and press Enter. Guardrail findings are shown after each reply.",
        settings.model_id, settings.guardrail_id, settings.guardrail_version
    );
    text
}

pub struct StatusView<'a> {
    pub adapter: &'a str,
    pub settings: &'a SessionSettings,
    pub history_len: usize,
    pub policy_loaded: bool,
}

pub fn status(view: &StatusView<'_>) -> String {
    let settings = view.settings;
    let mut text = String::from("\nCurrent Configuration\n=====================\n");
    let _ = writeln!(text, "Integration: {}", view.adapter);
    let _ = writeln!(text, "Model ID: {}", settings.model_id);
    let _ = writeln!(text, "Guardrail ID: {}", settings.guardrail_id);
    let _ = writeln!(text, "Guardrail Version: {}", settings.guardrail_version);
    let _ = writeln!(text, "AWS Region: {}", settings.region);
    let _ = writeln!(text, "Endpoint: {}", settings.endpoint);
    let document = settings
        .policy_document
        .as_ref()
        .map(|path| path.display().to_string())
        .unwrap_or_else(|| "none".to_string());
    let _ = writeln!(text, "Policy Document: {document}");
    let _ = writeln!(text, "Policy Loaded: {}", view.policy_loaded);
    let _ = writeln!(text, "Conversation Messages: {} (limit {})", view.history_len, settings.history_limit);
    text
}

pub fn cleared() -> String {
    "Conversation history cleared\n".to_string()
}

pub fn assistant(text: &str) -> String {
    format!("\nAssistant: {text}\n")
}

pub fn intervention(stage: GuardrailStage) -> String {
    format!("\nGuardrail intervened at {} stage - content blocked\n", stage.as_str())
}

pub fn usage(usage: &TokenUsage) -> String {
    format!(
        "\nUsage: Input tokens: {}, Output tokens: {}, Total: {}\n",
        usage.input_tokens, usage.output_tokens, usage.total_tokens
    )
}

/// A failed turn: malformed responses show their raw payload, the rest the user-facing hint.
pub fn failure(error: &ApplicationError) -> String {
    match error {
        ApplicationError::MalformedResponse { reason, raw } => malformed_response(None, reason, raw),
        other => format!("\nError: {other}\n{}\n", other.user_message()),
    }
}

pub fn malformed_response(stage: Option<GuardrailStage>, reason: &str, raw: &Value) -> String {
    let location = stage.map(|stage| format!(" ({} stage)", stage.as_str())).unwrap_or_default();
    format!("\nUnrecognized guardrail response{location}: {reason}\nRaw payload:\n{}\n", pretty(raw))
}

/// Guardrail assessment for one stage: action line, then one entry per finding.
pub fn assessment(stage: GuardrailStage, outcome: &GuardrailFinding) -> String {
    let mut text = String::new();
    let title = match stage {
        GuardrailStage::Conversation => "Guardrail Assessment",
        GuardrailStage::Input => "Input Guardrail Assessment",
        GuardrailStage::Output => "Output Guardrail Assessment",
    };
    let _ = writeln!(text, "\n{title}: {}", outcome.action.as_str());
    text.push_str(&findings(&outcome.findings));
    let summary = outcome.summary();
    if summary.total > 0 {
        let _ = writeln!(
            text,
            "  Summary: {} finding(s): {} valid, {} invalid, {} impossible, {} satisfiable, {} other",
            summary.total,
            summary.valid,
            summary.invalid,
            summary.impossible,
            summary.satisfiable,
            summary.other
        );
    }
    text
}

pub fn findings(findings: &[Finding]) -> String {
    let mut text = String::new();
    if findings.is_empty() {
        text.push_str("  No automated reasoning findings\n");
        return text;
    }

    for (index, finding) in findings.iter().enumerate() {
        let _ = write!(text, "  [{}] {}", index + 1, finding.label());
        if let Some(confidence) = finding.confidence() {
            let _ = write!(text, " (confidence {confidence:.2})");
        }
        text.push('\n');
        let _ = writeln!(text, "      {}", finding.explanation());
        for rule in finding.rules() {
            let _ = writeln!(
                text,
                "      - Rule ID: {} (policy: {})",
                rule.identifier,
                rule.policy_version_arn.as_deref().unwrap_or("unknown")
            );
        }
        if let Finding::Other(other) = finding {
            let _ = writeln!(text, "      raw: {}", other.raw);
        }
    }
    text
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

#[cfg(test)]
mod tests {
    use archeck_core::{
        ApplicationError, Finding, GuardrailAction, GuardrailFinding, OtherFinding, OtherKind,
        RuleRef, ValidationFinding, ValidationVerdict,
    };
    use serde_json::json;

    use super::{assessment, failure, findings, malformed_response};
    use crate::provider::GuardrailStage;

    #[test]
    fn assessment_lists_label_and_rules() {
        let outcome = GuardrailFinding {
            action: GuardrailAction::GuardrailIntervened,
            findings: vec![Finding::Validation(ValidationFinding {
                verdict: ValidationVerdict::Invalid,
                translation: None,
                rules: vec![RuleRef {
                    identifier: "REFUND_WINDOW".to_string(),
                    policy_version_arn: None,
                }],
                claims_true_scenario: None,
            })],
        };

        let text = assessment(GuardrailStage::Output, &outcome);
        assert!(text.contains("Output Guardrail Assessment: GUARDRAIL_INTERVENED"));
        assert!(text.contains("[1] INVALID"));
        assert!(text.contains("Rule ID: REFUND_WINDOW (policy: unknown)"));
    }

    #[test]
    fn other_findings_show_raw_payload() {
        let text = findings(&[Finding::Other(OtherFinding {
            kind: OtherKind::Unrecognized,
            tag: "brandNew".to_string(),
            raw: json!({ "brandNew": { "x": 1 } }),
        })]);
        assert!(text.contains("UNRECOGNIZED"));
        assert!(text.contains(r#"raw: {"brandNew":{"x":1}}"#));
    }

    #[test]
    fn malformed_response_includes_raw_payload() {
        let text = malformed_response(
            Some(GuardrailStage::Input),
            "no known shape",
            &json!({ "weird": true }),
        );
        assert!(text.contains("(input stage): no known shape"));
        assert!(text.contains("\"weird\": true"));
    }

    #[test]
    fn assessment_closes_with_a_verdict_summary() {
        let verdict = |verdict| {
            Finding::Validation(ValidationFinding {
                verdict,
                translation: None,
                rules: Vec::new(),
                claims_true_scenario: None,
            })
        };
        let outcome = GuardrailFinding {
            action: GuardrailAction::GuardrailIntervened,
            findings: vec![
                Finding::Other(OtherFinding {
                    kind: OtherKind::NonReasoningAssessment,
                    tag: "contentPolicy".to_string(),
                    raw: json!({}),
                }),
                verdict(ValidationVerdict::Valid),
                verdict(ValidationVerdict::Invalid),
            ],
        };

        let text = assessment(GuardrailStage::Output, &outcome);
        assert!(text.contains(
            "Summary: 3 finding(s): 1 valid, 1 invalid, 0 impossible, 0 satisfiable, 1 other"
        ));

        let quiet = GuardrailFinding { action: GuardrailAction::None, findings: Vec::new() };
        assert!(!assessment(GuardrailStage::Input, &quiet).contains("Summary"));
    }

    #[test]
    fn failures_carry_the_recovery_hint() {
        let text = failure(&ApplicationError::Transport("Converse timed out".to_string()));
        assert!(text.contains("Error: transport failure: Converse timed out"));
        assert!(text.contains("Your message was kept; try again."));

        let malformed = failure(&ApplicationError::MalformedResponse {
            reason: "no known shape".to_string(),
            raw: json!({ "weird": true }),
        });
        assert!(malformed.contains("Unrecognized guardrail response: no known shape"));
    }
}
