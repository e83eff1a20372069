//! Collapses the two upstream guardrail response shapes into one [`GuardrailFinding`].
//!
//! A standalone guardrail application returns `action` plus an `assessments`
//! array. A conversational response embeds the same assessments under
//! `trace.guardrail`. Anything else is rejected as malformed with the raw
//! payload kept for display.

use serde_json::{Map, Value};
use thiserror::Error;

use crate::domain::finding::{
    Finding, GuardrailAction, GuardrailFinding, OtherFinding, OtherKind, RuleRef,
    SatisfiabilityFinding, Scenario, Statement, Translation, ValidationFinding, ValidationVerdict,
};

const REASONING_SECTION: &str = "automatedReasoningPolicy";
const INTERVENED_STOP_REASON: &str = "guardrail_intervened";
// Per-assessment metadata that is not a policy verdict.
const BOOKKEEPING_SECTIONS: &[&str] = &["invocationMetrics", "appliedGuardrailDetails"];

#[derive(Debug, Error, Clone, PartialEq)]
pub enum NormalizeError {
    #[error("malformed response: {reason}")]
    MalformedResponse { reason: String, raw: Value },
}

impl NormalizeError {
    fn malformed(reason: impl Into<String>, raw: &Value) -> Self {
        Self::MalformedResponse { reason: reason.into(), raw: raw.clone() }
    }

    pub fn raw(&self) -> &Value {
        match self {
            Self::MalformedResponse { raw, .. } => raw,
        }
    }
}

/// Which of the known response shapes a payload matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseShape<'a> {
    Standalone(&'a Map<String, Value>),
    Embedded(&'a Map<String, Value>),
}

impl<'a> ResponseShape<'a> {
    pub fn detect(payload: &'a Value) -> Result<Self, NormalizeError> {
        let Some(object) = payload.as_object() else {
            return Err(NormalizeError::malformed("payload is not a JSON object", payload));
        };

        let has_action = object.get("action").is_some_and(Value::is_string);
        if has_action || object.contains_key("assessments") {
            return Ok(Self::Standalone(object));
        }

        let has_output = object.get("output").is_some_and(Value::is_object);
        if has_output || object.contains_key("stopReason") || object.contains_key("trace") {
            return Ok(Self::Embedded(object));
        }

        Err(NormalizeError::malformed(
            "payload matches neither a guardrail assessment nor a conversation response",
            payload,
        ))
    }
}

pub fn normalize(payload: &Value) -> Result<GuardrailFinding, NormalizeError> {
    match ResponseShape::detect(payload)? {
        ResponseShape::Standalone(object) => normalize_standalone(object, payload),
        ResponseShape::Embedded(object) => normalize_embedded(object, payload),
    }
}

/// Concatenated text blocks of a conversation response's assistant message.
pub fn assistant_text(payload: &Value) -> Option<String> {
    let blocks = payload.pointer("/output/message/content")?.as_array()?;
    let text: String = blocks
        .iter()
        .filter_map(|block| block.get("text").and_then(Value::as_str))
        .collect();
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

fn normalize_standalone(
    object: &Map<String, Value>,
    payload: &Value,
) -> Result<GuardrailFinding, NormalizeError> {
    let explicit = match object.get("action") {
        None | Some(Value::Null) => None,
        Some(Value::String(action)) => Some(action == GuardrailAction::GuardrailIntervened.as_str()),
        Some(_) => return Err(NormalizeError::malformed("`action` is not a string", payload)),
    };

    let mut findings = Vec::new();
    match object.get("assessments") {
        None | Some(Value::Null) => {}
        Some(Value::Array(assessments)) => {
            for assessment in assessments {
                collect_assessment(assessment, payload, &mut findings)?;
            }
        }
        Some(_) => return Err(NormalizeError::malformed("`assessments` is not an array", payload)),
    }

    Ok(finish(explicit, findings))
}

fn normalize_embedded(
    object: &Map<String, Value>,
    payload: &Value,
) -> Result<GuardrailFinding, NormalizeError> {
    let explicit = match object.get("stopReason") {
        None | Some(Value::Null) => None,
        Some(Value::String(reason)) => Some(reason == INTERVENED_STOP_REASON),
        Some(_) => return Err(NormalizeError::malformed("`stopReason` is not a string", payload)),
    };

    let guardrail = match object.get("trace") {
        None | Some(Value::Null) => None,
        Some(Value::Object(trace)) => match trace.get("guardrail") {
            None | Some(Value::Null) => None,
            Some(Value::Object(guardrail)) => Some(guardrail),
            Some(_) => {
                return Err(NormalizeError::malformed("`trace.guardrail` is not an object", payload))
            }
        },
        Some(_) => return Err(NormalizeError::malformed("`trace` is not an object", payload)),
    };

    let Some(guardrail) = guardrail.filter(|section| !section.is_empty()) else {
        // No guardrail section means the guardrail did not run on this turn.
        return Ok(GuardrailFinding {
            action: if explicit == Some(true) {
                GuardrailAction::GuardrailIntervened
            } else {
                GuardrailAction::None
            },
            findings: Vec::new(),
        });
    };

    let mut findings = Vec::new();
    match guardrail.get("inputAssessment") {
        None | Some(Value::Null) => {}
        Some(Value::Object(by_guardrail)) => {
            for assessment in by_guardrail.values() {
                collect_assessment(assessment, payload, &mut findings)?;
            }
        }
        Some(_) => {
            return Err(NormalizeError::malformed(
                "`trace.guardrail.inputAssessment` is not an object",
                payload,
            ))
        }
    }
    match guardrail.get("outputAssessments") {
        None | Some(Value::Null) => {}
        Some(Value::Object(by_guardrail)) => {
            for assessments in by_guardrail.values() {
                let Some(assessments) = assessments.as_array() else {
                    return Err(NormalizeError::malformed(
                        "`trace.guardrail.outputAssessments` entry is not an array",
                        payload,
                    ));
                };
                for assessment in assessments {
                    collect_assessment(assessment, payload, &mut findings)?;
                }
            }
        }
        Some(_) => {
            return Err(NormalizeError::malformed(
                "`trace.guardrail.outputAssessments` is not an object",
                payload,
            ))
        }
    }

    Ok(finish(explicit, findings))
}

fn finish(explicit: Option<bool>, findings: Vec<Finding>) -> GuardrailFinding {
    let intervened = explicit.unwrap_or(!findings.is_empty());
    GuardrailFinding {
        action: if intervened { GuardrailAction::GuardrailIntervened } else { GuardrailAction::None },
        findings,
    }
}

fn collect_assessment(
    assessment: &Value,
    payload: &Value,
    findings: &mut Vec<Finding>,
) -> Result<(), NormalizeError> {
    let Some(object) = assessment.as_object() else {
        return Err(NormalizeError::malformed("assessment is not an object", payload));
    };

    if object.is_empty() {
        findings.push(Finding::Other(OtherFinding {
            kind: OtherKind::NonReasoningAssessment,
            tag: "assessment".to_string(),
            raw: assessment.clone(),
        }));
        return Ok(());
    }

    // Other policies come first so the reasoning verdict stays the final label.
    for (key, section) in object {
        if key == REASONING_SECTION || BOOKKEEPING_SECTIONS.contains(&key.as_str()) {
            continue;
        }
        let mut raw = Map::new();
        raw.insert(key.clone(), section.clone());
        findings.push(Finding::Other(OtherFinding {
            kind: OtherKind::NonReasoningAssessment,
            tag: key.clone(),
            raw: Value::Object(raw),
        }));
    }

    let Some(section) = object.get(REASONING_SECTION) else {
        return Ok(());
    };

    let reasoning_findings = match section.get("findings") {
        None | Some(Value::Null) => &[][..],
        Some(Value::Array(items)) => items.as_slice(),
        Some(_) => {
            return Err(NormalizeError::malformed(
                "automated reasoning `findings` is not an array",
                payload,
            ))
        }
    };

    if reasoning_findings.is_empty() {
        findings.push(Finding::Other(OtherFinding {
            kind: OtherKind::Unrecognized,
            tag: REASONING_SECTION.to_string(),
            raw: assessment.clone(),
        }));
        return Ok(());
    }

    for item in reasoning_findings {
        findings.push(parse_finding(item, payload)?);
    }
    Ok(())
}

fn parse_finding(item: &Value, payload: &Value) -> Result<Finding, NormalizeError> {
    let Some(object) = item.as_object() else {
        return Err(NormalizeError::malformed("finding is not an object", payload));
    };

    for (key, body) in object {
        let verdict = match key.as_str() {
            "valid" => Some(ValidationVerdict::Valid),
            "invalid" => Some(ValidationVerdict::Invalid),
            "impossible" => Some(ValidationVerdict::Impossible),
            _ => None,
        };
        if let Some(verdict) = verdict {
            let mut rules = rule_refs(body.get("supportingRules"));
            rules.extend(rule_refs(body.get("contradictingRules")));
            if rules.is_empty() {
                rules.extend(rule_refs(object.get("supportingRules")));
                rules.extend(rule_refs(object.get("contradictingRules")));
            }
            return Ok(Finding::Validation(ValidationFinding {
                verdict,
                translation: translation(body.get("translation")),
                rules,
                claims_true_scenario: scenario(body.get("claimsTrueScenario")),
            }));
        }

        if key == "satisfiable" {
            return Ok(Finding::Satisfiability(SatisfiabilityFinding {
                translation: translation(body.get("translation")),
                claims_true_scenario: scenario(body.get("claimsTrueScenario")),
                claims_false_scenario: scenario(body.get("claimsFalseScenario")),
            }));
        }

        let kind = match key.as_str() {
            "translationAmbiguous" => Some(OtherKind::TranslationAmbiguous),
            "tooComplex" => Some(OtherKind::TooComplex),
            "noTranslations" => Some(OtherKind::NoTranslations),
            _ => None,
        };
        if let Some(kind) = kind {
            return Ok(Finding::Other(OtherFinding { kind, tag: key.clone(), raw: item.clone() }));
        }
    }

    let tag = object.keys().next().cloned().unwrap_or_else(|| "finding".to_string());
    Ok(Finding::Other(OtherFinding { kind: OtherKind::Unrecognized, tag, raw: item.clone() }))
}

fn translation(value: Option<&Value>) -> Option<Translation> {
    let object = value?.as_object()?;
    Some(Translation {
        premises: statements(object.get("premises")),
        claims: statements(object.get("claims")),
        untranslated_premises: untranslated(object.get("untranslatedPremises")),
        untranslated_claims: untranslated(object.get("untranslatedClaims")),
        confidence: object.get("confidence").and_then(Value::as_f64),
    })
}

fn statements(value: Option<&Value>) -> Vec<Statement> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_object)
                .map(|item| Statement {
                    logic: item.get("logic").and_then(Value::as_str).map(str::to_string),
                    natural_language: item
                        .get("naturalLanguage")
                        .and_then(Value::as_str)
                        .map(str::to_string),
                })
                .collect()
        })
        .unwrap_or_default()
}

// Untranslated spans arrive either as bare strings or as `{ "text": ... }` objects.
fn untranslated(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| match item {
                    Value::String(text) => Some(text.clone()),
                    Value::Object(object) => {
                        object.get("text").and_then(Value::as_str).map(str::to_string)
                    }
                    _ => None,
                })
                .collect()
        })
        .unwrap_or_default()
}

fn rule_refs(value: Option<&Value>) -> Vec<RuleRef> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| {
                    let identifier = item.get("identifier").and_then(Value::as_str)?;
                    Some(RuleRef {
                        identifier: identifier.to_string(),
                        policy_version_arn: item
                            .get("policyVersionArn")
                            .and_then(Value::as_str)
                            .map(str::to_string),
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}

fn scenario(value: Option<&Value>) -> Option<Scenario> {
    let object = value?.as_object()?;
    Some(Scenario { statements: statements(object.get("statements")) })
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};

    use super::{assistant_text, normalize, NormalizeError, ResponseShape};
    use crate::domain::finding::{Finding, GuardrailAction, OtherKind, ValidationVerdict};

    fn reasoning_assessment(finding: Value) -> Value {
        json!({ "automatedReasoningPolicy": { "findings": [finding] } })
    }

    fn refund_window_invalid() -> Value {
        json!({
            "invalid": {
                "translation": {
                    "premises": [
                        { "logic": "(= daysSincePurchase 31)", "naturalLanguage": "The purchase was made 31 days ago." }
                    ],
                    "claims": [
                        { "logic": "(= refundEligible true)", "naturalLanguage": "A refund is allowed 31 days after purchase, outside the 30-day refund window." }
                    ],
                    "untranslatedPremises": [],
                    "untranslatedClaims": [],
                    "confidence": 1.0
                },
                "contradictingRules": [
                    { "identifier": "REFUND_WINDOW_30_DAYS", "policyVersionArn": "arn:aws:bedrock:us-east-1:123456789012:automated-reasoning-policy/abc123:1" }
                ]
            }
        })
    }

    fn valid_finding() -> Value {
        json!({
            "valid": {
                "translation": {
                    "premises": [],
                    "claims": [
                        { "logic": "(= refundReturnsMoney true)", "naturalLanguage": "A refund returns money to the customer." }
                    ],
                    "confidence": 1.0
                },
                "supportingRules": [ { "identifier": "REFUND_DEFINITION" } ]
            }
        })
    }

    #[test]
    fn embedded_response_without_guardrail_section_is_clear() {
        let payloads = [
            json!({
                "output": { "message": { "role": "assistant", "content": [{ "text": "Hi there." }] } },
                "stopReason": "end_turn"
            }),
            json!({
                "output": { "message": { "role": "assistant", "content": [] } },
                "stopReason": "end_turn",
                "trace": {}
            }),
            json!({ "stopReason": "end_turn", "trace": { "guardrail": {} } }),
        ];

        for payload in payloads {
            let outcome = normalize(&payload).expect("embedded payload should normalize");
            assert_eq!(outcome.action, GuardrailAction::None);
            assert!(outcome.findings.is_empty());
        }
    }

    #[test]
    fn standalone_assessments_map_in_order() {
        let payload = json!({
            "action": "GUARDRAIL_INTERVENED",
            "assessments": [
                reasoning_assessment(refund_window_invalid()),
                reasoning_assessment(json!({ "satisfiable": { "translation": { "premises": [], "claims": [] } } })),
                reasoning_assessment(json!({ "tooComplex": {} })),
            ]
        });

        let outcome = normalize(&payload).expect("standalone payload should normalize");
        assert_eq!(outcome.action, GuardrailAction::GuardrailIntervened);
        let labels: Vec<_> = outcome.findings.iter().map(Finding::label).collect();
        assert_eq!(labels, vec!["INVALID", "SATISFIABLE", "TOO_COMPLEX"]);
    }

    #[test]
    fn non_empty_findings_without_action_flag_mean_intervened() {
        let payload = json!({ "assessments": [reasoning_assessment(refund_window_invalid())] });

        let outcome = normalize(&payload).expect("payload should normalize");
        assert_eq!(outcome.action, GuardrailAction::GuardrailIntervened);
        assert_eq!(outcome.findings.len(), 1);
    }

    #[test]
    fn explicit_none_action_is_authoritative() {
        let payload = json!({
            "action": "NONE",
            "assessments": [reasoning_assessment(valid_finding())]
        });

        let outcome = normalize(&payload).expect("payload should normalize");
        assert_eq!(outcome.action, GuardrailAction::None);
        assert_eq!(outcome.final_label(), Some("VALID"));
        assert!(outcome.passed());
    }

    #[test]
    fn refund_window_claim_is_explained_verbatim() {
        let payload = json!({
            "output": { "message": { "role": "assistant", "content": [{ "text": "Yes, " }, { "text": "you can." }] } },
            "stopReason": "guardrail_intervened",
            "trace": {
                "guardrail": {
                    "outputAssessments": {
                        "gr-1": [reasoning_assessment(refund_window_invalid())]
                    }
                }
            }
        });

        let outcome = normalize(&payload).expect("payload should normalize");
        assert_eq!(outcome.action, GuardrailAction::GuardrailIntervened);
        let finding = outcome.findings.first().expect("one finding");
        assert!(finding.explanation().contains("30-day refund window"));
        assert_eq!(finding.rules()[0].identifier, "REFUND_WINDOW_30_DAYS");
        assert_eq!(assistant_text(&payload).as_deref(), Some("Yes, you can."));

        let Finding::Validation(validation) = finding else {
            panic!("expected a validation finding");
        };
        assert_eq!(validation.verdict, ValidationVerdict::Invalid);
    }

    #[test]
    fn input_assessment_is_read_before_output_assessments() {
        let payload = json!({
            "stopReason": "end_turn",
            "trace": {
                "guardrail": {
                    "inputAssessment": { "gr-1": reasoning_assessment(valid_finding()) },
                    "outputAssessments": { "gr-1": [reasoning_assessment(refund_window_invalid())] }
                }
            }
        });

        let outcome = normalize(&payload).expect("payload should normalize");
        let labels: Vec<_> = outcome.findings.iter().map(Finding::label).collect();
        assert_eq!(labels, vec!["VALID", "INVALID"]);
        assert_eq!(outcome.action, GuardrailAction::None);
    }

    #[test]
    fn non_reasoning_and_unknown_findings_keep_raw_payload() {
        let content_filter = json!({ "contentPolicy": { "filters": [{ "type": "HATE", "action": "BLOCKED" }] } });
        let payload = json!({
            "action": "GUARDRAIL_INTERVENED",
            "assessments": [
                content_filter.clone(),
                reasoning_assessment(json!({ "somethingNew": { "detail": 1 } })),
            ]
        });

        let outcome = normalize(&payload).expect("payload should normalize");
        assert_eq!(outcome.findings.len(), 2);
        match &outcome.findings[0] {
            Finding::Other(other) => {
                assert_eq!(other.kind, OtherKind::NonReasoningAssessment);
                assert_eq!(other.tag, "contentPolicy");
                assert_eq!(other.raw, content_filter);
            }
            other => panic!("unexpected finding {other:?}"),
        }
        match &outcome.findings[1] {
            Finding::Other(other) => {
                assert_eq!(other.kind, OtherKind::Unrecognized);
                assert_eq!(other.tag, "somethingNew");
            }
            other => panic!("unexpected finding {other:?}"),
        }
    }

    #[test]
    fn mixed_assessment_reports_every_policy_and_keeps_reasoning_last() {
        let payload = json!({
            "action": "GUARDRAIL_INTERVENED",
            "assessments": [{
                "contentPolicy": { "filters": [{ "type": "HATE", "action": "BLOCKED" }] },
                "automatedReasoningPolicy": { "findings": [{ "valid": {} }] },
                "invocationMetrics": { "guardrailProcessingLatency": 120 }
            }]
        });

        let outcome = normalize(&payload).expect("payload should normalize");
        assert_eq!(outcome.action, GuardrailAction::GuardrailIntervened);
        let labels: Vec<_> = outcome.findings.iter().map(Finding::label).collect();
        assert_eq!(labels, vec!["UNRECOGNIZED", "VALID"]);
        assert_eq!(outcome.final_label(), Some("VALID"));
        match &outcome.findings[0] {
            Finding::Other(other) => {
                assert_eq!(other.kind, OtherKind::NonReasoningAssessment);
                assert_eq!(other.tag, "contentPolicy");
                assert_eq!(
                    other.raw,
                    json!({ "contentPolicy": { "filters": [{ "type": "HATE", "action": "BLOCKED" }] } })
                );
            }
            other => panic!("unexpected finding {other:?}"),
        }
    }

    #[test]
    fn metrics_only_assessment_adds_no_findings() {
        let payload = json!({
            "assessments": [{ "invocationMetrics": { "guardrailProcessingLatency": 80 } }]
        });

        let outcome = normalize(&payload).expect("payload should normalize");
        assert!(outcome.findings.is_empty());
        assert_eq!(outcome.action, GuardrailAction::None);
    }

    #[test]
    fn payloads_matching_no_shape_are_malformed() {
        let payloads = [
            json!({ "message": "hello" }),
            json!({}),
            json!([1, 2, 3]),
            json!("GUARDRAIL_INTERVENED"),
            json!(null),
            json!({ "action": "NONE", "assessments": "not-a-list" }),
            json!({ "stopReason": "end_turn", "trace": { "guardrail": "nope" } }),
            json!({ "assessments": [42] }),
        ];

        for payload in payloads {
            match normalize(&payload) {
                Err(NormalizeError::MalformedResponse { raw, .. }) => assert_eq!(raw, payload),
                other => panic!("expected malformed response for {payload}, got {other:?}"),
            }
        }
    }

    #[test]
    fn detect_distinguishes_shapes() {
        let standalone = json!({ "action": "NONE", "assessments": [] });
        let embedded = json!({ "output": { "message": { "content": [] } } });

        assert!(matches!(ResponseShape::detect(&standalone), Ok(ResponseShape::Standalone(_))));
        assert!(matches!(ResponseShape::detect(&embedded), Ok(ResponseShape::Embedded(_))));
        assert_eq!(assistant_text(&embedded), None);
    }
}
