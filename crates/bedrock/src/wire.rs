//! Converts typed SDK outputs into the service's JSON document shape.
//!
//! The normalizer and the export template read the documented JSON layout, so
//! every SDK response is rendered back into that layout before it leaves the
//! transport layer.

use aws_sdk_bedrock::operation::export_automated_reasoning_policy_version::ExportAutomatedReasoningPolicyVersionOutput;
use aws_sdk_bedrock::operation::list_automated_reasoning_policies::ListAutomatedReasoningPoliciesOutput;
use aws_sdk_bedrock::primitives::{DateTime, DateTimeFormat};
use aws_sdk_bedrock::types::{
    AutomatedReasoningPolicyDefinition, AutomatedReasoningPolicySummary,
};
use aws_sdk_bedrockruntime::operation::apply_guardrail::ApplyGuardrailOutput;
use aws_sdk_bedrockruntime::operation::converse::ConverseOutput;
use aws_sdk_bedrockruntime::types::{
    ContentBlock, ConverseOutput as ConverseBody, GuardrailAssessment,
    GuardrailAutomatedReasoningFinding, GuardrailAutomatedReasoningRule,
    GuardrailAutomatedReasoningScenario, GuardrailAutomatedReasoningStatement,
    GuardrailAutomatedReasoningTranslation, GuardrailTraceAssessment,
};
use serde_json::{json, Map, Value};

use crate::control::PolicySummary;

// Accepts both the required (`&[T]`) and optional (`Option<&[T]>`) accessor shapes.
fn items<'a, T>(list: impl Into<Option<&'a [T]>>) -> &'a [T] {
    list.into().unwrap_or_default()
}

fn text<'a>(value: impl Into<Option<&'a str>>) -> Option<String> {
    value.into().map(str::to_string)
}

/// `{ output, stopReason, usage, trace }` of a Converse call.
pub fn converse_response(output: &ConverseOutput) -> Value {
    let mut payload = Map::new();

    if let Some(ConverseBody::Message(message)) = output.output() {
        let content: Vec<Value> = message
            .content()
            .iter()
            .filter_map(|block| match block {
                ContentBlock::Text(text) => Some(json!({ "text": text })),
                _ => None,
            })
            .collect();
        payload.insert(
            "output".to_string(),
            json!({ "message": { "role": message.role().as_str(), "content": content } }),
        );
    }

    payload.insert("stopReason".to_string(), json!(output.stop_reason().as_str()));

    if let Some(usage) = output.usage() {
        payload.insert(
            "usage".to_string(),
            json!({
                "inputTokens": usage.input_tokens(),
                "outputTokens": usage.output_tokens(),
                "totalTokens": usage.total_tokens(),
            }),
        );
    }

    if let Some(guardrail) = output.trace().and_then(|trace| trace.guardrail()) {
        payload.insert("trace".to_string(), json!({ "guardrail": guardrail_trace(guardrail) }));
    }

    Value::Object(payload)
}

/// `{ action, assessments }` of a standalone guardrail application.
pub fn apply_guardrail_response(output: &ApplyGuardrailOutput) -> Value {
    let assessments: Vec<Value> = items(output.assessments()).iter().map(assessment).collect();
    json!({ "action": output.action().as_str(), "assessments": assessments })
}

fn guardrail_trace(trace: &GuardrailTraceAssessment) -> Value {
    let mut section = Map::new();

    if let Some(by_guardrail) = trace.input_assessment() {
        let input: Map<String, Value> = by_guardrail
            .iter()
            .map(|(id, entry)| (id.clone(), assessment(entry)))
            .collect();
        section.insert("inputAssessment".to_string(), Value::Object(input));
    }

    if let Some(by_guardrail) = trace.output_assessments() {
        let output: Map<String, Value> = by_guardrail
            .iter()
            .map(|(id, entries)| {
                (id.clone(), Value::Array(entries.iter().map(assessment).collect()))
            })
            .collect();
        section.insert("outputAssessments".to_string(), Value::Object(output));
    }

    Value::Object(section)
}

fn assessment(entry: &GuardrailAssessment) -> Value {
    let mut sections = Map::new();

    if let Some(policy) = entry.content_policy() {
        let filters: Vec<Value> = items(policy.filters())
            .iter()
            .map(|filter| {
                json!({ "type": filter.r#type().as_str(), "action": filter.action().as_str() })
            })
            .collect();
        sections.insert("contentPolicy".to_string(), json!({ "filters": filters }));
    }
    if let Some(policy) = entry.topic_policy() {
        let topics: Vec<Value> = items(policy.topics())
            .iter()
            .map(|topic| json!({ "name": text(topic.name()), "action": topic.action().as_str() }))
            .collect();
        sections.insert("topicPolicy".to_string(), json!({ "topics": topics }));
    }
    if let Some(policy) = entry.word_policy() {
        sections.insert("wordPolicy".to_string(), json!({ "detail": format!("{policy:?}") }));
    }
    if let Some(policy) = entry.sensitive_information_policy() {
        sections.insert(
            "sensitiveInformationPolicy".to_string(),
            json!({ "detail": format!("{policy:?}") }),
        );
    }
    if let Some(policy) = entry.contextual_grounding_policy() {
        sections.insert(
            "contextualGroundingPolicy".to_string(),
            json!({ "detail": format!("{policy:?}") }),
        );
    }
    if let Some(policy) = entry.automated_reasoning_policy() {
        let findings: Vec<Value> = items(policy.findings()).iter().map(reasoning_finding).collect();
        sections.insert("automatedReasoningPolicy".to_string(), json!({ "findings": findings }));
    }
    if let Some(metrics) = entry.invocation_metrics() {
        sections.insert(
            "invocationMetrics".to_string(),
            json!({ "detail": format!("{metrics:?}") }),
        );
    }

    Value::Object(sections)
}

fn reasoning_finding(finding: &GuardrailAutomatedReasoningFinding) -> Value {
    match finding {
        GuardrailAutomatedReasoningFinding::Valid(valid) => json!({
            "valid": {
                "translation": valid.translation().map(translation),
                "claimsTrueScenario": valid.claims_true_scenario().map(scenario),
                "supportingRules": rules(items(valid.supporting_rules())),
            }
        }),
        GuardrailAutomatedReasoningFinding::Invalid(invalid) => json!({
            "invalid": {
                "translation": invalid.translation().map(translation),
                "contradictingRules": rules(items(invalid.contradicting_rules())),
            }
        }),
        GuardrailAutomatedReasoningFinding::Impossible(impossible) => json!({
            "impossible": {
                "translation": impossible.translation().map(translation),
                "contradictingRules": rules(items(impossible.contradicting_rules())),
            }
        }),
        GuardrailAutomatedReasoningFinding::Satisfiable(satisfiable) => json!({
            "satisfiable": {
                "translation": satisfiable.translation().map(translation),
                "claimsTrueScenario": satisfiable.claims_true_scenario().map(scenario),
                "claimsFalseScenario": satisfiable.claims_false_scenario().map(scenario),
            }
        }),
        GuardrailAutomatedReasoningFinding::TranslationAmbiguous(ambiguous) => {
            json!({ "translationAmbiguous": { "detail": format!("{ambiguous:?}") } })
        }
        GuardrailAutomatedReasoningFinding::TooComplex(_) => json!({ "tooComplex": {} }),
        GuardrailAutomatedReasoningFinding::NoTranslations(_) => json!({ "noTranslations": {} }),
        _ => json!({ "unknown": {} }),
    }
}

fn translation(translation: &GuardrailAutomatedReasoningTranslation) -> Value {
    let confidence: Option<f64> = translation.confidence().into();
    json!({
        "premises": statements(items(translation.premises())),
        "claims": statements(items(translation.claims())),
        "untranslatedPremises": items(translation.untranslated_premises())
            .iter()
            .filter_map(|span| text(span.text()))
            .collect::<Vec<_>>(),
        "untranslatedClaims": items(translation.untranslated_claims())
            .iter()
            .filter_map(|span| text(span.text()))
            .collect::<Vec<_>>(),
        "confidence": confidence,
    })
}

fn statements(items: &[GuardrailAutomatedReasoningStatement]) -> Vec<Value> {
    items
        .iter()
        .map(|statement| {
            json!({
                "logic": text(statement.logic()),
                "naturalLanguage": text(statement.natural_language()),
            })
        })
        .collect()
}

fn scenario(scenario: &GuardrailAutomatedReasoningScenario) -> Value {
    json!({ "statements": statements(items(scenario.statements())) })
}

fn rules(items: &[GuardrailAutomatedReasoningRule]) -> Vec<Value> {
    items
        .iter()
        .map(|rule| {
            json!({
                "identifier": text(rule.identifier()),
                "policyVersionArn": text(rule.policy_version_arn()),
            })
        })
        .collect()
}

fn timestamp<'a>(value: impl Into<Option<&'a DateTime>>) -> Option<String> {
    value.into().and_then(|time| time.fmt(DateTimeFormat::DateTime).ok())
}

pub fn policy_page(page: &ListAutomatedReasoningPoliciesOutput) -> Vec<PolicySummary> {
    items(page.automated_reasoning_policy_summaries()).iter().map(policy_summary).collect()
}

fn policy_summary(summary: &AutomatedReasoningPolicySummary) -> PolicySummary {
    PolicySummary {
        policy_arn: text(summary.policy_arn()).unwrap_or_default(),
        policy_id: text(summary.policy_id()).unwrap_or_default(),
        name: text(summary.name()),
        description: text(summary.description()),
        version: text(summary.version()),
        created_at: timestamp(summary.created_at()),
        updated_at: timestamp(summary.updated_at()),
    }
}

/// `{ policyDefinition }` of a policy version export.
pub fn policy_export(output: &ExportAutomatedReasoningPolicyVersionOutput) -> Value {
    let definition: Option<&AutomatedReasoningPolicyDefinition> = output.policy_definition().into();
    json!({ "policyDefinition": definition.map(policy_definition) })
}

fn policy_definition(definition: &AutomatedReasoningPolicyDefinition) -> Value {
    let types: Vec<Value> = items(definition.types())
        .iter()
        .map(|kind| {
            let values: Vec<Value> = items(kind.values())
                .iter()
                .map(|value| {
                    compact(json!({
                        "value": text(value.value()),
                        "description": text(value.description()),
                    }))
                })
                .collect();
            compact(json!({
                "name": text(kind.name()),
                "description": text(kind.description()),
                "values": values,
            }))
        })
        .collect();

    let rules: Vec<Value> = items(definition.rules())
        .iter()
        .map(|rule| {
            compact(json!({
                "id": text(rule.id()),
                "expression": text(rule.expression()),
                "alternateExpression": text(rule.alternate_expression()),
            }))
        })
        .collect();

    let variables: Vec<Value> = items(definition.variables())
        .iter()
        .map(|variable| {
            compact(json!({
                "name": text(variable.name()),
                "type": text(variable.r#type()),
                "description": text(variable.description()),
            }))
        })
        .collect();

    compact(json!({
        "version": text(definition.version()),
        "types": types,
        "rules": rules,
        "variables": variables,
    }))
}

// Absent optional members are dropped rather than exported as `null`.
fn compact(value: Value) -> Value {
    match value {
        Value::Object(object) => {
            Value::Object(object.into_iter().filter(|(_, value)| !value.is_null()).collect())
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::compact;

    #[test]
    fn compact_drops_null_members_only() {
        assert_eq!(
            compact(json!({ "id": "R1", "alternateExpression": null, "values": [] })),
            json!({ "id": "R1", "values": [] })
        );
    }
}
