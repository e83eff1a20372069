use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GuardrailAction {
    None,
    GuardrailIntervened,
}

impl GuardrailAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "NONE",
            Self::GuardrailIntervened => "GUARDRAIL_INTERVENED",
        }
    }

    pub fn is_intervention(&self) -> bool {
        matches!(self, Self::GuardrailIntervened)
    }
}

/// One logical statement as translated by the reasoning engine.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Statement {
    pub logic: Option<String>,
    pub natural_language: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Translation {
    pub premises: Vec<Statement>,
    pub claims: Vec<Statement>,
    pub untranslated_premises: Vec<String>,
    pub untranslated_claims: Vec<String>,
    pub confidence: Option<f64>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleRef {
    pub identifier: String,
    pub policy_version_arn: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scenario {
    pub statements: Vec<Statement>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationVerdict {
    Valid,
    Invalid,
    Impossible,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ValidationFinding {
    pub verdict: ValidationVerdict,
    pub translation: Option<Translation>,
    pub rules: Vec<RuleRef>,
    pub claims_true_scenario: Option<Scenario>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SatisfiabilityFinding {
    pub translation: Option<Translation>,
    pub claims_true_scenario: Option<Scenario>,
    pub claims_false_scenario: Option<Scenario>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OtherKind {
    TranslationAmbiguous,
    TooComplex,
    NoTranslations,
    /// An assessment from a non-reasoning guardrail policy (content filters, topics, ...).
    NonReasoningAssessment,
    Unrecognized,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OtherFinding {
    pub kind: OtherKind,
    pub tag: String,
    pub raw: Value,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Finding {
    Validation(ValidationFinding),
    Satisfiability(SatisfiabilityFinding),
    Other(OtherFinding),
}

impl Finding {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Validation(finding) => match finding.verdict {
                ValidationVerdict::Valid => "VALID",
                ValidationVerdict::Invalid => "INVALID",
                ValidationVerdict::Impossible => "IMPOSSIBLE",
            },
            Self::Satisfiability(_) => "SATISFIABLE",
            Self::Other(finding) => match finding.kind {
                OtherKind::TranslationAmbiguous => "TRANSLATION_AMBIGUOUS",
                OtherKind::TooComplex => "TOO_COMPLEX",
                OtherKind::NoTranslations => "NO_TRANSLATIONS",
                OtherKind::NonReasoningAssessment | OtherKind::Unrecognized => "UNRECOGNIZED",
            },
        }
    }

    pub fn translation(&self) -> Option<&Translation> {
        match self {
            Self::Validation(finding) => finding.translation.as_ref(),
            Self::Satisfiability(finding) => finding.translation.as_ref(),
            Self::Other(_) => None,
        }
    }

    pub fn confidence(&self) -> Option<f64> {
        self.translation().and_then(|translation| translation.confidence)
    }

    pub fn rules(&self) -> &[RuleRef] {
        match self {
            Self::Validation(finding) => finding.rules.as_slice(),
            Self::Satisfiability(_) | Self::Other(_) => &[],
        }
    }

    /// Natural-language explanation: translated claims, else premises, else a kind description.
    pub fn explanation(&self) -> String {
        if let Some(translation) = self.translation() {
            let claims = natural_language(&translation.claims);
            if !claims.is_empty() {
                return claims.join("; ");
            }
            let premises = natural_language(&translation.premises);
            if !premises.is_empty() {
                return premises.join("; ");
            }
        }

        match self {
            Self::Validation(_) | Self::Satisfiability(_) => {
                "no natural-language translation was returned".to_string()
            }
            Self::Other(finding) => match finding.kind {
                OtherKind::TranslationAmbiguous => {
                    "the input could be translated into logic in more than one way".to_string()
                }
                OtherKind::TooComplex => {
                    "the input was too complex for the reasoning engine to evaluate".to_string()
                }
                OtherKind::NoTranslations => {
                    "no part of the input could be translated into policy logic".to_string()
                }
                OtherKind::NonReasoningAssessment => {
                    format!("non-reasoning assessment `{}`", finding.tag)
                }
                OtherKind::Unrecognized => format!("unrecognized finding `{}`", finding.tag),
            },
        }
    }
}

fn natural_language(statements: &[Statement]) -> Vec<&str> {
    statements
        .iter()
        .filter_map(|statement| statement.natural_language.as_deref().or(statement.logic.as_deref()))
        .filter(|text| !text.trim().is_empty())
        .collect()
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct FindingSummary {
    pub total: usize,
    pub valid: usize,
    pub invalid: usize,
    pub impossible: usize,
    pub satisfiable: usize,
    pub other: usize,
}

/// Canonical guardrail outcome for a single upstream response.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct GuardrailFinding {
    pub action: GuardrailAction,
    pub findings: Vec<Finding>,
}

impl GuardrailFinding {
    pub fn clear() -> Self {
        Self { action: GuardrailAction::None, findings: Vec::new() }
    }

    pub fn passed(&self) -> bool {
        !self.action.is_intervention()
    }

    /// Label of the last finding, which is the reported result of a check.
    pub fn final_label(&self) -> Option<&'static str> {
        self.findings.last().map(Finding::label)
    }

    pub fn summary(&self) -> FindingSummary {
        let mut summary = FindingSummary { total: self.findings.len(), ..FindingSummary::default() };
        for finding in &self.findings {
            match finding.label() {
                "VALID" => summary.valid += 1,
                "INVALID" => summary.invalid += 1,
                "IMPOSSIBLE" => summary.impossible += 1,
                "SATISFIABLE" => summary.satisfiable += 1,
                _ => summary.other += 1,
            }
        }
        summary
    }
}
