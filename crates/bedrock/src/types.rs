//! Request models handed to the runtime client, in the service's JSON layout.

use archeck_core::{ConversationTurn, Role};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TextBlock {
    pub text: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Message {
    pub role: &'static str,
    pub content: Vec<TextBlock>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GuardrailSettings {
    pub guardrail_identifier: String,
    pub guardrail_version: String,
    pub trace: &'static str,
}

impl GuardrailSettings {
    pub fn traced(id: impl Into<String>, version: impl Into<String>) -> Self {
        Self { guardrail_identifier: id.into(), guardrail_version: version.into(), trace: "enabled" }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConverseRequest {
    pub messages: Vec<Message>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub system: Vec<TextBlock>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guardrail_config: Option<GuardrailSettings>,
}

impl ConverseRequest {
    /// Builds a request from conversation history.
    ///
    /// The runtime requires the first message to come from the user and roles to
    /// alternate, so leading assistant turns are dropped and consecutive turns of
    /// the same role are merged into one message.
    pub fn from_turns(turns: &[ConversationTurn], system_prompt: Option<&str>) -> Self {
        let mut messages: Vec<Message> = Vec::new();
        for turn in turns.iter().skip_while(|turn| turn.role == Role::Assistant) {
            let block = TextBlock { text: turn.text.clone() };
            match messages.last_mut() {
                Some(last) if last.role == turn.role.as_str() => last.content.push(block),
                _ => messages.push(Message { role: turn.role.as_str(), content: vec![block] }),
            }
        }

        let system = system_prompt
            .filter(|prompt| !prompt.trim().is_empty())
            .map(|prompt| vec![TextBlock { text: prompt.to_string() }])
            .unwrap_or_default();

        Self { messages, system, guardrail_config: None }
    }

    pub fn with_guardrail(mut self, settings: GuardrailSettings) -> Self {
        self.guardrail_config = Some(settings);
        self
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GuardrailSource {
    Input,
    Output,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Qualifier {
    Query,
    GuardContent,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct GuardrailText {
    pub text: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub qualifiers: Vec<Qualifier>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct GuardrailContent {
    pub text: GuardrailText,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("guardrail content needs a question or an answer")]
pub struct EmptyContent;

impl GuardrailContent {
    pub fn plain(text: impl Into<String>) -> Self {
        Self { text: GuardrailText { text: text.into(), qualifiers: Vec::new() } }
    }

    pub fn qualified(text: impl Into<String>, qualifier: Qualifier) -> Self {
        Self { text: GuardrailText { text: text.into(), qualifiers: vec![qualifier] } }
    }

    /// Content blocks for a question/answer exchange.
    ///
    /// With both parts the question is the `query` and the answer the `guard_content`;
    /// with only one part it is sent unqualified.
    pub fn for_exchange(
        question: Option<&str>,
        answer: Option<&str>,
    ) -> Result<Vec<Self>, EmptyContent> {
        let question = question.filter(|text| !text.trim().is_empty());
        let answer = answer.filter(|text| !text.trim().is_empty());
        match (question, answer) {
            (Some(question), Some(answer)) => Ok(vec![
                Self::qualified(question, Qualifier::Query),
                Self::qualified(answer, Qualifier::GuardContent),
            ]),
            (None, Some(answer)) => Ok(vec![Self::plain(answer)]),
            (Some(question), None) => Ok(vec![Self::plain(question)]),
            (None, None) => Err(EmptyContent),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ApplyGuardrailRequest {
    pub source: GuardrailSource,
    pub content: Vec<GuardrailContent>,
}

impl ApplyGuardrailRequest {
    pub fn input(question: impl Into<String>) -> Self {
        Self { source: GuardrailSource::Input, content: vec![GuardrailContent::plain(question)] }
    }

    pub fn output(content: Vec<GuardrailContent>) -> Self {
        Self { source: GuardrailSource::Output, content }
    }
}

/// Token accounting reported by either model surface.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_tokens: u64,
}

impl TokenUsage {
    /// Reads `usage` from a Converse response.
    pub fn from_converse(payload: &Value) -> Option<Self> {
        let usage = payload.get("usage")?;
        Some(Self {
            input_tokens: usage.get("inputTokens").and_then(Value::as_u64).unwrap_or(0),
            output_tokens: usage.get("outputTokens").and_then(Value::as_u64).unwrap_or(0),
            total_tokens: usage.get("totalTokens").and_then(Value::as_u64).unwrap_or(0),
        })
    }
}

#[cfg(test)]
mod tests {
    use archeck_core::ConversationTurn;
    use serde_json::json;

    use super::{
        ApplyGuardrailRequest, ConverseRequest, EmptyContent, GuardrailContent,
        GuardrailSettings, TokenUsage,
    };

    #[test]
    fn exchange_content_qualifies_question_and_answer() {
        let content = GuardrailContent::for_exchange(
            Some("What is a refund?"),
            Some("A refund returns money to the customer."),
        )
        .expect("content");

        assert_eq!(
            serde_json::to_value(ApplyGuardrailRequest::output(content)).expect("json"),
            json!({
                "source": "OUTPUT",
                "content": [
                    { "text": { "text": "What is a refund?", "qualifiers": ["query"] } },
                    { "text": { "text": "A refund returns money to the customer.", "qualifiers": ["guard_content"] } }
                ]
            })
        );
    }

    #[test]
    fn single_part_content_is_unqualified() {
        let answer_only = GuardrailContent::for_exchange(None, Some("Refunds take 90 days."))
            .expect("content");
        assert_eq!(
            serde_json::to_value(&answer_only).expect("json"),
            json!([{ "text": { "text": "Refunds take 90 days." } }])
        );

        let question_only =
            GuardrailContent::for_exchange(Some("Can I return it?"), Some("  ")).expect("content");
        assert_eq!(question_only, vec![GuardrailContent::plain("Can I return it?")]);

        assert_eq!(GuardrailContent::for_exchange(None, None), Err(EmptyContent));
    }

    #[test]
    fn converse_request_merges_consecutive_roles() {
        let turns = vec![
            ConversationTurn::assistant("stale"),
            ConversationTurn::user("first"),
            ConversationTurn::user("second"),
            ConversationTurn::assistant("reply"),
        ];

        let request = ConverseRequest::from_turns(&turns, Some("Be brief."))
            .with_guardrail(GuardrailSettings::traced("gr-1", "DRAFT"));

        assert_eq!(
            serde_json::to_value(&request).expect("json"),
            json!({
                "messages": [
                    { "role": "user", "content": [{ "text": "first" }, { "text": "second" }] },
                    { "role": "assistant", "content": [{ "text": "reply" }] }
                ],
                "system": [{ "text": "Be brief." }],
                "guardrailConfig": {
                    "guardrailIdentifier": "gr-1",
                    "guardrailVersion": "DRAFT",
                    "trace": "enabled"
                }
            })
        );
    }

    #[test]
    fn usage_reads_converse_layout() {
        let converse = json!({ "usage": { "inputTokens": 10, "outputTokens": 4, "totalTokens": 14 } });

        assert_eq!(TokenUsage::from_converse(&converse).map(|usage| usage.total_tokens), Some(14));
        assert_eq!(TokenUsage::from_converse(&json!({})), None);
    }
}
