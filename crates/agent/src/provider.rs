use archeck_bedrock::{TokenUsage, TransportError};
use archeck_core::{ApplicationError, ConversationTurn, NormalizeError, Role};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::document::DocumentError;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Document(#[from] DocumentError),
    #[error(transparent)]
    Malformed(#[from] NormalizeError),
    #[error("the conversation has no user message to send")]
    EmptyConversation,
}

impl From<ProviderError> for ApplicationError {
    fn from(error: ProviderError) -> Self {
        match error {
            ProviderError::Transport(transport) => Self::from(transport),
            ProviderError::Document(document) => Self::Io(document.to_string()),
            ProviderError::Malformed(malformed) => Self::from(malformed),
            ProviderError::EmptyConversation => Self::InvalidInput(error.to_string()),
        }
    }
}

/// Where in the exchange a guardrail check ran.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GuardrailStage {
    /// Guardrail attached to the model call itself.
    Conversation,
    Input,
    Output,
}

impl GuardrailStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Conversation => "conversation",
            Self::Input => "input",
            Self::Output => "output",
        }
    }

    /// Whether an intervention at this stage blocks the assistant's answer.
    pub fn guards_answer(&self) -> bool {
        matches!(self, Self::Conversation | Self::Output)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct GuardrailCheck {
    pub stage: GuardrailStage,
    pub raw: Value,
}

impl GuardrailCheck {
    pub fn new(stage: GuardrailStage, raw: Value) -> Self {
        Self { stage, raw }
    }
}

/// Everything one provider round trip produced, before normalization.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ProviderExchange {
    pub assistant_text: Option<String>,
    pub checks: Vec<GuardrailCheck>,
    pub usage: Option<TokenUsage>,
}

/// One integration style for sending a conversation and getting guardrail results back.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    fn name(&self) -> &str;

    async fn send(&self, turns: &[ConversationTurn]) -> Result<ProviderExchange, ProviderError>;

    fn policy_loaded(&self) -> bool {
        false
    }
}

pub(crate) fn last_user_text(turns: &[ConversationTurn]) -> Result<&str, ProviderError> {
    turns
        .iter()
        .rev()
        .find(|turn| turn.role == Role::User)
        .map(|turn| turn.text.as_str())
        .ok_or(ProviderError::EmptyConversation)
}

#[cfg(test)]
mod tests {
    use archeck_bedrock::TransportError;
    use archeck_core::{ApplicationError, ConversationTurn, NormalizeError};
    use serde_json::json;

    use super::{last_user_text, GuardrailStage, ProviderError};

    #[test]
    fn last_user_text_skips_assistant_turns() {
        let turns = vec![
            ConversationTurn::user("first"),
            ConversationTurn::assistant("reply"),
            ConversationTurn::user("second"),
            ConversationTurn::assistant("blocked?"),
        ];
        assert_eq!(last_user_text(&turns).ok(), Some("second"));
        assert!(matches!(last_user_text(&[]), Err(ProviderError::EmptyConversation)));
    }

    #[test]
    fn only_answer_stages_block_the_answer() {
        assert!(GuardrailStage::Conversation.guards_answer());
        assert!(GuardrailStage::Output.guards_answer());
        assert!(!GuardrailStage::Input.guards_answer());
    }

    #[test]
    fn provider_failures_keep_their_application_class() {
        let transport = ApplicationError::from(ProviderError::Transport(TransportError::Dispatch {
            operation: "Converse",
            message: "connection reset".to_string(),
        }));
        let malformed = ApplicationError::from(ProviderError::Malformed(
            NormalizeError::MalformedResponse { reason: "no known shape".to_string(), raw: json!({}) },
        ));

        assert_eq!(transport.error_class(), "transport");
        assert!(transport.to_string().contains("connection reset"));
        assert_eq!(malformed.error_class(), "malformed_response");
        assert_eq!(
            ApplicationError::from(ProviderError::EmptyConversation).error_class(),
            "invalid_input"
        );
    }
}
