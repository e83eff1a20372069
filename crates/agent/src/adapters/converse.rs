use std::sync::Arc;

use archeck_bedrock::{ConverseRequest, ConverseService, GuardrailSettings, TokenUsage};
use archeck_core::{assistant_text, ConversationTurn};
use async_trait::async_trait;

use crate::prompt::PolicyPrompt;
use crate::provider::{
    GuardrailCheck, GuardrailStage, ProviderAdapter, ProviderError, ProviderExchange,
};

/// Native integration: the guardrail is attached to the Converse call and reported in its trace.
pub struct ConverseAdapter {
    service: Arc<dyn ConverseService>,
    model_id: String,
    guardrail: GuardrailSettings,
    prompt: Arc<PolicyPrompt>,
}

impl ConverseAdapter {
    pub fn new(
        service: Arc<dyn ConverseService>,
        model_id: impl Into<String>,
        guardrail: GuardrailSettings,
        prompt: Arc<PolicyPrompt>,
    ) -> Self {
        Self { service, model_id: model_id.into(), guardrail, prompt }
    }
}

#[async_trait]
impl ProviderAdapter for ConverseAdapter {
    fn name(&self) -> &str {
        "bedrock-converse"
    }

    async fn send(&self, turns: &[ConversationTurn]) -> Result<ProviderExchange, ProviderError> {
        if turns.is_empty() {
            return Err(ProviderError::EmptyConversation);
        }
        let system_prompt = self.prompt.render().await?;
        let request = ConverseRequest::from_turns(turns, Some(&system_prompt))
            .with_guardrail(self.guardrail.clone());
        let raw = self.service.converse(&self.model_id, &request).await?;

        Ok(ProviderExchange {
            assistant_text: assistant_text(&raw),
            usage: TokenUsage::from_converse(&raw),
            checks: vec![GuardrailCheck::new(GuardrailStage::Conversation, raw)],
        })
    }

    fn policy_loaded(&self) -> bool {
        self.prompt.is_loaded()
    }
}
