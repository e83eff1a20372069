use std::sync::Arc;

use archeck_bedrock::{ApplyGuardrailRequest, GuardrailContent, GuardrailService};
use archeck_core::{ConversationTurn, Role};
use async_trait::async_trait;
use tracing::debug;

use crate::provider::{GuardrailCheck, GuardrailStage, ProviderError};
use crate::runtime::AgentHook;

/// Applies a guardrail to each new user message and to every completed question/answer pair.
pub struct GuardrailHook {
    service: Arc<dyn GuardrailService>,
    guardrail_id: String,
    guardrail_version: String,
}

impl GuardrailHook {
    pub fn new(
        service: Arc<dyn GuardrailService>,
        guardrail_id: impl Into<String>,
        guardrail_version: impl Into<String>,
    ) -> Self {
        Self {
            service,
            guardrail_id: guardrail_id.into(),
            guardrail_version: guardrail_version.into(),
        }
    }

    async fn apply(
        &self,
        stage: GuardrailStage,
        request: ApplyGuardrailRequest,
    ) -> Result<GuardrailCheck, ProviderError> {
        let raw = self
            .service
            .apply_guardrail(&self.guardrail_id, &self.guardrail_version, &request)
            .await?;
        debug!(event_name = "hook.guardrail_applied", stage = stage.as_str(), "guardrail hook ran");
        Ok(GuardrailCheck::new(stage, raw))
    }
}

#[async_trait]
impl AgentHook for GuardrailHook {
    fn name(&self) -> &'static str {
        "guardrail"
    }

    async fn on_message_added(
        &self,
        turn: &ConversationTurn,
    ) -> Result<Option<GuardrailCheck>, ProviderError> {
        if turn.role != Role::User || turn.text.trim().is_empty() {
            return Ok(None);
        }
        let check =
            self.apply(GuardrailStage::Input, ApplyGuardrailRequest::input(turn.text.clone())).await?;
        Ok(Some(check))
    }

    async fn after_invocation(
        &self,
        question: &str,
        answer: &str,
    ) -> Result<Option<GuardrailCheck>, ProviderError> {
        let Ok(content) = GuardrailContent::for_exchange(Some(question), Some(answer)) else {
            return Ok(None);
        };
        let check = self.apply(GuardrailStage::Output, ApplyGuardrailRequest::output(content)).await?;
        Ok(Some(check))
    }
}
