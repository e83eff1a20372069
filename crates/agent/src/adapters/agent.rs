use archeck_core::ConversationTurn;
use async_trait::async_trait;

use crate::provider::{ProviderAdapter, ProviderError, ProviderExchange};
use crate::runtime::AgentRuntime;

/// Agent-framework integration: the model runs unguarded and hooks report guardrail checks.
pub struct AgentFrameworkAdapter {
    runtime: AgentRuntime,
}

impl AgentFrameworkAdapter {
    pub fn new(runtime: AgentRuntime) -> Self {
        Self { runtime }
    }
}

#[async_trait]
impl ProviderAdapter for AgentFrameworkAdapter {
    fn name(&self) -> &str {
        "agent-hooks"
    }

    async fn send(&self, turns: &[ConversationTurn]) -> Result<ProviderExchange, ProviderError> {
        self.runtime.invoke(turns).await
    }

    fn policy_loaded(&self) -> bool {
        self.runtime.prompt().is_loaded()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use archeck_core::ConversationTurn;
    use serde_json::json;

    use super::AgentFrameworkAdapter;
    use crate::adapters::fakes::{passed, FakeConverse, FakeGuardrail};
    use crate::guardrails::GuardrailHook;
    use crate::prompt::PolicyPrompt;
    use crate::provider::{GuardrailStage, ProviderAdapter, ProviderError};
    use crate::runtime::AgentRuntime;

    fn answer() -> serde_json::Value {
        json!({
            "output": { "message": { "role": "assistant", "content": [{ "text": "You have 30 days." }] } },
            "stopReason": "end_turn"
        })
    }

    #[tokio::test]
    async fn hooks_check_input_and_completed_pair() {
        let model = Arc::new(FakeConverse::replying(answer()));
        let guardrail = Arc::new(FakeGuardrail::sequence(vec![passed(), passed()]));
        let runtime = AgentRuntime::new(
            model.clone(),
            "us.amazon.nova-lite-v1:0",
            Arc::new(PolicyPrompt::bare("Be brief.")),
        )
        .with_hook(GuardrailHook::new(guardrail.clone(), "gr-1", "DRAFT"));
        assert_eq!(runtime.hook_names(), vec!["guardrail"]);
        let adapter = AgentFrameworkAdapter::new(runtime);

        let exchange = adapter
            .send(&[ConversationTurn::user("How long do I have?")])
            .await
            .expect("exchange");

        let stages: Vec<_> = exchange.checks.iter().map(|check| check.stage).collect();
        assert_eq!(stages, vec![GuardrailStage::Input, GuardrailStage::Output]);
        assert_eq!(exchange.assistant_text.as_deref(), Some("You have 30 days."));

        assert!(model.requests()[0].get("guardrailConfig").is_none());
        let requests = guardrail.requests();
        assert_eq!(requests[1]["content"][1]["text"]["text"], "You have 30 days.");
    }

    #[tokio::test]
    async fn hook_transport_failure_fails_the_invocation() {
        let model = Arc::new(FakeConverse::replying(answer()));
        let guardrail = Arc::new(FakeGuardrail::failing());
        let runtime =
            AgentRuntime::new(model.clone(), "m", Arc::new(PolicyPrompt::bare("Be brief.")))
                .with_hook(GuardrailHook::new(guardrail, "gr-1", "DRAFT"));

        let result =
            AgentFrameworkAdapter::new(runtime).send(&[ConversationTurn::user("hi")]).await;

        assert!(matches!(result, Err(ProviderError::Transport(_))));
        assert!(model.requests().is_empty());
    }
}
