use std::sync::Arc;

use archeck_bedrock::{
    chat_request, ApplyGuardrailRequest, ChatCompletionService, GuardrailContent, GuardrailService,
};
use archeck_core::{normalize, ConversationTurn};
use async_trait::async_trait;
use tracing::info;

use crate::prompt::PolicyPrompt;
use crate::provider::{
    last_user_text, GuardrailCheck, GuardrailStage, ProviderAdapter, ProviderError,
    ProviderExchange,
};

/// OpenAI-compatible chat completions wrapped by separate input and output guardrail checks.
pub struct OpenAiAdapter {
    chat: Arc<dyn ChatCompletionService>,
    guardrail: Arc<dyn GuardrailService>,
    model_id: String,
    guardrail_id: String,
    guardrail_version: String,
    prompt: Arc<PolicyPrompt>,
}

impl OpenAiAdapter {
    pub fn new(
        chat: Arc<dyn ChatCompletionService>,
        guardrail: Arc<dyn GuardrailService>,
        model_id: impl Into<String>,
        guardrail_id: impl Into<String>,
        guardrail_version: impl Into<String>,
        prompt: Arc<PolicyPrompt>,
    ) -> Self {
        Self {
            chat,
            guardrail,
            model_id: model_id.into(),
            guardrail_id: guardrail_id.into(),
            guardrail_version: guardrail_version.into(),
            prompt,
        }
    }
}

#[async_trait]
impl ProviderAdapter for OpenAiAdapter {
    fn name(&self) -> &str {
        "openai-compatible"
    }

    async fn send(&self, turns: &[ConversationTurn]) -> Result<ProviderExchange, ProviderError> {
        let question = last_user_text(turns)?;
        let system_prompt = self.prompt.render().await?;

        let input = self
            .guardrail
            .apply_guardrail(
                &self.guardrail_id,
                &self.guardrail_version,
                &ApplyGuardrailRequest::input(question),
            )
            .await?;
        let input_blocked = normalize(&input)?.action.is_intervention();
        let mut exchange = ProviderExchange {
            checks: vec![GuardrailCheck::new(GuardrailStage::Input, input)],
            ..ProviderExchange::default()
        };
        if input_blocked {
            info!(event_name = "openai.input_blocked", "input guardrail intervened; model not called");
            return Ok(exchange);
        }

        let request = chat_request(&self.model_id, turns, Some(&system_prompt))?;
        let completion = self.chat.chat_completion(request).await?;
        exchange.usage = completion.usage;

        if let Some(answer) = completion.text.as_deref() {
            if let Ok(content) = GuardrailContent::for_exchange(Some(question), Some(answer)) {
                let output = self
                    .guardrail
                    .apply_guardrail(
                        &self.guardrail_id,
                        &self.guardrail_version,
                        &ApplyGuardrailRequest::output(content),
                    )
                    .await?;
                exchange.checks.push(GuardrailCheck::new(GuardrailStage::Output, output));
            }
        }
        exchange.assistant_text = completion.text;

        Ok(exchange)
    }

    fn policy_loaded(&self) -> bool {
        self.prompt.is_loaded()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use archeck_core::ConversationTurn;
    use serde_json::json;

    use super::OpenAiAdapter;
    use crate::adapters::fakes::{intervened, passed, FakeChat, FakeGuardrail};
    use crate::prompt::PolicyPrompt;
    use crate::provider::{GuardrailStage, ProviderAdapter, ProviderError};

    fn adapter(chat: Arc<FakeChat>, guardrail: Arc<FakeGuardrail>) -> OpenAiAdapter {
        OpenAiAdapter::new(
            chat,
            guardrail,
            "openai.gpt-oss-20b-1:0",
            "gr-1",
            "DRAFT",
            Arc::new(PolicyPrompt::bare("Be brief.")),
        )
    }

    #[tokio::test]
    async fn blocked_input_skips_the_model() {
        let chat = Arc::new(FakeChat::replying("never"));
        let guardrail = Arc::new(FakeGuardrail::sequence(vec![intervened()]));
        let exchange = adapter(chat.clone(), guardrail.clone())
            .send(&[ConversationTurn::user("Can I get a refund after 31 days?")])
            .await
            .expect("exchange");

        assert_eq!(exchange.checks.len(), 1);
        assert_eq!(exchange.checks[0].stage, GuardrailStage::Input);
        assert!(exchange.assistant_text.is_none());
        assert_eq!(chat.calls(), 0);
    }

    #[tokio::test]
    async fn passed_input_runs_model_then_output_check() {
        let chat = Arc::new(FakeChat::replying("Refunds take 30 days."));
        let guardrail = Arc::new(FakeGuardrail::sequence(vec![passed(), intervened()]));
        let exchange = adapter(chat.clone(), guardrail.clone())
            .send(&[ConversationTurn::user("How long do refunds take?")])
            .await
            .expect("exchange");

        let stages: Vec<_> = exchange.checks.iter().map(|check| check.stage).collect();
        assert_eq!(stages, vec![GuardrailStage::Input, GuardrailStage::Output]);
        assert_eq!(exchange.assistant_text.as_deref(), Some("Refunds take 30 days."));
        assert_eq!(chat.calls(), 1);
        let sent = &chat.requests()[0];
        assert_eq!(sent.model, "openai.gpt-oss-20b-1:0");
        assert_eq!(sent.messages.len(), 2);

        let requests = guardrail.requests();
        assert_eq!(requests[0]["source"], "INPUT");
        assert_eq!(requests[1]["source"], "OUTPUT");
        assert_eq!(requests[1]["content"][0]["text"]["qualifiers"], json!(["query"]));
    }

    #[tokio::test]
    async fn malformed_input_check_is_an_error() {
        let chat = Arc::new(FakeChat::replying("never"));
        let guardrail = Arc::new(FakeGuardrail::sequence(vec![json!({ "unexpected": true })]));
        let result =
            adapter(chat, guardrail).send(&[ConversationTurn::user("hello")]).await;

        assert!(matches!(result, Err(ProviderError::Malformed(_))));
    }
}
