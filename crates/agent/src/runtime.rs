use std::sync::Arc;

use archeck_bedrock::{ConverseRequest, ConverseService, TokenUsage};
use archeck_core::{assistant_text, ConversationTurn};
use async_trait::async_trait;
use tracing::info;

use crate::prompt::PolicyPrompt;
use crate::provider::{last_user_text, GuardrailCheck, ProviderError, ProviderExchange};

/// Lifecycle callbacks around one agent invocation. Hooks observe; they never alter the answer.
#[async_trait]
pub trait AgentHook: Send + Sync {
    fn name(&self) -> &'static str;

    async fn on_message_added(
        &self,
        turn: &ConversationTurn,
    ) -> Result<Option<GuardrailCheck>, ProviderError>;

    async fn after_invocation(
        &self,
        question: &str,
        answer: &str,
    ) -> Result<Option<GuardrailCheck>, ProviderError>;
}

/// Minimal agent loop: model call through Converse with registered hooks around it.
pub struct AgentRuntime {
    model: Arc<dyn ConverseService>,
    model_id: String,
    prompt: Arc<PolicyPrompt>,
    hooks: Vec<Arc<dyn AgentHook>>,
}

impl AgentRuntime {
    pub fn new(
        model: Arc<dyn ConverseService>,
        model_id: impl Into<String>,
        prompt: Arc<PolicyPrompt>,
    ) -> Self {
        Self { model, model_id: model_id.into(), prompt, hooks: Vec::new() }
    }

    pub fn register_hook<H>(&mut self, hook: H)
    where
        H: AgentHook + 'static,
    {
        self.hooks.push(Arc::new(hook));
    }

    pub fn with_hook<H>(mut self, hook: H) -> Self
    where
        H: AgentHook + 'static,
    {
        self.register_hook(hook);
        self
    }

    pub fn hook_names(&self) -> Vec<&'static str> {
        self.hooks.iter().map(|hook| hook.name()).collect()
    }

    pub fn prompt(&self) -> &PolicyPrompt {
        &self.prompt
    }

    pub async fn invoke(&self, turns: &[ConversationTurn]) -> Result<ProviderExchange, ProviderError> {
        let question = last_user_text(turns)?;
        let latest = turns.last().ok_or(ProviderError::EmptyConversation)?;
        let mut checks = Vec::new();

        for hook in &self.hooks {
            if let Some(check) = hook.on_message_added(latest).await? {
                checks.push(check);
            }
        }

        let system_prompt = self.prompt.render().await?;
        let request = ConverseRequest::from_turns(turns, Some(&system_prompt));
        let raw = self.model.converse(&self.model_id, &request).await?;
        let answer = assistant_text(&raw);
        let usage = TokenUsage::from_converse(&raw);

        if let Some(answer) = answer.as_deref() {
            for hook in &self.hooks {
                if let Some(check) = hook.after_invocation(question, answer).await? {
                    checks.push(check);
                }
            }
        }

        info!(
            event_name = "agent.invocation_completed",
            model_id = %self.model_id,
            hooks = self.hooks.len(),
            checks = checks.len(),
            "agent invocation completed"
        );

        Ok(ProviderExchange { assistant_text: answer, checks, usage })
    }
}
