use std::time::Duration;

use archeck_core::{AppConfig, ConversationTurn, Role};
use async_openai::config::OpenAIConfig;
use async_openai::error::OpenAIError;
use async_openai::types::{
    ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
    ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
    CreateChatCompletionRequest, CreateChatCompletionRequestArgs, CreateChatCompletionResponse,
};
use async_openai::Client;
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use tracing::{info, warn};

use crate::client::TransportError;
use crate::types::TokenUsage;

const CHAT_COMPLETION: &str = "ChatCompletion";

#[derive(Clone, Debug, PartialEq)]
pub struct ChatCompletion {
    pub text: Option<String>,
    pub usage: Option<TokenUsage>,
    pub raw: Value,
}

impl ChatCompletion {
    /// First choice's message content plus usage.
    pub fn from_response(response: CreateChatCompletionResponse) -> Self {
        let text = response.choices.first().and_then(|choice| choice.message.content.clone());
        let usage = response.usage.as_ref().map(|usage| TokenUsage {
            input_tokens: u64::from(usage.prompt_tokens),
            output_tokens: u64::from(usage.completion_tokens),
            total_tokens: u64::from(usage.total_tokens),
        });
        let raw = serde_json::to_value(&response).unwrap_or(Value::Null);
        Self { text, usage, raw }
    }
}

fn failure(error: OpenAIError) -> TransportError {
    let failure = match error {
        OpenAIError::ApiError(api) => {
            TransportError::Service { operation: CHAT_COMPLETION, code: api.r#type, message: api.message }
        }
        OpenAIError::JSONDeserialize(error) => TransportError::Decode(error.to_string()),
        OpenAIError::InvalidArgument(message) => {
            TransportError::InvalidRequest { operation: CHAT_COMPLETION, message }
        }
        other => TransportError::Dispatch { operation: CHAT_COMPLETION, message: other.to_string() },
    };
    warn!(event_name = "transport.failure", operation = CHAT_COMPLETION, error = %failure, "service call failed");
    failure
}

/// Chat messages for `turns`, led by the system prompt when one is set.
pub fn chat_request(
    model: &str,
    turns: &[ConversationTurn],
    system_prompt: Option<&str>,
) -> Result<CreateChatCompletionRequest, TransportError> {
    let mut messages: Vec<ChatCompletionRequestMessage> = Vec::with_capacity(turns.len() + 1);
    if let Some(prompt) = system_prompt.filter(|prompt| !prompt.trim().is_empty()) {
        messages.push(
            ChatCompletionRequestSystemMessageArgs::default()
                .content(prompt.to_string())
                .build()
                .map_err(failure)?
                .into(),
        );
    }
    for turn in turns {
        let message: ChatCompletionRequestMessage = match turn.role {
            Role::User => ChatCompletionRequestUserMessageArgs::default()
                .content(turn.text.clone())
                .build()
                .map_err(failure)?
                .into(),
            Role::Assistant => ChatCompletionRequestAssistantMessageArgs::default()
                .content(turn.text.clone())
                .build()
                .map_err(failure)?
                .into(),
        };
        messages.push(message);
    }

    CreateChatCompletionRequestArgs::default()
        .model(model)
        .messages(messages)
        .build()
        .map_err(failure)
}

#[async_trait]
pub trait ChatCompletionService: Send + Sync {
    async fn chat_completion(
        &self,
        request: CreateChatCompletionRequest,
    ) -> Result<ChatCompletion, TransportError>;
}

#[derive(Clone, Debug)]
pub struct OpenAiCompatClient {
    client: Client<OpenAIConfig>,
}

impl OpenAiCompatClient {
    pub fn new(
        base_url: &str,
        api_key: Option<&SecretString>,
        timeout: Duration,
    ) -> Result<Self, TransportError> {
        let mut config = OpenAIConfig::new().with_api_base(base_url);
        if let Some(key) = api_key.filter(|key| !key.expose_secret().trim().is_empty()) {
            config = config.with_api_key(key.expose_secret());
        }
        let http = reqwest::Client::builder().timeout(timeout).build().map_err(|error| {
            TransportError::Dispatch { operation: CHAT_COMPLETION, message: error.to_string() }
        })?;
        Ok(Self { client: Client::with_config(config).with_http_client(http) })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, TransportError> {
        Self::new(
            &config.openai_base_url(),
            config.aws.bearer_token.as_ref(),
            Duration::from_secs(config.aws.timeout_secs),
        )
    }
}

#[async_trait]
impl ChatCompletionService for OpenAiCompatClient {
    async fn chat_completion(
        &self,
        request: CreateChatCompletionRequest,
    ) -> Result<ChatCompletion, TransportError> {
        info!(
            event_name = "openai.chat_completion",
            model = %request.model,
            messages = request.messages.len(),
            "requesting chat completion"
        );
        let response = self.client.chat().create(request).await.map_err(failure)?;
        Ok(ChatCompletion::from_response(response))
    }
}

#[cfg(test)]
mod tests {
    use archeck_core::ConversationTurn;
    use async_openai::types::ChatCompletionRequestMessage;

    use super::chat_request;

    #[test]
    fn chat_request_leads_with_system_prompt() {
        let turns = vec![ConversationTurn::user("hello"), ConversationTurn::assistant("hi")];
        let request = chat_request("openai.gpt-oss-20b-1:0", &turns, Some("Be brief."))
            .expect("request");

        assert_eq!(request.model, "openai.gpt-oss-20b-1:0");
        assert_eq!(request.messages.len(), 3);
        assert!(matches!(request.messages[0], ChatCompletionRequestMessage::System(_)));
        assert!(matches!(request.messages[1], ChatCompletionRequestMessage::User(_)));
        assert!(matches!(request.messages[2], ChatCompletionRequestMessage::Assistant(_)));
    }

    #[test]
    fn blank_system_prompt_is_skipped() {
        let request = chat_request("m", &[ConversationTurn::user("hello")], Some("  "))
            .expect("request");
        assert_eq!(request.messages.len(), 1);
    }
}
