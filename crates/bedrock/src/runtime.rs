use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_bedrockruntime::error::BuildError;
use aws_sdk_bedrockruntime::types::{
    ContentBlock, ConversationRole, GuardrailConfiguration, GuardrailContentBlock,
    GuardrailContentQualifier, GuardrailContentSource, GuardrailTextBlock, GuardrailTrace,
    Message, SystemContentBlock,
};
use aws_sdk_bedrockruntime::{config, Client};
use serde_json::Value;
use tracing::info;

use crate::client::{sdk_failure, TransportError};
use crate::types::{ApplyGuardrailRequest, ConverseRequest, GuardrailSource, Qualifier};
use crate::wire;

const CONVERSE: &str = "Converse";
const APPLY_GUARDRAIL: &str = "ApplyGuardrail";

/// Sends a conversation to a model and returns the raw Converse response.
#[async_trait]
pub trait ConverseService: Send + Sync {
    async fn converse(&self, model_id: &str, request: &ConverseRequest)
        -> Result<Value, TransportError>;
}

/// Applies a guardrail version to standalone content and returns the raw assessment response.
#[async_trait]
pub trait GuardrailService: Send + Sync {
    async fn apply_guardrail(
        &self,
        guardrail_id: &str,
        guardrail_version: &str,
        request: &ApplyGuardrailRequest,
    ) -> Result<Value, TransportError>;
}

#[derive(Clone, Debug)]
pub struct BedrockRuntimeClient {
    client: Client,
}

impl BedrockRuntimeClient {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Builds the SDK client from shared config, honoring an endpoint override.
    pub fn from_sdk_config(shared: &SdkConfig, endpoint: Option<&str>) -> Self {
        let mut builder = config::Builder::from(shared);
        if let Some(endpoint) = endpoint {
            builder = builder.endpoint_url(endpoint);
        }
        Self::new(Client::from_conf(builder.build()))
    }
}

fn invalid(operation: &'static str, error: BuildError) -> TransportError {
    TransportError::InvalidRequest { operation, message: error.to_string() }
}

fn converse_messages(request: &ConverseRequest) -> Result<Vec<Message>, TransportError> {
    request
        .messages
        .iter()
        .map(|message| {
            Message::builder()
                .role(ConversationRole::from(message.role))
                .set_content(Some(
                    message
                        .content
                        .iter()
                        .map(|block| ContentBlock::Text(block.text.clone()))
                        .collect(),
                ))
                .build()
                .map_err(|error| invalid(CONVERSE, error))
        })
        .collect()
}

fn guardrail_blocks(
    request: &ApplyGuardrailRequest,
) -> Result<Vec<GuardrailContentBlock>, TransportError> {
    request
        .content
        .iter()
        .map(|block| {
            let qualifiers: Vec<GuardrailContentQualifier> = block
                .text
                .qualifiers
                .iter()
                .map(|qualifier| match qualifier {
                    Qualifier::Query => GuardrailContentQualifier::Query,
                    Qualifier::GuardContent => GuardrailContentQualifier::GuardContent,
                })
                .collect();
            GuardrailTextBlock::builder()
                .text(block.text.text.clone())
                .set_qualifiers((!qualifiers.is_empty()).then_some(qualifiers))
                .build()
                .map(GuardrailContentBlock::Text)
                .map_err(|error| invalid(APPLY_GUARDRAIL, error))
        })
        .collect()
}

#[async_trait]
impl ConverseService for BedrockRuntimeClient {
    async fn converse(
        &self,
        model_id: &str,
        request: &ConverseRequest,
    ) -> Result<Value, TransportError> {
        let messages = converse_messages(request)?;
        let system: Vec<SystemContentBlock> = request
            .system
            .iter()
            .map(|block| SystemContentBlock::Text(block.text.clone()))
            .collect();
        let guardrail = request
            .guardrail_config
            .as_ref()
            .map(|settings| {
                Ok::<_, TransportError>(
                    GuardrailConfiguration::builder()
                        .guardrail_identifier(settings.guardrail_identifier.clone())
                        .guardrail_version(settings.guardrail_version.clone())
                        .trace(GuardrailTrace::from(settings.trace))
                        .build(),
                )
            })
            .transpose()?;

        info!(
            event_name = "runtime.converse",
            model_id,
            messages = messages.len(),
            guardrail = guardrail.is_some(),
            "invoking model"
        );
        let output = self
            .client
            .converse()
            .model_id(model_id)
            .set_messages(Some(messages))
            .set_system((!system.is_empty()).then_some(system))
            .set_guardrail_config(guardrail)
            .send()
            .await
            .map_err(|error| sdk_failure(CONVERSE, error))?;
        Ok(wire::converse_response(&output))
    }
}

#[async_trait]
impl GuardrailService for BedrockRuntimeClient {
    async fn apply_guardrail(
        &self,
        guardrail_id: &str,
        guardrail_version: &str,
        request: &ApplyGuardrailRequest,
    ) -> Result<Value, TransportError> {
        let content = guardrail_blocks(request)?;
        let source = match request.source {
            GuardrailSource::Input => GuardrailContentSource::Input,
            GuardrailSource::Output => GuardrailContentSource::Output,
        };

        info!(
            event_name = "runtime.apply_guardrail",
            guardrail_id,
            guardrail_version,
            source = ?request.source,
            blocks = content.len(),
            "applying guardrail"
        );
        let output = self
            .client
            .apply_guardrail()
            .guardrail_identifier(guardrail_id)
            .guardrail_version(guardrail_version)
            .source(source)
            .set_content(Some(content))
            .send()
            .await
            .map_err(|error| sdk_failure(APPLY_GUARDRAIL, error))?;
        Ok(wire::apply_guardrail_response(&output))
    }
}
