//! AWS SDK clients for the guardrail runtime and the policy control plane, the
//! OpenAI-compatible chat client, and policy export.

pub mod client;
pub mod control;
pub mod export;
pub mod openai;
pub mod runtime;
pub mod types;
pub mod wire;

pub use async_openai::types::CreateChatCompletionRequest;
pub use client::{load_sdk_config, Endpoints, TransportError};
pub use control::{BedrockControlClient, PolicyService, PolicySummary};
pub use export::{ExportError, PolicyArn, PolicySelection};
pub use openai::{chat_request, ChatCompletion, ChatCompletionService, OpenAiCompatClient};
pub use runtime::{BedrockRuntimeClient, ConverseService, GuardrailService};
pub use types::{
    ApplyGuardrailRequest, ConverseRequest, GuardrailContent, GuardrailSettings, GuardrailSource,
    Qualifier, TokenUsage,
};
