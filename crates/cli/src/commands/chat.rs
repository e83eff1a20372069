use std::io::{self, Write};
use std::sync::Arc;

use archeck_agent::{
    AgentFrameworkAdapter, AgentRuntime, ConverseAdapter, DocumentExtractor, GuardrailHook,
    OpenAiAdapter, PolicyPrompt, ProviderAdapter, Session, SessionSettings,
};
use archeck_bedrock::{
    load_sdk_config, BedrockRuntimeClient, Endpoints, GuardrailSettings, OpenAiCompatClient,
    TransportError,
};
use archeck_core::config::{AppConfig, DEFAULT_OPENAI_MODEL_ID};
use archeck_core::LoadOptions;
use clap::ValueEnum;
use tracing::info;

use crate::commands::{build_runtime, load_config, CommandResult, EXIT_IO, EXIT_OK, EXIT_RUNTIME_INIT};
use crate::logging;

/// How the chat session reaches the model and the guardrail.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Via {
    /// Converse with the guardrail attached to the model call.
    Converse,
    /// OpenAI-compatible chat with standalone guardrail checks around it.
    Openai,
    /// Unguarded Converse with guardrail hooks observing each turn.
    Agent,
}

pub fn run(mut options: LoadOptions, via: Via) -> CommandResult {
    if via == Via::Openai {
        options.default_model_id = Some(DEFAULT_OPENAI_MODEL_ID.to_string());
    }
    let config = match load_config("chat", options) {
        Ok(config) => config,
        Err(result) => return result,
    };
    logging::init(&config);

    let runtime = match build_runtime("chat") {
        Ok(runtime) => runtime,
        Err(result) => return result,
    };
    let sdk_config = runtime.block_on(load_sdk_config(&config));
    let runtime_client =
        BedrockRuntimeClient::from_sdk_config(&sdk_config, config.aws.runtime_endpoint.as_deref());
    let (adapter, endpoint) = match build_adapter(via, &config, runtime_client) {
        Ok(built) => built,
        Err(error) => {
            return CommandResult::failure(
                "chat",
                "runtime_init",
                format!("failed to build the chat client: {error}"),
                EXIT_RUNTIME_INIT,
            );
        }
    };
    let settings = SessionSettings::from_config(&config, endpoint);
    let mut session = Session::new(adapter, settings);
    info!(
        event_name = "chat.started",
        correlation_id = %session.correlation_id(),
        via = ?via,
        "chat session configured"
    );

    let stdin = io::stdin();
    let stdout = io::stdout();
    let mut output = stdout.lock();
    if let Err(error) = output.write_all(header(&config, via).as_bytes()) {
        return CommandResult::failure("chat", "io", error.to_string(), EXIT_IO);
    }

    match runtime.block_on(session.run(stdin.lock(), &mut output)) {
        Ok(_) => CommandResult::text(EXIT_OK, ""),
        Err(error) => CommandResult::failure(
            "chat",
            "io",
            format!("console I/O failed: {error}"),
            EXIT_IO,
        ),
    }
}

/// Builds the adapter for `via` and returns it with the endpoint it talks to.
fn build_adapter(
    via: Via,
    config: &AppConfig,
    runtime_client: BedrockRuntimeClient,
) -> Result<(Arc<dyn ProviderAdapter>, String), TransportError> {
    let endpoints = Endpoints::from_config(config);
    let prompt = Arc::new(PolicyPrompt::new(
        config.session.system_prompt.clone(),
        config.session.policy_document.clone(),
        DocumentExtractor::detect(),
    ));
    let runtime_client = Arc::new(runtime_client);

    let built = match via {
        Via::Converse => {
            let adapter: Arc<dyn ProviderAdapter> = Arc::new(ConverseAdapter::new(
                runtime_client,
                config.model.id.clone(),
                GuardrailSettings::traced(config.guardrail.id.clone(), config.guardrail.version.clone()),
                prompt,
            ));
            (adapter, endpoints.runtime)
        }
        Via::Openai => {
            let chat = Arc::new(OpenAiCompatClient::from_config(config)?);
            let adapter: Arc<dyn ProviderAdapter> = Arc::new(OpenAiAdapter::new(
                chat,
                runtime_client,
                config.model.id.clone(),
                config.guardrail.id.clone(),
                config.guardrail.version.clone(),
                prompt,
            ));
            (adapter, endpoints.openai)
        }
        Via::Agent => {
            let hook = GuardrailHook::new(
                runtime_client.clone(),
                config.guardrail.id.clone(),
                config.guardrail.version.clone(),
            );
            let agent = AgentRuntime::new(runtime_client, config.model.id.clone(), prompt).with_hook(hook);
            let adapter: Arc<dyn ProviderAdapter> = Arc::new(AgentFrameworkAdapter::new(agent));
            (adapter, endpoints.runtime)
        }
    };
    Ok(built)
}

fn header(config: &AppConfig, via: Via) -> String {
    let document = match &config.session.policy_document {
        Some(path) if path.exists() => path.display().to_string(),
        Some(path) => format!("{} (not found)", path.display()),
        None => "none".to_string(),
    };
    let credentials = if config.has_bearer_token() { "bearer token" } else { "AWS default credential chain" };

    format!(
        "Automated Reasoning Checks\n  Integration: {}\n  Guardrail: {} (version {})\n  Model: {}\n  Region: {}\n  Policy document: {document}\n  Credentials: {credentials}\n",
        via_label(via),
        config.guardrail.id,
        config.guardrail.version,
        config.model.id,
        config.effective_region(),
    )
}

fn via_label(via: Via) -> &'static str {
    match via {
        Via::Converse => "converse",
        Via::Openai => "openai",
        Via::Agent => "agent",
    }
}
