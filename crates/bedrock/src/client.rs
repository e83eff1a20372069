use std::error::Error as StdError;
use std::fmt::Debug;
use std::time::Duration;

use archeck_core::{AppConfig, ApplicationError};
use aws_config::timeout::TimeoutConfig;
use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_sdk_bedrockruntime::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use reqwest::Url;
use thiserror::Error;
use tracing::warn;

const NOT_FOUND_CODE: &str = "ResourceNotFoundException";

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("{operation} failed with {}: {message}", code.as_deref().unwrap_or("a service error"))]
    Service { operation: &'static str, code: Option<String>, message: String },
    #[error("{operation} could not be dispatched: {message}")]
    Dispatch { operation: &'static str, message: String },
    #[error("{operation} request is invalid: {message}")]
    InvalidRequest { operation: &'static str, message: String },
    #[error("could not decode service response: {0}")]
    Decode(String),
    #[error("invalid endpoint `{0}`")]
    InvalidEndpoint(String),
}

impl TransportError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Service { code: Some(code), .. } if code == NOT_FOUND_CODE)
    }
}

impl From<TransportError> for ApplicationError {
    fn from(error: TransportError) -> Self {
        Self::Transport(error.to_string())
    }
}

/// Maps an SDK failure onto the transport taxonomy, keeping the service error code.
pub fn sdk_failure<E, R>(operation: &'static str, error: SdkError<E, R>) -> TransportError
where
    E: ProvideErrorMetadata + StdError + 'static,
    R: Debug,
{
    let failure = match error.as_service_error() {
        Some(service) => TransportError::Service {
            operation,
            code: service.code().map(str::to_string),
            message: service
                .message()
                .map(str::to_string)
                .unwrap_or_else(|| DisplayErrorContext(service).to_string()),
        },
        None => TransportError::Dispatch {
            operation,
            message: DisplayErrorContext(&error).to_string(),
        },
    };
    warn!(event_name = "transport.failure", operation, error = %failure, "service call failed");
    failure
}

/// Shared SDK configuration: region, operation timeout and the default credential chain.
pub async fn load_sdk_config(config: &AppConfig) -> SdkConfig {
    let timeouts = TimeoutConfig::builder()
        .operation_timeout(Duration::from_secs(config.aws.timeout_secs))
        .build();
    aws_config::defaults(BehaviorVersion::latest())
        .region(Region::new(config.effective_region().to_string()))
        .timeout_config(timeouts)
        .load()
        .await
}

/// Base URLs of the three remote surfaces.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Endpoints {
    pub runtime: String,
    pub control: String,
    pub openai: String,
}

impl Endpoints {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            runtime: config.runtime_endpoint(),
            control: config.control_endpoint(),
            openai: config.openai_base_url(),
        }
    }
}

/// Checks that an endpoint override is an absolute http(s) URL.
pub fn parse_endpoint(base: &str) -> Result<Url, TransportError> {
    let url = Url::parse(base).map_err(|_| TransportError::InvalidEndpoint(base.to_string()))?;
    match url.scheme() {
        "http" | "https" if url.has_host() => Ok(url),
        _ => Err(TransportError::InvalidEndpoint(base.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::{parse_endpoint, TransportError};

    #[test]
    fn endpoints_must_be_absolute_http_urls() {
        assert!(parse_endpoint("https://bedrock.us-east-1.amazonaws.com").is_ok());
        assert!(parse_endpoint("http://127.0.0.1:9000/openai/v1").is_ok());
        assert!(matches!(parse_endpoint("not a url"), Err(TransportError::InvalidEndpoint(_))));
        assert!(matches!(
            parse_endpoint("file:///tmp/socket"),
            Err(TransportError::InvalidEndpoint(_))
        ));
    }

    #[test]
    fn only_the_not_found_code_counts_as_missing() {
        let missing = TransportError::Service {
            operation: "ApplyGuardrail",
            code: Some("ResourceNotFoundException".to_string()),
            message: "Guardrail not found".to_string(),
        };
        let throttled = TransportError::Service {
            operation: "ApplyGuardrail",
            code: Some("ThrottlingException".to_string()),
            message: "slow down".to_string(),
        };

        assert!(missing.is_not_found());
        assert!(!throttled.is_not_found());
        assert_eq!(
            missing.to_string(),
            "ApplyGuardrail failed with ResourceNotFoundException: Guardrail not found"
        );
    }
}
