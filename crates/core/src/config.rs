use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_GUARDRAIL_VERSION: &str = "DRAFT";
pub const DEFAULT_REGION: &str = "us-east-1";
pub const DEFAULT_MODEL_ID: &str = "us.amazon.nova-lite-v1:0";
pub const DEFAULT_OPENAI_MODEL_ID: &str = "openai.gpt-oss-20b-1:0";
pub const DEFAULT_TEST_CASES_FILE: &str = "automated_reasoning_test_cases.json";
pub const DEFAULT_POLICY_DOCUMENT: &str = "./docs/Customer Support Refund Policy.pdf";
pub const DEFAULT_SYSTEM_PROMPT: &str =
    "You are a customer support agent. You follow the provided refund policy. Reply with max 10 words.";
const PLACEHOLDER_GUARDRAIL_ID: &str = "YOUR_GUARDRAIL_ID";

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub guardrail: GuardrailConfig,
    pub aws: AwsConfig,
    pub model: ModelConfig,
    pub session: SessionConfig,
    pub batch: BatchConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct GuardrailConfig {
    pub id: String,
    pub version: String,
}

#[derive(Clone, Debug)]
pub struct AwsConfig {
    pub region: Option<String>,
    pub bearer_token: Option<SecretString>,
    pub runtime_endpoint: Option<String>,
    pub control_endpoint: Option<String>,
    pub openai_base_url: Option<String>,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ModelConfig {
    pub id: String,
}

#[derive(Clone, Debug)]
pub struct SessionConfig {
    pub system_prompt: String,
    pub policy_document: Option<PathBuf>,
    pub history_limit: usize,
}

#[derive(Clone, Debug)]
pub struct BatchConfig {
    pub test_cases_file: PathBuf,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub guardrail_id: Option<String>,
    pub guardrail_version: Option<String>,
    pub region: Option<String>,
    pub model_id: Option<String>,
    pub test_cases_file: Option<PathBuf>,
    pub log_level: Option<String>,
}

#[derive(Clone, Debug)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub require_guardrail: bool,
    pub load_dotenv: bool,
    pub default_model_id: Option<String>,
    pub overrides: ConfigOverrides,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            config_path: None,
            require_file: false,
            require_guardrail: true,
            load_dotenv: true,
            default_model_id: None,
            overrides: ConfigOverrides::default(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            guardrail: GuardrailConfig {
                id: String::new(),
                version: DEFAULT_GUARDRAIL_VERSION.to_string(),
            },
            aws: AwsConfig {
                region: None,
                bearer_token: None,
                runtime_endpoint: None,
                control_endpoint: None,
                openai_base_url: None,
                timeout_secs: 60,
            },
            model: ModelConfig { id: DEFAULT_MODEL_ID.to_string() },
            session: SessionConfig {
                system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
                policy_document: Some(PathBuf::from(DEFAULT_POLICY_DOCUMENT)),
                history_limit: 50,
            },
            batch: BatchConfig { test_cases_file: PathBuf::from(DEFAULT_TEST_CASES_FILE) },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        if options.load_dotenv {
            // Variables already present in the environment take precedence over `.env`.
            let _ = dotenvy::dotenv();
        }

        let mut config = Self::default();
        if let Some(model_id) = &options.default_model_id {
            config.model.id = model_id.clone();
        }

        let maybe_path = resolve_config_path(options.config_path.as_deref());
        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("archeck.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate(options.require_guardrail)?;

        Ok(config)
    }

    /// Region used to derive service endpoints when no explicit endpoint is set.
    pub fn effective_region(&self) -> &str {
        self.aws.region.as_deref().unwrap_or(DEFAULT_REGION)
    }

    pub fn runtime_endpoint(&self) -> String {
        self.aws.runtime_endpoint.clone().unwrap_or_else(|| {
            format!("https://bedrock-runtime.{}.amazonaws.com", self.effective_region())
        })
    }

    pub fn control_endpoint(&self) -> String {
        self.aws
            .control_endpoint
            .clone()
            .unwrap_or_else(|| format!("https://bedrock.{}.amazonaws.com", self.effective_region()))
    }

    pub fn openai_base_url(&self) -> String {
        self.aws.openai_base_url.clone().unwrap_or_else(|| {
            format!("https://bedrock-runtime.{}.amazonaws.com/openai/v1", self.effective_region())
        })
    }

    pub fn has_bearer_token(&self) -> bool {
        self.aws
            .bearer_token
            .as_ref()
            .map(|token| !token.expose_secret().trim().is_empty())
            .unwrap_or(false)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(guardrail) = patch.guardrail {
            if let Some(id) = guardrail.id {
                self.guardrail.id = id;
            }
            if let Some(version) = guardrail.version {
                self.guardrail.version = version;
            }
        }

        if let Some(aws) = patch.aws {
            if let Some(region) = aws.region {
                self.aws.region = Some(region);
            }
            if let Some(bearer_token_value) = aws.bearer_token {
                self.aws.bearer_token = Some(bearer_token_value.into());
            }
            if let Some(runtime_endpoint) = aws.runtime_endpoint {
                self.aws.runtime_endpoint = Some(runtime_endpoint);
            }
            if let Some(control_endpoint) = aws.control_endpoint {
                self.aws.control_endpoint = Some(control_endpoint);
            }
            if let Some(openai_base_url) = aws.openai_base_url {
                self.aws.openai_base_url = Some(openai_base_url);
            }
            if let Some(timeout_secs) = aws.timeout_secs {
                self.aws.timeout_secs = timeout_secs;
            }
        }

        if let Some(model) = patch.model {
            if let Some(id) = model.id {
                self.model.id = id;
            }
        }

        if let Some(session) = patch.session {
            if let Some(system_prompt) = session.system_prompt {
                self.session.system_prompt = system_prompt;
            }
            if let Some(policy_document) = session.policy_document {
                self.session.policy_document = non_empty_path(policy_document);
            }
            if let Some(history_limit) = session.history_limit {
                self.session.history_limit = history_limit;
            }
        }

        if let Some(batch) = patch.batch {
            if let Some(test_cases_file) = batch.test_cases_file {
                self.batch.test_cases_file = PathBuf::from(test_cases_file);
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("GUARDRAIL_ID") {
            self.guardrail.id = value;
        }
        if let Some(value) = read_env("GUARDRAIL_VERSION") {
            self.guardrail.version = value;
        }

        let region = read_env("AWS_REGION").or_else(|| read_env("AWS_DEFAULT_REGION"));
        if let Some(value) = region {
            self.aws.region = Some(value);
        }
        if let Some(value) = read_env("AWS_BEARER_TOKEN_BEDROCK") {
            self.aws.bearer_token = Some(value.into());
        }
        if let Some(value) = read_env("ARCHECK_RUNTIME_ENDPOINT") {
            self.aws.runtime_endpoint = Some(value);
        }
        if let Some(value) = read_env("ARCHECK_CONTROL_ENDPOINT") {
            self.aws.control_endpoint = Some(value);
        }
        if let Some(value) = read_env("ARCHECK_OPENAI_BASE_URL") {
            self.aws.openai_base_url = Some(value);
        }
        if let Some(value) = read_env("ARCHECK_TIMEOUT_SECS") {
            self.aws.timeout_secs = parse_u64("ARCHECK_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("MODEL_ID") {
            self.model.id = value;
        }

        if let Some(value) = read_env("ARCHECK_SYSTEM_PROMPT") {
            self.session.system_prompt = value;
        }
        if let Some(value) = env::var("ARCHECK_POLICY_DOCUMENT").ok() {
            self.session.policy_document = non_empty_path(value);
        }
        if let Some(value) = read_env("ARCHECK_HISTORY_LIMIT") {
            self.session.history_limit = parse_usize("ARCHECK_HISTORY_LIMIT", &value)?;
        }

        if let Some(value) = read_env("TEST_CASES_FILE") {
            self.batch.test_cases_file = PathBuf::from(value);
        }

        if let Some(value) = read_env("ARCHECK_LOG_LEVEL") {
            self.logging.level = value;
        }
        if let Some(value) = read_env("ARCHECK_LOG_FORMAT") {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(guardrail_id) = overrides.guardrail_id {
            self.guardrail.id = guardrail_id;
        }
        if let Some(guardrail_version) = overrides.guardrail_version {
            self.guardrail.version = guardrail_version;
        }
        if let Some(region) = overrides.region {
            self.aws.region = Some(region);
        }
        if let Some(model_id) = overrides.model_id {
            self.model.id = model_id;
        }
        if let Some(test_cases_file) = overrides.test_cases_file {
            self.batch.test_cases_file = test_cases_file;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
    }

    pub fn validate(&self, require_guardrail: bool) -> Result<(), ConfigError> {
        if require_guardrail {
            validate_guardrail(&self.guardrail)?;
        }
        validate_aws(&self.aws)?;
        validate_model(&self.model)?;
        validate_session(&self.session)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("archeck.toml"), PathBuf::from("config/archeck.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_guardrail(guardrail: &GuardrailConfig) -> Result<(), ConfigError> {
    let id = guardrail.id.trim();
    if id.is_empty() || id == PLACEHOLDER_GUARDRAIL_ID {
        return Err(ConfigError::Validation(
            "guardrail.id is required. Set GUARDRAIL_ID (e.g. `export GUARDRAIL_ID=abc123xyz`) or add `[guardrail] id = ...` to archeck.toml".to_string(),
        ));
    }

    if guardrail.version.trim().is_empty() {
        return Err(ConfigError::Validation(
            "guardrail.version must not be empty (use `DRAFT` or a published version number)"
                .to_string(),
        ));
    }

    Ok(())
}

fn validate_aws(aws: &AwsConfig) -> Result<(), ConfigError> {
    if aws.timeout_secs == 0 || aws.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "aws.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    if let Some(region) = &aws.region {
        if region.trim().is_empty() {
            return Err(ConfigError::Validation("aws.region must not be blank".to_string()));
        }
    }

    let endpoints = [
        ("aws.runtime_endpoint", aws.runtime_endpoint.as_deref()),
        ("aws.control_endpoint", aws.control_endpoint.as_deref()),
        ("aws.openai_base_url", aws.openai_base_url.as_deref()),
    ];
    for (key, endpoint) in endpoints {
        if let Some(endpoint) = endpoint {
            if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
                return Err(ConfigError::Validation(format!(
                    "{key} must start with http:// or https://"
                )));
            }
        }
    }

    Ok(())
}

fn validate_model(model: &ModelConfig) -> Result<(), ConfigError> {
    if model.id.trim().is_empty() {
        return Err(ConfigError::Validation("model.id must not be empty".to_string()));
    }
    Ok(())
}

fn validate_session(session: &SessionConfig) -> Result<(), ConfigError> {
    if session.history_limit == 0 {
        return Err(ConfigError::Validation(
            "session.history_limit must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn non_empty_path(value: String) -> Option<PathBuf> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| PathBuf::from(trimmed))
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_usize(key: &str, value: &str) -> Result<usize, ConfigError> {
    value.parse::<usize>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    guardrail: Option<GuardrailPatch>,
    aws: Option<AwsPatch>,
    model: Option<ModelPatch>,
    session: Option<SessionPatch>,
    batch: Option<BatchPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct GuardrailPatch {
    id: Option<String>,
    version: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct AwsPatch {
    region: Option<String>,
    bearer_token: Option<String>,
    runtime_endpoint: Option<String>,
    control_endpoint: Option<String>,
    openai_base_url: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ModelPatch {
    id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct SessionPatch {
    system_prompt: Option<String>,
    policy_document: Option<String>,
    history_limit: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct BatchPatch {
    test_cases_file: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
