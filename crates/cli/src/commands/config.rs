use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use archeck_core::config::AppConfig;
use archeck_core::LoadOptions;
use secrecy::ExposeSecret;
use toml::Value;

use crate::commands::{load_config, CommandResult, EXIT_OK};

/// One reported setting and where its value may come from.
struct Field<'a> {
    key: &'static str,
    value: String,
    env_keys: &'a [&'static str],
    flag: Option<(&'static str, bool)>,
}

pub fn run(options: LoadOptions) -> CommandResult {
    let config_file_path = detect_config_path(options.config_path.as_deref());
    let overrides = options.overrides.clone();
    let config = match load_config("config", options) {
        Ok(config) => config,
        Err(result) => return result,
    };
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let fields = [
        Field {
            key: "guardrail.id",
            value: non_empty(&config.guardrail.id),
            env_keys: &["GUARDRAIL_ID"],
            flag: Some(("--guardrail-id", overrides.guardrail_id.is_some())),
        },
        Field {
            key: "guardrail.version",
            value: config.guardrail.version.clone(),
            env_keys: &["GUARDRAIL_VERSION"],
            flag: Some(("--guardrail-version", overrides.guardrail_version.is_some())),
        },
        Field {
            key: "aws.region",
            value: config.effective_region().to_string(),
            env_keys: &["AWS_REGION", "AWS_DEFAULT_REGION"],
            flag: Some(("--region", overrides.region.is_some())),
        },
        Field {
            key: "aws.bearer_token",
            value: redact_token(&config),
            env_keys: &["AWS_BEARER_TOKEN_BEDROCK"],
            flag: None,
        },
        Field {
            key: "aws.runtime_endpoint",
            value: config.runtime_endpoint(),
            env_keys: &["ARCHECK_RUNTIME_ENDPOINT"],
            flag: None,
        },
        Field {
            key: "aws.control_endpoint",
            value: config.control_endpoint(),
            env_keys: &["ARCHECK_CONTROL_ENDPOINT"],
            flag: None,
        },
        Field {
            key: "aws.openai_base_url",
            value: config.openai_base_url(),
            env_keys: &["ARCHECK_OPENAI_BASE_URL"],
            flag: None,
        },
        Field {
            key: "aws.timeout_secs",
            value: config.aws.timeout_secs.to_string(),
            env_keys: &["ARCHECK_TIMEOUT_SECS"],
            flag: None,
        },
        Field {
            key: "model.id",
            value: config.model.id.clone(),
            env_keys: &["MODEL_ID"],
            flag: Some(("--model-id", overrides.model_id.is_some())),
        },
        Field {
            key: "session.system_prompt",
            value: config.session.system_prompt.clone(),
            env_keys: &["ARCHECK_SYSTEM_PROMPT"],
            flag: None,
        },
        Field {
            key: "session.policy_document",
            value: config
                .session
                .policy_document
                .as_ref()
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "<unset>".to_string()),
            env_keys: &["ARCHECK_POLICY_DOCUMENT"],
            flag: None,
        },
        Field {
            key: "session.history_limit",
            value: config.session.history_limit.to_string(),
            env_keys: &["ARCHECK_HISTORY_LIMIT"],
            flag: None,
        },
        Field {
            key: "batch.test_cases_file",
            value: config.batch.test_cases_file.display().to_string(),
            env_keys: &["TEST_CASES_FILE"],
            flag: None,
        },
        Field {
            key: "logging.level",
            value: config.logging.level.clone(),
            env_keys: &["ARCHECK_LOG_LEVEL"],
            flag: None,
        },
        Field {
            key: "logging.format",
            value: format!("{:?}", config.logging.format).to_ascii_lowercase(),
            env_keys: &["ARCHECK_LOG_FORMAT"],
            flag: None,
        },
    ];

    let mut lines =
        vec!["effective config (source precedence: flag > env > file > default):".to_string()];
    for field in &fields {
        let source =
            field_source(field, config_file_doc.as_ref(), config_file_path.as_deref());
        lines.push(render_line(field.key, &field.value, source));
    }

    CommandResult::text(EXIT_OK, lines.join("\n"))
}

fn detect_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return path.exists().then(|| path.to_path_buf());
    }

    let root = PathBuf::from("archeck.toml");
    if root.exists() {
        return Some(root);
    }

    let nested = PathBuf::from("config/archeck.toml");
    if nested.exists() {
        return Some(nested);
    }

    None
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    field: &Field<'_>,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some((flag, true)) = field.flag {
        return format!("flag ({flag})");
    }

    for env_key in field.env_keys {
        if env::var(env_key).is_ok_and(|value| !value.trim().is_empty()) {
            return format!("env ({env_key})");
        }
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, field.key) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

fn non_empty(value: &str) -> String {
    if value.trim().is_empty() {
        "<unset>".to_string()
    } else {
        value.to_string()
    }
}

fn redact_token(config: &AppConfig) -> String {
    match &config.aws.bearer_token {
        Some(token) if token.expose_secret().trim().is_empty() => "<empty>".to_string(),
        Some(_) => "<redacted>".to_string(),
        None => "<unset>".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use toml::Value;

    use super::contains_path;

    #[test]
    fn nested_keys_are_found_in_the_config_document() {
        let doc: Value = "[guardrail]\nid = \"abc\"\n[aws]\nregion = \"us-west-2\"\n"
            .parse()
            .expect("toml");

        assert!(contains_path(&doc, "guardrail.id"));
        assert!(contains_path(&doc, "aws.region"));
        assert!(!contains_path(&doc, "aws.timeout_secs"));
        assert!(!contains_path(&doc, "model.id"));
    }
}
