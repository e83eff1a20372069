use archeck_agent::DocumentExtractor;
use archeck_bedrock::client::parse_endpoint;
use archeck_core::config::AppConfig;
use archeck_core::{LoadOptions, TestSuite};
use serde::Serialize;

use crate::commands::{CommandResult, EXIT_CONFIG, EXIT_OK};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Warn,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

const CHECKS_AFTER_CONFIG: [&str; 4] =
    ["credentials", "service_endpoints", "policy_document", "test_cases_file"];

pub fn run(options: LoadOptions, json_output: bool) -> CommandResult {
    let report = build_report(options);
    let exit_code = if report.overall_status == CheckStatus::Fail { EXIT_CONFIG } else { EXIT_OK };

    if json_output {
        let output = serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        });
        return CommandResult::text(exit_code, output);
    }

    CommandResult::text(exit_code, render_human(&report))
}

fn build_report(options: LoadOptions) -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(options) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: format!(
                    "configuration loaded; guardrail `{}` version `{}`",
                    config.guardrail.id, config.guardrail.version
                ),
            });
            checks.push(check_credentials(&config));
            checks.push(check_endpoints(&config));
            checks.push(check_policy_document(&config));
            checks.push(check_test_cases(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            for name in CHECKS_AFTER_CONFIG {
                checks.push(DoctorCheck {
                    name,
                    status: CheckStatus::Skipped,
                    details: "skipped because configuration did not load".to_string(),
                });
            }
        }
    }

    let failed = checks.iter().any(|check| check.status == CheckStatus::Fail);
    let overall_status = if failed { CheckStatus::Fail } else { CheckStatus::Pass };
    let summary = if failed {
        "doctor: one or more readiness checks failed".to_string()
    } else {
        "doctor: all readiness checks passed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

/// Environment variables that point the default credential chain at a concrete source.
const CREDENTIAL_SOURCES: [&str; 4] = [
    "AWS_ACCESS_KEY_ID",
    "AWS_PROFILE",
    "AWS_WEB_IDENTITY_TOKEN_FILE",
    "AWS_CONTAINER_CREDENTIALS_FULL_URI",
];

fn check_credentials(config: &AppConfig) -> DoctorCheck {
    if config.has_bearer_token() {
        return DoctorCheck {
            name: "credentials",
            status: CheckStatus::Pass,
            details: "AWS_BEARER_TOKEN_BEDROCK is set".to_string(),
        };
    }

    let configured: Vec<&str> = CREDENTIAL_SOURCES
        .into_iter()
        .filter(|name| std::env::var(name).is_ok_and(|value| !value.trim().is_empty()))
        .collect();
    if configured.is_empty() {
        DoctorCheck {
            name: "credentials",
            status: CheckStatus::Warn,
            details: "no bearer token or credential variables; the default chain will try shared config, SSO and instance metadata"
                .to_string(),
        }
    } else {
        DoctorCheck {
            name: "credentials",
            status: CheckStatus::Pass,
            details: format!("default credential chain via {}", configured.join(", ")),
        }
    }
}

fn check_endpoints(config: &AppConfig) -> DoctorCheck {
    let endpoints = [config.runtime_endpoint(), config.control_endpoint(), config.openai_base_url()];
    for endpoint in &endpoints {
        if let Err(error) = parse_endpoint(endpoint) {
            return DoctorCheck { name: "service_endpoints", status: CheckStatus::Fail, details: error.to_string() };
        }
    }
    DoctorCheck {
        name: "service_endpoints",
        status: CheckStatus::Pass,
        details: endpoints.join(", "),
    }
}

fn check_policy_document(config: &AppConfig) -> DoctorCheck {
    let Some(path) = &config.session.policy_document else {
        return DoctorCheck {
            name: "policy_document",
            status: CheckStatus::Skipped,
            details: "no policy document configured; the bare system prompt is used".to_string(),
        };
    };

    if !path.exists() {
        return DoctorCheck {
            name: "policy_document",
            status: CheckStatus::Warn,
            details: format!("`{}` does not exist; chat turns will fail until it does", path.display()),
        };
    }

    let is_pdf = path
        .extension()
        .and_then(|extension| extension.to_str())
        .is_some_and(|extension| extension.eq_ignore_ascii_case("pdf"));
    if is_pdf && !DocumentExtractor::detect().pdf_supported() {
        return DoctorCheck {
            name: "policy_document",
            status: CheckStatus::Fail,
            details: format!("`{}` is a PDF but pdftotext was not found in PATH", path.display()),
        };
    }

    DoctorCheck {
        name: "policy_document",
        status: CheckStatus::Pass,
        details: format!("`{}` is readable", path.display()),
    }
}

fn check_test_cases(config: &AppConfig) -> DoctorCheck {
    let path = &config.batch.test_cases_file;
    if !path.exists() {
        return DoctorCheck {
            name: "test_cases_file",
            status: CheckStatus::Skipped,
            details: format!("`{}` not found; only needed by `archeck test`", path.display()),
        };
    }

    match TestSuite::load(path) {
        Ok(suite) => DoctorCheck {
            name: "test_cases_file",
            status: CheckStatus::Pass,
            details: format!("{} test cases in `{}`", suite.test_cases.len(), path.display()),
        },
        Err(error) => {
            DoctorCheck { name: "test_cases_file", status: CheckStatus::Fail, details: error.to_string() }
        }
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Warn => "warn",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
