use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use archeck_bedrock::export::{
    export_policy, export_timestamp, format_policy_table, parse_selection, ExportOutcome,
    ExportRequest, SelectionInput, TemplateOptions,
};
use archeck_bedrock::{
    load_sdk_config, BedrockControlClient, ExportError, PolicySelection, PolicyService,
    PolicySummary,
};
use archeck_core::{ApplicationError, LoadOptions};
use clap::Args;
use tracing::info;

use crate::commands::{build_runtime, load_config, CommandResult};
use crate::logging;

#[derive(Debug, Clone, Default, Args)]
pub struct ExportArgs {
    #[arg(long, help = "Full policy ARN, optionally with a version suffix")]
    pub policy_arn: Option<String>,
    #[arg(long, help = "Policy identifier; requires --version")]
    pub policy_id: Option<String>,
    #[arg(long, help = "Policy version to export, DRAFT or a number")]
    pub version: Option<String>,
    #[arg(long, default_value = ".", help = "Directory for the exported files")]
    pub output_dir: PathBuf,
    #[arg(long, help = "Name for the policy resource in the generated template")]
    pub policy_name: Option<String>,
    #[arg(long, help = "Omit resource tags from the generated template")]
    pub no_tags: bool,
}

pub fn run(options: LoadOptions, args: ExportArgs) -> CommandResult {
    let config = match load_config("export", options) {
        Ok(config) => config,
        Err(result) => return result,
    };
    logging::init(&config);

    let selection = match PolicySelection::from_flags(
        args.policy_arn.clone(),
        args.policy_id.clone(),
        args.version.clone(),
    ) {
        Ok(selection) => selection,
        Err(error) => return export_failure(error),
    };

    let runtime = match build_runtime("export") {
        Ok(runtime) => runtime,
        Err(result) => return result,
    };
    let sdk_config = runtime.block_on(load_sdk_config(&config));
    let client =
        BedrockControlClient::from_sdk_config(&sdk_config, config.aws.control_endpoint.as_deref());

    let selection = match selection {
        Some(selection) => selection,
        None => match runtime.block_on(choose_listed_policy(&client)) {
            Ok(Some(summary)) => PolicySelection::Listed(summary),
            Ok(None) => return cancelled(),
            Err(result) => return result,
        },
    };

    let request = ExportRequest {
        output_dir: args.output_dir.clone(),
        template: TemplateOptions { policy_name: args.policy_name.clone(), include_tags: !args.no_tags },
        timestamp: export_timestamp(&chrono::Local::now()),
    };
    match runtime.block_on(export_policy(&client, selection, &request)) {
        Ok(outcome) => CommandResult::success("export", describe(&outcome)),
        Err(error) => export_failure(error),
    }
}

async fn choose_listed_policy(
    service: &dyn PolicyService,
) -> Result<Option<PolicySummary>, CommandResult> {
    let policies = service
        .list_policies()
        .await
        .map_err(|error| export_failure(ExportError::from(error)))?;
    if policies.is_empty() {
        return Err(failure(ApplicationError::ResourceNotFound(
            "no automated reasoning policies found in this account and region".to_string(),
        )));
    }

    let stdin = io::stdin();
    let stdout = io::stdout();
    let mut output = stdout.lock();
    let choice = prompt_for_policy(&policies, stdin.lock(), &mut output)
        .map_err(|error| failure(ApplicationError::Io(error.to_string())))?;
    Ok(choice.map(|index| policies[index].clone()))
}

/// Shows the numbered table and reads lines until a valid choice, `q`, or end of input.
pub fn prompt_for_policy<R, W>(
    policies: &[PolicySummary],
    mut input: R,
    output: &mut W,
) -> io::Result<Option<usize>>
where
    R: BufRead,
    W: Write,
{
    writeln!(output, "\nAvailable Automated Reasoning Policies:\n{}", format_policy_table(policies))?;
    loop {
        write!(output, "Select a policy (1-{}) or 'q' to quit: ", policies.len())?;
        output.flush()?;

        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        match parse_selection(&line, policies.len()) {
            SelectionInput::Cancel => return Ok(None),
            SelectionInput::Choice(index) => return Ok(Some(index)),
            SelectionInput::Invalid(message) => writeln!(output, "{message}")?,
        }
    }
}

fn describe(outcome: &ExportOutcome) -> String {
    let [policy_json, template_json, template_yaml] = outcome.artifacts.paths();
    format!(
        "exported policy `{}` version `{}` as `{}`: {}, {}, {}",
        outcome.policy_id,
        outcome.version,
        outcome.template_name,
        policy_json.display(),
        template_json.display(),
        template_yaml.display()
    )
}

/// Backing out of the interactive picker is a normal exit, not a failure.
fn cancelled() -> CommandResult {
    info!(event_name = "export.cancelled", "policy selection cancelled");
    CommandResult::success("export", "cancelled: no policy was exported")
}

fn export_failure(error: ExportError) -> CommandResult {
    failure(ApplicationError::from(error))
}

fn failure(error: ApplicationError) -> CommandResult {
    CommandResult::from_application_error("export", &error)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use archeck_bedrock::{ExportError, PolicySummary, TransportError};

    use super::{cancelled, export_failure, prompt_for_policy};
    use crate::commands::{EXIT_CONFIG, EXIT_NOT_FOUND, EXIT_OK};

    fn policies() -> Vec<PolicySummary> {
        ["refund-policy", "shipping-policy"]
            .iter()
            .enumerate()
            .map(|(index, name)| PolicySummary {
                policy_arn: format!(
                    "arn:aws:bedrock:us-west-2:123456789012:automated-reasoning-policy/p{index}"
                ),
                policy_id: format!("p{index}"),
                name: Some((*name).to_string()),
                description: None,
                version: Some("DRAFT".to_string()),
                created_at: None,
                updated_at: None,
            })
            .collect()
    }

    #[test]
    fn invalid_entries_reprompt_until_a_choice() {
        let mut output = Vec::new();
        let choice = prompt_for_policy(&policies(), Cursor::new("abc\n7\n2\n"), &mut output)
            .expect("prompt io");

        assert_eq!(choice, Some(1));
        let text = String::from_utf8(output).expect("utf8");
        assert!(text.contains("shipping-policy"));
        assert!(text.contains("please enter a valid number or 'q'"));
        assert!(text.contains("please enter a number between 1 and 2"));
    }

    #[test]
    fn q_and_end_of_input_cancel() {
        let mut output = Vec::new();
        assert_eq!(prompt_for_policy(&policies(), Cursor::new("q\n"), &mut output).expect("io"), None);
        assert_eq!(prompt_for_policy(&policies(), Cursor::new(""), &mut output).expect("io"), None);
    }

    #[test]
    fn cancelled_selection_exits_cleanly() {
        let result = cancelled();
        assert_eq!(result.exit_code, EXIT_OK);

        let payload: serde_json::Value = serde_json::from_str(&result.output).expect("json");
        assert_eq!(payload["status"], "ok");
        assert!(payload["message"].as_str().unwrap_or_default().contains("cancelled"));
    }

    #[test]
    fn export_failures_use_application_classes() {
        let missing = export_failure(ExportError::Transport(TransportError::Service {
            operation: "ExportAutomatedReasoningPolicyVersion",
            code: Some("ResourceNotFoundException".to_string()),
            message: "no such policy".to_string(),
        }));
        assert_eq!(missing.exit_code, EXIT_NOT_FOUND);
        assert!(missing.output.contains("\"error_class\":\"resource_not_found\""));

        let bad_flags = export_failure(ExportError::MissingVersion);
        assert_eq!(bad_flags.exit_code, EXIT_CONFIG);
        assert!(bad_flags.output.contains("\"error_class\":\"invalid_input\""));
    }
}
