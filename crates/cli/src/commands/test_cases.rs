use std::sync::Arc;

use archeck_agent::{render_report, BatchError, BatchRunner};
use archeck_bedrock::{load_sdk_config, BedrockRuntimeClient};
use archeck_core::{ApplicationError, LoadOptions, TestSuite, TestSuiteError};

use crate::commands::{build_runtime, load_config, CommandResult, EXIT_FAILURES, EXIT_OK};
use crate::logging;

pub fn run(options: LoadOptions, test_number: Option<usize>, json_output: bool) -> CommandResult {
    let config = match load_config("test", options) {
        Ok(config) => config,
        Err(result) => return result,
    };
    logging::init(&config);

    let suite = match TestSuite::load(&config.batch.test_cases_file) {
        Ok(suite) => suite,
        Err(error) => return suite_failure(error),
    };
    if let Some(number) = test_number {
        if let Err(error) = suite.select(number) {
            return suite_failure(error);
        }
    }

    let runtime = match build_runtime("test") {
        Ok(runtime) => runtime,
        Err(result) => return result,
    };
    let sdk_config = runtime.block_on(load_sdk_config(&config));
    let client =
        BedrockRuntimeClient::from_sdk_config(&sdk_config, config.aws.runtime_endpoint.as_deref());
    let runner = BatchRunner::new(
        Arc::new(client),
        config.guardrail.id.clone(),
        config.guardrail.version.clone(),
    );

    let report = match runtime.block_on(runner.run(&suite, test_number)) {
        Ok(report) => report,
        Err(BatchError::Suite(error)) => return suite_failure(error),
    };
    let exit_code = if report.all_passed() { EXIT_OK } else { EXIT_FAILURES };

    if json_output {
        return match serde_json::to_string_pretty(&report) {
            Ok(output) => CommandResult::text(exit_code, output),
            Err(error) => CommandResult::from_application_error(
                "test",
                &ApplicationError::Serialization(error.to_string()),
            ),
        };
    }

    let scope = match test_number {
        Some(number) => format!("test case {number}"),
        None => format!("{} test cases", suite.test_cases.len()),
    };
    let heading = format!(
        "Running {scope} from {} against guardrail {} (version {})\n",
        config.batch.test_cases_file.display(),
        config.guardrail.id,
        config.guardrail.version
    );
    CommandResult::text(exit_code, format!("{heading}{}", render_report(&report)))
}

fn suite_failure(error: TestSuiteError) -> CommandResult {
    CommandResult::from_application_error("test", &ApplicationError::from(error))
}
