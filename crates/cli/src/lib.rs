pub mod commands;
pub mod logging;

use std::path::PathBuf;
use std::process::ExitCode;

use archeck_core::{ConfigOverrides, LoadOptions};
use clap::{Args, Parser, Subcommand};

use crate::commands::chat::Via;
use crate::commands::export::ExportArgs;

#[derive(Debug, Parser)]
#[command(
    name = "archeck",
    about = "Automated reasoning guardrail toolkit",
    long_about = "Chat against a policy-checked model, run guardrail test cases, and export automated reasoning policies.",
    after_help = "Examples:\n  archeck chat --via openai\n  archeck test --test 2 --json\n  archeck export --policy-id abc123 --version 1\n  archeck doctor --json"
)]
pub struct Cli {
    #[command(flatten)]
    global: GlobalArgs,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Default, Args)]
pub struct GlobalArgs {
    #[arg(long, global = true, help = "Path to archeck.toml")]
    pub config: Option<PathBuf>,
    #[arg(long, global = true, help = "Guardrail identifier (overrides GUARDRAIL_ID)")]
    pub guardrail_id: Option<String>,
    #[arg(long, global = true, help = "Guardrail version, DRAFT or a number")]
    pub guardrail_version: Option<String>,
    #[arg(long, global = true, help = "AWS region used to derive service endpoints")]
    pub region: Option<String>,
    #[arg(long, global = true, help = "Model identifier (overrides MODEL_ID)")]
    pub model_id: Option<String>,
}

impl GlobalArgs {
    pub fn load_options(&self, require_guardrail: bool) -> LoadOptions {
        LoadOptions {
            config_path: self.config.clone(),
            require_file: self.config.is_some(),
            require_guardrail,
            overrides: ConfigOverrides {
                guardrail_id: self.guardrail_id.clone(),
                guardrail_version: self.guardrail_version.clone(),
                region: self.region.clone(),
                model_id: self.model_id.clone(),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        }
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Start an interactive policy-checked chat session")]
    Chat {
        #[arg(long, value_enum, default_value_t = Via::Converse, help = "Integration style")]
        via: Via,
    },
    #[command(about = "Run guardrail test cases and compare against expected results")]
    Test {
        #[arg(long = "test", value_name = "N", help = "Run only test case N (1-based)")]
        test_number: Option<usize>,
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Export a policy version and generate CloudFormation templates")]
    Export(ExportArgs),
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate configuration, credentials, and local prerequisites")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    let global = cli.global;

    let result = match cli.command {
        Command::Chat { via } => commands::chat::run(global.load_options(true), via),
        Command::Test { test_number, json } => {
            commands::test_cases::run(global.load_options(true), test_number, json)
        }
        Command::Export(args) => commands::export::run(global.load_options(false), args),
        Command::Config => commands::config::run(global.load_options(false)),
        Command::Doctor { json } => commands::doctor::run(global.load_options(true), json),
    };

    if !result.output.is_empty() {
        println!("{}", result.output);
    }
    ExitCode::from(result.exit_code)
}
