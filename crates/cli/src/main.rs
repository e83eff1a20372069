use std::process::ExitCode;

fn main() -> ExitCode {
    archeck_cli::run()
}
