use std::process::ExitCode;

use clap::Parser;
use lambda_deploy_aws::cli::{run, Cli};
use lambda_deploy_aws::logging::log_error;
use serde_json::json;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(report) => match serde_json::to_string_pretty(&report) {
            Ok(text) => {
                println!("{text}");
                ExitCode::SUCCESS
            }
            Err(error) => {
                log_error("deploy", "report_failed", json!({ "error": error.to_string() }));
                ExitCode::FAILURE
            }
        },
        Err(error) => {
            log_error(
                "deploy",
                "command_failed",
                json!({ "kind": error.kind(), "error": error.to_string() }),
            );
            ExitCode::from(error.exit_code())
        }
    }
}
