use std::process::{exit, Command, ExitStatus};

use clap::{Parser, Subcommand, ValueEnum};

// ── CLI definition ─────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "xtask",
    about = "Task runner for the lambda deploy workspace",
    long_about = "CI checks, release builds and a shortcut for running the\n\
                  `deploy` CLI from the workspace."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run CI checks (fmt, clippy, tests)
    Ci {
        /// Job to run
        #[arg(value_enum, default_value_t = CiJob::All)]
        job: CiJob,
    },
    /// Build the optimized `deploy` binary
    Release,
    /// Run the `deploy` CLI, passing every argument through
    Deploy {
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
}

#[derive(Clone, ValueEnum)]
enum CiJob {
    /// Formatting and clippy
    Check,
    /// Unit and integration tests of both crates
    Test,
    /// Run check + test
    All,
}

// ── helpers ────────────────────────────────────────────────────────

fn step(label: &str) {
    eprintln!("\n=== {label} ===");
}

fn cargo(args: &[&str]) -> ExitStatus {
    eprintln!("+ cargo {}", args.join(" "));
    match Command::new("cargo").args(args).status() {
        Ok(status) => status,
        Err(error) => {
            eprintln!("failed to execute cargo: {error}");
            exit(1);
        }
    }
}

fn run_cargo(args: &[&str]) {
    let status = cargo(args);
    if !status.success() {
        exit(status.code().unwrap_or(1));
    }
}

fn ci_check() {
    step("Check formatting");
    run_cargo(&["fmt", "--all", "--", "--check"]);

    step("Run clippy");
    run_cargo(&[
        "clippy",
        "--workspace",
        "--all-targets",
        "--",
        "-D",
        "warnings",
    ]);
}

fn ci_test() {
    step("Test lambda_deploy_core");
    run_cargo(&["test", "-p", "lambda_deploy_core"]);

    step("Test lambda_deploy_aws");
    run_cargo(&["test", "-p", "lambda_deploy_aws"]);
}

// ── main ───────────────────────────────────────────────────────────

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Ci { job } => {
            match job {
                CiJob::Check => ci_check(),
                CiJob::Test => ci_test(),
                CiJob::All => {
                    ci_check();
                    ci_test();
                }
            }
            eprintln!("\nCI job passed.");
        }
        Commands::Release => {
            step("Build deploy (release)");
            run_cargo(&[
                "build",
                "-p",
                "lambda_deploy_aws",
                "--bin",
                "deploy",
                "--release",
            ]);
            eprintln!("\nBinary: target/release/deploy");
        }
        Commands::Deploy { args } => {
            let mut cargo_args = vec!["run", "-q", "-p", "lambda_deploy_aws", "--bin", "deploy", "--"];
            cargo_args.extend(args.iter().map(String::as_str));
            run_cargo(&cargo_args);
        }
    }
}
