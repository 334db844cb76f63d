use std::path::PathBuf;

use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use lambda_deploy_core::config::{DeploymentConfig, DEFAULT_ENV_FILE};
use lambda_deploy_core::stages::Stage;
use serde_json::{json, Value};

use crate::adapters::tools::CommandToolProbe;
use crate::clients::apigateway::ApiGatewayClient;
use crate::clients::docker::DockerCli;
use crate::clients::ecr::EcrRegistry;
use crate::clients::http::ReqwestProbe;
use crate::clients::lambda::LambdaFunctions;
use crate::clients::load_sdk_config;
use crate::clients::logs::CloudWatchLogSource;
use crate::clients::sts::StsIdentityResolver;
use crate::error::DeployError;
use crate::pipeline::{fetch_recent_logs, DeploymentSession, PipelineOptions, Services};
use crate::stages::cors::CorsOptions;
use crate::stages::function::FunctionOptions;
use crate::stages::identity::IdentityOptions;
use crate::stages::push::PushOptions;
use crate::stages::routing::RoutingOptions;
use crate::stages::smoke::SmokeOptions;

#[derive(Debug, Parser)]
#[command(name = "deploy")]
#[command(about = "Ship the movie revenue predictor to Lambda behind API Gateway")]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, PartialEq, Eq, Args)]
pub struct GlobalArgs {
    /// Env file holding the deployment config record
    #[arg(long, global = true, env = "DEPLOY_ENV_FILE", default_value = DEFAULT_ENV_FILE)]
    pub env_file: PathBuf,
    /// Send every AWS call to this endpoint (LocalStack and similar)
    #[arg(long, global = true, env = "AWS_ENDPOINT_URL")]
    pub endpoint_url: Option<String>,
    /// Run even if earlier stages are not recorded as complete
    #[arg(long, global = true)]
    pub force: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Check that docker (required), aws and python3 are installed
    Preflight,
    /// Resolve the AWS account and region and write the env file
    Identity(IdentityOptions),
    /// Find or create the ECR repository
    Registry,
    /// Build, tag and push the image, then confirm ECR has it
    Push(PushOptions),
    /// Point the Lambda function at the pushed image
    Function(FunctionOptions),
    /// Wire API Gateway to the function and publish a stage
    Routing(RoutingOptions),
    /// Add CORS preflight handling to the proxy resource
    Cors(CorsOptions),
    /// Call the deployed service and check its answer
    Invoke(SmokeOptions),
    /// Print recent function log events
    Logs(LogsArgs),
    /// Show the config record and stage readiness
    Status,
    /// Run a range of stages in order
    Run(RunArgs),
}

#[derive(Debug, Clone, PartialEq, Eq, Args)]
pub struct LogsArgs {
    #[arg(long, default_value_t = 15)]
    pub since_minutes: i64,
    #[arg(long, default_value_t = 100)]
    pub limit: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Args)]
pub struct RunArgs {
    #[arg(long, value_parser = parse_stage, default_value = "preflight")]
    pub from: Stage,
    #[arg(long, value_parser = parse_stage, default_value = "smoke")]
    pub to: Stage,
    #[command(flatten)]
    pub identity: IdentityOptions,
    #[command(flatten)]
    pub push: PushOptions,
    #[command(flatten)]
    pub function: FunctionOptions,
    #[command(flatten)]
    pub routing: RoutingOptions,
    #[command(flatten)]
    pub cors: CorsOptions,
    #[command(flatten)]
    pub smoke: SmokeOptions,
}

fn parse_stage(value: &str) -> Result<Stage, String> {
    Stage::parse(value).ok_or_else(|| {
        let names: Vec<&str> = Stage::ALL.iter().map(|stage| stage.as_str()).collect();
        format!("unknown stage '{value}', expected one of {}", names.join(", "))
    })
}

/// What a command does once its arguments are parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Stages {
        from: Stage,
        to: Stage,
        options: Box<PipelineOptions>,
    },
    Logs(LogsArgs),
    Status,
}

impl Command {
    pub fn into_action(self) -> Action {
        let single = |stage: Stage, options: PipelineOptions| Action::Stages {
            from: stage,
            to: stage,
            options: Box::new(options),
        };
        match self {
            Self::Preflight => single(Stage::Preflight, PipelineOptions::default()),
            Self::Identity(identity) => single(
                Stage::Identity,
                PipelineOptions {
                    identity,
                    ..PipelineOptions::default()
                },
            ),
            Self::Registry => single(Stage::Registry, PipelineOptions::default()),
            Self::Push(push) => single(
                Stage::Push,
                PipelineOptions {
                    push,
                    ..PipelineOptions::default()
                },
            ),
            Self::Function(function) => single(
                Stage::Function,
                PipelineOptions {
                    function,
                    ..PipelineOptions::default()
                },
            ),
            Self::Routing(routing) => single(
                Stage::Routing,
                PipelineOptions {
                    routing,
                    ..PipelineOptions::default()
                },
            ),
            Self::Cors(cors) => single(
                Stage::Cors,
                PipelineOptions {
                    cors,
                    ..PipelineOptions::default()
                },
            ),
            Self::Invoke(smoke) => single(
                Stage::Smoke,
                PipelineOptions {
                    smoke,
                    ..PipelineOptions::default()
                },
            ),
            Self::Logs(args) => Action::Logs(args),
            Self::Status => Action::Status,
            Self::Run(run) => Action::Stages {
                from: run.from,
                to: run.to,
                options: Box::new(PipelineOptions {
                    identity: run.identity,
                    push: run.push,
                    function: run.function,
                    routing: run.routing,
                    cors: run.cors,
                    smoke: run.smoke,
                }),
            },
        }
    }
}

struct AwsServices {
    tools: CommandToolProbe,
    identity: StsIdentityResolver,
    registry: EcrRegistry,
    engine: DockerCli,
    functions: LambdaFunctions,
    gateway: ApiGatewayClient,
    http: ReqwestProbe,
}

impl AwsServices {
    async fn load(endpoint_url: Option<&str>) -> Result<Self, DeployError> {
        let sdk_config = load_sdk_config(endpoint_url).await;
        Ok(Self {
            tools: CommandToolProbe,
            identity: StsIdentityResolver::new(&sdk_config),
            registry: EcrRegistry::new(&sdk_config),
            engine: DockerCli::default(),
            functions: LambdaFunctions::new(&sdk_config),
            gateway: ApiGatewayClient::new(&sdk_config),
            http: ReqwestProbe::new().map_err(DeployError::verification)?,
        })
    }

    fn services(&self) -> Services<'_> {
        Services {
            tools: &self.tools,
            identity: &self.identity,
            registry: &self.registry,
            engine: &self.engine,
            functions: &self.functions,
            gateway: &self.gateway,
            http: &self.http,
        }
    }
}

fn recorded_config(session: &DeploymentSession) -> Result<&DeploymentConfig, DeployError> {
    session.config().ok_or_else(|| DeployError::NoRecord {
        env_file: session.env_path().to_path_buf(),
    })
}

/// Executes a parsed command and returns the report printed on stdout.
pub async fn run(cli: Cli) -> Result<Value, DeployError> {
    let global = cli.global;
    let mut session = DeploymentSession::open(&global.env_file, !global.force)?;

    match cli.command.into_action() {
        Action::Status => Ok(session.status()),
        Action::Logs(args) => {
            let config = recorded_config(&session)?;
            let sdk_config = load_sdk_config(global.endpoint_url.as_deref()).await;
            let events = fetch_recent_logs(
                &CloudWatchLogSource::new(&sdk_config),
                config,
                args.since_minutes,
                args.limit,
                Utc::now(),
            )?;
            Ok(json!(events
                .iter()
                .map(|event| json!({
                    "timestamp": event.timestamp.to_rfc3339(),
                    "message": event.message,
                }))
                .collect::<Vec<_>>()))
        }
        Action::Stages { from, to, options } => {
            let aws = AwsServices::load(global.endpoint_url.as_deref()).await?;
            let mut rng = rand::thread_rng();
            let outcomes = session.run_plan(from, to, aws.services(), &options, &mut rng)?;
            if let [single] = outcomes.as_slice() {
                Ok(json!(single))
            } else {
                Ok(json!(outcomes))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::stages::smoke::{InvocationMode, SmokeEndpoint};

    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).expect("arguments should parse")
    }

    #[test]
    fn logs_without_a_record_is_a_precondition_failure() {
        let dir = tempfile::tempdir().expect("tempdir");
        let env_file = dir.path().join(".env");
        let session = DeploymentSession::open(&env_file, true).expect("session");

        let error = recorded_config(&session).expect_err("nothing was recorded");

        assert_eq!(error, DeployError::NoRecord { env_file });
        assert_eq!(error.kind(), "precondition");
        assert_eq!(error.exit_code(), 2);
        assert!(error.to_string().contains("deploy identity"));
    }

    #[test]
    fn single_stage_commands_plan_one_stage() {
        let action = parse(&["deploy", "registry"]).command.into_action();
        match action {
            Action::Stages { from, to, .. } => {
                assert_eq!(from, Stage::Registry);
                assert_eq!(to, Stage::Registry);
            }
            other => panic!("unexpected action {other:?}"),
        }
    }

    #[test]
    fn run_accepts_stage_range_and_stage_flags() {
        let cli = parse(&[
            "deploy",
            "--force",
            "run",
            "--from",
            "push",
            "--to",
            "cors",
            "--memory-mb",
            "2048",
            "--verify",
        ]);
        assert!(cli.global.force);
        match cli.command.into_action() {
            Action::Stages { from, to, options } => {
                assert_eq!(from, Stage::Push);
                assert_eq!(to, Stage::Cors);
                assert_eq!(options.function.memory_mb, Some(2048));
                assert!(options.cors.verify);
            }
            other => panic!("unexpected action {other:?}"),
        }
    }

    #[test]
    fn invoke_parses_mode_and_endpoint() {
        let cli = parse(&["deploy", "invoke", "--via", "http", "--endpoint", "health"]);
        match cli.command {
            Command::Invoke(options) => {
                assert_eq!(options.via, InvocationMode::Http);
                assert_eq!(options.endpoint, SmokeEndpoint::Health);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn unknown_stage_is_rejected() {
        let error = Cli::try_parse_from(["deploy", "run", "--from", "deploy"])
            .expect_err("stage name is invalid");
        assert!(error.to_string().contains("unknown stage"));
    }

    #[test]
    fn cors_overrides_are_optional() {
        let cli = parse(&["deploy", "cors", "--api-id", "a1b2c3"]);
        match cli.command {
            Command::Cors(options) => {
                assert_eq!(options.api_id.as_deref(), Some("a1b2c3"));
                assert_eq!(options.resource_id, None);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
