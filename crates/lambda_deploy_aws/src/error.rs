use std::fmt;
use std::path::PathBuf;

use lambda_deploy_core::config::ConfigError;
use lambda_deploy_core::ledger::LedgerError;
use lambda_deploy_core::stages::PreconditionError;

pub const CREDENTIALS_GUIDANCE: &str = "configure credentials with `aws configure`, or export AWS_PROFILE / AWS_ACCESS_KEY_ID and AWS_SECRET_ACCESS_KEY, and set AWS_REGION";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeployError {
    MissingTool {
        tool: String,
        remediation: String,
    },
    Credentials {
        message: String,
    },
    Aws {
        operation: &'static str,
        message: String,
    },
    Process {
        program: String,
        message: String,
    },
    Config(ConfigError),
    Ledger(LedgerError),
    Precondition(PreconditionError),
    /// A command that reads the deployment record ran before one was written.
    NoRecord {
        env_file: PathBuf,
    },
    Verification {
        message: String,
    },
    Io {
        path: PathBuf,
        message: String,
    },
}

impl DeployError {
    pub fn aws(operation: &'static str, message: impl Into<String>) -> Self {
        Self::Aws {
            operation,
            message: message.into(),
        }
    }

    pub fn process(program: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Process {
            program: program.into(),
            message: message.into(),
        }
    }

    pub fn verification(message: impl Into<String>) -> Self {
        Self::Verification {
            message: message.into(),
        }
    }

    /// Short machine-readable category used in structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MissingTool { .. } => "missing_tool",
            Self::Credentials { .. } => "credentials",
            Self::Aws { .. } => "aws_api",
            Self::Process { .. } => "process",
            Self::Config(_) => "config",
            Self::Ledger(_) => "ledger",
            Self::Precondition(_) | Self::NoRecord { .. } => "precondition",
            Self::Verification { .. } => "verification",
            Self::Io { .. } => "io",
        }
    }

    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Precondition(_) | Self::NoRecord { .. } | Self::Config(_) => 2,
            _ => 1,
        }
    }
}

impl fmt::Display for DeployError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingTool { tool, remediation } => {
                write!(f, "required tool '{tool}' was not found; {remediation}")
            }
            Self::Credentials { message } => {
                write!(f, "AWS credentials problem: {message}; {CREDENTIALS_GUIDANCE}")
            }
            Self::Aws { operation, message } => write!(f, "{operation} failed: {message}"),
            Self::Process { program, message } => write!(f, "`{program}` failed: {message}"),
            Self::Config(error) => write!(f, "deployment config: {error}"),
            Self::Ledger(error) => write!(f, "{error}"),
            Self::Precondition(error) => write!(f, "{error}"),
            Self::NoRecord { env_file } => write!(
                f,
                "'{}' holds no deployment record; run `deploy identity` first",
                env_file.display()
            ),
            Self::Verification { message } => write!(f, "verification failed: {message}"),
            Self::Io { path, message } => {
                write!(f, "failed to write '{}': {message}", path.display())
            }
        }
    }
}

impl std::error::Error for DeployError {}

impl From<ConfigError> for DeployError {
    fn from(error: ConfigError) -> Self {
        Self::Config(error)
    }
}

impl From<LedgerError> for DeployError {
    fn from(error: LedgerError) -> Self {
        Self::Ledger(error)
    }
}

impl From<PreconditionError> for DeployError {
    fn from(error: PreconditionError) -> Self {
        Self::Precondition(error)
    }
}
