//! Deployment stages, their order and their preconditions.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::{ConfigKey, DeploymentConfig};
use crate::ledger::StageLedger;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Preflight,
    Identity,
    Registry,
    Push,
    Function,
    Routing,
    Cors,
    Smoke,
}

const IDENTITY_KEYS: &[ConfigKey] = &ConfigKey::IDENTITY;

impl Stage {
    pub const ALL: [Stage; 8] = [
        Stage::Preflight,
        Stage::Identity,
        Stage::Registry,
        Stage::Push,
        Stage::Function,
        Stage::Routing,
        Stage::Cors,
        Stage::Smoke,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Preflight => "preflight",
            Self::Identity => "identity",
            Self::Registry => "registry",
            Self::Push => "push",
            Self::Function => "function",
            Self::Routing => "routing",
            Self::Cors => "cors",
            Self::Smoke => "smoke",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        let name = name.trim().to_ascii_lowercase();
        Self::ALL.into_iter().find(|stage| stage.as_str() == name)
    }

    /// Stages whose completion must be recorded before this one may run.
    pub fn requires(self) -> &'static [Stage] {
        match self {
            Self::Preflight | Self::Identity => &[],
            Self::Registry => &[Stage::Identity],
            Self::Push => &[Stage::Registry],
            Self::Function => &[Stage::Push],
            Self::Routing => &[Stage::Function],
            Self::Cors => &[Stage::Routing],
            Self::Smoke => &[Stage::Function],
        }
    }

    /// Configuration keys that must be set before this stage may run.
    pub fn required_keys(self) -> &'static [ConfigKey] {
        match self {
            Self::Preflight | Self::Identity => &[],
            Self::Registry => IDENTITY_KEYS,
            Self::Push => &[
                ConfigKey::AwsAccountId,
                ConfigKey::AwsRegion,
                ConfigKey::EcrRepoName,
                ConfigKey::EcrImageTag,
                ConfigKey::EcrUri,
            ],
            Self::Function => &[
                ConfigKey::EcrImageTag,
                ConfigKey::EcrUri,
                ConfigKey::LambdaFunctionName,
            ],
            Self::Routing => &[
                ConfigKey::AwsAccountId,
                ConfigKey::AwsRegion,
                ConfigKey::LambdaFunctionName,
            ],
            Self::Cors => &[
                ConfigKey::AwsRegion,
                ConfigKey::ApiId,
                ConfigKey::ApiResourceId,
                ConfigKey::ApiStageName,
            ],
            Self::Smoke => &[ConfigKey::AwsRegion, ConfigKey::LambdaFunctionName],
        }
    }

    /// Stages whose recorded completion no longer holds once this one reruns.
    pub fn invalidates(self) -> &'static [Stage] {
        match self {
            Self::Push => &[Stage::Function, Stage::Smoke],
            Self::Function => &[Stage::Smoke],
            Self::Routing => &[Stage::Cors, Stage::Smoke],
            Self::Preflight | Self::Identity | Self::Registry | Self::Cors | Self::Smoke => &[],
        }
    }

    pub fn needs_config(self) -> bool {
        !matches!(self, Self::Preflight | Self::Identity)
    }

    /// Inclusive, ordered run of stages from `from` to `to`.
    pub fn plan(from: Stage, to: Stage) -> Result<Vec<Stage>, PreconditionError> {
        if from > to {
            return Err(PreconditionError::EmptyPlan { from, to });
        }
        Ok(Self::ALL
            .into_iter()
            .filter(|stage| *stage >= from && *stage <= to)
            .collect())
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreconditionError {
    MissingConfig { stage: Stage },
    StageIncomplete { stage: Stage, missing: Stage },
    MissingKey { stage: Stage, key: ConfigKey },
    EmptyPlan { from: Stage, to: Stage },
}

impl fmt::Display for PreconditionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingConfig { stage } => write!(
                f,
                "stage '{stage}' needs the deployment config; run the identity stage first"
            ),
            Self::StageIncomplete { stage, missing } => write!(
                f,
                "stage '{stage}' requires stage '{missing}' to be completed first"
            ),
            Self::MissingKey { stage, key } => {
                write!(f, "stage '{stage}' requires {key} in the deployment config")
            }
            Self::EmptyPlan { from, to } => {
                write!(f, "stage '{from}' comes after stage '{to}'; nothing to run")
            }
        }
    }
}

impl std::error::Error for PreconditionError {}

/// Checks that `stage` may run now. With `enforce_ledger` off, recorded
/// completion of earlier stages is not demanded, but required keys still are.
pub fn check_preconditions(
    stage: Stage,
    config: Option<&DeploymentConfig>,
    ledger: &StageLedger,
    enforce_ledger: bool,
) -> Result<(), PreconditionError> {
    if enforce_ledger {
        if let Some(missing) = stage
            .requires()
            .iter()
            .copied()
            .find(|required| !ledger.is_complete(*required))
        {
            return Err(PreconditionError::StageIncomplete { stage, missing });
        }
    }

    if !stage.needs_config() {
        return Ok(());
    }
    let Some(config) = config else {
        return Err(PreconditionError::MissingConfig { stage });
    };
    if let Some(key) = stage
        .required_keys()
        .iter()
        .copied()
        .find(|key| config.get(*key).is_none())
    {
        return Err(PreconditionError::MissingKey { stage, key });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use serde_json::json;

    use super::*;

    fn config() -> DeploymentConfig {
        DeploymentConfig::new("123456789012", "us-east-1", "movie-predictor", "latest")
            .expect("config should validate")
    }

    #[test]
    fn parse_accepts_names_case_insensitively() {
        assert_eq!(Stage::parse("Push"), Some(Stage::Push));
        assert_eq!(Stage::parse(" cors "), Some(Stage::Cors));
        assert_eq!(Stage::parse("deploy"), None);
    }

    #[test]
    fn plan_is_inclusive_and_ordered() {
        let plan = Stage::plan(Stage::Registry, Stage::Function).expect("plan should pass");
        assert_eq!(plan, vec![Stage::Registry, Stage::Push, Stage::Function]);

        let error = Stage::plan(Stage::Cors, Stage::Identity).expect_err("reversed plan");
        assert_eq!(
            error,
            PreconditionError::EmptyPlan {
                from: Stage::Cors,
                to: Stage::Identity
            }
        );
    }

    #[test]
    fn push_requires_recorded_registry_stage() {
        let mut config = config();
        config.ecr_uri = Some("host/movie-predictor".to_string());
        let ledger = StageLedger::default();

        let error = check_preconditions(Stage::Push, Some(&config), &ledger, true)
            .expect_err("registry has not run");
        assert_eq!(
            error,
            PreconditionError::StageIncomplete {
                stage: Stage::Push,
                missing: Stage::Registry
            }
        );

        check_preconditions(Stage::Push, Some(&config), &ledger, false)
            .expect("ledger checks can be waived");
    }

    #[test]
    fn missing_key_is_reported_even_when_ledger_is_waived() {
        let mut ledger = StageLedger::default();
        ledger.record(Stage::Identity, Utc::now(), json!({}));
        ledger.record(Stage::Registry, Utc::now(), json!({}));

        let error = check_preconditions(Stage::Push, Some(&config()), &ledger, false)
            .expect_err("ECR_URI is not set");
        assert_eq!(
            error,
            PreconditionError::MissingKey {
                stage: Stage::Push,
                key: ConfigKey::EcrUri
            }
        );
    }

    #[test]
    fn identity_runs_without_config() {
        check_preconditions(Stage::Identity, None, &StageLedger::default(), true)
            .expect("identity has no preconditions");
        let error = check_preconditions(Stage::Registry, None, &StageLedger::default(), false)
            .expect_err("registry needs a config");
        assert_eq!(
            error,
            PreconditionError::MissingConfig {
                stage: Stage::Registry
            }
        );
    }
}
