//! Stage sequencing. A [`DeploymentSession`] owns the configuration record and
//! the stage ledger for one env file, checks preconditions before each stage
//! and persists both after every stage that completes.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use lambda_deploy_core::config::{ConfigError, ConfigKey, DeploymentConfig, EnvFile};
use lambda_deploy_core::ledger::{ledger_path_for, StageLedger};
use lambda_deploy_core::preflight::DEFAULT_TOOLS;
use lambda_deploy_core::stages::{check_preconditions, PreconditionError, Stage};
use rand::RngCore;
use serde_json::{json, Value};

use crate::adapters::engine::ContainerEngine;
use crate::adapters::function::FunctionService;
use crate::adapters::gateway::RestApiGateway;
use crate::adapters::http::HttpProbe;
use crate::adapters::identity::IdentityResolver;
use crate::adapters::logs::{function_log_group, LogEvent, LogSource};
use crate::adapters::registry::ContainerRegistry;
use crate::adapters::tools::ToolProbe;
use crate::error::DeployError;
use crate::logging::{log_error, log_info, log_warn};
use crate::stages::cors::{patch_cors, CorsOptions};
use crate::stages::function::{update_function, FunctionOptions};
use crate::stages::identity::{resolve_identity, IdentityOptions};
use crate::stages::preflight::run_preflight;
use crate::stages::push::{build_and_push, PushOptions};
use crate::stages::registry::provision_registry;
use crate::stages::routing::{provision_routing, RoutingOptions};
use crate::stages::smoke::{run_smoke_test, SmokeOptions};
use crate::stages::StageOutcome;

const COMPONENT: &str = "pipeline";

/// Every external collaborator a stage may need.
#[derive(Clone, Copy)]
pub struct Services<'a> {
    pub tools: &'a dyn ToolProbe,
    pub identity: &'a dyn IdentityResolver,
    pub registry: &'a dyn ContainerRegistry,
    pub engine: &'a dyn ContainerEngine,
    pub functions: &'a dyn FunctionService,
    pub gateway: &'a dyn RestApiGateway,
    pub http: &'a dyn HttpProbe,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineOptions {
    pub identity: IdentityOptions,
    pub push: PushOptions,
    pub function: FunctionOptions,
    pub routing: RoutingOptions,
    pub cors: CorsOptions,
    pub smoke: SmokeOptions,
}

#[derive(Debug)]
pub struct DeploymentSession {
    env_path: PathBuf,
    ledger_path: PathBuf,
    config: Option<DeploymentConfig>,
    /// Unrelated keys of an env file that does not hold a record yet.
    carried_extra: Vec<(String, String)>,
    unbound_reason: Option<ConfigError>,
    ledger: StageLedger,
    enforce_ledger: bool,
}

impl DeploymentSession {
    /// Loads the env file (if any) and its ledger. A ledger recorded for a
    /// different account, region, repository or tag is reset. An env file
    /// without identity keys is not an error here: identity resolution writes
    /// them and keeps the file's other keys.
    pub fn open(env_path: &Path, enforce_ledger: bool) -> Result<Self, DeployError> {
        let (config, carried_extra, unbound_reason) =
            match DeploymentConfig::load_env_file(env_path)? {
                EnvFile::Absent => (None, Vec::new(), None),
                EnvFile::Record(config) => (Some(config), Vec::new(), None),
                EnvFile::Unbound { extra, problem } => {
                    log_warn(
                        COMPONENT,
                        "env_file_unbound",
                        json!({
                            "env_file": env_path.display().to_string(),
                            "reason": problem.to_string(),
                            "kept_keys": extra.iter().map(|(name, _)| name.clone()).collect::<Vec<_>>(),
                        }),
                    );
                    (None, extra, Some(problem))
                }
            };
        let ledger_path = ledger_path_for(env_path);
        let mut ledger = StageLedger::load_or_default(&ledger_path)?;
        if let Some(config) = &config {
            if ledger.bind_config(&config.fingerprint()) {
                log_warn(
                    COMPONENT,
                    "ledger_reset",
                    json!({ "reason": "deployment target changed", "ledger": ledger_path.display().to_string() }),
                );
            }
        }
        Ok(Self {
            env_path: env_path.to_path_buf(),
            ledger_path,
            config,
            carried_extra,
            unbound_reason,
            ledger,
            enforce_ledger,
        })
    }

    pub fn env_path(&self) -> &Path {
        &self.env_path
    }

    pub fn config(&self) -> Option<&DeploymentConfig> {
        self.config.as_ref()
    }

    pub fn ledger(&self) -> &StageLedger {
        &self.ledger
    }

    pub fn check(&self, stage: Stage) -> Result<(), PreconditionError> {
        check_preconditions(stage, self.config.as_ref(), &self.ledger, self.enforce_ledger)
    }

    pub fn run_stage(
        &mut self,
        stage: Stage,
        services: Services<'_>,
        options: &PipelineOptions,
        rng: &mut dyn RngCore,
    ) -> Result<StageOutcome, DeployError> {
        let result = self.dispatch(stage, services, options, rng);
        if let Err(error) = &result {
            log_error(
                stage.as_str(),
                "stage_failed",
                json!({ "kind": error.kind(), "error": error.to_string() }),
            );
        }
        result
    }

    /// Runs `from..=to` in order, stopping at the first failure.
    pub fn run_plan(
        &mut self,
        from: Stage,
        to: Stage,
        services: Services<'_>,
        options: &PipelineOptions,
        rng: &mut dyn RngCore,
    ) -> Result<Vec<StageOutcome>, DeployError> {
        let plan = Stage::plan(from, to)?;
        log_info(
            COMPONENT,
            "plan_started",
            json!({ "stages": plan.iter().map(|stage| stage.as_str()).collect::<Vec<_>>() }),
        );
        let mut outcomes = Vec::with_capacity(plan.len());
        for stage in plan {
            outcomes.push(self.run_stage(stage, services, options, rng)?);
        }
        Ok(outcomes)
    }

    fn dispatch(
        &mut self,
        stage: Stage,
        services: Services<'_>,
        options: &PipelineOptions,
        rng: &mut dyn RngCore,
    ) -> Result<StageOutcome, DeployError> {
        if stage == Stage::Cors {
            let mut target = self.config.clone();
            if let Some(config) = target.as_mut() {
                options.cors.apply_overrides(config);
            }
            check_preconditions(stage, target.as_ref(), &self.ledger, self.enforce_ledger)?;
        } else {
            self.check(stage)?;
        }
        log_info(stage.as_str(), "stage_started", json!({}));

        match stage {
            Stage::Preflight => {
                let outcome = run_preflight(&DEFAULT_TOOLS, services.tools)?;
                self.complete(outcome, None)
            }
            Stage::Identity => {
                let (mut config, outcome) =
                    resolve_identity(services.identity, self.config.as_ref(), &options.identity)?;
                if self.config.is_none() {
                    config.extra = self.carried_extra.clone();
                }
                let outcome = self.complete(outcome, Some(config))?;
                self.carried_extra.clear();
                self.unbound_reason = None;
                Ok(outcome)
            }
            Stage::Registry => {
                let mut config = self.require_config(stage)?.clone();
                let outcome = provision_registry(services.registry, &mut config)?;
                self.complete(outcome, Some(config))
            }
            Stage::Push => {
                let config = self.require_config(stage)?.clone();
                let result = build_and_push(
                    services.engine,
                    services.registry,
                    &config,
                    &mut self.ledger,
                    &options.push,
                    Utc::now(),
                );
                match result {
                    Ok(outcome) => self.complete(outcome, None),
                    Err(error) => {
                        // keep a refreshed registry login even when the push fails
                        self.ledger.save(&self.ledger_path)?;
                        Err(error)
                    }
                }
            }
            Stage::Function => {
                let outcome =
                    update_function(services.functions, self.require_config(stage)?, &options.function)?;
                self.complete(outcome, None)
            }
            Stage::Routing => {
                let mut config = self.require_config(stage)?.clone();
                let outcome = provision_routing(
                    services.gateway,
                    services.functions,
                    &mut config,
                    &options.routing,
                    rng,
                )?;
                self.complete(outcome, Some(config))
            }
            Stage::Cors => {
                let outcome = patch_cors(
                    services.gateway,
                    services.http,
                    self.require_config(stage)?,
                    &options.cors,
                )?;
                self.complete(outcome, None)
            }
            Stage::Smoke => {
                let outcome = run_smoke_test(
                    services.functions,
                    services.http,
                    self.require_config(stage)?,
                    &options.smoke,
                )?;
                self.complete(outcome, None)
            }
        }
    }

    fn require_config(&self, stage: Stage) -> Result<&DeploymentConfig, PreconditionError> {
        self.config
            .as_ref()
            .ok_or(PreconditionError::MissingConfig { stage })
    }

    /// Persists an updated record first, then the ledger entry, so a recorded
    /// stage never refers to values that were not written.
    fn complete(
        &mut self,
        outcome: StageOutcome,
        updated: Option<DeploymentConfig>,
    ) -> Result<StageOutcome, DeployError> {
        if let Some(config) = updated {
            config.save(&self.env_path)?;
            log_info(
                outcome.stage.as_str(),
                "config_saved",
                json!({ "path": self.env_path.display().to_string() }),
            );
            self.config = Some(config);
        }
        if let Some(config) = &self.config {
            self.ledger.bind_config(&config.fingerprint());
        }
        self.ledger
            .record(outcome.stage, Utc::now(), outcome.detail.clone());
        self.ledger.save(&self.ledger_path)?;
        log_info(
            outcome.stage.as_str(),
            "stage_completed",
            json!({ "summary": outcome.summary.clone() }),
        );
        Ok(outcome)
    }

    /// Config, ledger and per-stage readiness as one JSON document.
    pub fn status(&self) -> Value {
        let stages: Vec<Value> = Stage::ALL
            .into_iter()
            .map(|stage| {
                let record = self.ledger.stages.get(&stage);
                let blocked_by = self.check(stage).err().map(|error| error.to_string());
                json!({
                    "stage": stage.as_str(),
                    "complete": record.is_some(),
                    "completed_at": record.map(|record| record.completed_at.to_rfc3339()),
                    "ready": blocked_by.is_none(),
                    "blocked_by": blocked_by,
                })
            })
            .collect();
        json!({
            "env_file": self.env_path.display().to_string(),
            "ledger_file": self.ledger_path.display().to_string(),
            "config": self.config,
            "unbound_reason": self.unbound_reason.as_ref().map(ToString::to_string),
            "registry_login": self.ledger.registry_login,
            "stages": stages,
        })
    }
}

/// Recent events from the function's log group, oldest first.
pub fn fetch_recent_logs(
    source: &dyn LogSource,
    config: &DeploymentConfig,
    since_minutes: i64,
    limit: i32,
    now: DateTime<Utc>,
) -> Result<Vec<LogEvent>, DeployError> {
    let function_name = config.require(ConfigKey::LambdaFunctionName)?;
    let log_group = function_log_group(function_name);
    let since = now - Duration::minutes(since_minutes.max(0));
    let mut events = source
        .recent_events(&log_group, since, limit.max(1))
        .map_err(|message| DeployError::aws("FilterLogEvents", message))?;
    events.sort_by_key(|event| event.timestamp);
    log_info(
        "logs",
        "events_fetched",
        json!({ "log_group": log_group, "count": events.len(), "since": since.to_rfc3339() }),
    );
    Ok(events)
}
