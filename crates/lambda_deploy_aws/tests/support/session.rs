#![allow(dead_code)]

use std::path::{Path, PathBuf};

use lambda_deploy_aws::pipeline::{DeploymentSession, PipelineOptions};
use lambda_deploy_core::config::DeploymentConfig;
use lambda_deploy_core::image::repository_uri;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tempfile::TempDir;

use super::fakes::{ACCOUNT_ID, FUNCTION_NAME, REGION};

pub fn env_path(dir: &TempDir) -> PathBuf {
    dir.path().join(".env")
}

pub fn ledger_path(dir: &TempDir) -> PathBuf {
    dir.path().join(".deploy-state.json")
}

pub fn seeded_rng() -> StdRng {
    StdRng::seed_from_u64(7)
}

/// Options with no waiting between polls and output kept inside `dir`.
pub fn fast_options(dir: &Path) -> PipelineOptions {
    let mut options = PipelineOptions::default();
    options.identity.function_name = Some(FUNCTION_NAME.to_string());
    options.push.info_file = dir.join("deployment-info.txt");
    options.push.verify_attempts = 2;
    options.push.verify_interval_secs = 0;
    options.function.wait_attempts = 5;
    options.function.wait_interval_secs = 0;
    options
}

pub fn base_config() -> DeploymentConfig {
    DeploymentConfig::new(ACCOUNT_ID, REGION, "movie-predictor", "latest")
        .expect("config should validate")
}

/// A record as it looks after routing has run.
pub fn deployed_config() -> DeploymentConfig {
    let mut config = base_config();
    config.ecr_uri = Some(repository_uri(ACCOUNT_ID, REGION, "movie-predictor"));
    config.lambda_function_name = Some(FUNCTION_NAME.to_string());
    config.api_id = Some("api1".to_string());
    config.api_resource_id = Some("res1".to_string());
    config.api_stage_name = Some("prod".to_string());
    config
}

/// Writes `config` and opens a session that skips ledger checks.
pub fn forced_session(dir: &TempDir, config: &DeploymentConfig) -> DeploymentSession {
    config.save(&env_path(dir)).expect("config should save");
    DeploymentSession::open(&env_path(dir), false).expect("session should open")
}
