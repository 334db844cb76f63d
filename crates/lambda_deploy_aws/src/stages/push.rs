use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use clap::Args;
use lambda_deploy_core::config::{ConfigKey, DeploymentConfig};
use lambda_deploy_core::image::{
    registry_of, render_deployment_info, ImageReference, PushedImage, DEFAULT_INFO_FILE,
    DEFAULT_LOCAL_IMAGE, DEFAULT_PLATFORM,
};
use lambda_deploy_core::ledger::StageLedger;
use lambda_deploy_core::stages::{PreconditionError, Stage};
use serde_json::json;

use crate::adapters::engine::{BuildRequest, ContainerEngine};
use crate::adapters::registry::{ContainerRegistry, ImageDetail};
use crate::error::DeployError;
use crate::logging::{log_info, log_warn};
use crate::stages::StageOutcome;

const COMPONENT: &str = "push";
pub const DEFAULT_VERIFY_ATTEMPTS: u32 = 5;
pub const DEFAULT_VERIFY_INTERVAL_SECS: u64 = 3;

#[derive(Debug, Clone, PartialEq, Eq, Args)]
pub struct PushOptions {
    /// Docker build context
    #[arg(long, default_value = ".")]
    pub context: PathBuf,
    /// Dockerfile path
    #[arg(long, default_value = "Dockerfile")]
    pub dockerfile: PathBuf,
    /// Local image name, built as `<name>:latest`
    #[arg(long, env = "LOCAL_IMAGE_NAME", default_value = DEFAULT_LOCAL_IMAGE)]
    pub local_image: String,
    /// Target platform passed to `docker build`
    #[arg(long, default_value = DEFAULT_PLATFORM)]
    pub platform: String,
    /// How many times to re-describe the image after pushing
    #[arg(long, default_value_t = DEFAULT_VERIFY_ATTEMPTS)]
    pub verify_attempts: u32,
    /// Seconds between verification attempts
    #[arg(long, default_value_t = DEFAULT_VERIFY_INTERVAL_SECS)]
    pub verify_interval_secs: u64,
    /// Human-readable summary written after a verified push
    #[arg(long, default_value = DEFAULT_INFO_FILE)]
    pub info_file: PathBuf,
}

impl Default for PushOptions {
    fn default() -> Self {
        Self {
            context: PathBuf::from("."),
            dockerfile: PathBuf::from("Dockerfile"),
            local_image: DEFAULT_LOCAL_IMAGE.to_string(),
            platform: DEFAULT_PLATFORM.to_string(),
            verify_attempts: DEFAULT_VERIFY_ATTEMPTS,
            verify_interval_secs: DEFAULT_VERIFY_INTERVAL_SECS,
            info_file: PathBuf::from(DEFAULT_INFO_FILE),
        }
    }
}

/// Builds, tags and pushes the image, then confirms the registry has it.
/// Any failing step stops the stage; nothing already pushed is undone.
pub fn build_and_push(
    engine: &dyn ContainerEngine,
    registry: &dyn ContainerRegistry,
    config: &DeploymentConfig,
    ledger: &mut StageLedger,
    options: &PushOptions,
    now: DateTime<Utc>,
) -> Result<StageOutcome, DeployError> {
    let repository_uri = config.get(ConfigKey::EcrUri).ok_or(PreconditionError::MissingKey {
        stage: Stage::Push,
        key: ConfigKey::EcrUri,
    })?;
    let registry_host = registry_of(repository_uri).unwrap_or(repository_uri).to_string();

    let local = ImageReference::local(&options.local_image);
    let remote = ImageReference::new(repository_uri, config.ecr_image_tag.clone());

    log_info(
        COMPONENT,
        "build_started",
        json!({ "image": local.to_string(), "context": options.context.display().to_string() }),
    );
    engine
        .build(&BuildRequest {
            context: options.context.clone(),
            dockerfile: options.dockerfile.clone(),
            image: local.clone(),
            platform: Some(options.platform.clone()).filter(|value| !value.is_empty()),
        })
        .map_err(|message| DeployError::process("docker build", message))?;

    let login = if ledger.login_is_fresh(&registry_host, now) {
        log_info(COMPONENT, "login_reused", json!({ "registry": registry_host.clone() }));
        "reused"
    } else {
        let credentials = registry
            .authorization()
            .map_err(|message| DeployError::aws("GetAuthorizationToken", message))?;
        engine
            .login(&credentials)
            .map_err(|message| DeployError::process("docker login", message))?;
        ledger.record_login(&registry_host, credentials.expires_at);
        log_info(
            COMPONENT,
            "login_refreshed",
            json!({
                "registry": registry_host.clone(),
                "expires_at": credentials.expires_at.to_rfc3339(),
            }),
        );
        "refreshed"
    };

    engine
        .tag(&local, &remote)
        .map_err(|message| DeployError::process("docker tag", message))?;
    engine
        .push(&remote)
        .map_err(|message| DeployError::process("docker push", message))?;
    log_info(COMPONENT, "push_completed", json!({ "image": remote.to_string() }));

    let detail = wait_for_image(registry, config, options)?;
    let pushed = PushedImage {
        reference: remote.clone(),
        digest: detail.digest.clone(),
        pushed_at: detail.pushed_at,
        size_bytes: detail.size_bytes,
    };

    std::fs::write(&options.info_file, render_deployment_info(&pushed, now)).map_err(
        |error| DeployError::Io {
            path: options.info_file.clone(),
            message: error.to_string(),
        },
    )?;

    Ok(StageOutcome::new(
        Stage::Push,
        format!("pushed {remote} ({})", pushed.digest),
        json!({
            "image": remote.to_string(),
            "digest": pushed.digest,
            "pushed_at": pushed.pushed_at.map(|value| value.to_rfc3339()),
            "size_bytes": pushed.size_bytes,
            "login": login,
            "info_file": options.info_file.display().to_string(),
        }),
    ))
}

fn wait_for_image(
    registry: &dyn ContainerRegistry,
    config: &DeploymentConfig,
    options: &PushOptions,
) -> Result<ImageDetail, DeployError> {
    let attempts = options.verify_attempts.max(1);
    for attempt in 1..=attempts {
        let images = registry
            .describe_images(&config.ecr_repo_name, &config.ecr_image_tag)
            .map_err(|message| DeployError::aws("DescribeImages", message))?;
        if let Some(image) = images.into_iter().next() {
            log_info(
                COMPONENT,
                "image_verified",
                json!({ "digest": image.digest.clone(), "attempt": attempt }),
            );
            return Ok(image);
        }
        log_warn(
            COMPONENT,
            "image_not_visible_yet",
            json!({ "attempt": attempt, "attempts": attempts }),
        );
        if attempt < attempts {
            std::thread::sleep(Duration::from_secs(options.verify_interval_secs));
        }
    }
    Err(DeployError::verification(format!(
        "no image tagged '{}' in repository '{}' after {attempts} attempts",
        config.ecr_image_tag, config.ecr_repo_name
    )))
}
