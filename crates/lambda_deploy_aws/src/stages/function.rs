use std::time::Duration;

use clap::Args;
use lambda_deploy_core::config::{ConfigKey, DeploymentConfig};
use lambda_deploy_core::image::ImageReference;
use lambda_deploy_core::stages::Stage;
use serde_json::json;

use crate::adapters::function::{FunctionService, UpdateStatus};
use crate::error::DeployError;
use crate::logging::{log_error, log_info};
use crate::stages::StageOutcome;

const COMPONENT: &str = "function";
pub const DEFAULT_WAIT_ATTEMPTS: u32 = 60;
pub const DEFAULT_WAIT_INTERVAL_SECS: u64 = 2;

#[derive(Debug, Clone, PartialEq, Eq, Args)]
pub struct FunctionOptions {
    /// Memory size to apply after the code update (MB)
    #[arg(long)]
    pub memory_mb: Option<i32>,
    /// Timeout to apply after the code update (seconds)
    #[arg(long)]
    pub timeout_secs: Option<i32>,
    /// Status polls while waiting for an update to finish
    #[arg(long, default_value_t = DEFAULT_WAIT_ATTEMPTS)]
    pub wait_attempts: u32,
    /// Seconds between status polls
    #[arg(long, default_value_t = DEFAULT_WAIT_INTERVAL_SECS)]
    pub wait_interval_secs: u64,
}

impl Default for FunctionOptions {
    fn default() -> Self {
        Self {
            memory_mb: None,
            timeout_secs: None,
            wait_attempts: DEFAULT_WAIT_ATTEMPTS,
            wait_interval_secs: DEFAULT_WAIT_INTERVAL_SECS,
        }
    }
}

/// Points the existing function at the pushed image. The function itself is
/// created in the console; this stage refuses to guess its settings.
pub fn update_function(
    functions: &dyn FunctionService,
    config: &DeploymentConfig,
    options: &FunctionOptions,
) -> Result<StageOutcome, DeployError> {
    let name = config.require(ConfigKey::LambdaFunctionName)?;
    let image = ImageReference::new(
        config.require(ConfigKey::EcrUri)?,
        config.ecr_image_tag.clone(),
    )
    .to_string();

    let info = functions
        .get_function(name)
        .map_err(|message| DeployError::aws("GetFunction", message))?
        .ok_or_else(|| {
            DeployError::aws(
                "GetFunction",
                format!(
                    "function '{name}' does not exist; create it in the Lambda console from container image {image}, then re-run this stage"
                ),
            )
        })?;

    functions
        .update_image(name, &image)
        .map_err(|message| DeployError::aws("UpdateFunctionCode", message))?;
    log_info(
        COMPONENT,
        "code_update_requested",
        json!({ "function": name, "image": image.clone() }),
    );
    wait_for_update(functions, name, "UpdateFunctionCode", options)?;

    let resized = options.memory_mb.is_some() || options.timeout_secs.is_some();
    if resized {
        functions
            .update_sizing(name, options.memory_mb, options.timeout_secs)
            .map_err(|message| DeployError::aws("UpdateFunctionConfiguration", message))?;
        wait_for_update(functions, name, "UpdateFunctionConfiguration", options)?;
    }

    Ok(StageOutcome::new(
        Stage::Function,
        format!("{name} now runs {image}"),
        json!({
            "function": name,
            "arn": info.arn,
            "image": image,
            "previous_image": info.image_uri,
            "memory_mb": options.memory_mb.or(info.memory_mb),
            "timeout_secs": options.timeout_secs.or(info.timeout_secs),
            "resized": resized,
        }),
    ))
}

fn wait_for_update(
    functions: &dyn FunctionService,
    name: &str,
    operation: &'static str,
    options: &FunctionOptions,
) -> Result<(), DeployError> {
    let attempts = options.wait_attempts.max(1);
    for attempt in 1..=attempts {
        match functions
            .update_status(name)
            .map_err(|message| DeployError::aws("GetFunctionConfiguration", message))?
        {
            UpdateStatus::Successful => {
                log_info(
                    COMPONENT,
                    "update_completed",
                    json!({ "function": name, "operation": operation, "attempt": attempt }),
                );
                return Ok(());
            }
            UpdateStatus::Failed(reason) => {
                log_error(
                    COMPONENT,
                    "update_failed",
                    json!({ "function": name, "operation": operation, "reason": reason.clone() }),
                );
                return Err(DeployError::aws(operation, reason));
            }
            UpdateStatus::InProgress => {
                if attempt < attempts {
                    std::thread::sleep(Duration::from_secs(options.wait_interval_secs));
                }
            }
        }
    }
    Err(DeployError::verification(format!(
        "function '{name}' was still updating after {attempts} status checks"
    )))
}
