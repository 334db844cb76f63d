use clap::Args;
use lambda_deploy_core::config::{DeploymentConfig, DEFAULT_IMAGE_TAG, DEFAULT_REPO_NAME};
use lambda_deploy_core::stages::Stage;
use serde_json::json;

use crate::adapters::identity::IdentityResolver;
use crate::error::DeployError;
use crate::logging::{log_error, log_info};
use crate::stages::StageOutcome;

const COMPONENT: &str = "identity";

#[derive(Debug, Clone, PartialEq, Eq, Args)]
pub struct IdentityOptions {
    /// ECR repository that will hold the service image
    #[arg(long, env = "ECR_REPO_NAME", default_value = DEFAULT_REPO_NAME)]
    pub repo_name: String,
    /// Tag pushed to the repository
    #[arg(long, env = "ECR_IMAGE_TAG", default_value = DEFAULT_IMAGE_TAG)]
    pub image_tag: String,
    /// Name of the Lambda function created from the image
    #[arg(long, env = "LAMBDA_FUNCTION_NAME")]
    pub function_name: Option<String>,
}

impl Default for IdentityOptions {
    fn default() -> Self {
        Self {
            repo_name: DEFAULT_REPO_NAME.to_string(),
            image_tag: DEFAULT_IMAGE_TAG.to_string(),
            function_name: None,
        }
    }
}

/// Resolves the caller identity and builds the configuration record that
/// every later stage reads. Nothing is persisted here: on failure the caller
/// has nothing to write, so an existing record is never clobbered.
pub fn resolve_identity(
    resolver: &dyn IdentityResolver,
    existing: Option<&DeploymentConfig>,
    options: &IdentityOptions,
) -> Result<(DeploymentConfig, StageOutcome), DeployError> {
    let identity = resolver.caller_identity().map_err(|message| {
        log_error(
            COMPONENT,
            "caller_identity_failed",
            json!({ "error": message.clone() }),
        );
        DeployError::Credentials { message }
    })?;

    let Some(region) = identity.region.clone().filter(|value| !value.is_empty()) else {
        return Err(DeployError::Credentials {
            message: "no AWS region is configured".to_string(),
        });
    };

    let mut config = DeploymentConfig::new(
        identity.account_id.clone(),
        region,
        options.repo_name.clone(),
        options.image_tag.clone(),
    )?;

    let mut carried_over = false;
    if let Some(existing) = existing {
        config.lambda_function_name = existing.lambda_function_name.clone();
        config.extra = existing.extra.clone();
        let same_target = existing.aws_account_id == config.aws_account_id
            && existing.aws_region == config.aws_region;
        if same_target {
            if existing.ecr_repo_name == config.ecr_repo_name {
                config.ecr_uri = existing.ecr_uri.clone();
            }
            config.api_id = existing.api_id.clone();
            config.api_resource_id = existing.api_resource_id.clone();
            config.api_stage_name = existing.api_stage_name.clone();
            carried_over = true;
        } else {
            config.clear_derived();
        }
    }
    if let Some(function_name) = &options.function_name {
        config.lambda_function_name = Some(function_name.clone());
    }
    config.validate()?;

    log_info(
        COMPONENT,
        "caller_identity_resolved",
        json!({
            "account_id": config.aws_account_id.clone(),
            "region": config.aws_region.clone(),
            "arn": identity.arn.clone(),
            "derived_values_kept": carried_over,
        }),
    );

    let outcome = StageOutcome::new(
        Stage::Identity,
        format!(
            "account {} in {}",
            config.aws_account_id, config.aws_region
        ),
        json!({
            "account_id": config.aws_account_id.clone(),
            "region": config.aws_region.clone(),
            "arn": identity.arn,
            "repository": config.ecr_repo_name.clone(),
            "image_tag": config.ecr_image_tag.clone(),
            "function_name": config.lambda_function_name.clone(),
        }),
    );
    Ok((config, outcome))
}
