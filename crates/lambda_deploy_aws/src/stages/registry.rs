use lambda_deploy_core::config::DeploymentConfig;
use lambda_deploy_core::stages::Stage;
use serde_json::json;

use crate::adapters::registry::{ContainerRegistry, RepositoryCreation, RepositoryInfo};
use crate::error::DeployError;
use crate::logging::log_info;
use crate::stages::StageOutcome;

const COMPONENT: &str = "registry";

/// Ensures the repository exists and records its URI. An existing repository
/// is only read, never reconfigured.
pub fn provision_registry(
    registry: &dyn ContainerRegistry,
    config: &mut DeploymentConfig,
) -> Result<StageOutcome, DeployError> {
    let name = config.ecr_repo_name.clone();

    let (repository, created) = match registry
        .describe_repository(&name)
        .map_err(|message| DeployError::aws("DescribeRepositories", message))?
    {
        Some(existing) => {
            log_info(
                COMPONENT,
                "repository_found",
                json!({ "repository": name.clone(), "uri": existing.uri.clone() }),
            );
            (existing, false)
        }
        None => create_repository(registry, &name)?,
    };

    config.ecr_uri = Some(repository.uri.clone());

    Ok(StageOutcome::new(
        Stage::Registry,
        if created {
            format!("created {}", repository.uri)
        } else {
            format!("using existing {}", repository.uri)
        },
        json!({
            "repository": repository.name,
            "uri": repository.uri,
            "created": created,
            "scan_on_push": repository.scan_on_push,
        }),
    ))
}

fn create_repository(
    registry: &dyn ContainerRegistry,
    name: &str,
) -> Result<(RepositoryInfo, bool), DeployError> {
    match registry
        .create_repository(name, true)
        .map_err(|message| DeployError::aws("CreateRepository", message))?
    {
        RepositoryCreation::Created(repository) => {
            log_info(
                COMPONENT,
                "repository_created",
                json!({ "repository": name, "uri": repository.uri.clone() }),
            );
            Ok((repository, true))
        }
        RepositoryCreation::AlreadyExists => {
            log_info(
                COMPONENT,
                "repository_created_concurrently",
                json!({ "repository": name }),
            );
            let repository = registry
                .describe_repository(name)
                .map_err(|message| DeployError::aws("DescribeRepositories", message))?
                .ok_or_else(|| {
                    DeployError::aws(
                        "DescribeRepositories",
                        format!("repository '{name}' reported as existing but not found"),
                    )
                })?;
            Ok((repository, false))
        }
    }
}
