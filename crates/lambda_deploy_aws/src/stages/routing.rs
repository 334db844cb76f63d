use clap::Args;
use lambda_deploy_core::config::{ConfigKey, DeploymentConfig};
use lambda_deploy_core::gateway::{
    execute_api_source_arn, invoke_url, lambda_integration_uri, statement_id,
    APIGATEWAY_PRINCIPAL, DEFAULT_API_NAME, DEFAULT_RESOURCE_PATH_PART, DEFAULT_STAGE_NAME,
    INVOKE_ACTION, PROXY_HTTP_METHOD,
};
use lambda_deploy_core::stages::Stage;
use rand::RngCore;
use serde_json::json;

use crate::adapters::function::{FunctionService, PermissionGrant, PermissionOutcome};
use crate::adapters::gateway::{Integration, MethodTarget, ResourceSummary, RestApiGateway};
use crate::error::DeployError;
use crate::logging::log_info;
use crate::stages::StageOutcome;

const COMPONENT: &str = "routing";

#[derive(Debug, Clone, PartialEq, Eq, Args)]
pub struct RoutingOptions {
    /// REST API to reuse or create
    #[arg(long, env = "API_NAME", default_value = DEFAULT_API_NAME)]
    pub api_name: String,
    /// Path part of the proxy resource under `/`
    #[arg(long, default_value = DEFAULT_RESOURCE_PATH_PART)]
    pub resource_path: String,
    /// Deployment stage to publish
    #[arg(long, env = "API_STAGE_NAME", default_value = DEFAULT_STAGE_NAME)]
    pub stage_name: String,
}

impl Default for RoutingOptions {
    fn default() -> Self {
        Self {
            api_name: DEFAULT_API_NAME.to_string(),
            resource_path: DEFAULT_RESOURCE_PATH_PART.to_string(),
            stage_name: DEFAULT_STAGE_NAME.to_string(),
        }
    }
}

/// Wires `ANY /<resource_path>` to the function through a proxy integration,
/// grants API Gateway permission to invoke it and publishes a stage.
pub fn provision_routing(
    gateway: &dyn RestApiGateway,
    functions: &dyn FunctionService,
    config: &mut DeploymentConfig,
    options: &RoutingOptions,
    rng: &mut dyn RngCore,
) -> Result<StageOutcome, DeployError> {
    let function_name = config.require(ConfigKey::LambdaFunctionName)?.to_string();
    let function = functions
        .get_function(&function_name)
        .map_err(|message| DeployError::aws("GetFunction", message))?
        .ok_or_else(|| {
            DeployError::aws(
                "GetFunction",
                format!("function '{function_name}' does not exist"),
            )
        })?;

    let (api, api_created) = match gateway
        .find_rest_api(&options.api_name)
        .map_err(|message| DeployError::aws("GetRestApis", message))?
    {
        Some(api) => (api, false),
        None => {
            let api = gateway
                .create_rest_api(&options.api_name)
                .map_err(|message| DeployError::aws("CreateRestApi", message))?;
            log_info(
                COMPONENT,
                "rest_api_created",
                json!({ "name": api.name.clone(), "api_id": api.id.clone() }),
            );
            (api, true)
        }
    };
    config.api_id = Some(api.id.clone());

    let (resource, resource_created) = ensure_resource(gateway, &api.id, &options.resource_path)?;
    config.api_resource_id = Some(resource.id.clone());

    let target = MethodTarget {
        api_id: &api.id,
        resource_id: &resource.id,
        http_method: PROXY_HTTP_METHOD,
    };
    let method = gateway
        .put_method(target)
        .map_err(|message| DeployError::aws("PutMethod", message))?;
    let integration_uri = lambda_integration_uri(&config.aws_region, &function.arn);
    gateway
        .put_integration(
            target,
            &Integration::LambdaProxy {
                uri: integration_uri.clone(),
            },
        )
        .map_err(|message| DeployError::aws("PutIntegration", message))?;

    let grant = PermissionGrant {
        statement_id: statement_id(rng),
        action: INVOKE_ACTION.to_string(),
        principal: APIGATEWAY_PRINCIPAL.to_string(),
        source_arn: execute_api_source_arn(&config.aws_region, &config.aws_account_id, &api.id),
    };
    let permission = functions
        .add_permission(&function_name, &grant)
        .map_err(|message| DeployError::aws("AddPermission", message))?;

    let deployment_id = gateway
        .create_deployment(&api.id, &options.stage_name)
        .map_err(|message| DeployError::aws("CreateDeployment", message))?;
    config.api_stage_name = Some(options.stage_name.clone());

    let url = invoke_url(&api.id, &config.aws_region, &options.stage_name);
    log_info(
        COMPONENT,
        "stage_deployed",
        json!({ "api_id": api.id.clone(), "deployment_id": deployment_id.clone(), "invoke_url": url.clone() }),
    );

    Ok(StageOutcome::new(
        Stage::Routing,
        format!("{url} -> {function_name}"),
        json!({
            "api_id": api.id,
            "api_created": api_created,
            "resource_id": resource.id,
            "resource_path": resource.path,
            "resource_created": resource_created,
            "method": method.as_str(),
            "integration_uri": integration_uri,
            "statement_id": grant.statement_id,
            "permission": match permission {
                PermissionOutcome::Added => "added",
                PermissionOutcome::AlreadyExists => "already_exists",
            },
            "deployment_id": deployment_id,
            "stage": options.stage_name.clone(),
            "invoke_url": url,
        }),
    ))
}

fn ensure_resource(
    gateway: &dyn RestApiGateway,
    api_id: &str,
    path_part: &str,
) -> Result<(ResourceSummary, bool), DeployError> {
    let resources = gateway
        .list_resources(api_id)
        .map_err(|message| DeployError::aws("GetResources", message))?;
    let root = resources
        .iter()
        .find(|resource| resource.path == "/")
        .ok_or_else(|| {
            DeployError::aws("GetResources", format!("REST API '{api_id}' has no root resource"))
        })?;

    if let Some(existing) = resources.iter().find(|resource| {
        resource.parent_id.as_deref() == Some(root.id.as_str())
            && resource.path_part.as_deref() == Some(path_part)
    }) {
        return Ok((existing.clone(), false));
    }

    let created = gateway
        .create_resource(api_id, &root.id, path_part)
        .map_err(|message| DeployError::aws("CreateResource", message))?;
    log_info(
        COMPONENT,
        "resource_created",
        json!({ "api_id": api_id, "resource_id": created.id.clone(), "path": created.path.clone() }),
    );
    Ok((created, true))
}
