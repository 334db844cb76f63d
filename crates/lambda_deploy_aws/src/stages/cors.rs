use clap::Args;
use lambda_deploy_core::config::{ConfigKey, DeploymentConfig};
use lambda_deploy_core::gateway::{
    check_preflight_response, invoke_url, CORS_HEADERS, CORS_MOCK_REQUEST_TEMPLATE,
    CORS_STATUS_CODE, DEFAULT_PREFLIGHT_PATH, PREFLIGHT_HTTP_METHOD,
};
use lambda_deploy_core::stages::Stage;
use serde_json::json;

use crate::adapters::gateway::{Integration, MethodTarget, RestApiGateway};
use crate::adapters::http::{HttpProbe, HttpRequest};
use crate::error::DeployError;
use crate::logging::{log_info, log_warn};
use crate::stages::StageOutcome;

const COMPONENT: &str = "cors";
const PREFLIGHT_ORIGIN: &str = "https://example.com";

#[derive(Debug, Clone, PartialEq, Eq, Args)]
pub struct CorsOptions {
    /// REST API to patch instead of API_ID from the config
    #[arg(long)]
    pub api_id: Option<String>,
    /// Resource to patch instead of API_RESOURCE_ID from the config
    #[arg(long)]
    pub resource_id: Option<String>,
    /// Send a preflight request after redeploying
    #[arg(long)]
    pub verify: bool,
    /// Path (below the stage) used for the preflight request
    #[arg(long, default_value = DEFAULT_PREFLIGHT_PATH)]
    pub preflight_path: String,
}

impl Default for CorsOptions {
    fn default() -> Self {
        Self {
            api_id: None,
            resource_id: None,
            verify: false,
            preflight_path: DEFAULT_PREFLIGHT_PATH.to_string(),
        }
    }
}

impl CorsOptions {
    /// Writes the override identifiers into the config so precondition checks
    /// and the patch both see the same target.
    pub fn apply_overrides(&self, config: &mut DeploymentConfig) {
        if let Some(api_id) = &self.api_id {
            config.api_id = Some(api_id.clone());
        }
        if let Some(resource_id) = &self.resource_id {
            config.api_resource_id = Some(resource_id.clone());
        }
    }
}

/// Adds an `OPTIONS` mock answering with the CORS headers, then redeploys.
pub fn patch_cors(
    gateway: &dyn RestApiGateway,
    http: &dyn HttpProbe,
    config: &DeploymentConfig,
    options: &CorsOptions,
) -> Result<StageOutcome, DeployError> {
    let api_id = options
        .api_id
        .as_deref()
        .map(Ok)
        .unwrap_or_else(|| config.require(ConfigKey::ApiId))?;
    let resource_id = options
        .resource_id
        .as_deref()
        .map(Ok)
        .unwrap_or_else(|| config.require(ConfigKey::ApiResourceId))?;
    let stage_name = config.require(ConfigKey::ApiStageName)?;

    let target = MethodTarget {
        api_id,
        resource_id,
        http_method: PREFLIGHT_HTTP_METHOD,
    };
    let method = gateway
        .put_method(target)
        .map_err(|message| DeployError::aws("PutMethod", message))?;
    gateway
        .put_integration(
            target,
            &Integration::Mock {
                request_template: CORS_MOCK_REQUEST_TEMPLATE.to_string(),
            },
        )
        .map_err(|message| DeployError::aws("PutIntegration", message))?;

    let parameters: Vec<String> = CORS_HEADERS
        .iter()
        .map(|header| header.method_response_parameter())
        .collect();
    let method_response = gateway
        .put_method_response(target, CORS_STATUS_CODE, &parameters)
        .map_err(|message| DeployError::aws("PutMethodResponse", message))?;

    let mappings: Vec<(String, String)> = CORS_HEADERS
        .iter()
        .map(|header| {
            (
                header.method_response_parameter(),
                header.integration_response_value(),
            )
        })
        .collect();
    gateway
        .put_integration_response(target, CORS_STATUS_CODE, &mappings)
        .map_err(|message| DeployError::aws("PutIntegrationResponse", message))?;

    let deployment_id = gateway
        .create_deployment(api_id, stage_name)
        .map_err(|message| DeployError::aws("CreateDeployment", message))?;
    log_info(
        COMPONENT,
        "cors_deployed",
        json!({ "api_id": api_id, "resource_id": resource_id, "deployment_id": deployment_id.clone() }),
    );

    let url = invoke_url(api_id, &config.aws_region, stage_name);
    let verified = if options.verify {
        verify_preflight(http, &url, &options.preflight_path)?;
        true
    } else {
        false
    };

    Ok(StageOutcome::new(
        Stage::Cors,
        format!("CORS enabled on {api_id}/{resource_id}"),
        json!({
            "api_id": api_id,
            "resource_id": resource_id,
            "method": method.as_str(),
            "method_response": method_response.as_str(),
            "headers": mappings
                .iter()
                .map(|(name, value)| json!({ "parameter": name, "value": value }))
                .collect::<Vec<_>>(),
            "deployment_id": deployment_id,
            "invoke_url": url,
            "verified": verified,
        }),
    ))
}

fn verify_preflight(http: &dyn HttpProbe, base_url: &str, path: &str) -> Result<(), DeployError> {
    let url = format!("{}/{}", base_url.trim_end_matches('/'), path.trim_start_matches('/'));
    let request = HttpRequest::new(PREFLIGHT_HTTP_METHOD, url.clone())
        .header("Origin", PREFLIGHT_ORIGIN)
        .header("Access-Control-Request-Method", "POST")
        .header("Access-Control-Request-Headers", "Content-Type");
    let response = http
        .send(&request)
        .map_err(|message| DeployError::verification(format!("preflight to {url}: {message}")))?;

    check_preflight_response(response.status, &response.headers).map_err(|message| {
        log_warn(
            COMPONENT,
            "preflight_rejected",
            json!({ "url": url.clone(), "status": response.status, "reason": message.clone() }),
        );
        DeployError::verification(message)
    })?;
    log_info(COMPONENT, "preflight_verified", json!({ "url": url }));
    Ok(())
}
