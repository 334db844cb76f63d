use clap::{Args, ValueEnum};
use lambda_deploy_core::config::{ConfigKey, DeploymentConfig};
use lambda_deploy_core::gateway::{invoke_url, DEFAULT_STAGE_NAME, JSON_CONTENT_TYPE};
use lambda_deploy_core::invocation::{
    check_health, check_prediction, default_predict_payload, proxy_event,
    validate_predict_payload, Endpoint, ProxyResponse, PredictionSummary, KNOWN_CATEGORIES,
};
use lambda_deploy_core::stages::Stage;
use serde_json::{json, Value};

use crate::adapters::function::FunctionService;
use crate::adapters::http::{HttpProbe, HttpRequest};
use crate::error::DeployError;
use crate::logging::{log_info, log_warn};
use crate::stages::StageOutcome;

const COMPONENT: &str = "smoke";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum InvocationMode {
    /// Invoke the function directly with a proxy event
    Function,
    /// Call the published API over HTTPS
    Http,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SmokeEndpoint {
    Predict,
    Health,
}

impl From<SmokeEndpoint> for Endpoint {
    fn from(endpoint: SmokeEndpoint) -> Self {
        match endpoint {
            SmokeEndpoint::Predict => Endpoint::Predict,
            SmokeEndpoint::Health => Endpoint::Health,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Args)]
pub struct SmokeOptions {
    #[arg(long, value_enum, default_value_t = InvocationMode::Function)]
    pub via: InvocationMode,
    #[arg(long, value_enum, default_value_t = SmokeEndpoint::Predict)]
    pub endpoint: SmokeEndpoint,
    /// JSON body for `/predict`; defaults to a sample movie
    #[arg(long)]
    pub payload: Option<String>,
}

impl Default for SmokeOptions {
    fn default() -> Self {
        Self {
            via: InvocationMode::Function,
            endpoint: SmokeEndpoint::Predict,
            payload: None,
        }
    }
}

/// Exercises the deployed service once and checks the answer's shape.
pub fn run_smoke_test(
    functions: &dyn FunctionService,
    http: &dyn HttpProbe,
    config: &DeploymentConfig,
    options: &SmokeOptions,
) -> Result<StageOutcome, DeployError> {
    let endpoint = Endpoint::from(options.endpoint);
    let payload = match endpoint {
        Endpoint::Predict => Some(predict_payload(options.payload.as_deref())?),
        Endpoint::Health => None,
    };

    let (status, body, target) = match options.via {
        InvocationMode::Function => invoke_directly(functions, config, endpoint, payload.as_ref())?,
        InvocationMode::Http => call_over_http(http, config, endpoint, payload.as_ref())?,
    };

    let mut detail = json!({
        "via": match options.via {
            InvocationMode::Function => "function",
            InvocationMode::Http => "http",
        },
        "endpoint": endpoint.to_string(),
        "target": target,
        "status": status,
    });

    let summary = match endpoint {
        Endpoint::Health => {
            check_health(status, &body).map_err(DeployError::verification)?;
            "service is healthy".to_string()
        }
        Endpoint::Predict => {
            let prediction = check_prediction(status, &body).map_err(DeployError::verification)?;
            warn_on_unknown_category(&prediction);
            let summary = format!(
                "predicted revenue {:.2} ({})",
                prediction.predicted_revenue, prediction.category
            );
            detail["prediction"] = json!(prediction);
            summary
        }
    };

    log_info(COMPONENT, "smoke_test_passed", detail.clone());
    Ok(StageOutcome::new(Stage::Smoke, summary, detail))
}

fn predict_payload(raw: Option<&str>) -> Result<Value, DeployError> {
    let payload = match raw {
        Some(text) => serde_json::from_str(text).map_err(|error| {
            DeployError::verification(format!("--payload is not valid JSON: {error}"))
        })?,
        None => default_predict_payload(),
    };
    validate_predict_payload(&payload).map_err(DeployError::verification)?;
    Ok(payload)
}

fn invoke_directly(
    functions: &dyn FunctionService,
    config: &DeploymentConfig,
    endpoint: Endpoint,
    payload: Option<&Value>,
) -> Result<(u16, String, String), DeployError> {
    let name = config.require(ConfigKey::LambdaFunctionName)?;
    let stage = config.get(ConfigKey::ApiStageName).unwrap_or(DEFAULT_STAGE_NAME);
    let event = proxy_event(endpoint, payload, stage);

    let output = functions
        .invoke(name, event.to_string().as_bytes())
        .map_err(|message| DeployError::aws("Invoke", message))?;
    if let Some(kind) = output.function_error {
        let payload = String::from_utf8_lossy(&output.payload).into_owned();
        return Err(DeployError::verification(format!(
            "function '{name}' raised {kind}: {payload}"
        )));
    }

    let response = ProxyResponse::decode(&output.payload).map_err(DeployError::verification)?;
    let body = response.body_text().map_err(DeployError::verification)?;
    Ok((response.status_code, body, format!("function:{name}")))
}

fn call_over_http(
    http: &dyn HttpProbe,
    config: &DeploymentConfig,
    endpoint: Endpoint,
    payload: Option<&Value>,
) -> Result<(u16, String, String), DeployError> {
    let api_id = config.require(ConfigKey::ApiId)?;
    let stage = config.require(ConfigKey::ApiStageName)?;
    let url = format!(
        "{}{}",
        invoke_url(api_id, &config.aws_region, stage),
        endpoint.path()
    );

    let mut request = HttpRequest::new(endpoint.http_method(), url.clone())
        .header("Accept", JSON_CONTENT_TYPE);
    if let Some(payload) = payload {
        request = request
            .header("Content-Type", JSON_CONTENT_TYPE)
            .body(payload.to_string());
    }
    let response = http
        .send(&request)
        .map_err(|message| DeployError::verification(format!("request to {url}: {message}")))?;
    Ok((response.status, response.body, url))
}

fn warn_on_unknown_category(prediction: &PredictionSummary) {
    if !prediction.known_category {
        log_warn(
            COMPONENT,
            "unknown_category",
            json!({ "category": prediction.category.clone(), "known": KNOWN_CATEGORIES }),
        );
    }
}
