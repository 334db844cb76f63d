//! REST API wiring: integration and permission ARNs, invoke URLs and the CORS
//! header set applied to the proxy resource.

use rand::Rng;

pub const DEFAULT_API_NAME: &str = "movie-predictor-api";
pub const DEFAULT_RESOURCE_PATH_PART: &str = "{proxy+}";
pub const DEFAULT_STAGE_NAME: &str = "prod";
pub const DEFAULT_PREFLIGHT_PATH: &str = "/predict";

pub const PROXY_HTTP_METHOD: &str = "ANY";
pub const PREFLIGHT_HTTP_METHOD: &str = "OPTIONS";
pub const INTEGRATION_HTTP_METHOD: &str = "POST";
pub const AUTHORIZATION_NONE: &str = "NONE";
pub const INVOKE_ACTION: &str = "lambda:InvokeFunction";
pub const APIGATEWAY_PRINCIPAL: &str = "apigateway.amazonaws.com";
pub const STATEMENT_ID_PREFIX: &str = "apigateway-invoke";
pub const CORS_STATUS_CODE: &str = "200";
pub const CORS_MOCK_REQUEST_TEMPLATE: &str = r#"{"statusCode": 200}"#;
pub const JSON_CONTENT_TYPE: &str = "application/json";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CorsHeader {
    pub name: &'static str,
    pub value: &'static str,
}

impl CorsHeader {
    /// Key used in `put-method-response` response parameters.
    pub fn method_response_parameter(&self) -> String {
        format!("method.response.header.{}", self.name)
    }

    /// Static mapping expression used in `put-integration-response`.
    pub fn integration_response_value(&self) -> String {
        format!("'{}'", self.value)
    }
}

pub const CORS_HEADERS: [CorsHeader; 3] = [
    CorsHeader {
        name: "Access-Control-Allow-Origin",
        value: "*",
    },
    CorsHeader {
        name: "Access-Control-Allow-Methods",
        value: "GET,POST,OPTIONS",
    },
    CorsHeader {
        name: "Access-Control-Allow-Headers",
        value: "Content-Type,X-Amz-Date,Authorization,X-Api-Key,X-Amz-Security-Token",
    },
];

pub fn lambda_integration_uri(region: &str, function_arn: &str) -> String {
    format!(
        "arn:aws:apigateway:{region}:lambda:path/2015-03-31/functions/{function_arn}/invocations"
    )
}

/// Source ARN covering every stage, method and path of one REST API.
pub fn execute_api_source_arn(region: &str, account_id: &str, api_id: &str) -> String {
    format!("arn:aws:execute-api:{region}:{account_id}:{api_id}/*/*/*")
}

pub fn invoke_url(api_id: &str, region: &str, stage: &str) -> String {
    format!("https://{api_id}.execute-api.{region}.amazonaws.com/{stage}")
}

/// Permission statement id with a random suffix so repeated runs never
/// collide with an earlier grant.
pub fn statement_id<R: Rng + ?Sized>(rng: &mut R) -> String {
    format!("{STATEMENT_ID_PREFIX}-{:08x}", rng.gen::<u32>())
}

/// Validates the answer to a CORS preflight: status 200 and a wildcard
/// `Access-Control-Allow-Origin`. Header names compare case-insensitively.
pub fn check_preflight_response(status: u16, headers: &[(String, String)]) -> Result<(), String> {
    if status != 200 {
        return Err(format!("preflight returned status {status}, expected 200"));
    }
    let origin = headers
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case("access-control-allow-origin"))
        .map(|(_, value)| value.trim());
    match origin {
        Some("*") => Ok(()),
        Some(other) => Err(format!(
            "Access-Control-Allow-Origin is '{other}', expected '*'"
        )),
        None => Err("preflight response has no Access-Control-Allow-Origin header".to_string()),
    }
}
