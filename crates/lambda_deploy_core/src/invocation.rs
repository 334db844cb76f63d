//! Invocation contracts for the deployed predictor: the API Gateway proxy
//! event handed to the function, its proxy response, and the checks applied
//! to `/health` and `/predict` answers.

use std::fmt;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub const KNOWN_CATEGORIES: [&str; 4] = ["Flop", "Average", "Hit", "Blockbuster"];
pub const NUMERIC_PREDICT_FIELDS: [&str; 4] = ["budget", "runtime", "cast_count", "release_month"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Endpoint {
    Health,
    Predict,
}

impl Endpoint {
    pub fn http_method(self) -> &'static str {
        match self {
            Self::Health => "GET",
            Self::Predict => "POST",
        }
    }

    pub fn path(self) -> &'static str {
        match self {
            Self::Health => "/health",
            Self::Predict => "/predict",
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.http_method(), self.path())
    }
}

pub fn default_predict_payload() -> Value {
    json!({
        "budget": 100000000,
        "runtime": 120,
        "cast_count": 15,
        "release_month": 6
    })
}

/// Accepts an object whose known numeric fields, when present, are numbers.
pub fn validate_predict_payload(payload: &Value) -> Result<(), String> {
    let Some(object) = payload.as_object() else {
        return Err("predict payload must be a JSON object".to_string());
    };
    for field in NUMERIC_PREDICT_FIELDS {
        if let Some(value) = object.get(field) {
            if !value.is_number() && !value.is_null() {
                return Err(format!("'{field}' must be numeric, got {value}"));
            }
        }
    }
    Ok(())
}

/// Builds a REST API (payload format 1.0) proxy event, shaped like what API
/// Gateway sends for a `{proxy+}` resource.
pub fn proxy_event(endpoint: Endpoint, body: Option<&Value>, stage: &str) -> Value {
    let path = endpoint.path();
    let method = endpoint.http_method();
    json!({
        "resource": "/{proxy+}",
        "path": path,
        "httpMethod": method,
        "headers": {
            "Accept": "application/json",
            "Content-Type": "application/json",
            "Host": "localhost"
        },
        "multiValueHeaders": {
            "Accept": ["application/json"],
            "Content-Type": ["application/json"],
            "Host": ["localhost"]
        },
        "queryStringParameters": null,
        "multiValueQueryStringParameters": null,
        "pathParameters": { "proxy": path.trim_start_matches('/') },
        "stageVariables": null,
        "requestContext": {
            "resourcePath": "/{proxy+}",
            "httpMethod": method,
            "path": format!("/{stage}{path}"),
            "stage": stage,
            "requestId": "deploy-smoke-test",
            "identity": { "sourceIp": "127.0.0.1", "userAgent": "lambda-deploy" }
        },
        "body": body.map(Value::to_string),
        "isBase64Encoded": false
    })
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProxyResponse {
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    #[serde(default)]
    pub headers: Value,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(rename = "isBase64Encoded", default)]
    pub is_base64_encoded: bool,
}

impl ProxyResponse {
    pub fn decode(payload: &[u8]) -> Result<Self, String> {
        serde_json::from_slice(payload)
            .map_err(|error| format!("function did not return a proxy response: {error}"))
    }

    pub fn body_text(&self) -> Result<String, String> {
        let body = self.body.clone().unwrap_or_default();
        if !self.is_base64_encoded {
            return Ok(body);
        }
        let bytes = BASE64
            .decode(body.as_bytes())
            .map_err(|error| format!("failed to decode base64 body: {error}"))?;
        String::from_utf8(bytes).map_err(|error| format!("body is not UTF-8: {error}"))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionSummary {
    pub predicted_revenue: f64,
    pub category: String,
    pub known_category: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

pub fn check_prediction(status: u16, body: &str) -> Result<PredictionSummary, String> {
    if status != 200 {
        return Err(format!("predict returned status {status}: {body}"));
    }
    let value: Value =
        serde_json::from_str(body).map_err(|error| format!("predict body is not JSON: {error}"))?;
    let predicted_revenue = value
        .get("predicted_revenue")
        .and_then(Value::as_f64)
        .ok_or_else(|| "predict body has no numeric 'predicted_revenue'".to_string())?;
    let category = value
        .get("category")
        .and_then(Value::as_str)
        .ok_or_else(|| "predict body has no string 'category'".to_string())?;

    Ok(PredictionSummary {
        predicted_revenue,
        category: category.to_string(),
        known_category: KNOWN_CATEGORIES.contains(&category),
        confidence: value.get("confidence").and_then(Value::as_f64),
    })
}

pub fn check_health(status: u16, body: &str) -> Result<(), String> {
    if status != 200 {
        return Err(format!("health returned status {status}: {body}"));
    }
    let value: Value =
        serde_json::from_str(body).map_err(|error| format!("health body is not JSON: {error}"))?;
    match value.get("status").and_then(Value::as_str) {
        Some("healthy") => Ok(()),
        Some(other) => Err(format!("service reports status '{other}'")),
        None => Err("health body has no 'status' field".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn proxy_event_carries_json_body_as_string() {
        let payload = default_predict_payload();
        let event = proxy_event(Endpoint::Predict, Some(&payload), "prod");

        assert_eq!(event["httpMethod"], "POST");
        assert_eq!(event["path"], "/predict");
        assert_eq!(event["requestContext"]["path"], "/prod/predict");
        let body: Value =
            serde_json::from_str(event["body"].as_str().expect("body is a string"))
                .expect("body is JSON");
        assert_eq!(body["budget"], 100000000);
    }

    #[test]
    fn health_event_has_null_body() {
        let event = proxy_event(Endpoint::Health, None, "prod");
        assert_eq!(event["httpMethod"], "GET");
        assert!(event["body"].is_null());
    }

    #[test]
    fn accepts_prediction_with_revenue_and_category() {
        let summary = check_prediction(
            200,
            r#"{"predicted_revenue": 412345678.9, "category": "Blockbuster", "confidence": 0.91}"#,
        )
        .expect("valid prediction");
        assert_eq!(summary.category, "Blockbuster");
        assert!(summary.known_category);
        assert_eq!(summary.confidence, Some(0.91));
    }

    #[test]
    fn unknown_category_is_flagged_not_rejected() {
        let summary = check_prediction(200, r#"{"predicted_revenue": 1, "category": "Cult"}"#)
            .expect("string category passes");
        assert!(!summary.known_category);
    }

    #[test]
    fn rejects_prediction_without_numeric_revenue() {
        let error = check_prediction(200, r#"{"predicted_revenue": "lots", "category": "Hit"}"#)
            .expect_err("revenue must be numeric");
        assert!(error.contains("predicted_revenue"));
        assert!(check_prediction(500, "{}").is_err());
    }

    #[test]
    fn decodes_base64_proxy_body() {
        let response = ProxyResponse {
            status_code: 200,
            headers: Value::Null,
            body: Some(BASE64.encode(r#"{"status":"healthy"}"#)),
            is_base64_encoded: true,
        };
        let body = response.body_text().expect("body decodes");
        check_health(response.status_code, &body).expect("service is healthy");
    }

    #[test]
    fn validates_numeric_payload_fields() {
        validate_predict_payload(&default_predict_payload()).expect("default payload is valid");
        assert!(validate_predict_payload(&json!({"budget": "big"})).is_err());
        assert!(validate_predict_payload(&json!([1, 2])).is_err());
    }
}
