use std::time::Duration;

use reqwest::Method;

use crate::adapters::http::{HttpProbe, HttpRequest, HttpResponse};
use crate::clients::block_on;

const REQUEST_TIMEOUT_SECS: u64 = 30;

pub struct ReqwestProbe {
    client: reqwest::Client,
}

impl ReqwestProbe {
    pub fn new() -> Result<Self, String> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|error| format!("failed to build HTTP client: {error}"))?;
        Ok(Self { client })
    }
}

impl HttpProbe for ReqwestProbe {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, String> {
        let method = Method::from_bytes(request.method.as_bytes())
            .map_err(|error| format!("invalid HTTP method '{}': {error}", request.method))?;
        let mut builder = self.client.request(method, &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        block_on(execute(builder))
    }
}

async fn execute(builder: reqwest::RequestBuilder) -> Result<HttpResponse, String> {
    let response = builder
        .send()
        .await
        .map_err(|error| format!("request failed: {error}"))?;
    let status = response.status().as_u16();
    let headers = response
        .headers()
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                value.to_str().unwrap_or_default().to_string(),
            )
        })
        .collect();
    let body = response
        .text()
        .await
        .map_err(|error| format!("failed to read response body: {error}"))?;
    Ok(HttpResponse {
        status,
        headers,
        body,
    })
}
