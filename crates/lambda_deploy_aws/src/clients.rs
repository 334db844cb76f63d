//! Real adapter implementations: AWS SDK clients, the Docker CLI and an HTTPS
//! client. Each one is synchronous and bridges into the async runtime
//! started by `#[tokio::main]`, so it must run on a multi-threaded runtime.

use std::future::Future;

use aws_config::retry::RetryConfig;
use aws_config::{BehaviorVersion, SdkConfig};
use aws_sdk_sts::error::DisplayErrorContext;

pub mod apigateway;
pub mod docker;
pub mod ecr;
pub mod http;
pub mod lambda;
pub mod logs;
pub mod sts;

/// Shared SDK configuration from the default provider chain. Each call is
/// attempted once; `endpoint_url` points every client at an emulator.
pub async fn load_sdk_config(endpoint_url: Option<&str>) -> SdkConfig {
    let mut loader = aws_config::defaults(BehaviorVersion::latest())
        .retry_config(RetryConfig::standard().with_max_attempts(1));
    if let Some(url) = endpoint_url {
        loader = loader.endpoint_url(url);
    }
    loader.load().await
}

pub(crate) fn block_on<F: Future>(future: F) -> F::Output {
    tokio::task::block_in_place(|| tokio::runtime::Handle::current().block_on(future))
}

/// Full error chain of an SDK failure, including the service error code.
pub(crate) fn describe_error<E: std::error::Error>(error: E) -> String {
    DisplayErrorContext(error).to_string()
}
