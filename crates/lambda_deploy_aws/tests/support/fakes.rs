#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Mutex;

use chrono::{Duration, Utc};
use lambda_deploy_aws::adapters::engine::{BuildRequest, ContainerEngine};
use lambda_deploy_aws::adapters::function::{
    FunctionInfo, FunctionService, InvocationOutput, PermissionGrant, PermissionOutcome,
    UpdateStatus,
};
use lambda_deploy_aws::adapters::gateway::{
    Integration, MethodTarget, PutOutcome, ResourceSummary, RestApiGateway, RestApiSummary,
};
use lambda_deploy_aws::adapters::http::{HttpProbe, HttpRequest, HttpResponse};
use lambda_deploy_aws::adapters::identity::{CallerIdentity, IdentityResolver};
use lambda_deploy_aws::adapters::registry::{
    ContainerRegistry, ImageDetail, RegistryCredentials, RepositoryCreation, RepositoryInfo,
};
use lambda_deploy_aws::adapters::tools::ToolProbe;
use lambda_deploy_aws::pipeline::Services;
use lambda_deploy_core::image::repository_uri;
use serde_json::json;

pub const ACCOUNT_ID: &str = "123456789012";
pub const REGION: &str = "us-east-1";
pub const FUNCTION_NAME: &str = "movie-predictor";
pub const FUNCTION_ARN: &str = "arn:aws:lambda:us-east-1:123456789012:function:movie-predictor";

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().expect("poisoned mutex")
}

pub struct FakeIdentity {
    pub result: Result<CallerIdentity, String>,
}

impl FakeIdentity {
    pub fn ok() -> Self {
        Self {
            result: Ok(CallerIdentity {
                account_id: ACCOUNT_ID.to_string(),
                arn: format!("arn:aws:iam::{ACCOUNT_ID}:user/deployer"),
                region: Some(REGION.to_string()),
            }),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            result: Err(message.to_string()),
        }
    }
}

impl IdentityResolver for FakeIdentity {
    fn caller_identity(&self) -> Result<CallerIdentity, String> {
        self.result.clone()
    }
}

#[derive(Default)]
pub struct FakeRegistry {
    pub repositories: Mutex<Vec<RepositoryInfo>>,
    pub images: Mutex<Vec<ImageDetail>>,
    pub calls: Mutex<Vec<String>>,
}

impl FakeRegistry {
    pub fn with_image(digest: &str) -> Self {
        let registry = Self::default();
        lock(&registry.images).push(ImageDetail {
            digest: digest.to_string(),
            tags: vec!["latest".to_string()],
            pushed_at: Some(Utc::now()),
            size_bytes: Some(512 * 1024 * 1024),
        });
        registry
    }

    pub fn calls(&self) -> Vec<String> {
        lock(&self.calls).clone()
    }

    pub fn count(&self, call: &str) -> usize {
        self.calls().iter().filter(|value| value.as_str() == call).count()
    }
}

impl ContainerRegistry for FakeRegistry {
    fn describe_repository(&self, name: &str) -> Result<Option<RepositoryInfo>, String> {
        lock(&self.calls).push("describe_repository".to_string());
        Ok(lock(&self.repositories)
            .iter()
            .find(|repository| repository.name == name)
            .cloned())
    }

    fn create_repository(
        &self,
        name: &str,
        scan_on_push: bool,
    ) -> Result<RepositoryCreation, String> {
        lock(&self.calls).push("create_repository".to_string());
        let repository = RepositoryInfo {
            name: name.to_string(),
            uri: repository_uri(ACCOUNT_ID, REGION, name),
            scan_on_push,
        };
        lock(&self.repositories).push(repository.clone());
        Ok(RepositoryCreation::Created(repository))
    }

    fn authorization(&self) -> Result<RegistryCredentials, String> {
        lock(&self.calls).push("authorization".to_string());
        Ok(RegistryCredentials {
            registry: format!("{ACCOUNT_ID}.dkr.ecr.{REGION}.amazonaws.com"),
            username: "AWS".to_string(),
            password: "token".to_string(),
            expires_at: Utc::now() + Duration::hours(12),
        })
    }

    fn describe_images(&self, _repository: &str, _tag: &str) -> Result<Vec<ImageDetail>, String> {
        lock(&self.calls).push("describe_images".to_string());
        Ok(lock(&self.images).clone())
    }
}

#[derive(Default)]
pub struct FakeEngine {
    pub calls: Mutex<Vec<String>>,
}

impl FakeEngine {
    pub fn calls(&self) -> Vec<String> {
        lock(&self.calls).clone()
    }
}

impl ContainerEngine for FakeEngine {
    fn build(&self, request: &BuildRequest) -> Result<(), String> {
        lock(&self.calls).push(format!("build {}", request.image));
        Ok(())
    }

    fn login(&self, credentials: &RegistryCredentials) -> Result<(), String> {
        lock(&self.calls).push(format!("login {}", credentials.registry));
        Ok(())
    }

    fn tag(
        &self,
        source: &lambda_deploy_core::image::ImageReference,
        target: &lambda_deploy_core::image::ImageReference,
    ) -> Result<(), String> {
        lock(&self.calls).push(format!("tag {source} {target}"));
        Ok(())
    }

    fn push(&self, image: &lambda_deploy_core::image::ImageReference) -> Result<(), String> {
        lock(&self.calls).push(format!("push {image}"));
        Ok(())
    }
}

pub struct FakeFunctions {
    pub function: Option<FunctionInfo>,
    pub statuses: Mutex<VecDeque<UpdateStatus>>,
    pub calls: Mutex<Vec<String>>,
    pub grants: Mutex<Vec<PermissionGrant>>,
    pub invocation: Mutex<InvocationOutput>,
    pub invoked_payloads: Mutex<Vec<Vec<u8>>>,
}

impl Default for FakeFunctions {
    fn default() -> Self {
        Self {
            function: Some(FunctionInfo {
                name: FUNCTION_NAME.to_string(),
                arn: FUNCTION_ARN.to_string(),
                image_uri: None,
                memory_mb: Some(1024),
                timeout_secs: Some(30),
            }),
            statuses: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
            grants: Mutex::new(Vec::new()),
            invocation: Mutex::new(proxy_reply(
                200,
                &json!({ "predicted_revenue": 245000000.0, "category": "Hit", "confidence": 0.82 })
                    .to_string(),
            )),
            invoked_payloads: Mutex::new(Vec::new()),
        }
    }
}

/// Function reply carrying an API Gateway proxy response.
pub fn proxy_reply(status: u16, body: &str) -> InvocationOutput {
    InvocationOutput {
        status_code: 200,
        function_error: None,
        payload: json!({
            "statusCode": status,
            "headers": { "Content-Type": "application/json" },
            "body": body,
            "isBase64Encoded": false
        })
        .to_string()
        .into_bytes(),
    }
}

impl FakeFunctions {
    pub fn missing() -> Self {
        Self {
            function: None,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<String> {
        lock(&self.calls).clone()
    }

    pub fn set_invocation(&self, output: InvocationOutput) {
        *lock(&self.invocation) = output;
    }
}

impl FunctionService for FakeFunctions {
    fn get_function(&self, _name: &str) -> Result<Option<FunctionInfo>, String> {
        lock(&self.calls).push("get_function".to_string());
        Ok(self.function.clone())
    }

    fn update_image(&self, _name: &str, image_uri: &str) -> Result<(), String> {
        lock(&self.calls).push(format!("update_image {image_uri}"));
        Ok(())
    }

    fn update_sizing(
        &self,
        _name: &str,
        memory_mb: Option<i32>,
        timeout_secs: Option<i32>,
    ) -> Result<(), String> {
        lock(&self.calls).push(format!("update_sizing {memory_mb:?} {timeout_secs:?}"));
        Ok(())
    }

    fn update_status(&self, _name: &str) -> Result<UpdateStatus, String> {
        lock(&self.calls).push("update_status".to_string());
        Ok(lock(&self.statuses)
            .pop_front()
            .unwrap_or(UpdateStatus::Successful))
    }

    fn add_permission(
        &self,
        _name: &str,
        grant: &PermissionGrant,
    ) -> Result<PermissionOutcome, String> {
        lock(&self.calls).push("add_permission".to_string());
        lock(&self.grants).push(grant.clone());
        Ok(PermissionOutcome::Added)
    }

    fn invoke(&self, _name: &str, payload: &[u8]) -> Result<InvocationOutput, String> {
        lock(&self.calls).push("invoke".to_string());
        lock(&self.invoked_payloads).push(payload.to_vec());
        Ok(lock(&self.invocation).clone())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedResponse {
    pub http_method: String,
    pub status_code: String,
    pub entries: Vec<(String, String)>,
}

pub struct FakeGateway {
    pub apis: Mutex<Vec<RestApiSummary>>,
    pub resources: Mutex<Vec<ResourceSummary>>,
    pub methods: Mutex<Vec<(String, String)>>,
    pub integrations: Mutex<Vec<(String, Integration)>>,
    pub method_responses: Mutex<Vec<RecordedResponse>>,
    pub integration_responses: Mutex<Vec<RecordedResponse>>,
    pub deployments: Mutex<Vec<(String, String)>>,
    pub calls: Mutex<Vec<String>>,
}

impl Default for FakeGateway {
    fn default() -> Self {
        Self {
            apis: Mutex::new(Vec::new()),
            resources: Mutex::new(Vec::new()),
            methods: Mutex::new(Vec::new()),
            integrations: Mutex::new(Vec::new()),
            method_responses: Mutex::new(Vec::new()),
            integration_responses: Mutex::new(Vec::new()),
            deployments: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
        }
    }
}

impl FakeGateway {
    pub fn count(&self, call: &str) -> usize {
        lock(&self.calls).iter().filter(|value| value.as_str() == call).count()
    }

    pub fn method_responses(&self) -> Vec<RecordedResponse> {
        lock(&self.method_responses).clone()
    }

    pub fn integration_responses(&self) -> Vec<RecordedResponse> {
        lock(&self.integration_responses).clone()
    }

    pub fn integrations(&self) -> Vec<(String, Integration)> {
        lock(&self.integrations).clone()
    }

    pub fn deployments(&self) -> Vec<(String, String)> {
        lock(&self.deployments).clone()
    }
}

impl RestApiGateway for FakeGateway {
    fn find_rest_api(&self, name: &str) -> Result<Option<RestApiSummary>, String> {
        lock(&self.calls).push("find_rest_api".to_string());
        Ok(lock(&self.apis).iter().find(|api| api.name == name).cloned())
    }

    fn create_rest_api(&self, name: &str) -> Result<RestApiSummary, String> {
        lock(&self.calls).push("create_rest_api".to_string());
        let api = RestApiSummary {
            id: format!("api{}", lock(&self.apis).len() + 1),
            name: name.to_string(),
        };
        lock(&self.apis).push(api.clone());
        lock(&self.resources).push(ResourceSummary {
            id: "root".to_string(),
            path: "/".to_string(),
            path_part: None,
            parent_id: None,
        });
        Ok(api)
    }

    fn list_resources(&self, _api_id: &str) -> Result<Vec<ResourceSummary>, String> {
        lock(&self.calls).push("list_resources".to_string());
        Ok(lock(&self.resources).clone())
    }

    fn create_resource(
        &self,
        _api_id: &str,
        parent_id: &str,
        path_part: &str,
    ) -> Result<ResourceSummary, String> {
        lock(&self.calls).push("create_resource".to_string());
        let resource = ResourceSummary {
            id: format!("res{}", lock(&self.resources).len()),
            path: format!("/{path_part}"),
            path_part: Some(path_part.to_string()),
            parent_id: Some(parent_id.to_string()),
        };
        lock(&self.resources).push(resource.clone());
        Ok(resource)
    }

    fn put_method(&self, target: MethodTarget<'_>) -> Result<PutOutcome, String> {
        lock(&self.calls).push("put_method".to_string());
        let key = (target.resource_id.to_string(), target.http_method.to_string());
        let mut methods = lock(&self.methods);
        if methods.contains(&key) {
            return Ok(PutOutcome::AlreadyExists);
        }
        methods.push(key);
        Ok(PutOutcome::Applied)
    }

    fn put_integration(
        &self,
        target: MethodTarget<'_>,
        integration: &Integration,
    ) -> Result<(), String> {
        lock(&self.calls).push("put_integration".to_string());
        lock(&self.integrations).push((target.http_method.to_string(), integration.clone()));
        Ok(())
    }

    fn put_method_response(
        &self,
        target: MethodTarget<'_>,
        status_code: &str,
        header_parameters: &[String],
    ) -> Result<PutOutcome, String> {
        lock(&self.calls).push("put_method_response".to_string());
        let declared = header_parameters
            .iter()
            .map(|parameter| (parameter.clone(), "false".to_string()));
        let mut responses = lock(&self.method_responses);
        if let Some(existing) = responses.iter_mut().find(|response| {
            response.http_method == target.http_method && response.status_code == status_code
        }) {
            for entry in declared {
                if !existing.entries.contains(&entry) {
                    existing.entries.push(entry);
                }
            }
            return Ok(PutOutcome::Updated);
        }
        responses.push(RecordedResponse {
            http_method: target.http_method.to_string(),
            status_code: status_code.to_string(),
            entries: declared.collect(),
        });
        Ok(PutOutcome::Applied)
    }

    fn put_integration_response(
        &self,
        target: MethodTarget<'_>,
        status_code: &str,
        header_values: &[(String, String)],
    ) -> Result<(), String> {
        lock(&self.calls).push("put_integration_response".to_string());
        lock(&self.integration_responses).push(RecordedResponse {
            http_method: target.http_method.to_string(),
            status_code: status_code.to_string(),
            entries: header_values.to_vec(),
        });
        Ok(())
    }

    fn create_deployment(&self, api_id: &str, stage_name: &str) -> Result<String, String> {
        lock(&self.calls).push("create_deployment".to_string());
        let mut deployments = lock(&self.deployments);
        deployments.push((api_id.to_string(), stage_name.to_string()));
        Ok(format!("dep{}", deployments.len()))
    }
}

pub struct FakeHttp {
    pub response: Mutex<Result<HttpResponse, String>>,
    pub requests: Mutex<Vec<HttpRequest>>,
}

impl FakeHttp {
    pub fn replying(status: u16, headers: &[(&str, &str)], body: &str) -> Self {
        Self {
            response: Mutex::new(Ok(HttpResponse {
                status,
                headers: headers
                    .iter()
                    .map(|(name, value)| (name.to_string(), value.to_string()))
                    .collect(),
                body: body.to_string(),
            })),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        lock(&self.requests).clone()
    }
}

impl Default for FakeHttp {
    fn default() -> Self {
        Self::replying(200, &[("access-control-allow-origin", "*")], "")
    }
}

impl HttpProbe for FakeHttp {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, String> {
        lock(&self.requests).push(request.clone());
        lock(&self.response).clone()
    }
}

pub struct FakeTools {
    pub available: Vec<&'static str>,
}

impl Default for FakeTools {
    fn default() -> Self {
        Self {
            available: vec!["docker", "aws", "python3"],
        }
    }
}

impl ToolProbe for FakeTools {
    fn version(&self, program: &str) -> Option<String> {
        self.available
            .contains(&program)
            .then(|| format!("{program} 1.0.0"))
    }
}

/// One fake per adapter trait.
pub struct FakeWorld {
    pub tools: FakeTools,
    pub identity: FakeIdentity,
    pub registry: FakeRegistry,
    pub engine: FakeEngine,
    pub functions: FakeFunctions,
    pub gateway: FakeGateway,
    pub http: FakeHttp,
}

impl Default for FakeWorld {
    fn default() -> Self {
        Self {
            tools: FakeTools::default(),
            identity: FakeIdentity::ok(),
            registry: FakeRegistry::with_image("sha256:abc123"),
            engine: FakeEngine::default(),
            functions: FakeFunctions::default(),
            gateway: FakeGateway::default(),
            http: FakeHttp::default(),
        }
    }
}

impl FakeWorld {
    pub fn services(&self) -> Services<'_> {
        Services {
            tools: &self.tools,
            identity: &self.identity,
            registry: &self.registry,
            engine: &self.engine,
            functions: &self.functions,
            gateway: &self.gateway,
            http: &self.http,
        }
    }
}
