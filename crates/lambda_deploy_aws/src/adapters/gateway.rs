#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestApiSummary {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceSummary {
    pub id: String,
    pub path: String,
    pub path_part: Option<String>,
    pub parent_id: Option<String>,
}

/// A method on a resource of a REST API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MethodTarget<'a> {
    pub api_id: &'a str,
    pub resource_id: &'a str,
    pub http_method: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Integration {
    /// `AWS_PROXY` integration invoking a Lambda function.
    LambdaProxy { uri: String },
    /// `MOCK` integration answering from a request template.
    Mock { request_template: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOutcome {
    Applied,
    AlreadyExists,
    /// Existed already and was patched to match the request.
    Updated,
}

impl PutOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Applied => "applied",
            Self::AlreadyExists => "already_exists",
            Self::Updated => "updated",
        }
    }
}

pub trait RestApiGateway {
    fn find_rest_api(&self, name: &str) -> Result<Option<RestApiSummary>, String>;

    fn create_rest_api(&self, name: &str) -> Result<RestApiSummary, String>;

    fn list_resources(&self, api_id: &str) -> Result<Vec<ResourceSummary>, String>;

    fn create_resource(
        &self,
        api_id: &str,
        parent_id: &str,
        path_part: &str,
    ) -> Result<ResourceSummary, String>;

    /// Declares a method with no authorization.
    fn put_method(&self, target: MethodTarget<'_>) -> Result<PutOutcome, String>;

    fn put_integration(
        &self,
        target: MethodTarget<'_>,
        integration: &Integration,
    ) -> Result<(), String>;

    /// Declares response headers (by `method.response.header.*` parameter).
    /// An existing response for the status code is updated to declare them.
    fn put_method_response(
        &self,
        target: MethodTarget<'_>,
        status_code: &str,
        header_parameters: &[String],
    ) -> Result<PutOutcome, String>;

    /// Maps response header parameters to static values.
    fn put_integration_response(
        &self,
        target: MethodTarget<'_>,
        status_code: &str,
        header_values: &[(String, String)],
    ) -> Result<(), String>;

    /// Publishes the API to `stage_name`, returning the deployment id.
    fn create_deployment(&self, api_id: &str, stage_name: &str) -> Result<String, String>;
}
