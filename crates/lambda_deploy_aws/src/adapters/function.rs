#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionInfo {
    pub name: String,
    pub arn: String,
    pub image_uri: Option<String>,
    pub memory_mb: Option<i32>,
    pub timeout_secs: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateStatus {
    Successful,
    InProgress,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionGrant {
    pub statement_id: String,
    pub action: String,
    pub principal: String,
    pub source_arn: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionOutcome {
    Added,
    AlreadyExists,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationOutput {
    pub status_code: i32,
    pub function_error: Option<String>,
    pub payload: Vec<u8>,
}

pub trait FunctionService {
    fn get_function(&self, name: &str) -> Result<Option<FunctionInfo>, String>;

    fn update_image(&self, name: &str, image_uri: &str) -> Result<(), String>;

    fn update_sizing(
        &self,
        name: &str,
        memory_mb: Option<i32>,
        timeout_secs: Option<i32>,
    ) -> Result<(), String>;

    fn update_status(&self, name: &str) -> Result<UpdateStatus, String>;

    fn add_permission(
        &self,
        name: &str,
        grant: &PermissionGrant,
    ) -> Result<PermissionOutcome, String>;

    /// Synchronous (`RequestResponse`) invocation.
    fn invoke(&self, name: &str, payload: &[u8]) -> Result<InvocationOutput, String>;
}
