use aws_config::SdkConfig;
use aws_sdk_lambda::primitives::Blob;
use aws_sdk_lambda::types::{InvocationType, LastUpdateStatus, State};

use crate::adapters::function::{
    FunctionInfo, FunctionService, InvocationOutput, PermissionGrant, PermissionOutcome,
    UpdateStatus,
};
use crate::clients::{block_on, describe_error};

pub struct LambdaFunctions {
    client: aws_sdk_lambda::Client,
}

impl LambdaFunctions {
    pub fn new(config: &SdkConfig) -> Self {
        Self {
            client: aws_sdk_lambda::Client::new(config),
        }
    }
}

impl FunctionService for LambdaFunctions {
    fn get_function(&self, name: &str) -> Result<Option<FunctionInfo>, String> {
        let client = self.client.clone();
        let function_name = name.to_string();
        let result =
            block_on(async move { client.get_function().function_name(function_name).send().await });
        let output = match result {
            Ok(output) => output,
            Err(error)
                if error
                    .as_service_error()
                    .is_some_and(|service| service.is_resource_not_found_exception()) =>
            {
                return Ok(None);
            }
            Err(error) => return Err(describe_error(error)),
        };

        let configuration = output
            .configuration()
            .ok_or_else(|| format!("GetFunction returned no configuration for '{name}'"))?;
        Ok(Some(FunctionInfo {
            name: configuration.function_name().unwrap_or(name).to_string(),
            arn: configuration
                .function_arn()
                .ok_or_else(|| format!("function '{name}' has no ARN"))?
                .to_string(),
            image_uri: output
                .code()
                .and_then(|code| code.image_uri())
                .map(str::to_string),
            memory_mb: configuration.memory_size(),
            timeout_secs: configuration.timeout(),
        }))
    }

    fn update_image(&self, name: &str, image_uri: &str) -> Result<(), String> {
        let client = self.client.clone();
        let function_name = name.to_string();
        let image_uri = image_uri.to_string();
        block_on(async move {
            client
                .update_function_code()
                .function_name(function_name)
                .image_uri(image_uri)
                .send()
                .await
        })
        .map(|_| ())
        .map_err(describe_error)
    }

    fn update_sizing(
        &self,
        name: &str,
        memory_mb: Option<i32>,
        timeout_secs: Option<i32>,
    ) -> Result<(), String> {
        let client = self.client.clone();
        let function_name = name.to_string();
        block_on(async move {
            client
                .update_function_configuration()
                .function_name(function_name)
                .set_memory_size(memory_mb)
                .set_timeout(timeout_secs)
                .send()
                .await
        })
        .map(|_| ())
        .map_err(describe_error)
    }

    fn update_status(&self, name: &str) -> Result<UpdateStatus, String> {
        let client = self.client.clone();
        let function_name = name.to_string();
        let output = block_on(async move {
            client
                .get_function_configuration()
                .function_name(function_name)
                .send()
                .await
        })
        .map_err(describe_error)?;

        if matches!(output.state(), Some(State::Pending)) {
            return Ok(UpdateStatus::InProgress);
        }
        Ok(match output.last_update_status() {
            None | Some(LastUpdateStatus::Successful) => UpdateStatus::Successful,
            Some(LastUpdateStatus::InProgress) => UpdateStatus::InProgress,
            Some(LastUpdateStatus::Failed) => UpdateStatus::Failed(
                output
                    .last_update_status_reason()
                    .unwrap_or("update failed without a reason")
                    .to_string(),
            ),
            Some(other) => UpdateStatus::Failed(format!("unexpected update status '{}'", other.as_str())),
        })
    }

    fn add_permission(
        &self,
        name: &str,
        grant: &PermissionGrant,
    ) -> Result<PermissionOutcome, String> {
        let client = self.client.clone();
        let function_name = name.to_string();
        let grant = grant.clone();
        let result = block_on(async move {
            client
                .add_permission()
                .function_name(function_name)
                .statement_id(grant.statement_id)
                .action(grant.action)
                .principal(grant.principal)
                .source_arn(grant.source_arn)
                .send()
                .await
        });
        match result {
            Ok(_) => Ok(PermissionOutcome::Added),
            Err(error)
                if error
                    .as_service_error()
                    .is_some_and(|service| service.is_resource_conflict_exception()) =>
            {
                Ok(PermissionOutcome::AlreadyExists)
            }
            Err(error) => Err(describe_error(error)),
        }
    }

    fn invoke(&self, name: &str, payload: &[u8]) -> Result<InvocationOutput, String> {
        let client = self.client.clone();
        let function_name = name.to_string();
        let request_payload = payload.to_vec();
        let output = block_on(async move {
            client
                .invoke()
                .function_name(function_name)
                .invocation_type(InvocationType::RequestResponse)
                .payload(Blob::new(request_payload))
                .send()
                .await
        })
        .map_err(describe_error)?;

        Ok(InvocationOutput {
            status_code: output.status_code(),
            function_error: output.function_error().map(str::to_string),
            payload: output
                .payload()
                .map(|blob| blob.as_ref().to_vec())
                .unwrap_or_default(),
        })
    }
}
