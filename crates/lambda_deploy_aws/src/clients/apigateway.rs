use aws_config::SdkConfig;
use aws_sdk_apigateway::types::{
    EndpointConfiguration, EndpointType, IntegrationType, Op, PatchOperation, Resource,
};
use lambda_deploy_core::gateway::{AUTHORIZATION_NONE, INTEGRATION_HTTP_METHOD, JSON_CONTENT_TYPE};

use crate::adapters::gateway::{
    Integration, MethodTarget, PutOutcome, ResourceSummary, RestApiGateway, RestApiSummary,
};
use crate::clients::{block_on, describe_error};

const PAGE_SIZE: i32 = 500;

pub struct ApiGatewayClient {
    client: aws_sdk_apigateway::Client,
}

impl ApiGatewayClient {
    pub fn new(config: &SdkConfig) -> Self {
        Self {
            client: aws_sdk_apigateway::Client::new(config),
        }
    }
}

fn resource_summary(resource: &Resource) -> Result<ResourceSummary, String> {
    Ok(ResourceSummary {
        id: resource
            .id()
            .ok_or_else(|| "resource has no id".to_string())?
            .to_string(),
        path: resource.path().unwrap_or_default().to_string(),
        path_part: resource.path_part().map(str::to_string),
        parent_id: resource.parent_id().map(str::to_string),
    })
}

impl RestApiGateway for ApiGatewayClient {
    fn find_rest_api(&self, name: &str) -> Result<Option<RestApiSummary>, String> {
        let mut position: Option<String> = None;
        loop {
            let client = self.client.clone();
            let page_position = position.take();
            let output = block_on(async move {
                client
                    .get_rest_apis()
                    .limit(PAGE_SIZE)
                    .set_position(page_position)
                    .send()
                    .await
            })
            .map_err(describe_error)?;

            if let Some(api) = output.items().iter().find(|api| api.name() == Some(name)) {
                return Ok(Some(RestApiSummary {
                    id: api.id().unwrap_or_default().to_string(),
                    name: name.to_string(),
                }));
            }
            match output.position() {
                Some(next) if !next.is_empty() => position = Some(next.to_string()),
                _ => return Ok(None),
            }
        }
    }

    fn create_rest_api(&self, name: &str) -> Result<RestApiSummary, String> {
        let client = self.client.clone();
        let api_name = name.to_string();
        let output = block_on(async move {
            client
                .create_rest_api()
                .name(api_name)
                .endpoint_configuration(
                    EndpointConfiguration::builder()
                        .types(EndpointType::Regional)
                        .build(),
                )
                .send()
                .await
        })
        .map_err(describe_error)?;
        Ok(RestApiSummary {
            id: output
                .id()
                .ok_or_else(|| "CreateRestApi returned no id".to_string())?
                .to_string(),
            name: output.name().unwrap_or(name).to_string(),
        })
    }

    fn list_resources(&self, api_id: &str) -> Result<Vec<ResourceSummary>, String> {
        let mut resources = Vec::new();
        let mut position: Option<String> = None;
        loop {
            let client = self.client.clone();
            let rest_api_id = api_id.to_string();
            let page_position = position.take();
            let output = block_on(async move {
                client
                    .get_resources()
                    .rest_api_id(rest_api_id)
                    .limit(PAGE_SIZE)
                    .set_position(page_position)
                    .send()
                    .await
            })
            .map_err(describe_error)?;

            for resource in output.items() {
                resources.push(resource_summary(resource)?);
            }
            match output.position() {
                Some(next) if !next.is_empty() => position = Some(next.to_string()),
                _ => return Ok(resources),
            }
        }
    }

    fn create_resource(
        &self,
        api_id: &str,
        parent_id: &str,
        path_part: &str,
    ) -> Result<ResourceSummary, String> {
        let client = self.client.clone();
        let (rest_api_id, parent_id, path_part) =
            (api_id.to_string(), parent_id.to_string(), path_part.to_string());
        let output = block_on(async move {
            client
                .create_resource()
                .rest_api_id(rest_api_id)
                .parent_id(parent_id)
                .path_part(path_part)
                .send()
                .await
        })
        .map_err(describe_error)?;
        Ok(ResourceSummary {
            id: output
                .id()
                .ok_or_else(|| "CreateResource returned no id".to_string())?
                .to_string(),
            path: output.path().unwrap_or_default().to_string(),
            path_part: output.path_part().map(str::to_string),
            parent_id: output.parent_id().map(str::to_string),
        })
    }

    fn put_method(&self, target: MethodTarget<'_>) -> Result<PutOutcome, String> {
        let client = self.client.clone();
        let (api_id, resource_id, http_method) = owned(target);
        let result = block_on(async move {
            client
                .put_method()
                .rest_api_id(api_id)
                .resource_id(resource_id)
                .http_method(http_method)
                .authorization_type(AUTHORIZATION_NONE)
                .send()
                .await
        });
        match result {
            Ok(_) => Ok(PutOutcome::Applied),
            Err(error)
                if error
                    .as_service_error()
                    .is_some_and(|service| service.is_conflict_exception()) =>
            {
                Ok(PutOutcome::AlreadyExists)
            }
            Err(error) => Err(describe_error(error)),
        }
    }

    fn put_integration(
        &self,
        target: MethodTarget<'_>,
        integration: &Integration,
    ) -> Result<(), String> {
        let (api_id, resource_id, http_method) = owned(target);
        let request = self
            .client
            .put_integration()
            .rest_api_id(api_id)
            .resource_id(resource_id)
            .http_method(http_method);
        let request = match integration {
            Integration::LambdaProxy { uri } => request
                .r#type(IntegrationType::AwsProxy)
                .integration_http_method(INTEGRATION_HTTP_METHOD)
                .uri(uri.clone()),
            Integration::Mock { request_template } => request
                .r#type(IntegrationType::Mock)
                .request_templates(JSON_CONTENT_TYPE, request_template.clone()),
        };
        block_on(async move { request.send().await })
            .map(|_| ())
            .map_err(describe_error)
    }

    fn put_method_response(
        &self,
        target: MethodTarget<'_>,
        status_code: &str,
        header_parameters: &[String],
    ) -> Result<PutOutcome, String> {
        let (api_id, resource_id, http_method) = owned(target);
        let mut request = self
            .client
            .put_method_response()
            .rest_api_id(api_id.clone())
            .resource_id(resource_id.clone())
            .http_method(http_method.clone())
            .status_code(status_code);
        for parameter in header_parameters {
            request = request.response_parameters(parameter.clone(), false);
        }
        match block_on(async move { request.send().await }) {
            Ok(_) => return Ok(PutOutcome::Applied),
            Err(error)
                if error
                    .as_service_error()
                    .is_some_and(|service| service.is_conflict_exception()) => {}
            Err(error) => return Err(describe_error(error)),
        }

        // an existing response may predate the headers; declare them in place
        let request = self
            .client
            .update_method_response()
            .rest_api_id(api_id)
            .resource_id(resource_id)
            .http_method(http_method)
            .status_code(status_code)
            .set_patch_operations(Some(declare_parameters(header_parameters)));
        block_on(async move { request.send().await })
            .map(|_| PutOutcome::Updated)
            .map_err(describe_error)
    }

    fn put_integration_response(
        &self,
        target: MethodTarget<'_>,
        status_code: &str,
        header_values: &[(String, String)],
    ) -> Result<(), String> {
        let (api_id, resource_id, http_method) = owned(target);
        let mut request = self
            .client
            .put_integration_response()
            .rest_api_id(api_id)
            .resource_id(resource_id)
            .http_method(http_method)
            .status_code(status_code);
        for (parameter, value) in header_values {
            request = request.response_parameters(parameter.clone(), value.clone());
        }
        block_on(async move { request.send().await })
            .map(|_| ())
            .map_err(describe_error)
    }

    fn create_deployment(&self, api_id: &str, stage_name: &str) -> Result<String, String> {
        let client = self.client.clone();
        let (rest_api_id, stage_name) = (api_id.to_string(), stage_name.to_string());
        let output = block_on(async move {
            client
                .create_deployment()
                .rest_api_id(rest_api_id)
                .stage_name(stage_name)
                .send()
                .await
        })
        .map_err(describe_error)?;
        Ok(output.id().unwrap_or_default().to_string())
    }
}

fn declare_parameters(header_parameters: &[String]) -> Vec<PatchOperation> {
    header_parameters
        .iter()
        .map(|parameter| {
            PatchOperation::builder()
                .op(Op::Add)
                .path(format!("/responseParameters/{parameter}"))
                .value("false")
                .build()
        })
        .collect()
}

fn owned(target: MethodTarget<'_>) -> (String, String, String) {
    (
        target.api_id.to_string(),
        target.resource_id.to_string(),
        target.http_method.to_string(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn existing_method_responses_are_patched_per_header() {
        let patches = declare_parameters(&[
            "method.response.header.Access-Control-Allow-Origin".to_string(),
            "method.response.header.Access-Control-Allow-Methods".to_string(),
        ]);

        assert_eq!(patches.len(), 2);
        assert_eq!(patches[0].op(), Some(&Op::Add));
        assert_eq!(
            patches[0].path(),
            Some("/responseParameters/method.response.header.Access-Control-Allow-Origin")
        );
        assert_eq!(patches[1].value(), Some("false"));
    }
}
