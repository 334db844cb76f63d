use aws_config::SdkConfig;
use aws_sdk_ecr::types::{ImageIdentifier, ImageScanningConfiguration, Repository};
use chrono::{DateTime, Utc};

use crate::adapters::registry::{
    decode_authorization_token, registry_from_endpoint, ContainerRegistry, ImageDetail,
    RegistryCredentials, RepositoryCreation, RepositoryInfo,
};
use crate::clients::{block_on, describe_error};

pub struct EcrRegistry {
    client: aws_sdk_ecr::Client,
}

impl EcrRegistry {
    pub fn new(config: &SdkConfig) -> Self {
        Self {
            client: aws_sdk_ecr::Client::new(config),
        }
    }
}

fn repository_info(repository: &Repository) -> Result<RepositoryInfo, String> {
    let uri = repository
        .repository_uri()
        .ok_or_else(|| "repository has no URI".to_string())?;
    Ok(RepositoryInfo {
        name: repository.repository_name().unwrap_or_default().to_string(),
        uri: uri.to_string(),
        scan_on_push: repository
            .image_scanning_configuration()
            .is_some_and(|scanning| scanning.scan_on_push()),
    })
}

fn to_utc(value: &aws_sdk_ecr::primitives::DateTime) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(value.secs(), value.subsec_nanos())
}

impl ContainerRegistry for EcrRegistry {
    fn describe_repository(&self, name: &str) -> Result<Option<RepositoryInfo>, String> {
        let client = self.client.clone();
        let name = name.to_string();
        let result = block_on(async move {
            client
                .describe_repositories()
                .repository_names(name)
                .send()
                .await
        });
        match result {
            Ok(output) => output.repositories().first().map(repository_info).transpose(),
            Err(error)
                if error
                    .as_service_error()
                    .is_some_and(|service| service.is_repository_not_found_exception()) =>
            {
                Ok(None)
            }
            Err(error) => Err(describe_error(error)),
        }
    }

    fn create_repository(
        &self,
        name: &str,
        scan_on_push: bool,
    ) -> Result<RepositoryCreation, String> {
        let client = self.client.clone();
        let name = name.to_string();
        let result = block_on(async move {
            client
                .create_repository()
                .repository_name(name)
                .image_scanning_configuration(
                    ImageScanningConfiguration::builder()
                        .scan_on_push(scan_on_push)
                        .build(),
                )
                .send()
                .await
        });
        match result {
            Ok(output) => {
                let repository = output
                    .repository()
                    .ok_or_else(|| "CreateRepository returned no repository".to_string())?;
                repository_info(repository).map(RepositoryCreation::Created)
            }
            Err(error)
                if error
                    .as_service_error()
                    .is_some_and(|service| service.is_repository_already_exists_exception()) =>
            {
                Ok(RepositoryCreation::AlreadyExists)
            }
            Err(error) => Err(describe_error(error)),
        }
    }

    fn authorization(&self) -> Result<RegistryCredentials, String> {
        let client = self.client.clone();
        let output = block_on(async move { client.get_authorization_token().send().await })
            .map_err(describe_error)?;
        let data = output
            .authorization_data()
            .first()
            .ok_or_else(|| "GetAuthorizationToken returned no authorization data".to_string())?;

        let token = data
            .authorization_token()
            .ok_or_else(|| "authorization data has no token".to_string())?;
        let (username, password) = decode_authorization_token(token)?;
        let registry = registry_from_endpoint(data.proxy_endpoint().unwrap_or_default());
        let expires_at = data
            .expires_at()
            .and_then(to_utc)
            .ok_or_else(|| "authorization data has no expiry".to_string())?;

        Ok(RegistryCredentials {
            registry,
            username,
            password,
            expires_at,
        })
    }

    fn describe_images(&self, repository: &str, tag: &str) -> Result<Vec<ImageDetail>, String> {
        let client = self.client.clone();
        let repository = repository.to_string();
        let tag = tag.to_string();
        let result = block_on(async move {
            client
                .describe_images()
                .repository_name(repository)
                .image_ids(ImageIdentifier::builder().image_tag(tag).build())
                .send()
                .await
        });
        match result {
            Ok(output) => Ok(output
                .image_details()
                .iter()
                .map(|image| ImageDetail {
                    digest: image.image_digest().unwrap_or_default().to_string(),
                    tags: image.image_tags().to_vec(),
                    pushed_at: image.image_pushed_at().and_then(to_utc),
                    size_bytes: image.image_size_in_bytes(),
                })
                .collect()),
            Err(error)
                if error
                    .as_service_error()
                    .is_some_and(|service| service.is_image_not_found_exception()) =>
            {
                Ok(Vec::new())
            }
            Err(error) => Err(describe_error(error)),
        }
    }
}
