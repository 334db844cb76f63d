use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryInfo {
    pub name: String,
    pub uri: String,
    pub scan_on_push: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepositoryCreation {
    Created(RepositoryInfo),
    /// Someone created it between our describe and create calls.
    AlreadyExists,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryCredentials {
    pub registry: String,
    pub username: String,
    pub password: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageDetail {
    pub digest: String,
    pub tags: Vec<String>,
    pub pushed_at: Option<DateTime<Utc>>,
    pub size_bytes: Option<i64>,
}

pub trait ContainerRegistry {
    fn describe_repository(&self, name: &str) -> Result<Option<RepositoryInfo>, String>;

    fn create_repository(
        &self,
        name: &str,
        scan_on_push: bool,
    ) -> Result<RepositoryCreation, String>;

    fn authorization(&self) -> Result<RegistryCredentials, String>;

    /// Images carrying `tag`; an unknown tag is an empty list, not an error.
    fn describe_images(&self, repository: &str, tag: &str) -> Result<Vec<ImageDetail>, String>;
}

/// Splits an ECR authorization token (`base64("user:password")`).
pub fn decode_authorization_token(token: &str) -> Result<(String, String), String> {
    let decoded = BASE64
        .decode(token.trim().as_bytes())
        .map_err(|error| format!("authorization token is not base64: {error}"))?;
    let decoded = String::from_utf8(decoded)
        .map_err(|error| format!("authorization token is not UTF-8: {error}"))?;
    let (username, password) = decoded
        .split_once(':')
        .ok_or_else(|| "authorization token is not of the form user:password".to_string())?;
    Ok((username.to_string(), password.to_string()))
}

/// ECR reports `https://<host>`; docker wants the bare host.
pub fn registry_from_endpoint(proxy_endpoint: &str) -> String {
    proxy_endpoint
        .trim_start_matches("https://")
        .trim_start_matches("http://")
        .trim_end_matches('/')
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_user_and_password() {
        let token = BASE64.encode("AWS:eyJwYXlsb2FkIjoi");
        let (username, password) = decode_authorization_token(&token).expect("token decodes");
        assert_eq!(username, "AWS");
        assert_eq!(password, "eyJwYXlsb2FkIjoi");
    }

    #[test]
    fn rejects_token_without_separator() {
        let token = BASE64.encode("no-separator");
        assert!(decode_authorization_token(&token).is_err());
        assert!(decode_authorization_token("%%%").is_err());
    }

    #[test]
    fn strips_scheme_from_proxy_endpoint() {
        assert_eq!(
            registry_from_endpoint("https://123456789012.dkr.ecr.us-east-1.amazonaws.com"),
            "123456789012.dkr.ecr.us-east-1.amazonaws.com"
        );
    }
}
