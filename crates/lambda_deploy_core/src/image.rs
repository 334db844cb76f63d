use std::fmt;

use chrono::{DateTime, Utc};

pub const DEFAULT_LOCAL_IMAGE: &str = "movie-predictor";
pub const LOCAL_IMAGE_TAG: &str = "latest";
pub const DEFAULT_PLATFORM: &str = "linux/amd64";
pub const DEFAULT_INFO_FILE: &str = "deployment-info.txt";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageReference {
    pub repository: String,
    pub tag: String,
}

impl ImageReference {
    pub fn new(repository: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            repository: repository.into(),
            tag: tag.into(),
        }
    }

    pub fn local(name: &str) -> Self {
        Self::new(name, LOCAL_IMAGE_TAG)
    }

    /// Splits `repo[:tag]`, treating a colon inside the registry host
    /// (`host:port/repo`) as part of the repository.
    pub fn parse(reference: &str) -> Self {
        let last_slash = reference.rfind('/').map(|index| index + 1).unwrap_or(0);
        match reference[last_slash..].rfind(':') {
            Some(offset) => {
                let split = last_slash + offset;
                Self::new(&reference[..split], &reference[split + 1..])
            }
            None => Self::new(reference, LOCAL_IMAGE_TAG),
        }
    }

    /// Registry host of a fully qualified reference, if it has one.
    pub fn registry(&self) -> Option<&str> {
        registry_of(&self.repository)
    }
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.repository, self.tag)
    }
}

pub fn registry_host(account_id: &str, region: &str) -> String {
    format!("{account_id}.dkr.ecr.{region}.amazonaws.com")
}

pub fn repository_uri(account_id: &str, region: &str, repository: &str) -> String {
    format!("{}/{repository}", registry_host(account_id, region))
}

pub fn registry_of(repository_uri: &str) -> Option<&str> {
    repository_uri
        .split_once('/')
        .map(|(host, _)| host)
        .filter(|host| host.contains('.') || host.contains(':'))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushedImage {
    pub reference: ImageReference,
    pub digest: String,
    pub pushed_at: Option<DateTime<Utc>>,
    pub size_bytes: Option<i64>,
}

/// Human-readable summary written after a verified push.
pub fn render_deployment_info(image: &PushedImage, generated_at: DateTime<Utc>) -> String {
    let mut out = String::new();
    out.push_str("Deployment image\n");
    out.push_str("================\n");
    out.push_str(&format!("Repository URI : {}\n", image.reference.repository));
    out.push_str(&format!("Tag            : {}\n", image.reference.tag));
    out.push_str(&format!("Image          : {}\n", image.reference));
    out.push_str(&format!("Digest         : {}\n", image.digest));
    if let Some(pushed_at) = image.pushed_at {
        out.push_str(&format!("Pushed at      : {}\n", pushed_at.to_rfc3339()));
    }
    if let Some(size) = image.size_bytes {
        out.push_str(&format!(
            "Size           : {:.2} MB\n",
            size as f64 / (1024.0 * 1024.0)
        ));
    }
    out.push_str(&format!("Generated at   : {}\n", generated_at.to_rfc3339()));
    out
}
