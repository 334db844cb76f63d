//! The deployment configuration record.
//!
//! Persisted as `export KEY=VALUE` lines so the file stays consumable by a
//! shell `source`, but always loaded through [`DeploymentConfig::parse`], which
//! checks the schema instead of trusting the text.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::persist::write_atomically;

pub const DEFAULT_ENV_FILE: &str = ".env";
pub const DEFAULT_REPO_NAME: &str = "movie-predictor";
pub const DEFAULT_IMAGE_TAG: &str = "latest";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ConfigKey {
    AwsAccountId,
    AwsRegion,
    EcrRepoName,
    EcrImageTag,
    EcrUri,
    LambdaFunctionName,
    ApiId,
    ApiResourceId,
    ApiStageName,
}

impl ConfigKey {
    pub const ALL: [ConfigKey; 9] = [
        ConfigKey::AwsAccountId,
        ConfigKey::AwsRegion,
        ConfigKey::EcrRepoName,
        ConfigKey::EcrImageTag,
        ConfigKey::EcrUri,
        ConfigKey::LambdaFunctionName,
        ConfigKey::ApiId,
        ConfigKey::ApiResourceId,
        ConfigKey::ApiStageName,
    ];

    /// Keys written by identity resolution; they define which deployment a
    /// record (and its ledger) belongs to.
    pub const IDENTITY: [ConfigKey; 4] = [
        ConfigKey::AwsAccountId,
        ConfigKey::AwsRegion,
        ConfigKey::EcrRepoName,
        ConfigKey::EcrImageTag,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::AwsAccountId => "AWS_ACCOUNT_ID",
            Self::AwsRegion => "AWS_REGION",
            Self::EcrRepoName => "ECR_REPO_NAME",
            Self::EcrImageTag => "ECR_IMAGE_TAG",
            Self::EcrUri => "ECR_URI",
            Self::LambdaFunctionName => "LAMBDA_FUNCTION_NAME",
            Self::ApiId => "API_ID",
            Self::ApiResourceId => "API_RESOURCE_ID",
            Self::ApiStageName => "API_STAGE_NAME",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|key| key.as_str() == name)
    }

    pub fn is_required(self) -> bool {
        Self::IDENTITY.contains(&self)
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    Io { path: PathBuf, message: String },
    Syntax { line: usize, message: String },
    MissingKey(ConfigKey),
    InvalidValue {
        key: ConfigKey,
        value: String,
        reason: &'static str,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { path, message } => {
                write!(f, "failed to access '{}': {message}", path.display())
            }
            Self::Syntax { line, message } => write!(f, "line {line}: {message}"),
            Self::MissingKey(key) => write!(f, "{key} is required but not set"),
            Self::InvalidValue { key, value, reason } => {
                write!(f, "{key}='{value}' is invalid: {reason}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// What an env file holds before it is trusted as a deployment record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvFile {
    Absent,
    Record(DeploymentConfig),
    /// The file parses, but its identity keys are missing or invalid. Only the
    /// keys this tool does not own are kept.
    Unbound {
        extra: Vec<(String, String)>,
        problem: ConfigError,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeploymentConfig {
    pub aws_account_id: String,
    pub aws_region: String,
    pub ecr_repo_name: String,
    pub ecr_image_tag: String,
    pub ecr_uri: Option<String>,
    pub lambda_function_name: Option<String>,
    pub api_id: Option<String>,
    pub api_resource_id: Option<String>,
    pub api_stage_name: Option<String>,
    /// Keys this tool does not own; kept in file order and written back.
    pub extra: Vec<(String, String)>,
}

impl DeploymentConfig {
    pub fn new(
        aws_account_id: impl Into<String>,
        aws_region: impl Into<String>,
        ecr_repo_name: impl Into<String>,
        ecr_image_tag: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        let config = Self {
            aws_account_id: aws_account_id.into(),
            aws_region: aws_region.into(),
            ecr_repo_name: ecr_repo_name.into(),
            ecr_image_tag: ecr_image_tag.into(),
            ecr_uri: None,
            lambda_function_name: None,
            api_id: None,
            api_resource_id: None,
            api_stage_name: None,
            extra: Vec::new(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn get(&self, key: ConfigKey) -> Option<&str> {
        match key {
            ConfigKey::AwsAccountId => Some(self.aws_account_id.as_str()),
            ConfigKey::AwsRegion => Some(self.aws_region.as_str()),
            ConfigKey::EcrRepoName => Some(self.ecr_repo_name.as_str()),
            ConfigKey::EcrImageTag => Some(self.ecr_image_tag.as_str()),
            ConfigKey::EcrUri => self.ecr_uri.as_deref(),
            ConfigKey::LambdaFunctionName => self.lambda_function_name.as_deref(),
            ConfigKey::ApiId => self.api_id.as_deref(),
            ConfigKey::ApiResourceId => self.api_resource_id.as_deref(),
            ConfigKey::ApiStageName => self.api_stage_name.as_deref(),
        }
        .filter(|value| !value.is_empty())
    }

    /// Returns the value or a `MissingKey` error, for handlers that cannot
    /// proceed without it.
    pub fn require(&self, key: ConfigKey) -> Result<&str, ConfigError> {
        self.get(key).ok_or(ConfigError::MissingKey(key))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        check_account_id(&self.aws_account_id)?;
        check_region(&self.aws_region)?;
        check_repo_name(&self.ecr_repo_name)?;
        check_image_tag(&self.ecr_image_tag)?;
        for key in [
            ConfigKey::EcrUri,
            ConfigKey::LambdaFunctionName,
            ConfigKey::ApiId,
            ConfigKey::ApiResourceId,
            ConfigKey::ApiStageName,
        ] {
            if let Some(value) = self.get(key) {
                if value.chars().any(char::is_whitespace) {
                    return Err(ConfigError::InvalidValue {
                        key,
                        value: value.to_string(),
                        reason: "must not contain whitespace",
                    });
                }
            }
        }
        Ok(())
    }

    /// Forgets every value derived from AWS resources of a previous account,
    /// region or repository.
    pub fn clear_derived(&mut self) {
        self.ecr_uri = None;
        self.api_id = None;
        self.api_resource_id = None;
        self.api_stage_name = None;
    }

    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for key in ConfigKey::IDENTITY {
            hasher.update(key.as_str());
            hasher.update("=");
            hasher.update(self.get(key).unwrap_or_default());
            hasher.update("\n");
        }
        format!("{:x}", hasher.finalize())
    }

    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let (known, extra) = parse_entries(text)?;
        Self::from_entries(known, extra)
    }

    /// Like [`DeploymentConfig::parse`], but a file whose identity keys are
    /// missing or invalid is reported as [`EnvFile::Unbound`] with its unknown
    /// keys, instead of failing. Syntax errors still fail.
    pub fn parse_lenient(text: &str) -> Result<EnvFile, ConfigError> {
        let (known, extra) = parse_entries(text)?;
        match Self::from_entries(known, extra.clone()) {
            Ok(config) => Ok(EnvFile::Record(config)),
            Err(problem @ (ConfigError::MissingKey(_) | ConfigError::InvalidValue { .. })) => {
                Ok(EnvFile::Unbound { extra, problem })
            }
            Err(error) => Err(error),
        }
    }

    fn from_entries(
        mut known: BTreeMap<ConfigKey, String>,
        extra: Vec<(String, String)>,
    ) -> Result<Self, ConfigError> {
        let mut take_required = |key: ConfigKey| -> Result<String, ConfigError> {
            known
                .remove(&key)
                .filter(|value| !value.is_empty())
                .ok_or(ConfigError::MissingKey(key))
        };
        let aws_account_id = take_required(ConfigKey::AwsAccountId)?;
        let aws_region = take_required(ConfigKey::AwsRegion)?;
        let ecr_repo_name = take_required(ConfigKey::EcrRepoName)?;
        let ecr_image_tag = take_required(ConfigKey::EcrImageTag)?;

        let mut take_optional =
            |key: ConfigKey| known.remove(&key).filter(|value| !value.is_empty());

        let config = Self {
            aws_account_id,
            aws_region,
            ecr_repo_name,
            ecr_image_tag,
            ecr_uri: take_optional(ConfigKey::EcrUri),
            lambda_function_name: take_optional(ConfigKey::LambdaFunctionName),
            api_id: take_optional(ConfigKey::ApiId),
            api_resource_id: take_optional(ConfigKey::ApiResourceId),
            api_stage_name: take_optional(ConfigKey::ApiStageName),
            extra,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn render(&self) -> String {
        let mut out = String::from("# Managed by the deploy tool. Safe to `source`.\n");
        for key in ConfigKey::ALL {
            if let Some(value) = self.get(key) {
                out.push_str(&format!("export {}={}\n", key.as_str(), quote(value)));
            }
        }
        for (name, value) in &self.extra {
            out.push_str(&format!("export {name}={}\n", quote(value)));
        }
        out
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|error| ConfigError::Io {
            path: path.to_path_buf(),
            message: error.to_string(),
        })?;
        Self::parse(&text)
    }

    /// Loads the record if the file exists; a missing file is `Ok(None)`.
    pub fn load_if_present(path: &Path) -> Result<Option<Self>, ConfigError> {
        if !path.exists() {
            return Ok(None);
        }
        Self::load(path).map(Some)
    }

    /// Lenient load used before identity resolution has written a record.
    pub fn load_env_file(path: &Path) -> Result<EnvFile, ConfigError> {
        if !path.exists() {
            return Ok(EnvFile::Absent);
        }
        let text = fs::read_to_string(path).map_err(|error| ConfigError::Io {
            path: path.to_path_buf(),
            message: error.to_string(),
        })?;
        Self::parse_lenient(&text)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        self.validate()?;
        write_atomically(path, self.render().as_bytes()).map_err(|error| ConfigError::Io {
            path: path.to_path_buf(),
            message: error.to_string(),
        })
    }
}

type Entries = (BTreeMap<ConfigKey, String>, Vec<(String, String)>);

fn parse_entries(text: &str) -> Result<Entries, ConfigError> {
    let mut known: BTreeMap<ConfigKey, String> = BTreeMap::new();
    let mut extra: Vec<(String, String)> = Vec::new();

    for (index, raw_line) in text.lines().enumerate() {
        let line_number = index + 1;
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let line = line
            .strip_prefix("export ")
            .map(str::trim_start)
            .unwrap_or(line);

        let Some((name, raw_value)) = line.split_once('=') else {
            return Err(ConfigError::Syntax {
                line: line_number,
                message: "expected KEY=VALUE".to_string(),
            });
        };
        let name = name.trim();
        if !is_valid_key_name(name) {
            return Err(ConfigError::Syntax {
                line: line_number,
                message: format!("invalid key name '{name}'"),
            });
        }
        let value = unquote(raw_value.trim()).map_err(|message| ConfigError::Syntax {
            line: line_number,
            message,
        })?;

        match ConfigKey::from_name(name) {
            Some(key) => {
                known.insert(key, value);
            }
            None => match extra.iter_mut().find(|(existing, _)| existing == name) {
                Some(entry) => entry.1 = value,
                None => extra.push((name.to_string(), value)),
            },
        }
    }
    Ok((known, extra))
}

fn is_valid_key_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn unquote(raw: &str) -> Result<String, String> {
    if let Some(rest) = raw.strip_prefix('"') {
        let Some(inner) = rest.strip_suffix('"') else {
            return Err("unterminated double-quoted value".to_string());
        };
        let mut value = String::with_capacity(inner.len());
        let mut chars = inner.chars();
        while let Some(c) = chars.next() {
            if c == '\\' {
                match chars.next() {
                    Some(next @ ('"' | '\\' | '$' | '`')) => value.push(next),
                    Some(other) => {
                        value.push('\\');
                        value.push(other);
                    }
                    None => value.push('\\'),
                }
            } else {
                value.push(c);
            }
        }
        return Ok(value);
    }

    if let Some(rest) = raw.strip_prefix('\'') {
        return rest
            .strip_suffix('\'')
            .map(str::to_string)
            .ok_or_else(|| "unterminated single-quoted value".to_string());
    }

    let value = match raw.find(" #") {
        Some(position) => raw[..position].trim_end(),
        None => raw,
    };
    Ok(value.to_string())
}

fn quote(value: &str) -> String {
    let needs_quotes = value.is_empty()
        || value.chars().any(|c| {
            c.is_whitespace()
                || matches!(
                    c,
                    '\'' | '"' | '$' | '`' | '\\' | '#' | ';' | '&' | '|' | '<' | '>' | '('
                        | ')' | '{' | '}' | '*' | '?' | '!' | '~'
                )
        });
    if !needs_quotes {
        return value.to_string();
    }
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        if matches!(c, '"' | '\\' | '$' | '`') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}

fn invalid(key: ConfigKey, value: &str, reason: &'static str) -> ConfigError {
    ConfigError::InvalidValue {
        key,
        value: value.to_string(),
        reason,
    }
}

fn check_account_id(value: &str) -> Result<(), ConfigError> {
    if value.len() == 12 && value.chars().all(|c| c.is_ascii_digit()) {
        Ok(())
    } else {
        Err(invalid(
            ConfigKey::AwsAccountId,
            value,
            "expected a 12-digit account id",
        ))
    }
}

fn check_region(value: &str) -> Result<(), ConfigError> {
    let parts: Vec<&str> = value.split('-').collect();
    let well_formed = parts.len() >= 3
        && parts.iter().all(|part| {
            !part.is_empty()
                && part
                    .chars()
                    .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        })
        && parts
            .last()
            .is_some_and(|last| last.chars().all(|c| c.is_ascii_digit()));
    if well_formed {
        Ok(())
    } else {
        Err(invalid(
            ConfigKey::AwsRegion,
            value,
            "expected a region such as us-east-1",
        ))
    }
}

fn check_repo_name(value: &str) -> Result<(), ConfigError> {
    let key = ConfigKey::EcrRepoName;
    if !(2..=256).contains(&value.len()) {
        return Err(invalid(key, value, "must be 2 to 256 characters"));
    }
    if !value
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '.' | '_' | '-' | '/'))
    {
        return Err(invalid(
            key,
            value,
            "only lowercase letters, digits, '.', '_', '-' and '/' are allowed",
        ));
    }
    let starts_ok = value
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_lowercase() || c.is_ascii_digit());
    let ends_ok = value
        .chars()
        .last()
        .is_some_and(|c| c.is_ascii_lowercase() || c.is_ascii_digit());
    if !starts_ok || !ends_ok {
        return Err(invalid(
            key,
            value,
            "must start and end with a letter or digit",
        ));
    }
    Ok(())
}

fn check_image_tag(value: &str) -> Result<(), ConfigError> {
    let key = ConfigKey::EcrImageTag;
    if value.is_empty() || value.len() > 128 {
        return Err(invalid(key, value, "must be 1 to 128 characters"));
    }
    if value.starts_with('.') || value.starts_with('-') {
        return Err(invalid(key, value, "must not start with '.' or '-'"));
    }
    if !value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
    {
        return Err(invalid(
            key,
            value,
            "only letters, digits, '_', '.' and '-' are allowed",
        ));
    }
    Ok(())
}
