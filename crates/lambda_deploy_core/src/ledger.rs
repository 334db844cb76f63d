//! Recorded stage completion, persisted next to the configuration record.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::persist::write_atomically;
use crate::stages::Stage;

pub const LEDGER_SCHEMA_VERSION: &str = "v1";
pub const LEDGER_FILE_NAME: &str = ".deploy-state.json";
/// A registry login closer than this to expiry is refreshed.
pub const LOGIN_EXPIRY_MARGIN_MINUTES: i64 = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageRecord {
    pub completed_at: DateTime<Utc>,
    #[serde(default)]
    pub detail: Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryLogin {
    pub registry: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageLedger {
    pub schema_version: String,
    #[serde(default)]
    pub config_fingerprint: Option<String>,
    #[serde(default)]
    pub stages: BTreeMap<Stage, StageRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registry_login: Option<RegistryLogin>,
}

impl Default for StageLedger {
    fn default() -> Self {
        Self {
            schema_version: LEDGER_SCHEMA_VERSION.to_string(),
            config_fingerprint: None,
            stages: BTreeMap::new(),
            registry_login: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerError {
    pub path: PathBuf,
    pub message: String,
}

impl fmt::Display for LedgerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stage ledger '{}': {}", self.path.display(), self.message)
    }
}

impl std::error::Error for LedgerError {}

/// Ledger path for a given configuration file: same directory, fixed name.
pub fn ledger_path_for(env_path: &Path) -> PathBuf {
    env_path.with_file_name(LEDGER_FILE_NAME)
}

impl StageLedger {
    pub fn load_or_default(path: &Path) -> Result<Self, LedgerError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = fs::read_to_string(path).map_err(|error| LedgerError {
            path: path.to_path_buf(),
            message: error.to_string(),
        })?;
        let ledger: Self = serde_json::from_str(&text).map_err(|error| LedgerError {
            path: path.to_path_buf(),
            message: format!("malformed ledger: {error}"),
        })?;
        if ledger.schema_version != LEDGER_SCHEMA_VERSION {
            return Err(LedgerError {
                path: path.to_path_buf(),
                message: format!(
                    "unsupported schema_version '{}' (expected {LEDGER_SCHEMA_VERSION})",
                    ledger.schema_version
                ),
            });
        }
        Ok(ledger)
    }

    pub fn save(&self, path: &Path) -> Result<(), LedgerError> {
        let body = serde_json::to_vec_pretty(self).map_err(|error| LedgerError {
            path: path.to_path_buf(),
            message: error.to_string(),
        })?;
        write_atomically(path, &body).map_err(|error| LedgerError {
            path: path.to_path_buf(),
            message: error.to_string(),
        })
    }

    /// Associates the ledger with a configuration fingerprint. A different
    /// fingerprint means a different deployment target, so every record made
    /// for the previous one is dropped. Returns whether a reset happened.
    pub fn bind_config(&mut self, fingerprint: &str) -> bool {
        let reset = self
            .config_fingerprint
            .as_deref()
            .is_some_and(|existing| existing != fingerprint);
        if reset {
            self.stages.clear();
            self.registry_login = None;
        }
        self.config_fingerprint = Some(fingerprint.to_string());
        reset
    }

    pub fn is_complete(&self, stage: Stage) -> bool {
        self.stages.contains_key(&stage)
    }

    pub fn record(&mut self, stage: Stage, completed_at: DateTime<Utc>, detail: Value) {
        for invalidated in stage.invalidates() {
            self.stages.remove(invalidated);
        }
        self.stages.insert(
            stage,
            StageRecord {
                completed_at,
                detail,
            },
        );
    }

    pub fn login_is_fresh(&self, registry: &str, now: DateTime<Utc>) -> bool {
        self.registry_login.as_ref().is_some_and(|login| {
            login.registry == registry
                && login.expires_at - Duration::minutes(LOGIN_EXPIRY_MARGIN_MINUTES) > now
        })
    }

    pub fn record_login(&mut self, registry: &str, expires_at: DateTime<Utc>) {
        self.registry_login = Some(RegistryLogin {
            registry: registry.to_string(),
            expires_at,
        });
    }
}
