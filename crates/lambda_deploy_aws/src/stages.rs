//! One handler per deployment stage. Handlers reach AWS, Docker and HTTP only
//! through the adapter traits and report what they did as a [`StageOutcome`].

use lambda_deploy_core::stages::Stage;
use serde::Serialize;
use serde_json::Value;

pub mod cors;
pub mod function;
pub mod identity;
pub mod preflight;
pub mod push;
pub mod registry;
pub mod routing;
pub mod smoke;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageOutcome {
    pub stage: Stage,
    pub summary: String,
    pub detail: Value,
}

impl StageOutcome {
    pub fn new(stage: Stage, summary: impl Into<String>, detail: Value) -> Self {
        Self {
            stage,
            summary: summary.into(),
            detail,
        }
    }
}
