//! Deployment domain primitives for the containerized Lambda predictor.
//!
//! This crate owns the persisted configuration record, stage ordering and
//! preconditions, the stage ledger, and the request/response contracts used
//! to wire and probe the deployed service. It intentionally excludes AWS SDK
//! and process-spawning concerns; those live in `lambda_deploy_aws`.

pub mod config;
pub mod gateway;
pub mod image;
pub mod invocation;
pub mod ledger;
pub mod persist;
pub mod preflight;
pub mod stages;
