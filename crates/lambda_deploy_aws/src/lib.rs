//! AWS-oriented adapters, stage handlers and the `deploy` CLI.
//!
//! Stage handlers talk to the outside world only through the traits in
//! [`adapters`]; [`clients`] provides the AWS SDK, Docker CLI and HTTP
//! implementations, and tests substitute in-memory fakes.

pub mod adapters;
pub mod cli;
pub mod clients;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod stages;
