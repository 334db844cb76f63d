use chrono::{DateTime, Utc};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEvent {
    pub timestamp: DateTime<Utc>,
    pub message: String,
}

pub trait LogSource {
    fn recent_events(
        &self,
        log_group: &str,
        since: DateTime<Utc>,
        limit: i32,
    ) -> Result<Vec<LogEvent>, String>;
}

pub fn function_log_group(function_name: &str) -> String {
    format!("/aws/lambda/{function_name}")
}
