use aws_config::SdkConfig;
use chrono::{DateTime, Utc};

use crate::adapters::logs::{LogEvent, LogSource};
use crate::clients::{block_on, describe_error};

pub struct CloudWatchLogSource {
    client: aws_sdk_cloudwatchlogs::Client,
}

impl CloudWatchLogSource {
    pub fn new(config: &SdkConfig) -> Self {
        Self {
            client: aws_sdk_cloudwatchlogs::Client::new(config),
        }
    }
}

impl LogSource for CloudWatchLogSource {
    fn recent_events(
        &self,
        log_group: &str,
        since: DateTime<Utc>,
        limit: i32,
    ) -> Result<Vec<LogEvent>, String> {
        let client = self.client.clone();
        let log_group = log_group.to_string();
        let output = block_on(async move {
            client
                .filter_log_events()
                .log_group_name(log_group)
                .start_time(since.timestamp_millis())
                .limit(limit)
                .send()
                .await
        })
        .map_err(describe_error)?;

        Ok(output
            .events()
            .iter()
            .filter_map(|event| {
                let timestamp = DateTime::from_timestamp_millis(event.timestamp()?)?;
                Some(LogEvent {
                    timestamp,
                    message: event.message().unwrap_or_default().trim_end().to_string(),
                })
            })
            .collect())
    }
}
