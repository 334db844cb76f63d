use aws_config::SdkConfig;

use crate::adapters::identity::{CallerIdentity, IdentityResolver};
use crate::clients::{block_on, describe_error};

pub struct StsIdentityResolver {
    client: aws_sdk_sts::Client,
    region: Option<String>,
}

impl StsIdentityResolver {
    pub fn new(config: &SdkConfig) -> Self {
        Self {
            client: aws_sdk_sts::Client::new(config),
            region: config.region().map(|region| region.to_string()),
        }
    }
}

impl IdentityResolver for StsIdentityResolver {
    fn caller_identity(&self) -> Result<CallerIdentity, String> {
        let client = self.client.clone();
        let output = block_on(async move { client.get_caller_identity().send().await })
            .map_err(describe_error)?;

        let account_id = output
            .account()
            .filter(|account| !account.is_empty())
            .ok_or_else(|| "GetCallerIdentity returned no account".to_string())?;
        Ok(CallerIdentity {
            account_id: account_id.to_string(),
            arn: output.arn().unwrap_or_default().to_string(),
            region: self.region.clone(),
        })
    }
}
