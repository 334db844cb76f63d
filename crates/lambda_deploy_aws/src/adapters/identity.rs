#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerIdentity {
    pub account_id: String,
    pub arn: String,
    /// Region resolved by the SDK configuration chain, if any.
    pub region: Option<String>,
}

pub trait IdentityResolver {
    fn caller_identity(&self) -> Result<CallerIdentity, String>;
}
