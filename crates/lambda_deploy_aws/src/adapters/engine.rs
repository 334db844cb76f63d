use std::path::PathBuf;

use lambda_deploy_core::image::ImageReference;

use crate::adapters::registry::RegistryCredentials;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildRequest {
    pub context: PathBuf,
    pub dockerfile: PathBuf,
    pub image: ImageReference,
    pub platform: Option<String>,
}

pub trait ContainerEngine {
    fn build(&self, request: &BuildRequest) -> Result<(), String>;

    fn login(&self, credentials: &RegistryCredentials) -> Result<(), String>;

    fn tag(&self, source: &ImageReference, target: &ImageReference) -> Result<(), String>;

    fn push(&self, image: &ImageReference) -> Result<(), String>;
}
