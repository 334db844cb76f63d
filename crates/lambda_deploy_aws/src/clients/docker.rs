use std::io::Write;
use std::process::{Command, Stdio};

use lambda_deploy_core::image::ImageReference;

use crate::adapters::engine::{BuildRequest, ContainerEngine};
use crate::adapters::registry::RegistryCredentials;

/// Drives the `docker` CLI; output streams straight to the terminal.
pub struct DockerCli {
    program: String,
}

impl Default for DockerCli {
    fn default() -> Self {
        Self {
            program: "docker".to_string(),
        }
    }
}

impl DockerCli {
    fn run(&self, args: &[&str]) -> Result<(), String> {
        let status = Command::new(&self.program)
            .args(args)
            .status()
            .map_err(|error| format!("failed to start {}: {error}", self.program))?;
        if status.success() {
            Ok(())
        } else {
            Err(format!("{} {} exited with {status}", self.program, args.join(" ")))
        }
    }
}

impl ContainerEngine for DockerCli {
    fn build(&self, request: &BuildRequest) -> Result<(), String> {
        let image = request.image.to_string();
        let dockerfile = request.dockerfile.to_string_lossy().into_owned();
        let context = request.context.to_string_lossy().into_owned();
        let mut args = vec!["build", "-t", image.as_str(), "-f", dockerfile.as_str()];
        if let Some(platform) = &request.platform {
            args.extend(["--platform", platform.as_str()]);
        }
        args.push(context.as_str());
        self.run(&args)
    }

    fn login(&self, credentials: &RegistryCredentials) -> Result<(), String> {
        let mut child = Command::new(&self.program)
            .args([
                "login",
                "--username",
                credentials.username.as_str(),
                "--password-stdin",
                credentials.registry.as_str(),
            ])
            .stdin(Stdio::piped())
            .spawn()
            .map_err(|error| format!("failed to start {}: {error}", self.program))?;
        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(credentials.password.as_bytes())
                .map_err(|error| format!("failed to pass registry password: {error}"))?;
        }
        let status = child
            .wait()
            .map_err(|error| format!("failed to wait for docker login: {error}"))?;
        if status.success() {
            Ok(())
        } else {
            Err(format!("docker login to {} exited with {status}", credentials.registry))
        }
    }

    fn tag(&self, source: &ImageReference, target: &ImageReference) -> Result<(), String> {
        let (source, target) = (source.to_string(), target.to_string());
        self.run(&["tag", source.as_str(), target.as_str()])
    }

    fn push(&self, image: &ImageReference) -> Result<(), String> {
        let image = image.to_string();
        self.run(&["push", image.as_str()])
    }
}
