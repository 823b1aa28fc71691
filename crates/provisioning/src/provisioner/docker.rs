//! Docker provisioner.
//!
//! Runs one container per server through the docker CLI:
//!
//! - **start**: `docker run -d --name <hostname> [--network <net>] -e ID=<id> <image>`
//! - **stop**: `docker stop <hostname>` then `docker rm <hostname>`
//! - **address**: `<hostname>:<port>`, resolved by docker's embedded DNS when
//!   the load balancer runs on the same network
//!
//! # Limitations
//!
//! - Requires the docker CLI on `PATH` (optionally via `sudo`)
//! - No readiness wait: a container counts as started once `docker run -d`
//!   returns

use std::path::PathBuf;

use async_trait::async_trait;
use corelib::{Provisioner, Result, ServerId};
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::error::ProvisionError;

/// Settings for the docker provisioner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DockerConfig {
    /// Docker executable.
    pub binary: String,
    /// Prefix every command with `sudo`.
    pub sudo: bool,
    /// Image every backend container runs.
    pub image: String,
    /// Network the containers join.
    pub network: Option<String>,
    /// Port the backend listens on inside its container.
    pub port: u16,
    /// Directory to build `image` from before the first start.
    pub build_context: Option<PathBuf>,
}

impl Default for DockerConfig {
    fn default() -> Self {
        Self {
            binary: "docker".to_string(),
            sudo: false,
            image: "ring-balancer-replica:latest".to_string(),
            network: None,
            port: 5000,
            build_context: None,
        }
    }
}

/// Starts and stops backend containers with the docker CLI.
#[derive(Debug, Clone)]
pub struct DockerProvisioner {
    config: DockerConfig,
}

impl DockerProvisioner {
    pub fn new(config: DockerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DockerConfig {
        &self.config
    }

    /// Arguments for `docker run`.
    pub fn run_args(&self, id: ServerId, hostname: &str) -> Vec<String> {
        let mut args = vec![
            "run".to_string(),
            "-d".to_string(),
            "--name".to_string(),
            hostname.to_string(),
        ];
        if let Some(network) = &self.config.network {
            args.push("--network".to_string());
            args.push(network.clone());
        }
        args.push("-e".to_string());
        args.push(format!("ID={id}"));
        args.push(self.config.image.clone());
        args
    }

    /// Arguments for `docker build`, if a build context is configured.
    pub fn build_args(&self) -> Option<Vec<String>> {
        let context = self.config.build_context.as_ref()?;
        Some(vec![
            "build".to_string(),
            "--tag".to_string(),
            self.config.image.clone(),
            context.display().to_string(),
        ])
    }

    /// Build the backend image once, before any server is started.
    ///
    /// Does nothing when no build context is configured.
    pub async fn build_image(&self) -> std::result::Result<(), ProvisionError> {
        let Some(args) = self.build_args() else {
            return Ok(());
        };
        info!(image = %self.config.image, "building backend image");
        self.docker(args).await
    }

    async fn docker(&self, args: Vec<String>) -> std::result::Result<(), ProvisionError> {
        let mut command = if self.config.sudo {
            let mut c = Command::new("sudo");
            c.arg(&self.config.binary);
            c
        } else {
            Command::new(&self.config.binary)
        };
        command.args(&args);

        let rendered = format!("{} {}", self.config.binary, args.join(" "));
        debug!(command = %rendered, "running docker");

        let output = command
            .output()
            .await
            .map_err(|source| ProvisionError::Spawn {
                command: rendered.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(ProvisionError::CommandFailed {
                command: rendered,
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl Provisioner for DockerProvisioner {
    async fn start(&self, id: ServerId, hostname: &str) -> Result<()> {
        self.docker(self.run_args(id, hostname))
            .await
            .map_err(|e| e.for_host(hostname))?;
        info!(server = %id, %hostname, image = %self.config.image, "container started");
        Ok(())
    }

    async fn stop(&self, hostname: &str) -> Result<()> {
        let stopped = self
            .docker(vec!["stop".to_string(), hostname.to_string()])
            .await;
        if let Err(e) = &stopped {
            warn!(%hostname, error = %e, "docker stop failed, removing anyway");
        }
        let removed = self.docker(vec!["rm".to_string(), hostname.to_string()]).await;

        stopped
            .and(removed)
            .map_err(|e| e.for_host(hostname))?;
        info!(%hostname, "container removed");
        Ok(())
    }

    async fn resolve_address(&self, hostname: &str) -> Result<String> {
        Ok(format!("{hostname}:{}", self.config.port))
    }

    fn name(&self) -> &'static str {
        "docker"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_args_with_network() {
        let provisioner = DockerProvisioner::new(DockerConfig {
            network: Some("lbnet".into()),
            image: "replica:1".into(),
            ..Default::default()
        });
        assert_eq!(
            provisioner.run_args(ServerId(3), "s3"),
            vec!["run", "-d", "--name", "s3", "--network", "lbnet", "-e", "ID=3", "replica:1"]
        );
    }

    #[test]
    fn test_run_args_without_network() {
        let provisioner = DockerProvisioner::new(DockerConfig::default());
        let args = provisioner.run_args(ServerId(1), "s1");
        assert!(!args.contains(&"--network".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("ring-balancer-replica:latest"));
    }

    #[test]
    fn test_build_args_only_with_context() {
        assert!(DockerProvisioner::new(DockerConfig::default()).build_args().is_none());

        let provisioner = DockerProvisioner::new(DockerConfig {
            build_context: Some(PathBuf::from("/replica")),
            ..Default::default()
        });
        assert_eq!(
            provisioner.build_args().unwrap(),
            vec!["build", "--tag", "ring-balancer-replica:latest", "/replica"]
        );
    }

    #[tokio::test]
    async fn test_resolve_uses_container_port() {
        let provisioner = DockerProvisioner::new(DockerConfig {
            port: 8080,
            ..Default::default()
        });
        assert_eq!(provisioner.resolve_address("s1").await.unwrap(), "s1:8080");
    }

    #[tokio::test]
    async fn test_missing_binary_is_provisioning_failure() {
        let provisioner = DockerProvisioner::new(DockerConfig {
            binary: "/nonexistent/docker-binary".into(),
            ..Default::default()
        });
        let err = provisioner.start(ServerId(1), "s1").await.unwrap_err();
        assert!(matches!(err, corelib::Error::ProvisioningFailed { ref hostname, .. } if hostname == "s1"));
    }
}
