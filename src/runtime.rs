use async_trait::async_trait;
use log::debug;
use tokio::process::Command;

use crate::error::MirrorError;

/// Local container runtime used to move images around. Mirror jobs depend
/// only on this seam; every operation may fail transiently and reports the
/// runtime's own error text.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Startup reachability check
    async fn ping(&self) -> Result<(), MirrorError>;

    /// Pull `image:tag` from its source registry
    async fn pull(&self, image: &str, tag: &str) -> Result<(), MirrorError>;

    /// Retag a local image ref under a new ref
    async fn tag(&self, src: &str, dst: &str) -> Result<(), MirrorError>;

    /// Push `image:tag` to its registry
    async fn push(&self, image: &str, tag: &str) -> Result<(), MirrorError>;

    /// Remove a local image ref
    async fn remove(&self, image: &str, tag: &str) -> Result<(), MirrorError>;
}

/// ContainerRuntime backed by the docker CLI
#[derive(Debug, Default)]
pub struct DockerCli;

impl DockerCli {
    pub fn new() -> Self {
        DockerCli
    }

    async fn run(args: &[&str]) -> Result<(), MirrorError> {
        debug!("docker {}", args.join(" "));
        let output = Command::new("docker")
            .args(args)
            .output()
            .await
            .map_err(|e| MirrorError::Runtime(format!("failed to run docker: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(MirrorError::Runtime(format!(
                "docker {} failed: {}",
                args.first().copied().unwrap_or_default(),
                stderr.trim()
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl ContainerRuntime for DockerCli {
    async fn ping(&self) -> Result<(), MirrorError> {
        Self::run(&["version", "--format", "{{.Server.Version}}"]).await
    }

    async fn pull(&self, image: &str, tag: &str) -> Result<(), MirrorError> {
        Self::run(&["pull", &format!("{image}:{tag}")]).await
    }

    async fn tag(&self, src: &str, dst: &str) -> Result<(), MirrorError> {
        Self::run(&["tag", src, dst]).await
    }

    async fn push(&self, image: &str, tag: &str) -> Result<(), MirrorError> {
        Self::run(&["push", &format!("{image}:{tag}")]).await
    }

    async fn remove(&self, image: &str, tag: &str) -> Result<(), MirrorError> {
        Self::run(&["image", "rm", &format!("{image}:{tag}")]).await
    }
}
