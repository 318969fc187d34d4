use std::sync::Arc;

use log::{info, warn};

use crate::config::{RepositorySpec, TargetConfig};
use crate::error::MirrorError;
use crate::filter::filter_tags;
use crate::models::Tag;
use crate::registry::{RegistryHost, TagResolver};
use crate::runtime::ContainerRuntime;

/// Terminal result of one mirror job
#[derive(Debug)]
pub enum JobOutcome {
    Succeeded,
    SkippedUnsupportedHost,
    SetupFailed(String),
    TransferFailed(Vec<String>),
}

/// Completion report handed back to the dispatcher
#[derive(Debug)]
pub struct JobReport {
    pub repo: String,
    pub outcome: JobOutcome,
    pub tags_mirrored: usize,
}

impl JobReport {
    /// Skipped repositories are not failures; they were never attempted
    pub fn failed(&self) -> bool {
        matches!(
            self.outcome,
            JobOutcome::SetupFailed(_) | JobOutcome::TransferFailed(_)
        )
    }
}

/// Mirrors one repository from its source registry into the target.
/// Created per dequeued repository and destroyed on completion.
pub struct MirrorJob {
    repo: RepositorySpec,
    target: TargetConfig,
    cleanup: bool,
    resolver: Arc<TagResolver>,
    runtime: Arc<dyn ContainerRuntime>,
}

impl MirrorJob {
    pub fn new(
        repo: RepositorySpec,
        target: TargetConfig,
        cleanup: bool,
        resolver: Arc<TagResolver>,
        runtime: Arc<dyn ContainerRuntime>,
    ) -> Self {
        MirrorJob {
            repo,
            target,
            cleanup,
            resolver,
            runtime,
        }
    }

    /// Drive the job to a terminal state. Every failure is contained in
    /// the returned report; sibling jobs never see it.
    pub async fn run(mut self) -> JobReport {
        let full_repo = self.repo.name.clone();

        let host = match self.setup() {
            Ok(host) => host,
            Err(MirrorError::UnsupportedHost(host)) => {
                warn!("[{full_repo}] Skipping, unsupported registry host {host}");
                return JobReport {
                    repo: full_repo,
                    outcome: JobOutcome::SkippedUnsupportedHost,
                    tags_mirrored: 0,
                };
            }
            Err(e) => {
                warn!("[{full_repo}] Setup failed: {e}");
                return JobReport {
                    repo: full_repo,
                    outcome: JobOutcome::SetupFailed(e.to_string()),
                    tags_mirrored: 0,
                };
            }
        };

        let tags = match self.resolver.resolve(host, &self.repo.name).await {
            Ok(tags) => tags,
            Err(e) => {
                warn!("[{full_repo}] Failed to resolve tags: {e:#}");
                return JobReport {
                    repo: full_repo,
                    outcome: JobOutcome::SetupFailed(format!("{e:#}")),
                    tags_mirrored: 0,
                };
            }
        };

        let retained = filter_tags(
            tags,
            &self.repo.match_tags,
            &self.repo.drop_tags,
            self.repo.max_tags,
        );
        info!(
            "[{full_repo}] {} tags retained after filtering",
            retained.len()
        );

        let failed = self.transfer(host, &retained).await;
        let tags_mirrored = retained.len() - failed.len();
        let outcome = if failed.is_empty() {
            JobOutcome::Succeeded
        } else {
            JobOutcome::TransferFailed(failed)
        };

        JobReport {
            repo: full_repo,
            outcome,
            tags_mirrored,
        }
    }

    /// Split the `name:tag` shorthand into name plus a single-entry match
    /// list and resolve the source host. Runs before any network call, so
    /// an unsupported host never hits the wire.
    fn setup(&mut self) -> Result<RegistryHost, MirrorError> {
        if let Some((name, tag)) = self.repo.name.split_once(':') {
            self.repo.match_tags = vec![tag.to_string()];
            self.repo.name = name.to_string();
        }
        RegistryHost::resolve(&self.repo.host)
    }

    /// Source image ref without the tag. `private_registry` overrides the
    /// host-derived pull prefix.
    fn source_image(&self, host: RegistryHost) -> String {
        if !self.repo.private_registry.is_empty() {
            return format!("{}/{}", self.repo.private_registry, self.repo.name);
        }
        match host.pull_prefix() {
            Some(prefix) => format!("{}/{}", prefix, self.repo.name),
            None => self.repo.name.clone(),
        }
    }

    /// Target image ref without the tag; the repository's prefix override
    /// wins over the global target prefix
    fn target_image(&self) -> String {
        let prefix = self
            .repo
            .target_prefix
            .as_deref()
            .or(self.target.prefix.as_deref())
            .unwrap_or("");
        format!("{}/{}{}", self.target.registry, prefix, self.repo.name)
    }

    /// Pull, retag and push every retained tag. Returns the names of tags
    /// whose transfer failed; one failing tag never stops the rest.
    async fn transfer(&self, host: RegistryHost, tags: &[Tag]) -> Vec<String> {
        let source = self.source_image(host);
        let target = self.target_image();
        let mut failed = Vec::new();

        for tag in tags {
            info!(
                "[{}] Mirroring {source}:{tag} -> {target}:{tag}",
                self.repo.name,
                tag = tag.name
            );
            if let Err(e) = self.transfer_one(&source, &target, &tag.name).await {
                warn!(
                    "[{}] Failed to mirror tag {}: {e}",
                    self.repo.name, tag.name
                );
                failed.push(tag.name.clone());
            }
        }

        failed
    }

    async fn transfer_one(
        &self,
        source: &str,
        target: &str,
        tag: &str,
    ) -> Result<(), MirrorError> {
        self.runtime.pull(source, tag).await?;
        self.runtime
            .tag(&format!("{source}:{tag}"), &format!("{target}:{tag}"))
            .await?;
        self.runtime.push(target, tag).await?;

        if self.cleanup {
            // keep the local daemon from accumulating mirrored layers
            if let Err(e) = self.runtime.remove(target, tag).await {
                warn!("[{}] Cleanup of {target}:{tag} failed: {e}", self.repo.name);
            }
            if let Err(e) = self.runtime.remove(source, tag).await {
                warn!("[{}] Cleanup of {source}:{tag} failed: {e}", self.repo.name);
            }
        }

        Ok(())
    }
}
