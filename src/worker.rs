use std::sync::Arc;
use std::thread;

use log::{debug, info, warn};
use tokio::sync::{mpsc, Mutex};

use crate::config::{Config, RepositorySpec};
use crate::mirror::{JobReport, MirrorJob};
use crate::registry::TagResolver;
use crate::runtime::ContainerRuntime;

/// Backpressure bound on the repository job queue; the enqueue loop blocks
/// once this many jobs are waiting
const QUEUE_CAPACITY: usize = 5;

/// Fans the configured repositories out over a fixed pool of mirror
/// workers, each running one job at a time to its terminal state
pub struct Dispatcher {
    config: Config,
    resolver: Arc<TagResolver>,
    runtime: Arc<dyn ContainerRuntime>,
}

impl Dispatcher {
    pub fn new(
        config: Config,
        resolver: Arc<TagResolver>,
        runtime: Arc<dyn ContainerRuntime>,
    ) -> Self {
        Dispatcher {
            config,
            resolver,
            runtime,
        }
    }

    fn worker_count(&self, jobs: usize) -> usize {
        let configured = if self.config.workers > 0 {
            self.config.workers
        } else {
            thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
        };
        configured.min(jobs).max(1)
    }

    /// Enqueue every repository whose name starts with `prefix` (all of
    /// them when no prefix is given) and block until each job has reported
    /// a terminal state. Per-job failures land in the returned reports and
    /// never abort sibling jobs.
    pub async fn run(&self, prefix: Option<&str>) -> Vec<JobReport> {
        let repos: Vec<RepositorySpec> = self
            .config
            .repositories
            .iter()
            .filter(|repo| prefix.is_none_or(|p| repo.name.starts_with(p)))
            .cloned()
            .collect();

        if repos.is_empty() {
            info!("No repositories to mirror");
            return Vec::new();
        }

        let workers = self.worker_count(repos.len());
        info!(
            "Mirroring {} repositories with {} workers",
            repos.len(),
            workers
        );

        let (tx, rx) = mpsc::channel::<RepositorySpec>(QUEUE_CAPACITY);
        let rx = Arc::new(Mutex::new(rx));

        let mut handles = Vec::with_capacity(workers);
        for worker_id in 0..workers {
            let rx = Arc::clone(&rx);
            let resolver = Arc::clone(&self.resolver);
            let runtime = Arc::clone(&self.runtime);
            let target = self.config.target.clone();
            let cleanup = self.config.cleanup;

            handles.push(tokio::spawn(async move {
                let mut reports = Vec::new();
                loop {
                    let repo = rx.lock().await.recv().await;
                    let Some(repo) = repo else { break };

                    debug!("Worker {worker_id} picked up {}", repo.name);
                    let job = MirrorJob::new(
                        repo,
                        target.clone(),
                        cleanup,
                        Arc::clone(&resolver),
                        Arc::clone(&runtime),
                    );
                    reports.push(job.run().await);
                }
                reports
            }));
        }

        for repo in repos {
            if tx.send(repo).await.is_err() {
                break;
            }
        }
        drop(tx);

        let mut reports = Vec::new();
        for handle in handles {
            match handle.await {
                Ok(worker_reports) => reports.extend(worker_reports),
                Err(e) => warn!("Worker task failed: {e}"),
            }
        }
        reports
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TargetConfig;
    use crate::mirror::JobOutcome;
    use crate::runtime::testing::FakeRuntime;

    fn config_with(repos: &[(&str, &str)], workers: usize) -> Config {
        Config {
            cleanup: false,
            workers,
            repositories: repos
                .iter()
                .map(|(name, host)| RepositorySpec {
                    private_registry: String::new(),
                    name: name.to_string(),
                    match_tags: Vec::new(),
                    drop_tags: Vec::new(),
                    max_tags: 0,
                    target_prefix: None,
                    host: host.to_string(),
                })
                .collect(),
            target: TargetConfig {
                registry: "registry.internal:5000".to_string(),
                prefix: None,
            },
        }
    }

    fn dispatcher(config: Config) -> Dispatcher {
        Dispatcher::new(
            config,
            Arc::new(TagResolver::new().unwrap()),
            Arc::new(FakeRuntime::new()),
        )
    }

    // Repositories on an unrecognized host terminate in setup, so pool
    // mechanics can be exercised without any network
    #[tokio::test]
    async fn test_pool_drains_every_enqueued_job() {
        let repos = [
            ("one", "nowhere.example.com"),
            ("two", "nowhere.example.com"),
            ("three", "nowhere.example.com"),
            ("four", "nowhere.example.com"),
        ];
        let reports = dispatcher(config_with(&repos, 2)).run(None).await;

        assert_eq!(reports.len(), 4);
        assert!(reports
            .iter()
            .all(|r| matches!(r.outcome, JobOutcome::SkippedUnsupportedHost)));
    }

    #[tokio::test]
    async fn test_prefix_filter_limits_enqueued_repositories() {
        let repos = [
            ("app/one", "nowhere.example.com"),
            ("app/two", "nowhere.example.com"),
            ("lib/other", "nowhere.example.com"),
        ];
        let reports = dispatcher(config_with(&repos, 2)).run(Some("app/")).await;

        let mut names: Vec<&str> = reports.iter().map(|r| r.repo.as_str()).collect();
        names.sort_unstable();
        assert_eq!(names, vec!["app/one", "app/two"]);
    }

    #[tokio::test]
    async fn test_no_matching_repositories_returns_empty() {
        let reports = dispatcher(config_with(&[("app/one", "")], 1))
            .run(Some("zzz/"))
            .await;
        assert!(reports.is_empty());
    }

    #[test]
    fn test_worker_count_defaults_and_caps() {
        let d = dispatcher(config_with(&[("a", ""), ("b", "")], 8));
        assert_eq!(d.worker_count(2), 2);

        let d = dispatcher(config_with(&[("a", "")], 3));
        assert_eq!(d.worker_count(10), 3);

        let d = dispatcher(config_with(&[("a", "")], 0));
        assert!(d.worker_count(64) >= 1);
    }
}
