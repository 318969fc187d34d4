use std::env;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use reqwest::header::AUTHORIZATION;
use reqwest::Client;

use crate::error::MirrorError;
use crate::models::{
    DockerHubTagsResponse, GcrTagsResponse, LoginResponse, QuayTagsResponse, Tag, TagPage,
};
use crate::retry::{Attempt, RetryPolicy};

const HTTP_TIMEOUT: Duration = Duration::from_secs(10);
const DOCKER_HUB_PAGE_SIZE: u32 = 2048;
const DOCKER_HUB_LOGIN_URL: &str = "https://hub.docker.com/v2/users/login/";

/// Source registry hosts with a supported tag-listing API
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryHost {
    DockerHub,
    Quay,
    Gcr,
    K8s,
}

impl RegistryHost {
    /// Resolve a configured host string; empty defaults to Docker Hub
    pub fn resolve(host: &str) -> Result<RegistryHost, MirrorError> {
        match host {
            "" | "hub.docker.com" => Ok(RegistryHost::DockerHub),
            "quay.io" => Ok(RegistryHost::Quay),
            "gcr.io" => Ok(RegistryHost::Gcr),
            "k8s.gcr.io" => Ok(RegistryHost::K8s),
            other => Err(MirrorError::UnsupportedHost(other.to_string())),
        }
    }

    /// First tag-listing URL for a repository on this host
    pub fn initial_url(&self, repo: &str) -> String {
        match self {
            RegistryHost::DockerHub => format!(
                "https://registry.hub.docker.com/v2/repositories/{}/tags/?page_size={}",
                hub_repo_name(repo),
                DOCKER_HUB_PAGE_SIZE
            ),
            RegistryHost::Quay => format!("https://quay.io/api/v1/repository/{repo}/tag"),
            RegistryHost::Gcr => format!("https://gcr.io/v2/{repo}/tags/list"),
            RegistryHost::K8s => format!("https://k8s.gcr.io/v2/{repo}/tags/list"),
        }
    }

    /// Image prefix used when pulling from this host; Docker Hub refs are
    /// bare names
    pub fn pull_prefix(&self) -> Option<&'static str> {
        match self {
            RegistryHost::DockerHub => None,
            RegistryHost::Quay => Some("quay.io"),
            RegistryHost::Gcr => Some("gcr.io"),
            RegistryHost::K8s => Some("k8s.gcr.io"),
        }
    }

    /// Decode one page of this host's tag-listing response
    pub fn decode_page(&self, repo: &str, body: &str) -> Result<TagPage> {
        match self {
            RegistryHost::DockerHub => {
                let page: DockerHubTagsResponse = serde_json::from_str(body)
                    .with_context(|| format!("Failed to parse Docker Hub tag page for {repo}"))?;
                Ok(TagPage {
                    tags: page.results.into_iter().map(Tag::from).collect(),
                    next: page.next,
                })
            }
            RegistryHost::Quay => {
                let page: QuayTagsResponse = serde_json::from_str(body)
                    .with_context(|| format!("Failed to parse Quay tag page for {repo}"))?;
                if page.has_additional {
                    warn!("Quay reports additional tag pages for {repo}; only the first page is mirrored");
                }
                Ok(TagPage {
                    tags: page.tags.into_iter().map(Tag::from).collect(),
                    next: None,
                })
            }
            RegistryHost::Gcr | RegistryHost::K8s => {
                let page: GcrTagsResponse = serde_json::from_str(body)
                    .with_context(|| format!("Failed to parse tag list for {repo}"))?;
                Ok(TagPage {
                    tags: page.tags.into_iter().map(Tag::named).collect(),
                    next: None,
                })
            }
        }
    }

    /// Freshness ordering, newest first where the host reports timestamps.
    /// GCR and k8s.gcr.io expose none, so their list order stands.
    pub fn sort_tags(&self, tags: &mut [Tag]) {
        match self {
            RegistryHost::DockerHub => {
                tags.sort_by(|a, b| {
                    timestamp_or_min(b.last_updated).cmp(&timestamp_or_min(a.last_updated))
                });
            }
            RegistryHost::Quay => {
                tags.sort_by(|a, b| {
                    timestamp_or_min(b.last_modified).cmp(&timestamp_or_min(a.last_modified))
                });
            }
            RegistryHost::Gcr | RegistryHost::K8s => {}
        }
    }
}

/// Official Docker Hub images live under the implicit library/ namespace
fn hub_repo_name(repo: &str) -> String {
    if repo.contains('/') {
        repo.to_string()
    } else {
        format!("library/{repo}")
    }
}

fn timestamp_or_min(ts: Option<DateTime<Utc>>) -> i64 {
    ts.map(|t| t.timestamp()).unwrap_or(i64::MIN)
}

/// Resolves the complete ordered tag list for one repository, following
/// pagination where the host supports it
pub struct TagResolver {
    client: Client,
    policy: RetryPolicy,
}

impl TagResolver {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(TagResolver {
            client,
            policy: RetryPolicy::default(),
        })
    }

    /// Fetch every tag page for `repo` on `host` and return the tags in
    /// freshness order. The first page fetch that survives all retries as
    /// an error aborts the whole resolution.
    pub async fn resolve(&self, host: RegistryHost, repo: &str) -> Result<Vec<Tag>> {
        let token = if host == RegistryHost::DockerHub {
            self.docker_hub_login().await?
        } else {
            None
        };

        let mut all_tags: Vec<Tag> = Vec::new();
        let mut url = host.initial_url(repo);

        loop {
            debug!("GET {url}");
            let body = self.fetch_page(&url, token.as_deref()).await?;
            let page = host.decode_page(repo, &body)?;
            all_tags.extend(page.tags);

            match page.next {
                Some(next) => url = next,
                None => break,
            }
        }

        host.sort_tags(&mut all_tags);
        Ok(all_tags)
    }

    /// One page GET under the bounded retry policy
    async fn fetch_page(&self, url: &str, token: Option<&str>) -> Result<String, MirrorError> {
        self.policy
            .execute(url, || {
                let client = self.client.clone();
                let url = url.to_string();
                let token = token.map(str::to_string);

                async move {
                    let mut request = client.get(&url);
                    if let Some(token) = &token {
                        request = request.header(AUTHORIZATION, format!("JWT {token}"));
                    }

                    let response = match request.send().await {
                        Ok(response) => response,
                        Err(e) => return Attempt::TransportError(e.to_string()),
                    };

                    let status = response.status();
                    if status.as_u16() == 429 {
                        let reset = response
                            .headers()
                            .get("X-RateLimit-Reset")
                            .and_then(|v| v.to_str().ok())
                            .map(str::to_string);
                        return Attempt::RateLimited { reset };
                    }
                    if !status.is_success() {
                        return Attempt::BadStatus(status.as_u16());
                    }

                    match response.text().await {
                        Ok(body) => Attempt::Ok(body),
                        Err(e) => Attempt::TransportError(e.to_string()),
                    }
                }
            })
            .await
    }

    /// Obtain a Docker Hub bearer token when DOCKERHUB_USER and
    /// DOCKERHUB_PASSWORD are both present in the environment
    async fn docker_hub_login(&self) -> Result<Option<String>> {
        let (Ok(user), Ok(password)) = (env::var("DOCKERHUB_USER"), env::var("DOCKERHUB_PASSWORD"))
        else {
            return Ok(None);
        };
        if user.is_empty() || password.is_empty() {
            return Ok(None);
        }

        info!("Listing tags using Docker Hub credentials from the environment");
        let response = self
            .client
            .post(DOCKER_HUB_LOGIN_URL)
            .json(&serde_json::json!({ "username": user, "password": password }))
            .send()
            .await
            .context("Docker Hub login request failed")?
            .error_for_status()
            .context("Docker Hub login was rejected")?;

        let login: LoginResponse = response
            .json()
            .await
            .context("Failed to parse Docker Hub login response")?;
        Ok(Some(login.token))
    }
}
