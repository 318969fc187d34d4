use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::Deserialize;

/// Top-level mirror configuration, loaded once at startup and read-only
/// from then on.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub cleanup: bool,

    /// Number of concurrent mirror workers; 0 means one per CPU
    #[serde(default)]
    pub workers: usize,

    #[serde(default)]
    pub repositories: Vec<RepositorySpec>,

    pub target: TargetConfig,
}

/// Target registry and optional name prefix applied to every mirrored image
#[derive(Debug, Clone, Deserialize)]
pub struct TargetConfig {
    #[serde(default)]
    pub registry: String,
    #[serde(default)]
    pub prefix: Option<String>,
}

/// A single source repository to mirror
#[derive(Debug, Clone, Deserialize)]
pub struct RepositorySpec {
    /// Overrides the host-derived pull prefix for the source image
    #[serde(default)]
    pub private_registry: String,

    /// Repository name; `name:tag` shorthand restricts the mirror to one tag
    pub name: String,

    #[serde(default, rename = "match_tag")]
    pub match_tags: Vec<String>,

    #[serde(default, rename = "ignore_tag")]
    pub drop_tags: Vec<String>,

    /// Keep at most this many tags, newest first; 0 means unlimited
    #[serde(default)]
    pub max_tags: usize,

    #[serde(default)]
    pub target_prefix: Option<String>,

    /// Source registry host; empty defaults to hub.docker.com
    #[serde(default)]
    pub host: String,
}

impl Config {
    /// Load and validate the YAML configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Config> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Config = serde_yaml::from_str(&raw)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.target.registry.is_empty() {
            bail!("target.registry is required");
        }
        for repo in &self.repositories {
            if repo.name.is_empty() {
                bail!("repository entry is missing a name");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(yaml: &str) -> Result<Config> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    #[test]
    fn test_parse_full_config() {
        let config = parse(
            r#"
cleanup: true
workers: 2
target:
  registry: registry.internal:5000
  prefix: mirror/
repositories:
  - name: nginx
  - name: myorg/app:v1
    host: quay.io
    ignore_tag:
      - latest
    max_tags: 10
"#,
        )
        .unwrap();

        assert!(config.cleanup);
        assert_eq!(config.workers, 2);
        assert_eq!(config.target.registry, "registry.internal:5000");
        assert_eq!(config.target.prefix.as_deref(), Some("mirror/"));
        assert_eq!(config.repositories.len(), 2);

        let app = &config.repositories[1];
        assert_eq!(app.name, "myorg/app:v1");
        assert_eq!(app.host, "quay.io");
        assert_eq!(app.drop_tags, vec!["latest"]);
        assert_eq!(app.max_tags, 10);
    }

    #[test]
    fn test_defaults() {
        let config = parse(
            r#"
target:
  registry: localhost:5000
repositories:
  - name: nginx
"#,
        )
        .unwrap();

        assert!(!config.cleanup);
        assert_eq!(config.workers, 0);
        let repo = &config.repositories[0];
        assert!(repo.host.is_empty());
        assert!(repo.match_tags.is_empty());
        assert!(repo.drop_tags.is_empty());
        assert_eq!(repo.max_tags, 0);
        assert!(repo.target_prefix.is_none());
        assert!(repo.private_registry.is_empty());
    }

    #[test]
    fn test_missing_target_registry_is_fatal() {
        let err = parse(
            r#"
target:
  prefix: mirror/
repositories:
  - name: nginx
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("target.registry"));
    }

    #[test]
    fn test_unnamed_repository_is_fatal() {
        let err = parse(
            r#"
target:
  registry: localhost:5000
repositories:
  - name: ""
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("missing a name"));
    }
}
