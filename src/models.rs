use chrono::{DateTime, Utc};
use serde::Deserialize;

/// GET registry.hub.docker.com/v2/repositories/<repo>/tags/ response
#[derive(Debug, Deserialize)]
#[allow(dead_code)]
pub struct DockerHubTagsResponse {
    pub count: Option<u64>,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<DockerHubTag>,
}

#[derive(Debug, Deserialize)]
pub struct DockerHubTag {
    pub name: String,
    pub last_updated: Option<DateTime<Utc>>,
}

/// GET quay.io/api/v1/repository/<repo>/tag response
#[derive(Debug, Deserialize)]
#[allow(dead_code)]
pub struct QuayTagsResponse {
    #[serde(default)]
    pub has_additional: bool,
    #[serde(default)]
    pub page: u32,
    pub tags: Vec<QuayTag>,
}

/// Quay serializes last_modified as RFC 2822, not RFC 3339
#[derive(Debug, Deserialize)]
pub struct QuayTag {
    pub name: String,
    pub last_modified: Option<String>,
}

/// GET gcr.io/v2/<repo>/tags/list response (same shape on k8s.gcr.io)
#[derive(Debug, Deserialize)]
#[allow(dead_code)]
pub struct GcrTagsResponse {
    pub name: String,
    pub tags: Vec<String>,
}

/// POST hub.docker.com/v2/users/login/ response
#[derive(Debug, Deserialize)]
pub struct LoginResponse {
    pub token: String,
}

/// One addressable version of a repository, normalized across hosts
#[derive(Debug, Clone)]
pub struct Tag {
    pub name: String,
    pub last_updated: Option<DateTime<Utc>>,
    pub last_modified: Option<DateTime<Utc>>,
}

impl Tag {
    /// Tag with no timestamp metadata (GCR and k8s.gcr.io listings)
    pub fn named(name: impl Into<String>) -> Self {
        Tag {
            name: name.into(),
            last_updated: None,
            last_modified: None,
        }
    }
}

impl From<DockerHubTag> for Tag {
    fn from(t: DockerHubTag) -> Self {
        Tag {
            name: t.name,
            last_updated: t.last_updated,
            last_modified: None,
        }
    }
}

impl From<QuayTag> for Tag {
    fn from(t: QuayTag) -> Self {
        let last_modified = t
            .last_modified
            .as_deref()
            .and_then(|s| DateTime::parse_from_rfc2822(s).ok())
            .map(|dt| dt.with_timezone(&Utc));
        Tag {
            name: t.name,
            last_updated: None,
            last_modified,
        }
    }
}

/// One decoded page of a host's tag listing
#[derive(Debug)]
pub struct TagPage {
    pub tags: Vec<Tag>,
    pub next: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quay_tag_parses_rfc2822() {
        let tag = QuayTag {
            name: "v1".to_string(),
            last_modified: Some("Wed, 25 Oct 2023 14:30:00 -0000".to_string()),
        };
        let tag: Tag = tag.into();
        let ts = tag.last_modified.expect("timestamp should parse");
        assert_eq!(ts.to_rfc3339(), "2023-10-25T14:30:00+00:00");
    }

    #[test]
    fn test_quay_tag_garbage_timestamp_becomes_none() {
        let tag = QuayTag {
            name: "v1".to_string(),
            last_modified: Some("not a date".to_string()),
        };
        let tag: Tag = tag.into();
        assert!(tag.last_modified.is_none());
    }

    #[test]
    fn test_named_tag_has_no_timestamps() {
        let tag = Tag::named("3.18");
        assert_eq!(tag.name, "3.18");
        assert!(tag.last_updated.is_none());
        assert!(tag.last_modified.is_none());
    }
}
