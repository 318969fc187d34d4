use crate::models::Tag;

/// Apply a repository's match/drop rules and tag cap to a resolved tag
/// list, preserving the freshness order the resolver established. An empty
/// match list matches everything; `max_tags` of 0 means unlimited.
pub fn filter_tags(
    tags: Vec<Tag>,
    match_tags: &[String],
    drop_tags: &[String],
    max_tags: usize,
) -> Vec<Tag> {
    let mut retained: Vec<Tag> = tags
        .into_iter()
        .filter(|tag| match_tags.is_empty() || match_tags.iter().any(|m| *m == tag.name))
        .filter(|tag| !drop_tags.iter().any(|d| *d == tag.name))
        .collect();

    if max_tags > 0 && retained.len() > max_tags {
        retained.truncate(max_tags);
    }

    retained
}
