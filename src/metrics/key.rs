//! Key resolution for aggregation buckets
//!
//! A bucket is identified by its metric name plus the *set* of its tags.
//! The order the caller supplied is kept separately so emitted lines
//! reproduce it.
//!
//! Default tags (`group:<stats_group>`) are appended after the caller's
//! tags and take part in both the identity and the display order.

use super::error::InvalidTagsError;
use super::types::TagSet;

/// Tag identity plus the ordering to emit it with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedKey {
    pub tag_set: TagSet,
    pub display: Vec<String>,
}

/// Turns caller tag collections into bucket keys
#[derive(Debug, Clone, Default)]
pub struct KeyResolver {
    default_tags: Vec<String>,
}

impl KeyResolver {
    /// Create a resolver, injecting `group:<stats_group>` into every key
    pub fn new(stats_group: Option<&str>) -> Self {
        KeyResolver {
            default_tags: stats_group
                .map(|group| vec![format!("group:{}", group)])
                .unwrap_or_default(),
        }
    }

    pub fn default_tags(&self) -> &[String] {
        &self.default_tags
    }

    /// Resolve caller tags into a bucket key.
    ///
    /// Fails if any tag repeats, counting the default tags.
    pub fn resolve(&self, tags: &[&str]) -> Result<ResolvedKey, InvalidTagsError> {
        let display: Vec<String> = tags
            .iter()
            .map(|t| t.to_string())
            .chain(self.default_tags.iter().cloned())
            .collect();
        let tag_set: TagSet = display.iter().cloned().collect();

        if tag_set.len() != display.len() {
            return Err(InvalidTagsError {
                duplicates: find_duplicates(&display),
                tags: display,
            });
        }

        Ok(ResolvedKey { tag_set, display })
    }

    /// Tags for an emission that is not aggregated
    pub fn display_tags(&self, tags: &[&str]) -> Result<Vec<String>, InvalidTagsError> {
        self.resolve(tags).map(|key| key.display)
    }
}

/// Join the service prefix and metric name: `<prefix>.<name>`
pub fn full_name(service_prefix: &str, metric_name: &str) -> String {
    format!("{}.{}", service_prefix, metric_name)
}

fn find_duplicates(tags: &[String]) -> Vec<String> {
    let mut duplicates: Vec<String> = Vec::new();
    for (i, tag) in tags.iter().enumerate() {
        if tags[..i].contains(tag) && !duplicates.contains(tag) {
            duplicates.push(tag.clone());
        }
    }
    duplicates
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_keeps_caller_order() {
        let resolver = KeyResolver::new(None);
        let key = resolver.resolve(&["b", "a"]).unwrap();

        let expected: TagSet = ["a", "b"].into_iter().collect();
        assert_eq!(key.display, vec!["b", "a"]);
        assert_eq!(key.tag_set, expected);
    }

    #[test]
    fn test_same_tags_same_key() {
        let resolver = KeyResolver::new(None);
        let key1 = resolver.resolve(&["a", "b"]).unwrap();
        let key2 = resolver.resolve(&["b", "a"]).unwrap();

        assert_eq!(key1.tag_set, key2.tag_set);
        assert_ne!(key1.display, key2.display);
    }

    #[test]
    fn test_different_tags_different_key() {
        let resolver = KeyResolver::new(None);
        let key1 = resolver.resolve(&["host:web01"]).unwrap();
        let key2 = resolver.resolve(&["host:web02"]).unwrap();

        assert_ne!(key1.tag_set, key2.tag_set);
    }

    #[test]
    fn test_no_tags() {
        let key = KeyResolver::new(None).resolve(&[]).unwrap();
        assert!(key.display.is_empty());
        assert!(key.tag_set.is_empty());
    }

    #[test]
    fn test_group_tag_appended() {
        let resolver = KeyResolver::new(Some("test_group"));
        let key = resolver.resolve(&["tag"]).unwrap();

        assert_eq!(key.display, vec!["tag", "group:test_group"]);
        assert!(key.tag_set.contains("group:test_group"));
        assert_eq!(resolver.default_tags(), ["group:test_group".to_string()]);
    }

    #[test]
    fn test_duplicate_tags_rejected() {
        let err = KeyResolver::new(None).resolve(&["a", "b", "a"]).unwrap_err();
        assert_eq!(err.duplicates, vec!["a"]);
        assert_eq!(err.tags, vec!["a", "b", "a"]);
    }

    #[test]
    fn test_caller_tag_colliding_with_group_rejected() {
        let resolver = KeyResolver::new(Some("g"));
        let err = resolver.resolve(&["group:g"]).unwrap_err();
        assert_eq!(err.duplicates, vec!["group:g"]);
    }

    #[test]
    fn test_full_name() {
        assert_eq!(full_name("test", "test_metric"), "test.test_metric");
    }
}
