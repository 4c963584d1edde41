use smallvec::SmallVec;
use std::collections::BTreeMap;
use std::sync::Arc;

/// An unordered `key -> value` tag mapping, stored sorted by key.
///
/// Two tag sets compare equal iff they map the same keys to the same values,
/// regardless of the order the pairs were supplied in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TagSet {
    // SmallVec to avoid allocation for small tag sets (usually < 4)
    tags: SmallVec<[(Arc<str>, Arc<str>); 4]>,
}

impl TagSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a tag set from arbitrary pairs. A repeated key keeps its last value.
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut tags: SmallVec<[(Arc<str>, Arc<str>); 4]> = pairs
            .into_iter()
            .map(|(k, v)| (Arc::from(k.as_ref()), Arc::from(v.as_ref())))
            .collect();

        // Stable sort keeps insertion order among equal keys, so the last one survives dedup.
        tags.sort_by(|a, b| a.0.cmp(&b.0));
        let mut out: SmallVec<[(Arc<str>, Arc<str>); 4]> = SmallVec::with_capacity(tags.len());
        for (k, v) in tags {
            match out.last_mut() {
                Some(last) if last.0 == k => last.1 = v,
                _ => out.push((k, v)),
            }
        }

        Self { tags: out }
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    /// Iterates pairs in ascending key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.tags.iter().map(|(k, v)| (k.as_ref(), v.as_ref()))
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.tags
            .binary_search_by(|(k, _)| k.as_ref().cmp(key))
            .ok()
            .and_then(|idx| self.tags.get(idx))
            .map(|(_, v)| v.as_ref())
    }

    /// Returns a copy with `key` set to `value`, replacing any previous value.
    #[must_use]
    pub fn with(&self, key: &str, value: &str) -> TagSet {
        let mut tags = self.tags.clone();
        match tags.binary_search_by(|(k, _)| k.as_ref().cmp(key)) {
            Ok(idx) => {
                if let Some(slot) = tags.get_mut(idx) {
                    slot.1 = Arc::from(value);
                }
            }
            Err(idx) => tags.insert(idx, (Arc::from(key), Arc::from(value))),
        }
        TagSet { tags }
    }

    pub fn to_map(&self) -> BTreeMap<String, String> {
        self.iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }
}

impl<K, V> FromIterator<(K, V)> for TagSet
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self::from_pairs(iter)
    }
}

impl From<&BTreeMap<String, String>> for TagSet {
    fn from(map: &BTreeMap<String, String>) -> Self {
        Self::from_pairs(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tagset_is_order_independent() {
        let a = TagSet::from_pairs([("route", "test"), ("method", "GET")]);
        let b = TagSet::from_pairs([("method", "GET"), ("route", "test")]);
        assert_eq!(a, b);
        assert_eq!(
            a.iter().collect::<Vec<_>>(),
            vec![("method", "GET"), ("route", "test")]
        );
    }

    #[test]
    fn tagset_duplicate_key_keeps_last_value() {
        let set = TagSet::from_pairs([("a", "1"), ("b", "2"), ("a", "3")]);
        assert_eq!(set.len(), 2);
        assert_eq!(set.get("a"), Some("3"));
        assert_eq!(set.get("b"), Some("2"));
        assert_eq!(set.get("c"), None);
    }

    #[test]
    fn tagset_with_inserts_and_replaces() {
        let base = TagSet::from_pairs([("route", "test")]);

        let added = base.with("percentile", "0.5");
        assert_eq!(
            added.iter().collect::<Vec<_>>(),
            vec![("percentile", "0.5"), ("route", "test")]
        );

        let replaced = added.with("route", "other");
        assert_eq!(replaced.get("route"), Some("other"));
        assert_eq!(replaced.len(), 2);

        // The source set is untouched.
        assert_eq!(base.len(), 1);
    }
}
