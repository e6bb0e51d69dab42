//! Persisted position of an incremental listing.

use std::collections::{BTreeSet, HashMap};

use logpipe_state::StateMap;

/// State entry holding the watermark in epoch milliseconds.
pub const CURRENT_TIMESTAMP_KEY: &str = "currentTimestamp";
/// Prefix of the `key-0`, `key-1`, ... entries listing keys at the watermark.
pub const KEY_PREFIX: &str = "key-";

/// Highest timestamp fully listed, plus the keys already seen at exactly
/// that timestamp.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BucketListingCursor {
    watermark: i64,
    keys_at_watermark: BTreeSet<String>,
}

impl BucketListingCursor {
    pub fn new<I, S>(watermark: i64, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            watermark,
            keys_at_watermark: keys.into_iter().map(Into::into).collect(),
        }
    }

    pub fn watermark(&self) -> i64 {
        self.watermark
    }

    pub fn keys_at_watermark(&self) -> &BTreeSet<String> {
        &self.keys_at_watermark
    }

    /// True if an item was not covered by a previous cycle.
    pub fn is_new(&self, last_modified: i64, key: &str) -> bool {
        last_modified > self.watermark
            || (last_modified == self.watermark && !self.keys_at_watermark.contains(key))
    }

    /// Move past the items emitted in one cycle.
    ///
    /// The key set is rebuilt from this cycle's items when the watermark
    /// moves forward and extended when it stays put.
    pub fn advance<'a, I>(&mut self, emitted: I)
    where
        I: IntoIterator<Item = (i64, &'a str)>,
    {
        let emitted: Vec<(i64, &str)> = emitted.into_iter().collect();
        let max_seen = emitted
            .iter()
            .map(|(ts, _)| *ts)
            .fold(self.watermark, i64::max);

        let at_max = emitted
            .iter()
            .filter(|(ts, _)| *ts == max_seen)
            .map(|(_, key)| key.to_string());

        if max_seen > self.watermark {
            self.keys_at_watermark = at_max.collect();
        } else {
            self.keys_at_watermark.extend(at_max);
        }
        self.watermark = max_seen;
    }

    pub fn to_state_entries(&self) -> HashMap<String, String> {
        let mut entries = HashMap::with_capacity(self.keys_at_watermark.len() + 1);
        entries.insert(CURRENT_TIMESTAMP_KEY.to_string(), self.watermark.to_string());
        for (i, key) in self.keys_at_watermark.iter().enumerate() {
            entries.insert(format!("{KEY_PREFIX}{i}"), key.clone());
        }
        entries
    }

    /// Rebuild a cursor from state; `None` if nothing usable was stored.
    pub fn from_state(state: &StateMap) -> Option<Self> {
        if !state.exists() {
            return None;
        }
        let watermark = state.get(CURRENT_TIMESTAMP_KEY)?.parse().ok()?;
        let keys = state
            .entries()
            .iter()
            .filter(|(name, _)| name.starts_with(KEY_PREFIX))
            .map(|(_, key)| key.clone());
        Some(Self::new(watermark, keys))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use logpipe_state::Scope;

    #[test]
    fn test_is_new() {
        let cursor = BucketListingCursor::new(10, ["a"]);
        assert!(cursor.is_new(11, "a"));
        assert!(cursor.is_new(10, "b"));
        assert!(!cursor.is_new(10, "a"));
        assert!(!cursor.is_new(9, "z"));
    }

    #[test]
    fn test_advance_forward_replaces_keys() {
        let mut cursor = BucketListingCursor::new(1, ["a"]);
        cursor.advance([(1, "b"), (2, "c")]);
        assert_eq!(cursor, BucketListingCursor::new(2, ["c"]));
    }

    #[test]
    fn test_advance_at_same_instant_unions_keys() {
        let mut cursor = BucketListingCursor::new(5, ["a"]);
        cursor.advance([(5, "b")]);
        assert_eq!(cursor, BucketListingCursor::new(5, ["a", "b"]));

        cursor.advance(std::iter::empty());
        assert_eq!(cursor, BucketListingCursor::new(5, ["a", "b"]));
    }

    #[test]
    fn test_state_round_trip() {
        let cursor = BucketListingCursor::new(1_700_000_000_000, ["x/1.log", "x/2.log"]);
        let entries = cursor.to_state_entries();
        assert_eq!(entries[CURRENT_TIMESTAMP_KEY], "1700000000000");
        assert!(entries.contains_key("key-0"));
        assert!(entries.contains_key("key-1"));

        let state = StateMap::new(Scope::Cluster, 3, entries);
        assert_eq!(BucketListingCursor::from_state(&state), Some(cursor));
    }

    #[test]
    fn test_from_state_without_cursor() {
        assert_eq!(
            BucketListingCursor::from_state(&StateMap::empty(Scope::Cluster)),
            None
        );
        let no_timestamp = StateMap::new(
            Scope::Cluster,
            1,
            HashMap::from([("key-0".to_string(), "a".to_string())]),
        );
        assert_eq!(BucketListingCursor::from_state(&no_timestamp), None);
    }
}
