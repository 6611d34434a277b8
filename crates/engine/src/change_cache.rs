//! `ChangeCache`: a conservative "has this entity changed since
//! stream id S?" accelerator. One instance is keyed by room id (used by the
//! cross-room stream's room prune) and a second by user id (used by the
//! membership-changes operation's short-circuit); both share this same
//! generic implementation.
//!
//! The cache is allowed to lie in exactly one direction: it may say "maybe
//! changed" about something that didn't (a false positive, which just costs
//! a wasted DB read), but it must never say "unchanged" about something that
//! did (a false negative, which would drop events from a client's sync).
//! Eviction satisfies this by construction: an evicted or never-seen key has
//! no entry, and "no entry" reports as changed.

use std::collections::HashSet;
use std::hash::Hash;

use lru_cache::LruCache;
use parking_lot::Mutex;
use roomstream_core::Seqnum;

pub struct ChangeCache<K> {
    entries: Mutex<LruCache<K, Seqnum>>,
}

impl<K> ChangeCache<K>
where
    K: Eq + Hash + Clone,
{
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// True iff `key` is known to have changed after `since_stream_id`, or
    /// the cache holds no information about `key` at all.
    pub fn has_entity_changed(&self, key: &K, since_stream_id: Seqnum) -> bool {
        let mut entries = self.entries.lock();
        match entries.get_mut(key) {
            Some(&mut last_changed) => last_changed > since_stream_id,
            None => true,
        }
    }

    /// The subset of `keys` that the cache reports as changed (or unknown)
    /// since `since_stream_id`. Used by the cross-room stream operation to prune the room fan-out down
    /// to rooms actually worth querying.
    pub fn get_entities_changed<'a, I>(&self, keys: I, since_stream_id: Seqnum) -> HashSet<K>
    where
        I: IntoIterator<Item = &'a K>,
        K: 'a,
    {
        keys.into_iter()
            .filter(|key| self.has_entity_changed(key, since_stream_id))
            .cloned()
            .collect()
    }

    /// Write-side hook: records that `key` changed as of `stream_id`. Not
    /// part of this engine's read surface (the event-insert path, which this
    /// crate does not implement, is the real caller) but implemented here so
    /// tests can populate the cache deterministically.
    pub fn entity_has_changed(&self, key: K, stream_id: Seqnum) {
        let mut entries = self.entries.lock();
        let should_bump = entries.get_mut(&key).is_none_or(|&mut last| stream_id > last);
        if should_bump {
            entries.insert(key, stream_id);
        }
    }
}
