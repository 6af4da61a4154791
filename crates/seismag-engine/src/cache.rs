//! Expiring public-object cache.
//!
//! Owns every pick, amplitude and origin the engine currently knows,
//! keyed by public id. Entries age out after a configured lifetime; the
//! expiry sweep hands evicted objects back to the caller so that the
//! cross-reference indexes can be purged before the objects are dropped.
//!
//! The cache never holds pointers into other engine state. Indexes store
//! public ids and resolve them here.

use chrono::{DateTime, Duration, Utc};
use std::cell::Cell;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

use seismag_models::PublicObject;

struct CacheEntry {
    object: PublicObject,
    inserted_at: DateTime<Utc>,
}

/// Time-bounded store of public objects.
pub struct ObjectCache {
    expiry: Duration,
    entries: HashMap<String, CacheEntry>,
    /// Insertion-ordered expiry queue. Refreshing an entry enqueues it
    /// again; stale queue slots are skipped when their timestamp no longer
    /// matches the live entry.
    queue: VecDeque<(DateTime<Utc>, String)>,
}

impl ObjectCache {
    pub fn new(expiry: Duration) -> Self {
        Self {
            expiry,
            entries: HashMap::new(),
            queue: VecDeque::new(),
        }
    }

    pub fn expiry(&self) -> Duration {
        self.expiry
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, public_id: &str) -> bool {
        self.entries.contains_key(public_id)
    }

    pub fn get(&self, public_id: &str) -> Option<&PublicObject> {
        self.entries.get(public_id).map(|e| &e.object)
    }

    /// Insert or refresh; either way the entry's lifetime starts over.
    pub fn feed(&mut self, object: PublicObject, now: DateTime<Utc>) {
        let id = object.public_id().to_string();
        self.queue.push_back((now, id.clone()));
        self.entries.insert(
            id,
            CacheEntry {
                object,
                inserted_at: now,
            },
        );
    }

    /// Drop every entry older than the configured lifetime and return the
    /// evicted objects in eviction order. The caller must purge its
    /// indexes before letting the objects go.
    pub fn expire(&mut self, now: DateTime<Utc>) -> Vec<PublicObject> {
        let mut evicted = Vec::new();
        while let Some((queued_at, id)) = self.queue.front() {
            let queued_at = *queued_at;
            let live = self
                .entries
                .get(id.as_str())
                .map_or(false, |e| e.inserted_at == queued_at);
            if !live {
                self.queue.pop_front();
                continue;
            }
            if now - queued_at < self.expiry {
                break;
            }
            let (_, id) = self.queue.pop_front().unwrap();
            if let Some(entry) = self.entries.remove(&id) {
                evicted.push(entry.object);
            }
        }
        evicted
    }

    /// Check an entry out for mutation, preserving its insertion time.
    /// Not an eviction: no cleanup runs, and the caller must `put_back`.
    pub fn take(&mut self, public_id: &str) -> Option<(PublicObject, DateTime<Utc>)> {
        self.entries
            .remove(public_id)
            .map(|e| (e.object, e.inserted_at))
    }

    /// Return a checked-out entry, keeping its original lifetime.
    pub fn put_back(&mut self, object: PublicObject, inserted_at: DateTime<Utc>) {
        let id = object.public_id().to_string();
        self.queue.push_back((inserted_at, id.clone()));
        self.entries.insert(
            id,
            CacheEntry {
                object,
                inserted_at,
            },
        );
    }
}

/// Whether engine mutations may surface as external notifications.
///
/// Eviction cleanup and archive back-fill run inside a suppression scope;
/// the guard restores the previous state on drop, so scopes nest.
#[derive(Debug)]
pub struct NotifierState {
    enabled: Cell<bool>,
}

impl NotifierState {
    pub fn new() -> Rc<Self> {
        Rc::new(Self {
            enabled: Cell::new(true),
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.get()
    }

    pub fn suppress(self: &Rc<Self>) -> NotifierGuard {
        let previous = self.enabled.replace(false);
        NotifierGuard {
            state: Rc::clone(self),
            previous,
        }
    }
}

pub struct NotifierGuard {
    state: Rc<NotifierState>,
    previous: bool,
}

impl Drop for NotifierGuard {
    fn drop(&mut self) {
        self.state.enabled.set(self.previous);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use seismag_models::{Pick, WaveformStreamId};

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn pick(id: &str) -> PublicObject {
        PublicObject::Pick(Pick::new(
            id,
            WaveformStreamId::new("GE", "MORC", "", "BHZ"),
            t(0),
        ))
    }

    #[test]
    fn test_expiry_evicts_in_insertion_order() {
        let mut cache = ObjectCache::new(Duration::seconds(10));
        cache.feed(pick("Pick/1"), t(0));
        cache.feed(pick("Pick/2"), t(5));

        assert!(cache.expire(t(9)).is_empty());

        let evicted = cache.expire(t(12));
        assert_eq!(evicted.len(), 1);
        assert_eq!(evicted[0].public_id(), "Pick/1");
        assert!(!cache.contains("Pick/1"));
        assert!(cache.contains("Pick/2"));

        let evicted = cache.expire(t(20));
        assert_eq!(evicted.len(), 1);
        assert_eq!(evicted[0].public_id(), "Pick/2");
        assert!(cache.is_empty());
    }

    #[test]
    fn test_refeed_resets_lifetime() {
        let mut cache = ObjectCache::new(Duration::seconds(10));
        cache.feed(pick("Pick/1"), t(0));
        cache.feed(pick("Pick/1"), t(8));

        // The stale queue slot from t(0) must not evict the refreshed entry.
        assert!(cache.expire(t(12)).is_empty());
        assert!(cache.contains("Pick/1"));

        let evicted = cache.expire(t(18));
        assert_eq!(evicted.len(), 1);
    }

    #[test]
    fn test_take_and_put_back_preserve_lifetime() {
        let mut cache = ObjectCache::new(Duration::seconds(10));
        cache.feed(pick("Pick/1"), t(0));

        let (object, inserted_at) = cache.take("Pick/1").unwrap();
        assert!(!cache.contains("Pick/1"));
        cache.put_back(object, inserted_at);

        let evicted = cache.expire(t(11));
        assert_eq!(evicted.len(), 1);
    }

    #[test]
    fn test_notifier_guard_restores_previous_state() {
        let state = NotifierState::new();
        assert!(state.is_enabled());
        {
            let _outer = state.suppress();
            assert!(!state.is_enabled());
            {
                let _inner = state.suppress();
                assert!(!state.is_enabled());
            }
            assert!(!state.is_enabled());
        }
        assert!(state.is_enabled());
    }
}
