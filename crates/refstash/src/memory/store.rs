//! Expiring in-memory object store for tool results.
//!
//! Every `put` allocates the next id from a single counter (`obj_001`,
//! `obj_002`, ...) and records the value with its time-to-live. Expiry is
//! checked lazily on every `get`; [`ObjectStore::sweep_expired`] and the
//! optional background sweeper reclaim entries nobody asks for again.
//!
//! Ids are never reused. Because the counter only moves forward, an id below
//! the counter that is no longer present must have been evicted, so it keeps
//! reporting [`MemoryError::Expired`] forever without tombstones.

use super::config::StoreConfig;
use super::error::{MemoryError, Result};
use super::value::Value;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tracing::{debug, info, trace};

/// Prefix of every object id.
pub const ID_PREFIX: &str = "obj_";

// ── ObjectId ───────────────────────────────────────────────────────

/// Identifier of a stored object, rendered as `obj_001`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(u64);

impl ObjectId {
    pub fn number(self) -> u64 {
        self.0
    }

    /// Split a leading id off `text` by syntax alone, returning the id text
    /// and the rest.
    ///
    /// `"obj_004.items.0"` yields `("obj_004", ".items.0")`. Returns `None`
    /// if `text` does not start with `obj_` and at least one digit. The id
    /// text may still name an id no store could have allocated; parsing it
    /// reports [`MemoryError::NotFound`].
    pub fn split_prefix(text: &str) -> Option<(&str, &str)> {
        let digits_and_rest = text.strip_prefix(ID_PREFIX)?;
        let digits = digits_and_rest
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(digits_and_rest.len());
        if digits == 0 {
            return None;
        }
        Some(text.split_at(ID_PREFIX.len() + digits))
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{ID_PREFIX}{:03}", self.0)
    }
}

impl FromStr for ObjectId {
    type Err = MemoryError;

    fn from_str(s: &str) -> Result<Self> {
        let number = match ObjectId::split_prefix(s.trim()) {
            Some((id, "")) => id.get(ID_PREFIX.len()..).and_then(|n| n.parse().ok()),
            _ => None,
        };
        number
            .map(ObjectId)
            .ok_or_else(|| MemoryError::NotFound(s.to_string()))
    }
}

// ── StoredObject ───────────────────────────────────────────────────

/// A value held by the store, with its bookkeeping.
#[derive(Debug, Clone)]
pub struct StoredObject {
    pub id: ObjectId,
    pub value: Arc<Value>,
    pub created_at: DateTime<Utc>,
    /// `None` means the object never expires.
    pub ttl: Option<Duration>,
    expires_at: Option<Instant>,
}

impl StoredObject {
    fn new(id: ObjectId, value: Arc<Value>, ttl: Option<Duration>) -> Self {
        let now = Instant::now();
        Self {
            id,
            value,
            created_at: Utc::now(),
            ttl,
            expires_at: ttl.and_then(|ttl| now.checked_add(ttl)),
        }
    }

    pub fn is_expired_at(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|deadline| now >= deadline)
    }
}

// ── Backend ────────────────────────────────────────────────────────

/// Storage behind the [`ObjectStore`]'s lock.
///
/// The store owns id allocation and expiry policy; a backend only keeps
/// objects by id. Implementations are always called with the store's lock
/// held, so they need no synchronization of their own.
pub trait StoreBackend: Send + fmt::Debug {
    fn insert(&mut self, object: StoredObject);

    fn get(&self, id: ObjectId) -> Option<&StoredObject>;

    fn remove(&mut self, id: ObjectId) -> Option<StoredObject>;

    /// Keep only objects for which `keep` returns `true`. Returns how many
    /// were removed.
    fn retain(&mut self, keep: &mut dyn FnMut(&StoredObject) -> bool) -> usize;

    /// Remove and return the object with the lowest id.
    fn pop_oldest(&mut self) -> Option<StoredObject>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn clear(&mut self);
}

/// The default backend: a hash map plus the ids in insertion order.
///
/// Ids are allocated in increasing order, so the front of `order` is the
/// oldest id. Entries removed by other means stay in `order` until they
/// reach the front or the queue is compacted.
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    objects: HashMap<ObjectId, StoredObject>,
    order: VecDeque<ObjectId>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StoreBackend for InMemoryBackend {
    fn insert(&mut self, object: StoredObject) {
        self.order.push_back(object.id);
        self.objects.insert(object.id, object);
    }

    fn get(&self, id: ObjectId) -> Option<&StoredObject> {
        self.objects.get(&id)
    }

    fn remove(&mut self, id: ObjectId) -> Option<StoredObject> {
        let removed = self.objects.remove(&id);
        if self.order.len() > 2 * self.objects.len() + 32 {
            self.compact();
        }
        removed
    }

    fn retain(&mut self, keep: &mut dyn FnMut(&StoredObject) -> bool) -> usize {
        let before = self.objects.len();
        self.objects.retain(|_, object| keep(object));
        self.compact();
        before - self.objects.len()
    }

    fn pop_oldest(&mut self) -> Option<StoredObject> {
        while let Some(id) = self.order.pop_front() {
            if let Some(object) = self.objects.remove(&id) {
                return Some(object);
            }
        }
        None
    }

    fn len(&self) -> usize {
        self.objects.len()
    }

    fn clear(&mut self) {
        self.objects.clear();
        self.order.clear();
    }
}

impl InMemoryBackend {
    fn compact(&mut self) {
        let objects = &self.objects;
        self.order.retain(|id| objects.contains_key(id));
    }
}

// ── ObjectStore ────────────────────────────────────────────────────

struct StoreState {
    /// Next id to hand out. Ids `1..next_id` have been allocated.
    next_id: u64,
    backend: Box<dyn StoreBackend>,
}

/// Process-wide store of tool results, shared as `Arc<ObjectStore>`.
///
/// The id counter and the backend sit behind one mutex, so allocation is
/// atomic and a `get` racing with eviction sees either the live value or
/// `Expired`, never a partial state.
pub struct ObjectStore {
    state: Mutex<StoreState>,
    config: StoreConfig,
    closed: AtomicBool,
}

impl fmt::Debug for ObjectStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("ObjectStore")
            .field("live", &state.backend.len())
            .field("allocated", &(state.next_id - 1))
            .field("config", &self.config)
            .finish()
    }
}

impl ObjectStore {
    /// Create a store backed by an [`InMemoryBackend`].
    pub fn new(config: StoreConfig) -> Self {
        Self::with_backend(config, InMemoryBackend::new())
    }

    /// Create a store over a custom backend.
    pub fn with_backend(config: StoreConfig, backend: impl StoreBackend + 'static) -> Self {
        Self {
            state: Mutex::new(StoreState {
                next_id: 1,
                backend: Box::new(backend),
            }),
            config,
            closed: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Store a value with the default TTL and return its id.
    pub fn put(&self, value: impl Into<Value>) -> ObjectId {
        self.put_with_ttl(value, self.config.default_ttl)
    }

    /// Store a value with an explicit TTL (`None` = never expires).
    pub fn put_with_ttl(&self, value: impl Into<Value>, ttl: Option<Duration>) -> ObjectId {
        let value = Arc::new(value.into());
        let kind = value.type_name();

        let mut state = self.lock();
        if let Some(max) = self.config.max_entries {
            make_room(&mut state, max.max(1));
        }
        let id = ObjectId(state.next_id);
        state.next_id += 1;
        state.backend.insert(StoredObject::new(id, value, ttl));
        let live = state.backend.len();
        drop(state);

        debug!(
            "Stored {id} ({kind}, ttl {}, {live} live)",
            ttl.map_or_else(|| "none".to_string(), |t| format!("{}s", t.as_secs()))
        );
        id
    }

    /// Serialize a Rust value into the value model and store it.
    pub fn put_serialize<T: Serialize + ?Sized>(&self, value: &T) -> Result<ObjectId> {
        Ok(self.put(Value::from_serialize(value)?))
    }

    /// Fetch a value by its id string.
    pub fn get(&self, id: &str) -> Result<Arc<Value>> {
        self.get_object(id).map(|object| object.value)
    }

    /// Fetch a value and its metadata by id string.
    pub fn get_object(&self, id: &str) -> Result<StoredObject> {
        self.lookup(id.parse()?)
    }

    /// Fetch by parsed id. An expired entry is removed on the spot.
    pub fn lookup(&self, id: ObjectId) -> Result<StoredObject> {
        let now = Instant::now();
        let mut state = self.lock();
        if id.0 == 0 || id.0 >= state.next_id {
            return Err(MemoryError::NotFound(id.to_string()));
        }
        match state.backend.get(id) {
            None => Err(MemoryError::Expired(id.to_string())),
            Some(object) if object.is_expired_at(now) => {
                state.backend.remove(id);
                drop(state);
                debug!("Evicted {id} on access (expired)");
                Err(MemoryError::Expired(id.to_string()))
            }
            Some(object) => {
                trace!("Hit {id}");
                Ok(object.clone())
            }
        }
    }

    /// Objects currently held, including expired ones not yet swept.
    pub fn len(&self) -> usize {
        self.lock().backend.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every expired object. Returns how many were removed.
    pub fn sweep_expired(&self) -> usize {
        let now = Instant::now();
        let removed = self
            .lock()
            .backend
            .retain(&mut |object| !object.is_expired_at(now));
        if removed > 0 {
            debug!("Swept {removed} expired objects");
        }
        removed
    }

    /// Run [`sweep_expired`](Self::sweep_expired) every
    /// `config.sweep_interval` on the current tokio runtime.
    ///
    /// The task holds only a weak reference and stops once the store is
    /// dropped or [`shutdown`](Self::shutdown) is called.
    pub fn spawn_sweeper(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let store = Arc::downgrade(self);
        let period = self.config.sweep_interval.max(Duration::from_millis(1));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(store) = store.upgrade() else { break };
                if store.is_closed() {
                    break;
                }
                let removed = store.sweep_expired();
                if removed > 0 {
                    info!("Object store sweep: {removed} expired, {} live", store.len());
                }
            }
        })
    }

    /// Drop every object and stop the background sweeper. Ids handed out
    /// before shutdown report `Expired` from now on.
    pub fn shutdown(&self) {
        self.closed.store(true, Ordering::SeqCst);
        let mut state = self.lock();
        let dropped = state.backend.len();
        state.backend.clear();
        drop(state);
        info!("Object store shut down ({dropped} objects dropped)");
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for ObjectStore {
    fn default() -> Self {
        Self::new(StoreConfig::default())
    }
}

/// Bring the backend below `max` objects by dropping the oldest ones.
/// Expired objects elsewhere are left to lazy eviction and the sweeper.
fn make_room(state: &mut StoreState, max: usize) {
    let now = Instant::now();
    while state.backend.len() >= max {
        let Some(evicted) = state.backend.pop_oldest() else {
            break;
        };
        if evicted.is_expired_at(now) {
            debug!("Dropped {} (expired) to make room", evicted.id);
        } else {
            debug!("Evicted {} (store at capacity {max})", evicted.id);
        }
    }
}
