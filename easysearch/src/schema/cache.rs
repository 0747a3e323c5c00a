//! In-process cache of resolved field sets
//!
//! Single writer, many readers. Every entry is stamped with the cache
//! generation current when its fetch started; bumping the generation
//! retires all older entries and any fetch still in flight. Entries also
//! expire after a fixed time to live.

use super::types::FieldSet;
use crate::types::IndexCoord;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

struct CachedFields {
    fields: Arc<FieldSet>,
    generation: u64,
    fetched_at: Instant,
}

pub struct SchemaCache {
    entries: RwLock<HashMap<IndexCoord, CachedFields>>,
    generation: AtomicU64,
    ttl: Duration,
}

impl SchemaCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            generation: AtomicU64::new(0),
            ttl,
        }
    }

    /// Current generation; pass it back to [`SchemaCache::insert`]
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    pub fn get(&self, coord: &IndexCoord) -> Option<Arc<FieldSet>> {
        let current = self.generation();
        let entries = self.entries.read();
        entries
            .get(coord)
            .filter(|entry| entry.generation == current && entry.fetched_at.elapsed() < self.ttl)
            .map(|entry| Arc::clone(&entry.fields))
    }

    /// Store a fetched field set unless the cache was invalidated since
    /// `generation` was read
    pub fn insert(&self, coord: IndexCoord, fields: Arc<FieldSet>, generation: u64) -> bool {
        let mut entries = self.entries.write();
        if self.generation() != generation {
            debug!(coord = %coord, "discarding field set fetched before invalidation");
            return false;
        }
        entries.insert(
            coord,
            CachedFields {
                fields,
                generation,
                fetched_at: Instant::now(),
            },
        );
        true
    }

    pub fn invalidate(&self, coord: &IndexCoord) {
        let mut entries = self.entries.write();
        self.generation.fetch_add(1, Ordering::AcqRel);
        entries.remove(coord);
        Self::restamp(&mut entries, self.generation());
    }

    /// Drop every type of `index`
    pub fn invalidate_index(&self, index: &str) {
        let mut entries = self.entries.write();
        self.generation.fetch_add(1, Ordering::AcqRel);
        entries.retain(|coord, _| coord.index != index);
        Self::restamp(&mut entries, self.generation());
    }

    pub fn invalidate_all(&self) {
        let mut entries = self.entries.write();
        self.generation.fetch_add(1, Ordering::AcqRel);
        entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // Unaffected entries stay valid under the new generation
    fn restamp(entries: &mut HashMap<IndexCoord, CachedFields>, generation: u64) {
        for entry in entries.values_mut() {
            entry.generation = generation;
        }
    }
}
