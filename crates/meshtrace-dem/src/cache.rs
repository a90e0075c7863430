//! Read-through tile cache with one load per tile.
//!
//! Concurrent misses on the same key are coalesced: the first caller loads
//! the tile, later callers block on a condition variable until the load
//! finishes and then share the same `Arc`. Absent or unreadable tiles are
//! cached as absent, so each one is reported once.

use crate::{DemError, DemTile, TileKey, TileLoader};
use meshtrace_metrics::{metric_defs, metrics};
use parking_lot::{Condvar, Mutex};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// State of a cache entry.
enum Slot {
    /// A thread is loading this tile.
    Loading,
    /// Load finished; `None` if the tile does not exist or failed to load.
    Ready(Option<Arc<DemTile>>),
}

/// Cache statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Tiles loaded by the loader.
    pub loaded: u64,
    /// Tiles the loader reported as absent.
    pub missing: u64,
    /// Tiles that failed to load.
    pub failed: u64,
    /// Lookups answered from the cache, including coalesced waits.
    pub hits: u64,
}

/// Coalescing read-through cache in front of a [`TileLoader`].
///
/// Tiles stay resident for the cache's lifetime.
pub struct TileCache<L> {
    loader: L,
    slots: Mutex<HashMap<TileKey, Slot>>,
    load_complete: Condvar,
    loaded: AtomicU64,
    missing: AtomicU64,
    failed: AtomicU64,
    hits: AtomicU64,
}

impl<L: TileLoader> TileCache<L> {
    /// Creates an empty cache.
    pub fn new(loader: L) -> Self {
        Self {
            loader,
            slots: Mutex::new(HashMap::new()),
            load_complete: Condvar::new(),
            loaded: AtomicU64::new(0),
            missing: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            hits: AtomicU64::new(0),
        }
    }

    /// Returns the tile for `key`, loading it if needed.
    pub fn tile(&self, key: TileKey) -> Option<Arc<DemTile>> {
        {
            let mut slots = self.slots.lock();
            loop {
                match slots.get(&key) {
                    Some(Slot::Ready(tile)) => {
                        self.hits.fetch_add(1, Ordering::Relaxed);
                        return tile.clone();
                    }
                    Some(Slot::Loading) => {
                        self.load_complete.wait(&mut slots);
                    }
                    None => {
                        slots.insert(key, Slot::Loading);
                        break;
                    }
                }
            }
        }

        // We own the load; other keys proceed concurrently
        let mut in_flight = InFlight { cache: self, key, finished: false };
        let tile = self.load(key);
        in_flight.finish(tile.clone());
        tile
    }

    /// Elevation at a coordinate in meters.
    ///
    /// A missing tile reads as 0.0 (sea level). A no-data sample reads as
    /// `None`.
    pub fn elevation(&self, lat: f64, lon: f64) -> Option<f64> {
        let Some(tile) = self.tile(TileKey::from_coord(lat, lon)) else {
            return Some(0.0);
        };
        match tile.elevation(lat, lon) {
            Ok(v) => Some(v as f64),
            Err(DemError::NoData { .. }) => None,
            Err(e) => {
                debug!(lat, lon, error = %e, "elevation lookup failed");
                None
            }
        }
    }

    /// Snapshot of the cache counters.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            loaded: self.loaded.load(Ordering::Relaxed),
            missing: self.missing.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            hits: self.hits.load(Ordering::Relaxed),
        }
    }

    /// Number of resolved entries, present or absent.
    pub fn len(&self) -> usize {
        self.slots
            .lock()
            .values()
            .filter(|slot| matches!(slot, Slot::Ready(_)))
            .count()
    }

    /// Whether nothing has been resolved yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn load(&self, key: TileKey) -> Option<Arc<DemTile>> {
        match self.loader.load(key) {
            Ok(Some(tile)) => {
                self.loaded.fetch_add(1, Ordering::Relaxed);
                metrics::counter!(metric_defs::TILES_LOADED.name).increment(1);
                let (width, height) = tile.dimensions();
                debug!(tile = %key, width, height, "loaded elevation tile");
                Some(Arc::new(tile))
            }
            Ok(None) => {
                self.missing.fetch_add(1, Ordering::Relaxed);
                metrics::counter!(metric_defs::TILES_MISSING.name).increment(1);
                warn!(tile = %key, "elevation tile missing, assuming sea level");
                None
            }
            Err(e) => {
                self.failed.fetch_add(1, Ordering::Relaxed);
                metrics::counter!(metric_defs::TILES_MISSING.name).increment(1);
                warn!(tile = %key, error = %e, "elevation tile failed to load, assuming sea level");
                None
            }
        }
    }
}

/// Publishes a load result, or clears the slot if the loader panicked so
/// waiters can retry.
struct InFlight<'a, L> {
    cache: &'a TileCache<L>,
    key: TileKey,
    finished: bool,
}

impl<L> InFlight<'_, L> {
    fn finish(&mut self, tile: Option<Arc<DemTile>>) {
        self.cache.slots.lock().insert(self.key, Slot::Ready(tile));
        self.finished = true;
        self.cache.load_complete.notify_all();
    }
}

impl<L> Drop for InFlight<'_, L> {
    fn drop(&mut self) {
        if !self.finished {
            self.cache.slots.lock().remove(&self.key);
            self.cache.load_complete.notify_all();
        }
    }
}

impl<L> std::fmt::Debug for TileCache<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TileCache")
            .field("loaded", &self.loaded.load(Ordering::Relaxed))
            .field("missing", &self.missing.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}
