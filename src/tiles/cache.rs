//! Two-tier tile storage
//!
//! The active set holds the tiles referenced by the latest render pass. Tiles
//! that fall out of use move into a [`RecencyCache`], a least-recently-used
//! store bounded by the total decoded byte size of its tiles. A [`TileId`]
//! lives in at most one of the two tiers and tiles move between them by value.

use crate::prelude::HashMap;
use crate::tiles::id::TileId;
use crate::tiles::tile::Tile;
use lru::LruCache;
use std::ops::Index;
use std::time::{Duration, SystemTime};

/// Cost-bounded LRU of tiles that are not on screen
#[derive(Debug)]
pub struct RecencyCache {
    entries: LruCache<TileId, Tile>,
    total_cost: usize,
    max_cost: usize,
}

impl RecencyCache {
    pub fn new(max_cost: usize) -> Self {
        Self {
            entries: LruCache::unbounded(),
            total_cost: 0,
            max_cost,
        }
    }

    /// Inserts a tile as the most recent entry, evicting the least recent
    /// entries until the total cost is within budget. Returns how many entries
    /// were evicted.
    ///
    /// The tile is handed back when it cannot be cached: it is empty, costs
    /// more than the whole budget, or its id is already present.
    pub fn insert(&mut self, tile: Tile) -> std::result::Result<usize, Tile> {
        let cost = tile.byte_size();
        if cost == 0 || cost > self.max_cost || self.entries.contains(&tile.id()) {
            return Err(tile);
        }

        self.total_cost += cost;
        self.entries.put(tile.id(), tile);
        Ok(self.trim())
    }

    /// Removes and returns a tile
    pub fn take(&mut self, id: &TileId) -> Option<Tile> {
        let tile = self.entries.pop(id)?;
        self.total_cost -= tile.byte_size();
        Some(tile)
    }

    pub fn contains(&self, id: &TileId) -> bool {
        self.entries.contains(id)
    }

    /// Looks at a tile without changing its recency
    pub fn peek(&self, id: &TileId) -> Option<&Tile> {
        self.entries.peek(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total_cost(&self) -> usize {
        self.total_cost
    }

    pub fn max_cost(&self) -> usize {
        self.max_cost
    }

    /// Changes the budget for future insertions; current entries stay until the next insert
    pub fn set_max_cost(&mut self, max_cost: usize) {
        self.max_cost = max_cost;
    }

    /// Ids from the most to the least recent entry
    pub fn ids(&self) -> impl Iterator<Item = &TileId> {
        self.entries.iter().map(|(id, _)| id)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.total_cost = 0;
    }

    fn trim(&mut self) -> usize {
        let mut evicted = 0;
        while self.total_cost > self.max_cost {
            match self.entries.pop_lru() {
                Some((id, tile)) => {
                    self.total_cost -= tile.byte_size();
                    evicted += 1;
                    log::trace!("evicted tile {} ({} bytes)", id, tile.byte_size());
                }
                None => break,
            }
        }
        evicted
    }
}

/// Counters describing how requests were resolved
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub active_hits: u64,
    pub cache_hits: u64,
    pub stale_discards: u64,
    pub misses: u64,
    pub evictions: u64,
    /// Unused tiles destroyed because the recency cache refused them
    pub dropped_demotions: u64,
}

/// Active set plus recency cache.
///
/// Single-owner structure: all mutation happens on the thread that drives the
/// render passes, so there is no locking.
#[derive(Debug)]
pub struct TileStore {
    active: HashMap<TileId, Tile>,
    cache: RecencyCache,
    stats: CacheStats,
}

impl TileStore {
    pub fn new(cache_byte_budget: usize) -> Self {
        Self {
            active: HashMap::default(),
            cache: RecencyCache::new(cache_byte_budget),
            stats: CacheStats::default(),
        }
    }

    /// Finds an active tile and marks it used
    pub fn lookup_active(&mut self, id: &TileId) -> Option<&mut Tile> {
        let tile = self.active.get_mut(id)?;
        tile.set_used(true);
        self.stats.active_hits += 1;
        Some(tile)
    }

    /// Moves a fresh tile from the recency cache into the active set and marks it used.
    ///
    /// A tile that is `expire` old at `now` is dropped and reported as absent.
    pub fn promote(
        &mut self,
        id: &TileId,
        now: SystemTime,
        expire: Duration,
    ) -> Option<&mut Tile> {
        let mut tile = self.cache.take(id)?;
        if tile.is_expired(now, expire) {
            log::debug!("discarding stale tile {}", id);
            self.stats.stale_discards += 1;
            return None;
        }

        tile.set_used(true);
        self.stats.cache_hits += 1;
        Some(self.active.entry(*id).or_insert(tile))
    }

    /// Adds a freshly loaded tile to the active set.
    ///
    /// # Panics
    ///
    /// If a tile with the same id is already active.
    pub fn insert_active(&mut self, tile: Tile) -> &mut Tile {
        let id = tile.id();
        assert!(
            !self.active.contains_key(&id),
            "tile {} is already in the active set",
            id
        );
        if self.cache.take(&id).is_some() {
            log::trace!("dropping cached copy of tile {} in favour of a new one", id);
        }
        self.active.entry(id).or_insert(tile)
    }

    /// Clears the usage flag of every active tile. Call before the tile
    /// requests of a render pass.
    pub fn reset_usage_flags(&mut self) {
        for tile in self.active.values_mut() {
            tile.set_used(false);
        }
    }

    /// Moves every active tile not used since the last reset into the recency cache
    pub fn demote_unused(&mut self) {
        let unused: Vec<TileId> = self
            .active
            .iter()
            .filter(|(_, tile)| !tile.is_used())
            .map(|(id, _)| *id)
            .collect();
        self.demote(unused);
    }

    /// Moves every active tile into the recency cache
    pub fn flush_active(&mut self) {
        let ids: Vec<TileId> = self.active.keys().copied().collect();
        self.demote(ids);
    }

    /// Drops both tiers
    pub fn invalidate_all(&mut self) {
        self.active.clear();
        self.cache.clear();
    }

    /// Removes a tile from the recency cache
    pub fn purge(&mut self, id: &TileId) -> bool {
        self.cache.take(id).is_some()
    }

    /// Active tile without touching its usage flag
    pub fn get(&self, id: &TileId) -> Option<&Tile> {
        self.active.get(id)
    }

    pub(crate) fn get_mut(&mut self, id: &TileId) -> Option<&mut Tile> {
        self.active.get_mut(id)
    }

    pub fn contains_active(&self, id: &TileId) -> bool {
        self.active.contains_key(id)
    }

    pub fn contains_cached(&self, id: &TileId) -> bool {
        self.cache.contains(id)
    }

    pub fn active_len(&self) -> usize {
        self.active.len()
    }

    pub fn cached_len(&self) -> usize {
        self.cache.len()
    }

    pub fn active_ids(&self) -> impl Iterator<Item = &TileId> {
        self.active.keys()
    }

    pub fn cached_ids(&self) -> impl Iterator<Item = &TileId> {
        self.cache.ids()
    }

    /// Total byte size held by the recency cache
    pub fn cached_bytes(&self) -> usize {
        self.cache.total_cost()
    }

    pub fn cache_byte_budget(&self) -> usize {
        self.cache.max_cost()
    }

    /// Changes the recency cache budget; takes effect on the next eviction
    pub fn set_cache_byte_budget(&mut self, bytes: usize) {
        self.cache.set_max_cost(bytes);
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    pub(crate) fn record_miss(&mut self) {
        self.stats.misses += 1;
    }

    fn demote(&mut self, ids: Vec<TileId>) {
        for id in ids {
            let Some(tile) = self.active.remove(&id) else {
                continue;
            };
            match self.cache.insert(tile) {
                Ok(evicted) => self.stats.evictions += evicted as u64,
                Err(tile) => {
                    log::trace!(
                        "dropping tile {} ({} bytes) instead of caching it",
                        id,
                        tile.byte_size()
                    );
                    self.stats.dropped_demotions += 1;
                }
            }
        }
    }
}

impl Index<&TileId> for TileStore {
    type Output = Tile;

    fn index(&self, id: &TileId) -> &Tile {
        &self.active[id]
    }
}
