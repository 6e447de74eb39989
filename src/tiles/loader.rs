use crossbeam_channel::{select, unbounded, Receiver, Sender};

use crate::core::config::ImageLayer;
use crate::core::constants::DEFAULT_CACHE_BYTE_BUDGET;
use crate::prelude::{Arc, Duration, HashSet, SystemTime};
use crate::tiles::addressing::TilePyramid;
use crate::tiles::cache::{CacheStats, TileStore};
use crate::tiles::decode::{DecodeJob, DecodeOrigin, DecodeOutcome, DecodePool};
use crate::tiles::id::TileId;
use crate::tiles::source::{parse_token, DownloadScheduler, FetchCompletion, FetchRequest};
use crate::tiles::tile::Tile;
use crate::Result;
use std::path::Path;

/// Configuration for the tile loader
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileLoaderConfig {
    /// Byte budget of the recency cache
    pub cache_byte_budget: usize,
    /// Background decode threads; 0 decodes inline while requesting
    pub decode_workers: usize,
}

impl Default for TileLoaderConfig {
    fn default() -> Self {
        Self {
            cache_byte_budget: DEFAULT_CACHE_BYTE_BUDGET,
            decode_workers: 2,
        }
    }
}

/// Configuration presets for TileLoaderConfig
impl TileLoaderConfig {
    pub fn low_resource() -> Self {
        Self {
            cache_byte_budget: 8_000 * 1024,
            decode_workers: 1,
        }
    }

    pub fn high_performance() -> Self {
        Self {
            cache_byte_budget: 100_000 * 1024,
            decode_workers: 4,
        }
    }

    pub fn for_testing() -> Self {
        Self {
            cache_byte_budget: DEFAULT_CACHE_BYTE_BUDGET,
            decode_workers: 0,
        }
    }
}

/// Sent to subscribers whenever tiles handed out earlier changed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileUpdated {
    /// One tile was filled in place
    Tile(TileId),
    /// Every tile was dropped; request the visible ones again
    All,
}

impl TileUpdated {
    /// The updated tile, `None` after a full invalidation
    pub fn tile(&self) -> Option<TileId> {
        match self {
            TileUpdated::Tile(id) => Some(*id),
            TileUpdated::All => None,
        }
    }
}

enum LoaderEvent {
    Fetched(FetchCompletion),
    Decoded(DecodeOutcome),
}

/// Resolves tile requests through the active set, the recency cache, the
/// disk pyramid and finally the network.
///
/// The loader is owned by the render thread. Per frame the renderer calls
/// [`TileLoader::reset_usage_flags`], then [`TileLoader::request_tile`] for
/// every visible tile, then [`TileLoader::demote_unused`]. Background work
/// (decodes and downloads) reports back through channels drained by
/// [`TileLoader::process_events`].
pub struct TileLoader {
    pyramid: TilePyramid,
    store: TileStore,
    config: TileLoaderConfig,
    decoder: DecodePool,
    scheduler: Option<Arc<dyn DownloadScheduler>>,
    completion_tx: Sender<FetchCompletion>,
    completion_rx: Receiver<FetchCompletion>,
    /// Downloads requested since the last full invalidation
    in_flight: HashSet<TileId>,
    /// Decodes submitted and not yet applied
    pending_decodes: HashSet<TileId>,
    /// Bumped by every full invalidation; older decode results are dropped
    generation: u64,
    subscribers: Vec<Sender<TileUpdated>>,
}

impl TileLoader {
    pub fn new(layer: ImageLayer, config: TileLoaderConfig) -> Result<Self> {
        layer.validate()?;
        let decoder = DecodePool::new(config.decode_workers)?;
        let (completion_tx, completion_rx) = unbounded();

        log::info!(
            "tile loader for layer {} with a {} byte cache",
            layer.id,
            config.cache_byte_budget
        );
        Ok(Self {
            pyramid: TilePyramid::new(layer),
            store: TileStore::new(config.cache_byte_budget),
            config,
            decoder,
            scheduler: None,
            completion_tx,
            completion_rx,
            in_flight: HashSet::default(),
            pending_decodes: HashSet::default(),
            generation: 0,
            subscribers: Vec::new(),
        })
    }

    /// Collaborator used for tiles missing on disk. Without one, such tiles stay empty.
    pub fn set_download_scheduler(&mut self, scheduler: Arc<dyn DownloadScheduler>) {
        self.scheduler = Some(scheduler);
    }

    /// Channel on which a transport reports finished downloads
    pub fn completion_sender(&self) -> Sender<FetchCompletion> {
        self.completion_tx.clone()
    }

    /// Receives a [`TileUpdated`] for every tile filled in place and every
    /// full invalidation from now on
    pub fn subscribe(&mut self) -> Receiver<TileUpdated> {
        let (tx, rx) = unbounded();
        self.subscribers.push(tx);
        rx
    }

    /// Returns the tile at `(column, row)` of `level`, loading it if needed.
    ///
    /// A tile that is not available yet comes back empty and is filled in
    /// place later; subscribers hear about it through [`TileUpdated`].
    pub fn request_tile(&mut self, column: u32, row: u32, level: u32) -> &Tile {
        let id = TileId::new(level, column, row);

        if self.store.lookup_active(&id).is_none() {
            let expire = self.pyramid.layer().expire();
            if self.store.promote(&id, SystemTime::now(), expire).is_none() {
                self.load_missing(id);
            }
        }
        &self.store[&id]
    }

    /// Clears the usage flags; call before the requests of a frame
    pub fn reset_usage_flags(&mut self) {
        self.store.reset_usage_flags();
    }

    /// Moves tiles not requested since the last reset to the recency cache
    pub fn demote_unused(&mut self) {
        self.store.demote_unused();
    }

    /// Moves every active tile to the recency cache
    pub fn flush(&mut self) {
        self.store.flush_active();
    }

    /// Switches to another imagery layer, dropping every tile of the old one
    pub fn set_image_layer(&mut self, layer: ImageLayer) -> Result<()> {
        layer.validate()?;
        log::info!("switching image layer {} -> {}", self.pyramid.layer().id, layer.id);
        self.pyramid = TilePyramid::new(layer);
        self.invalidate();
        Ok(())
    }

    /// Forces every tile to be reloaded on its next request
    pub fn update(&mut self) {
        log::info!("reloading all tiles of layer {}", self.pyramid.layer().id);
        self.invalidate();
    }

    /// Changes the recency cache budget. Current entries are only evicted on
    /// the next demotion.
    pub fn set_cache_byte_budget(&mut self, bytes: usize) {
        log::info!("tile cache budget set to {} bytes", bytes);
        self.config.cache_byte_budget = bytes;
        self.store.set_cache_byte_budget(bytes);
    }

    /// Applies every finished download and decode. Returns how many events were handled.
    pub fn process_events(&mut self) -> usize {
        let mut handled = 0;
        loop {
            let event = if let Ok(completion) = self.completion_rx.try_recv() {
                LoaderEvent::Fetched(completion)
            } else if let Ok(outcome) = self.decoder.outcomes().try_recv() {
                LoaderEvent::Decoded(outcome)
            } else {
                break;
            };
            self.handle_event(event);
            handled += 1;
        }
        handled
    }

    /// Blocks until at least one event arrives or `timeout` passes, then
    /// handles everything that is ready
    pub fn wait_for_events(&mut self, timeout: Duration) -> usize {
        let completions = self.completion_rx.clone();

        // An inline pool has no workers holding the outcome channel open
        let event = if self.decoder.is_inline() {
            completions
                .recv_timeout(timeout)
                .ok()
                .map(LoaderEvent::Fetched)
        } else {
            let outcomes = self.decoder.outcomes().clone();
            select! {
                recv(completions) -> msg => msg.ok().map(LoaderEvent::Fetched),
                recv(outcomes) -> msg => msg.ok().map(LoaderEvent::Decoded),
                default(timeout) => None,
            }
        };

        match event {
            Some(event) => {
                self.handle_event(event);
                1 + self.process_events()
            }
            None => 0,
        }
    }

    /// Completion callback for transports that only carry the string token
    pub fn on_fetch_complete(&mut self, remote_path: &str, local_path: &Path, token: &str) {
        match parse_token(token, local_path) {
            Ok(completion) => self.handle_completion(completion),
            Err(e) => log::warn!("ignoring download of {}: {}", remote_path, e),
        }
    }

    pub fn pyramid(&self) -> &TilePyramid {
        &self.pyramid
    }

    pub fn image_layer(&self) -> &ImageLayer {
        self.pyramid.layer()
    }

    pub fn store(&self) -> &TileStore {
        &self.store
    }

    pub fn config(&self) -> &TileLoaderConfig {
        &self.config
    }

    pub fn stats(&self) -> CacheStats {
        self.store.stats()
    }

    pub fn tile_width(&self) -> u32 {
        self.pyramid.layer().tile_width
    }

    pub fn tile_height(&self) -> u32 {
        self.pyramid.layer().tile_height
    }

    pub fn global_width(&self, level: u32) -> u64 {
        self.pyramid.global_width(level)
    }

    pub fn global_height(&self, level: u32) -> u64 {
        self.pyramid.global_height(level)
    }

    pub fn max_complete_level(&self) -> i32 {
        self.pyramid.max_complete_level()
    }

    pub fn max_partial_level(&self) -> i32 {
        self.pyramid.max_partial_level()
    }

    pub fn base_tiles_available(&self) -> bool {
        self.pyramid.base_tiles_available()
    }

    /// Number of downloads requested and not completed yet
    pub fn downloads_in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Number of decodes submitted and not applied yet
    pub fn decodes_pending(&self) -> usize {
        self.pending_decodes.len()
    }

    fn load_missing(&mut self, id: TileId) {
        self.store.record_miss();
        log::debug!("tile {} not in memory, loading from disk", id);

        let mut tile = Tile::empty(id);
        tile.set_used(true);
        self.store.insert_active(tile);

        if self.pending_decodes.contains(&id) {
            return;
        }
        let path = self.pyramid.local_path(&id);
        self.submit_decode(id, path, DecodeOrigin::Disk);
    }

    fn submit_decode(&mut self, id: TileId, path: std::path::PathBuf, origin: DecodeOrigin) {
        let job = DecodeJob {
            id,
            path,
            origin,
            generation: self.generation,
        };
        self.pending_decodes.insert(id);

        match self.decoder.submit(job) {
            Ok(Some(outcome)) => self.apply_decode(outcome),
            Ok(None) => {}
            Err(e) => {
                self.pending_decodes.remove(&id);
                log::error!("cannot decode tile {}: {}", id, e);
            }
        }
    }

    fn handle_event(&mut self, event: LoaderEvent) {
        match event {
            LoaderEvent::Fetched(completion) => self.handle_completion(completion),
            LoaderEvent::Decoded(outcome) => self.apply_decode(outcome),
        }
    }

    fn handle_completion(&mut self, completion: FetchCompletion) {
        let id = completion.id;
        let requested = self.in_flight.remove(&id);

        if !requested || !self.store.contains_active(&id) {
            // Keep a late or unexpected download from resurrecting a cached copy
            if self.store.purge(&id) {
                log::debug!("purged cached tile {} after unexpected download", id);
            }
            log::debug!("discarding download of tile {}, it is no longer wanted", id);
            return;
        }

        log::debug!("download of tile {} finished", id);
        self.submit_decode(id, completion.local_path, DecodeOrigin::Download);
    }

    fn apply_decode(&mut self, outcome: DecodeOutcome) {
        let id = outcome.id;
        if outcome.generation != self.generation {
            log::trace!("dropping decode of tile {} from before an invalidation", id);
            return;
        }
        self.pending_decodes.remove(&id);

        let expire = self.pyramid.layer().expire();
        match outcome.result {
            Ok(raster) => {
                let Some(tile) = self.store.get_mut(&id) else {
                    log::trace!("tile {} left the active set while decoding", id);
                    return;
                };
                tile.set_image(raster.image);
                if let Some(modified) = raster.modified {
                    tile.set_created_at(modified);
                }
                let stale = tile.is_expired(SystemTime::now(), expire);

                self.notify(TileUpdated::Tile(id));
                if stale && outcome.origin == DecodeOrigin::Disk {
                    log::debug!("tile {} on disk is older than the expiry, refreshing", id);
                    self.schedule_download(id);
                }
            }
            Err(e) => match outcome.origin {
                DecodeOrigin::Disk => {
                    log::debug!("tile {} unavailable on disk: {}", id, e);
                    if self.store.contains_active(&id) {
                        self.schedule_download(id);
                    }
                }
                DecodeOrigin::Download => {
                    log::warn!("tile {} still unusable after download: {}", id, e);
                }
            },
        }
    }

    fn schedule_download(&mut self, id: TileId) {
        let Some(scheduler) = &self.scheduler else {
            log::debug!("no download scheduler, tile {} stays as it is", id);
            return;
        };
        if !self.in_flight.insert(id) {
            return;
        }

        let request = FetchRequest::new(
            id,
            self.pyramid.remote_path(&id),
            self.pyramid.local_path(&id),
        );
        log::debug!("scheduling download of {}", request.remote_path);
        scheduler.schedule_fetch(request);
    }

    fn notify(&mut self, update: TileUpdated) {
        self.subscribers
            .retain(|subscriber| subscriber.send(update).is_ok());
    }

    fn invalidate(&mut self) {
        self.store.flush_active();
        self.store.invalidate_all();
        self.in_flight.clear();
        self.pending_decodes.clear();
        self.generation += 1;
        self.notify(TileUpdated::All);
    }
}

impl std::fmt::Debug for TileLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TileLoader")
            .field("layer", &self.pyramid.layer().id)
            .field("active", &self.store.active_len())
            .field("cached", &self.store.cached_len())
            .field("in_flight", &self.in_flight.len())
            .field("generation", &self.generation)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbaImage;
    use std::sync::Mutex;

    fn layer(dir: &Path) -> ImageLayer {
        ImageLayer::new("earth/test", dir).with_extension("png")
    }

    fn write_tile(layer: &ImageLayer, id: TileId) {
        let path = TilePyramid::new(layer.clone()).local_path(&id);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        RgbaImage::new(4, 4).save(path).unwrap();
    }

    #[test]
    fn test_presets() {
        assert_eq!(TileLoaderConfig::default().cache_byte_budget, 20_000 * 1024);
        assert_eq!(TileLoaderConfig::for_testing().decode_workers, 0);
    }

    #[test]
    fn test_rejects_invalid_layer() {
        let layer = ImageLayer::new("earth/test", "/tmp").with_level_zero(0, 0);
        assert!(TileLoader::new(layer, TileLoaderConfig::for_testing()).is_err());
    }

    #[test]
    fn test_inline_disk_load() {
        let dir = tempfile::tempdir().unwrap();
        let layer = layer(dir.path());
        write_tile(&layer, TileId::new(0, 1, 0));

        let mut loader = TileLoader::new(layer, TileLoaderConfig::for_testing()).unwrap();
        let updates = loader.subscribe();

        let tile = loader.request_tile(1, 0, 0);
        assert!(tile.is_valid());
        assert!(tile.is_used());
        assert_eq!(updates.try_recv().unwrap(), TileUpdated::Tile(TileId::new(0, 1, 0)));
        assert_eq!(loader.stats().misses, 1);
    }

    #[test]
    fn test_missing_tile_schedules_one_download() {
        let dir = tempfile::tempdir().unwrap();
        let mut loader =
            TileLoader::new(layer(dir.path()), TileLoaderConfig::for_testing()).unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let sink = requests.clone();
        loader.set_download_scheduler(Arc::new(move |request: FetchRequest| {
            sink.lock().unwrap().push(request)
        }));

        assert!(!loader.request_tile(0, 0, 0).is_valid());
        loader.request_tile(0, 0, 0);

        let requests = requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].remote_path, "earth/test/0/0/0.png");
        assert_eq!(requests[0].token(), "0:0:0");
        assert_eq!(loader.downloads_in_flight(), 1);
    }

    #[test]
    fn test_malformed_token_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let mut loader =
            TileLoader::new(layer(dir.path()), TileLoaderConfig::for_testing()).unwrap();
        loader.on_fetch_complete("x", Path::new("/nowhere"), "not-a-tile");
        assert_eq!(loader.store().active_len(), 0);
    }

    #[test]
    fn test_update_bumps_generation() {
        let dir = tempfile::tempdir().unwrap();
        let layer = layer(dir.path());
        write_tile(&layer, TileId::new(0, 0, 0));
        let mut loader = TileLoader::new(layer, TileLoaderConfig::for_testing()).unwrap();

        loader.request_tile(0, 0, 0);
        loader.update();
        assert_eq!(loader.store().active_len(), 0);
        assert_eq!(loader.store().cached_len(), 0);
        assert_eq!(loader.generation, 1);
    }
}
