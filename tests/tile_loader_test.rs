use globe_tiles::prelude::*;
use image::RgbaImage;
use std::path::Path;
use std::sync::Mutex;

/// Frame-level tests for the tile loader against a real pyramid on disk
#[cfg(test)]
mod tile_loader_tests {
    use super::*;

    /// Download collaborator that only remembers what it was asked for
    #[derive(Default)]
    struct RecordingScheduler {
        requests: Mutex<Vec<FetchRequest>>,
    }

    impl RecordingScheduler {
        fn requests(&self) -> Vec<FetchRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    impl DownloadScheduler for RecordingScheduler {
        fn schedule_fetch(&self, request: FetchRequest) {
            self.requests.lock().unwrap().push(request);
        }
    }

    fn init_logging() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn write_png(path: &Path, width: u32, height: u32) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        RgbaImage::from_pixel(width, height, image::Rgba([0, 64, 128, 255]))
            .save(path)
            .unwrap();
    }

    /// Writes every tile of `level`
    fn write_level(layer: &ImageLayer, level: u32) {
        let pyramid = TilePyramid::new(layer.clone());
        for y in 0..pyramid.rows(level) {
            for x in 0..pyramid.columns(level) {
                write_png(&pyramid.local_path(&TileId::new(level, x, y)), 8, 8);
            }
        }
    }

    fn test_layer(dir: &Path) -> ImageLayer {
        ImageLayer::new("earth/testmap", dir).with_extension("png")
    }

    fn loader_with_recorder(layer: ImageLayer) -> (TileLoader, Arc<RecordingScheduler>) {
        let mut loader = TileLoader::new(layer, TileLoaderConfig::for_testing()).unwrap();
        let recorder = Arc::new(RecordingScheduler::default());
        loader.set_download_scheduler(recorder.clone());
        (loader, recorder)
    }

    #[test]
    fn test_same_tile_twice_in_one_frame() {
        init_logging();
        let dir = tempfile::tempdir().unwrap();
        let layer = test_layer(dir.path());
        write_level(&layer, 0);
        let (mut loader, _) = loader_with_recorder(layer);
        let id = TileId::new(0, 0, 0);

        loader.reset_usage_flags();
        let first = loader.request_tile(0, 0, 0) as *const Tile;
        let second = loader.request_tile(0, 0, 0) as *const Tile;
        assert_eq!(first, second);

        let tile = loader.store().get(&id).unwrap();
        assert!(tile.is_used());
        assert!(tile.is_valid());

        loader.demote_unused();
        assert!(loader.store().contains_active(&id));
        assert!(!loader.store().contains_cached(&id));
        assert_eq!(loader.stats().active_hits, 1);
        assert_eq!(loader.stats().misses, 1);
    }

    #[test]
    fn test_frames_demote_and_promote() {
        let dir = tempfile::tempdir().unwrap();
        let layer = test_layer(dir.path());
        write_level(&layer, 0);
        let (mut loader, _) = loader_with_recorder(layer);

        loader.reset_usage_flags();
        loader.request_tile(0, 0, 0);
        loader.request_tile(1, 0, 0);
        loader.demote_unused();

        // Next frame only shows the first tile
        loader.reset_usage_flags();
        loader.request_tile(0, 0, 0);
        loader.demote_unused();
        assert!(loader.store().contains_cached(&TileId::new(0, 1, 0)));
        assert_eq!(loader.store().cached_bytes(), 8 * 8 * 4);

        // And then the second one again
        loader.reset_usage_flags();
        assert!(loader.request_tile(1, 0, 0).is_valid());
        assert!(loader.store().contains_active(&TileId::new(0, 1, 0)));
        assert!(!loader.store().contains_cached(&TileId::new(0, 1, 0)));
        assert_eq!(loader.stats().cache_hits, 1);
    }

    #[test]
    fn test_recency_cache_holds_budget_under_pressure() {
        // 25 tiles of 1 MiB each against the default budget of 20 000 KiB
        let budget = TileLoaderConfig::default().cache_byte_budget;
        let mut store = TileStore::new(budget);

        for x in 0..25 {
            store.insert_active(Tile::from_image(
                TileId::new(5, x, 0),
                RgbaImage::new(512, 512),
            ));
            store.reset_usage_flags();
            store.demote_unused();
            assert!(store.cached_bytes() <= budget);
        }

        assert_eq!(store.cached_len(), 19);
        for x in 0..6 {
            assert!(!store.contains_cached(&TileId::new(5, x, 0)));
        }
        for x in 6..25 {
            assert!(store.contains_cached(&TileId::new(5, x, 0)));
        }
        assert_eq!(store.stats().evictions, 6);
    }

    #[test]
    fn test_missing_tile_is_downloaded_and_filled_in_place() {
        init_logging();
        let dir = tempfile::tempdir().unwrap();
        let (mut loader, recorder) = loader_with_recorder(test_layer(dir.path()));
        let updates = loader.subscribe();

        assert!(!loader.request_tile(1, 0, 0).is_valid());
        let requests = recorder.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].remote_path, "earth/testmap/0/1/0.png");
        assert!(updates.try_recv().is_err());

        // The transport drops the file in place and reports back
        write_png(&requests[0].local_path, 16, 16);
        loader
            .completion_sender()
            .send(requests[0].completed())
            .unwrap();
        assert_eq!(loader.process_events(), 1);

        assert_eq!(updates.try_recv().unwrap(), TileUpdated::Tile(TileId::new(0, 1, 0)));
        let tile = loader.store().get(&TileId::new(0, 1, 0)).unwrap();
        assert_eq!(tile.byte_size(), 16 * 16 * 4);
        assert_eq!(loader.downloads_in_flight(), 0);
    }

    #[test]
    fn test_string_token_completion() {
        let dir = tempfile::tempdir().unwrap();
        let (mut loader, recorder) = loader_with_recorder(test_layer(dir.path()));

        loader.request_tile(0, 0, 0);
        let request = recorder.requests().remove(0);
        write_png(&request.local_path, 8, 8);

        loader.on_fetch_complete(&request.remote_path, &request.local_path, &request.token());
        assert!(loader.request_tile(0, 0, 0).is_valid());
    }

    #[test]
    fn test_broken_download_leaves_tile_empty() {
        let dir = tempfile::tempdir().unwrap();
        let (mut loader, recorder) = loader_with_recorder(test_layer(dir.path()));

        loader.request_tile(0, 0, 0);
        let request = recorder.requests().remove(0);
        std::fs::create_dir_all(request.local_path.parent().unwrap()).unwrap();
        std::fs::write(&request.local_path, b"<html>404</html>").unwrap();

        loader.completion_sender().send(request.completed()).unwrap();
        loader.process_events();

        assert!(!loader.request_tile(0, 0, 0).is_valid());
        // No retry loop
        assert_eq!(recorder.requests().len(), 1);
    }

    #[test]
    fn test_stale_tiles_reload() {
        let dir = tempfile::tempdir().unwrap();
        // Every tile is stale the moment it is created
        let layer = test_layer(dir.path()).with_expire_seconds(0);
        write_level(&layer, 0);
        let (mut loader, recorder) = loader_with_recorder(layer);
        let id = TileId::new(0, 0, 0);

        // Shown from disk, but refreshed from the network
        assert!(loader.request_tile(0, 0, 0).is_valid());
        assert_eq!(recorder.requests().len(), 1);

        loader.reset_usage_flags();
        loader.demote_unused();
        assert!(loader.store().contains_cached(&id));

        // Promotion finds it stale and reloads instead
        loader.reset_usage_flags();
        assert!(loader.request_tile(0, 0, 0).is_valid());
        assert_eq!(loader.stats().stale_discards, 1);
        assert_eq!(loader.stats().cache_hits, 0);
        assert_eq!(loader.stats().misses, 2);
        assert!(!loader.store().contains_cached(&id));
    }

    #[test]
    fn test_unexpected_completion_purges_cached_tile() {
        let dir = tempfile::tempdir().unwrap();
        let layer = test_layer(dir.path());
        write_level(&layer, 0);
        let (mut loader, _) = loader_with_recorder(layer.clone());
        let id = TileId::new(0, 1, 0);

        loader.request_tile(1, 0, 0);
        loader.reset_usage_flags();
        loader.demote_unused();
        assert!(loader.store().contains_cached(&id));

        let local_path = TilePyramid::new(layer).local_path(&id);
        loader
            .completion_sender()
            .send(FetchCompletion { id, local_path })
            .unwrap();
        loader.process_events();

        assert!(!loader.store().contains_cached(&id));
        assert!(!loader.store().contains_active(&id));
    }

    #[test]
    fn test_invalidation_discards_outstanding_downloads() {
        let dir = tempfile::tempdir().unwrap();
        let (mut loader, recorder) = loader_with_recorder(test_layer(dir.path()));
        let updates = loader.subscribe();

        loader.request_tile(0, 0, 0);
        assert_eq!(loader.downloads_in_flight(), 1);
        loader.update();
        assert_eq!(loader.downloads_in_flight(), 0);
        assert_eq!(updates.try_recv().unwrap(), TileUpdated::All);

        let request = recorder.requests().remove(0);
        write_png(&request.local_path, 8, 8);
        loader.completion_sender().send(request.completed()).unwrap();
        loader.process_events();

        assert!(updates.try_recv().is_err());
        assert_eq!(loader.store().active_len(), 0);
        assert_eq!(loader.store().cached_len(), 0);
    }

    #[test]
    fn test_switching_layers_drops_tiles() {
        let dir = tempfile::tempdir().unwrap();
        let first = test_layer(dir.path());
        write_level(&first, 0);
        let (mut loader, _) = loader_with_recorder(first);

        loader.request_tile(0, 0, 0);
        loader.request_tile(1, 0, 0);
        loader.reset_usage_flags();
        loader.request_tile(0, 0, 0);
        loader.demote_unused();

        let updates = loader.subscribe();
        let second = ImageLayer::new("earth/other", dir.path())
            .with_extension("png")
            .with_level_zero(1, 1);
        loader.set_image_layer(second).unwrap();
        assert_eq!(loader.store().active_len(), 0);
        assert_eq!(loader.store().cached_len(), 0);
        assert_eq!(loader.image_layer().id, "earth/other");
        assert_eq!(loader.global_width(2), 4 * 256);
        assert_eq!(updates.try_iter().collect::<Vec<_>>(), vec![TileUpdated::All]);

        let invalid = ImageLayer::new("", dir.path());
        assert!(loader.set_image_layer(invalid).is_err());
        assert_eq!(loader.image_layer().id, "earth/other");
    }

    #[test]
    fn test_cache_budget_change() {
        let dir = tempfile::tempdir().unwrap();
        let layer = test_layer(dir.path());
        write_level(&layer, 0);
        let (mut loader, _) = loader_with_recorder(layer);

        loader.request_tile(0, 0, 0);
        loader.request_tile(1, 0, 0);
        loader.flush();
        assert_eq!(loader.store().cached_len(), 2);

        loader.set_cache_byte_budget(64);
        assert_eq!(loader.store().cache_byte_budget(), 64);
        assert_eq!(loader.config().cache_byte_budget, 64);
        assert_eq!(loader.store().cached_len(), 2);
    }

    #[test]
    fn test_pyramid_probing() {
        let dir = tempfile::tempdir().unwrap();
        let layer = test_layer(dir.path());
        let loader = TileLoader::new(layer.clone(), TileLoaderConfig::for_testing()).unwrap();
        assert_eq!(loader.max_complete_level(), -1);
        assert!(!loader.base_tiles_available());

        write_level(&layer, 0);
        write_level(&layer, 1);
        let pyramid = TilePyramid::new(layer.clone());
        write_png(&pyramid.local_path(&TileId::new(2, 0, 0)), 8, 8);

        assert!(loader.base_tiles_available());
        assert_eq!(loader.max_complete_level(), 1);
        assert_eq!(loader.max_partial_level(), 2);

        // A complete level above a gap is not found
        write_level(&layer, 3);
        assert_eq!(loader.max_complete_level(), 1);
    }

    #[test]
    fn test_background_decoding() {
        init_logging();
        let dir = tempfile::tempdir().unwrap();
        let layer = test_layer(dir.path());
        write_level(&layer, 0);

        let config = TileLoaderConfig {
            decode_workers: 2,
            ..TileLoaderConfig::default()
        };
        let mut loader = TileLoader::new(layer, config).unwrap();
        let updates = loader.subscribe();

        assert!(!loader.request_tile(0, 0, 0).is_valid());
        assert!(!loader.request_tile(1, 0, 0).is_valid());

        let mut updated = Vec::new();
        while updated.len() < 2 {
            assert!(loader.wait_for_events(Duration::from_secs(10)) > 0);
            updated.extend(updates.try_iter().filter_map(|update| update.tile()));
        }
        updated.sort();
        assert_eq!(updated, vec![TileId::new(0, 0, 0), TileId::new(0, 1, 0)]);
        assert!(loader.request_tile(0, 0, 0).is_valid());
        assert!(loader.request_tile(1, 0, 0).is_valid());
    }
}
