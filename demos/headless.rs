//! Drives the tile loader the way a renderer would, without a window.
//!
//! Level 0 of a small pyramid is written to a temporary directory. Deeper
//! tiles are "downloaded" by a transport thread that paints them and reports
//! back through the loader's completion channel.
//!
//! Run with `RUST_LOG=debug cargo run --example headless`.

use anyhow::{Context, Result};
use crossbeam_channel::{unbounded, Sender};
use globe_tiles::prelude::*;
use image::{Rgba, RgbaImage};
use std::path::Path;
use std::thread;

/// Transport that hands requests to a worker thread
struct ThreadTransport {
    requests: Sender<FetchRequest>,
}

impl DownloadScheduler for ThreadTransport {
    fn schedule_fetch(&self, request: FetchRequest) {
        if let Err(err) = self.requests.send(request) {
            log::warn!("transport is gone, dropping fetch of {}", err.into_inner().id);
        }
    }
}

fn paint_tile(path: &Path, id: TileId) -> Result<()> {
    let dir = path.parent().context("tile path without parent")?;
    std::fs::create_dir_all(dir)?;
    let shade = (40 * id.level + 8 * (id.x + id.y)) as u8;
    RgbaImage::from_pixel(64, 64, Rgba([shade, 90, 160, 255])).save(path)?;
    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let root = tempfile::tempdir()?;
    let layer = ImageLayer::new("earth/demo", root.path())
        .with_extension("png")
        .with_tile_size(64, 64);

    let pyramid = TilePyramid::new(layer.clone());
    for y in 0..pyramid.rows(0) {
        for x in 0..pyramid.columns(0) {
            let id = TileId::new(0, x, y);
            paint_tile(&pyramid.local_path(&id), id)?;
        }
    }

    let mut loader = TileLoader::new(layer, CacheProfile::Balanced.resolve())?;
    log::info!(
        "complete up to level {}, base tiles available: {}",
        loader.max_complete_level(),
        loader.base_tiles_available()
    );

    let (request_tx, request_rx) = unbounded::<FetchRequest>();
    let completions = loader.completion_sender();
    let transport = thread::spawn(move || -> Result<()> {
        for request in request_rx.iter() {
            paint_tile(&request.local_path, request.id)?;
            if completions.send(request.completed()).is_err() {
                break;
            }
        }
        Ok(())
    });
    loader.set_download_scheduler(Arc::new(ThreadTransport {
        requests: request_tx,
    }));
    let updates = loader.subscribe();

    let mut viewport = ViewportParams::new();
    viewport.set_size(640, 480);
    viewport.set_projection(ProjectionKind::Equirectangular);

    // Zoom in on Europe over a few frames
    for (frame, (radius, level)) in [(200, 0), (400, 1), (800, 2), (800, 2)].into_iter().enumerate() {
        viewport.set_radius(radius);
        viewport.set_orientation(Orientation::from_center(0.2, 0.8, 0.0));
        let region = viewport.view_lat_lon_box();

        loader.reset_usage_flags();
        let ids = loader.pyramid().tiles_covering(&region, level);
        let mut ready = 0;
        for id in &ids {
            if loader.request_tile(id.x, id.y, id.level).is_valid() {
                ready += 1;
            }
        }
        loader.demote_unused();

        while loader.downloads_in_flight() + loader.decodes_pending() > 0 {
            if loader.wait_for_events(Duration::from_secs(2)) == 0 {
                log::warn!("gave up waiting for tiles");
                break;
            }
        }

        let stats = loader.stats();
        log::info!(
            "frame {}: {} of {} tiles ready at level {}, {} updated, {} active / {} cached ({} bytes)",
            frame,
            ready,
            ids.len(),
            level,
            updates.try_iter().count(),
            loader.store().active_len(),
            loader.store().cached_len(),
            loader.store().cached_bytes(),
        );
        log::debug!("{:?}", stats);
    }

    let center = viewport.screen_coordinates(&GeoCoordinates::from_degrees(2.35, 48.86));
    log::info!("Paris lands at ({:.1}, {:.1}), visible: {}", center.x, center.y, center.visible);

    drop(loader);
    transport
        .join()
        .map_err(|_| anyhow::anyhow!("transport thread panicked"))??;
    Ok(())
}
