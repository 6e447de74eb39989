//! Background decoding of tile files
//!
//! Decoding a compressed tile into an RGBA raster is the expensive part of a
//! disk load, so it runs on a few worker threads fed through a crossbeam
//! channel. Finished decodes come back on a second channel that the owning
//! thread drains. A pool without workers decodes on the calling thread.

use crate::tiles::id::TileId;
use crate::{Error, Result};
use crossbeam_channel::{unbounded, Receiver, Sender};
use image::{ImageError, RgbaImage};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};
use std::time::SystemTime;

/// Where the file being decoded came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DecodeOrigin {
    /// Local pyramid on first request
    Disk,
    /// File that a download just put in place
    Download,
}

#[derive(Debug, Clone)]
pub(crate) struct DecodeJob {
    pub id: TileId,
    pub path: PathBuf,
    pub origin: DecodeOrigin,
    /// Loader generation at submission time
    pub generation: u64,
}

impl DecodeJob {
    fn run(self) -> DecodeOutcome {
        let result = decode_tile_file(self.id, &self.path);
        DecodeOutcome {
            id: self.id,
            origin: self.origin,
            generation: self.generation,
            result,
        }
    }
}

#[derive(Debug)]
pub(crate) struct DecodedRaster {
    pub image: RgbaImage,
    /// Modification time of the tile file
    pub modified: Option<SystemTime>,
}

#[derive(Debug)]
pub(crate) struct DecodeOutcome {
    pub id: TileId,
    pub origin: DecodeOrigin,
    pub generation: u64,
    pub result: Result<DecodedRaster>,
}

/// Reads and decodes one tile file into an RGBA raster
pub(crate) fn decode_tile_file(id: TileId, path: &Path) -> Result<DecodedRaster> {
    let image = match image::open(path) {
        Ok(image) => image.to_rgba8(),
        Err(ImageError::IoError(e)) if e.kind() == ErrorKind::NotFound => {
            return Err(Error::TileMissing(path.to_path_buf()));
        }
        Err(e) => return Err(e.into()),
    };
    if image.width() == 0 || image.height() == 0 {
        return Err(Error::EmptyRaster(id));
    }

    let modified = std::fs::metadata(path).and_then(|m| m.modified()).ok();
    Ok(DecodedRaster { image, modified })
}

pub(crate) struct DecodePool {
    job_tx: Option<Sender<DecodeJob>>,
    outcome_rx: Receiver<DecodeOutcome>,
    workers: Vec<JoinHandle<()>>,
}

impl DecodePool {
    pub fn new(worker_count: usize) -> Result<Self> {
        let (job_tx, job_rx) = unbounded::<DecodeJob>();
        let (outcome_tx, outcome_rx) = unbounded();

        let mut workers = Vec::with_capacity(worker_count);
        for index in 0..worker_count {
            let job_rx = job_rx.clone();
            let outcome_tx = outcome_tx.clone();
            let handle = thread::Builder::new()
                .name(format!("tile-decode-{}", index))
                .spawn(move || {
                    for job in job_rx.iter() {
                        if outcome_tx.send(job.run()).is_err() {
                            break;
                        }
                    }
                })?;
            workers.push(handle);
        }

        log::debug!("decode pool started with {} workers", worker_count);
        Ok(Self {
            job_tx: Some(job_tx),
            outcome_rx,
            workers,
        })
    }

    pub fn is_inline(&self) -> bool {
        self.workers.is_empty()
    }

    /// Queues a job. Without workers the job runs right away and its outcome
    /// is returned instead of being sent to the outcome channel.
    pub fn submit(&self, job: DecodeJob) -> Result<Option<DecodeOutcome>> {
        if self.is_inline() {
            return Ok(Some(job.run()));
        }
        let job_tx = self.job_tx.as_ref().ok_or(Error::WorkerPoolClosed)?;
        job_tx.send(job).map_err(|_| Error::WorkerPoolClosed)?;
        Ok(None)
    }

    pub fn outcomes(&self) -> &Receiver<DecodeOutcome> {
        &self.outcome_rx
    }
}

impl Drop for DecodePool {
    fn drop(&mut self) {
        // Closing the job channel ends the worker loops
        self.job_tx.take();
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                log::error!("tile decode worker panicked");
            }
        }
    }
}

impl std::fmt::Debug for DecodePool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecodePool")
            .field("workers", &self.workers.len())
            .field("pending_outcomes", &self.outcome_rx.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn write_tile(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        RgbaImage::from_pixel(8, 4, image::Rgba([10, 20, 30, 255]))
            .save(&path)
            .unwrap();
        path
    }

    fn job(path: PathBuf) -> DecodeJob {
        DecodeJob {
            id: TileId::new(0, 0, 0),
            path,
            origin: DecodeOrigin::Disk,
            generation: 7,
        }
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = decode_tile_file(TileId::new(0, 0, 0), &dir.path().join("0.png"));
        assert!(matches!(result, Err(Error::TileMissing(_))));
    }

    #[test]
    fn test_garbage_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("0.png");
        std::fs::write(&path, b"definitely not a png").unwrap();
        assert!(decode_tile_file(TileId::new(0, 0, 0), &path).is_err());
    }

    #[test]
    fn test_inline_pool_decodes_on_submit() {
        let dir = tempfile::tempdir().unwrap();
        let pool = DecodePool::new(0).unwrap();
        assert!(pool.is_inline());

        let outcome = pool
            .submit(job(write_tile(dir.path(), "0.png")))
            .unwrap()
            .unwrap();
        assert_eq!(outcome.generation, 7);
        let raster = outcome.result.unwrap();
        assert_eq!(raster.image.dimensions(), (8, 4));
        assert!(raster.modified.is_some());
    }

    #[test]
    fn test_worker_pool_delivers_outcomes() {
        let dir = tempfile::tempdir().unwrap();
        let pool = DecodePool::new(2).unwrap();

        for name in ["0.png", "1.png", "2.png"] {
            let pending = pool.submit(job(write_tile(dir.path(), name))).unwrap();
            assert!(pending.is_none());
        }

        for _ in 0..3 {
            let outcome = pool
                .outcomes()
                .recv_timeout(Duration::from_secs(10))
                .unwrap();
            assert!(outcome.result.is_ok());
        }
    }
}
