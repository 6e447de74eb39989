pub mod addressing;
pub mod cache;
pub(crate) mod decode;
pub mod id;
pub mod loader;
pub mod source;
pub mod tile;

// Re-exports for convenience
pub use addressing::TilePyramid;
pub use id::TileId;
pub use loader::TileLoader;
pub use source::{DownloadScheduler, FetchCompletion, FetchRequest};
