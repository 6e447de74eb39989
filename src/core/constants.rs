//! Core constants shared by the tile pipeline and the projections.
//! Keeping them in a single place makes it easier to tweak engine-wide magic numbers.

/// Default byte budget of the recency cache (20 000 KiB).
pub const DEFAULT_CACHE_BYTE_BUDGET: usize = 20_000 * 1024;

/// Default globe radius in pixels.
pub const DEFAULT_RADIUS: u32 = 2000;

/// Default canvas size in pixels (width, height).
pub const DEFAULT_CANVAS_SIZE: (u32, u32) = (100, 100);

/// Distance of the vertical-perspective camera from the globe center, in globe radii.
pub const PERSPECTIVE_DISTANCE: f64 = 5.0;

/// Latitude (radians) at which the Mercator map is cut off: `atan(sinh(PI))`, about 85.0511°.
pub const MERCATOR_MAX_LATITUDE: f64 = 1.484_422_229_745_332_4;

/// Default tile expiry of one year.
pub const DEFAULT_EXPIRE_SECONDS: u64 = 31_536_000;

/// Default tile edge in pixels.
pub const DEFAULT_TILE_SIZE: u32 = 256;

/// Highest level the completeness probe will look at.
pub const MAX_PROBE_LEVEL: u32 = 20;

/// Bytes per decoded RGBA pixel.
pub const BYTES_PER_PIXEL: usize = 4;
