use crate::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identifies one cell of the tile pyramid.
///
/// Row 0 is the northernmost row of a level. The `Display` form
/// `"level:x:y"` is the token round-tripped through the download collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TileId {
    pub level: u32,
    pub x: u32,
    pub y: u32,
}

impl TileId {
    pub fn new(level: u32, x: u32, y: u32) -> Self {
        Self { level, x, y }
    }

    /// Tile one level up containing this one; `None` at level 0
    pub fn parent(&self) -> Option<TileId> {
        if self.level == 0 {
            return None;
        }
        Some(TileId::new(self.level - 1, self.x / 2, self.y / 2))
    }

    /// The four tiles one level down covering this one
    pub fn children(&self) -> [TileId; 4] {
        let level = self.level + 1;
        let (x, y) = (self.x * 2, self.y * 2);
        [
            TileId::new(level, x, y),
            TileId::new(level, x + 1, y),
            TileId::new(level, x, y + 1),
            TileId::new(level, x + 1, y + 1),
        ]
    }
}

impl fmt::Display for TileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.level, self.x, self.y)
    }
}

impl FromStr for TileId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split(':');
        let mut next = || -> Result<u32, Error> {
            parts
                .next()
                // Only the exact `Display` form: no whitespace, no sign
                .filter(|part| !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit()))
                .and_then(|part| part.parse().ok())
                .ok_or_else(|| Error::InvalidTileId(s.to_string()))
        };

        let id = TileId::new(next()?, next()?, next()?);
        if parts.next().is_some() {
            return Err(Error::InvalidTileId(s.to_string()));
        }
        Ok(id)
    }
}
