//! Tile addressing: layers, `(level, ilat, ilng)` keys and on-disk paths.

use std::fmt;
use std::path::PathBuf;

/// Which tile set of a body a tree streams.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TileLayer {
    /// Cloud shell textures.
    Cloud,
    /// Surface textures.
    Surface,
}

impl TileLayer {
    /// Directory name of the layer below the body directory.
    pub fn dir_name(self) -> &'static str {
        match self {
            TileLayer::Cloud => "Cloud",
            TileLayer::Surface => "Surf",
        }
    }
}

impl fmt::Display for TileLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

/// Position of a tile in the quadtree of one layer.
///
/// Level `l` splits the sphere into `2^l` latitude rows (row 0 northernmost)
/// and `2^(l+1)` longitude columns starting at -π. Level 0 holds the two
/// hemisphere roots.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileKey {
    /// Quadtree level (0 = hemisphere).
    pub level: u8,
    /// Latitude row.
    pub ilat: u32,
    /// Longitude column.
    pub ilng: u32,
}

impl TileKey {
    /// Deepest level whose indices fit the six-digit file names.
    pub const MAX_LEVEL: u8 = 18;

    /// Offset between quadtree level and the on-disk level directory.
    pub const DISK_LEVEL_OFFSET: u8 = 4;

    /// Construct a key, validating the indices against the level.
    ///
    /// # Panics
    ///
    /// Panics if `level` exceeds [`Self::MAX_LEVEL`] or an index is out of range.
    #[must_use]
    pub fn new(level: u8, ilat: u32, ilng: u32) -> Self {
        assert!(
            level <= Self::MAX_LEVEL,
            "level {level} exceeds MAX_LEVEL {}",
            Self::MAX_LEVEL
        );
        assert!(
            ilat < Self::lat_count(level),
            "ilat={ilat} out of range for level {level}"
        );
        assert!(
            ilng < Self::lng_count(level),
            "ilng={ilng} out of range for level {level}"
        );
        Self { level, ilat, ilng }
    }

    /// The two hemisphere roots, western first.
    pub fn roots() -> [TileKey; 2] {
        [TileKey::new(0, 0, 0), TileKey::new(0, 0, 1)]
    }

    /// Number of latitude rows at `level`.
    pub fn lat_count(level: u8) -> u32 {
        1 << level
    }

    /// Number of longitude columns at `level`.
    pub fn lng_count(level: u8) -> u32 {
        1 << (level + 1)
    }

    /// The key one level up, `None` for a root.
    #[must_use]
    pub fn parent(&self) -> Option<TileKey> {
        if self.level == 0 {
            return None;
        }
        Some(TileKey {
            level: self.level - 1,
            ilat: self.ilat / 2,
            ilng: self.ilng / 2,
        })
    }

    /// The four keys one level down, ordered north-west, north-east,
    /// south-west, south-east.
    #[must_use]
    pub fn children(&self) -> [TileKey; 4] {
        let level = self.level + 1;
        let (lat, lng) = (self.ilat * 2, self.ilng * 2);
        [
            TileKey::new(level, lat, lng),
            TileKey::new(level, lat, lng + 1),
            TileKey::new(level, lat + 1, lng),
            TileKey::new(level, lat + 1, lng + 1),
        ]
    }

    /// True if `self` is `other` or one of its ancestors.
    pub fn contains(&self, other: &TileKey) -> bool {
        if other.level < self.level {
            return false;
        }
        let shift = other.level - self.level;
        other.ilat >> shift == self.ilat && other.ilng >> shift == self.ilng
    }

    /// File path of the tile relative to the texture root:
    /// `<body>/<layer>/<level+4:02>/<ilat:06>/<ilng:06>.dds`.
    pub fn relative_path(&self, body: &str, layer: TileLayer) -> PathBuf {
        let mut path = PathBuf::from(body);
        path.push(layer.dir_name());
        path.push(format!("{:02}", self.level + Self::DISK_LEVEL_OFFSET));
        path.push(format!("{:06}", self.ilat));
        path.push(format!("{:06}.dds", self.ilng));
        path
    }
}

impl fmt::Display for TileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}[{}, {}]", self.level, self.ilat, self.ilng)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cloud_path_pattern() {
        let key = TileKey::new(3, 2, 9);
        let path = key.relative_path("Earth", TileLayer::Cloud);
        let expected: PathBuf = ["Earth", "Cloud", "07", "000002", "000009.dds"].iter().collect();
        assert_eq!(path, expected);
    }

    #[test]
    fn test_surface_path_uses_surf_dir() {
        let path = TileKey::new(0, 0, 1).relative_path("Mars", TileLayer::Surface);
        let expected: PathBuf = ["Mars", "Surf", "04", "000000", "000001.dds"].iter().collect();
        assert_eq!(path, expected);
    }

    #[test]
    fn test_grid_counts() {
        assert_eq!(TileKey::lat_count(0), 1);
        assert_eq!(TileKey::lng_count(0), 2);
        assert_eq!(TileKey::lat_count(5), 32);
        assert_eq!(TileKey::lng_count(5), 64);
        assert_eq!(TileKey::lng_count(TileKey::MAX_LEVEL), 1 << 19);
        assert!(TileKey::lng_count(TileKey::MAX_LEVEL) - 1 <= 999_999);
    }

    #[test]
    fn test_children_parent_roundtrip() {
        let key = TileKey::new(4, 5, 17);
        for child in key.children() {
            assert_eq!(child.level, 5);
            assert_eq!(child.parent(), Some(key));
            assert!(key.contains(&child));
        }
        assert_eq!(TileKey::roots()[0].parent(), None);
    }

    #[test]
    fn test_contains_rejects_other_branches() {
        let west = TileKey::roots()[0];
        let east = TileKey::roots()[1];
        let deep = TileKey::new(6, 10, 100);
        assert!(east.contains(&deep));
        assert!(!west.contains(&deep));
        assert!(!deep.contains(&east));
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn test_out_of_range_index_panics() {
        let _ = TileKey::new(2, 4, 0);
    }
}
