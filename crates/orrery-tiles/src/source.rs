//! Where tile data comes from.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::{Texture, TileKey, TileLayer, TileSourceError};

/// Regular grid of heights in meters over a tile, row 0 northernmost.
#[derive(Clone, Debug, PartialEq)]
pub struct ElevationGrid {
    /// Samples per side; at least 2.
    pub size: usize,
    pub heights: Vec<f32>,
}

impl ElevationGrid {
    /// A grid with every sample at `height`.
    pub fn flat(size: usize, height: f32) -> Self {
        Self {
            size,
            heights: vec![height; size * size],
        }
    }

    /// Bilinear lookup at tile-relative `(u, v)` in `[0, 1]`, `u` eastwards
    /// and `v` southwards.
    pub fn sample(&self, u: f64, v: f64) -> f32 {
        let n = self.size.max(2);
        let last = (n - 1) as f64;
        let x = (u.clamp(0.0, 1.0) * last).min(last);
        let y = (v.clamp(0.0, 1.0) * last).min(last);
        let (x0, y0) = (x.floor() as usize, y.floor() as usize);
        let (x1, y1) = ((x0 + 1).min(n - 1), (y0 + 1).min(n - 1));
        let (fx, fy) = ((x - x0 as f64) as f32, (y - y0 as f64) as f32);
        let at = |col: usize, row: usize| self.heights.get(row * n + col).copied().unwrap_or(0.0);
        let top = at(x0, y0) * (1.0 - fx) + at(x1, y0) * fx;
        let bottom = at(x0, y1) * (1.0 - fx) + at(x1, y1) * fx;
        top * (1.0 - fy) + bottom * fy
    }
}

/// Resolves tile addresses to data. Called from loader threads without the
/// tree lock held.
pub trait TileSource: Send + Sync {
    /// Texture of one tile.
    fn load_texture(&self, layer: TileLayer, key: &TileKey) -> Result<Texture, TileSourceError>;

    /// Height field of one tile, if the source has one.
    fn load_elevation(
        &self,
        _layer: TileLayer,
        _key: &TileKey,
    ) -> Result<Option<ElevationGrid>, TileSourceError> {
        Ok(None)
    }
}

/// Reads DDS tiles from `<root>/<body>/<layer>/<level+4>/<ilat>/<ilng>.dds`.
#[derive(Clone, Debug)]
pub struct FsTileSource {
    root: PathBuf,
    body: String,
}

impl FsTileSource {
    pub fn new(root: impl Into<PathBuf>, body: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            body: body.into(),
        }
    }

    /// Absolute path of a tile file.
    pub fn path(&self, layer: TileLayer, key: &TileKey) -> PathBuf {
        self.root.join(key.relative_path(&self.body, layer))
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl TileSource for FsTileSource {
    fn load_texture(&self, layer: TileLayer, key: &TileKey) -> Result<Texture, TileSourceError> {
        let path = self.path(layer, key);
        let bytes = std::fs::read(&path).map_err(|source| match source.kind() {
            ErrorKind::NotFound => TileSourceError::NotFound(path.clone()),
            ErrorKind::OutOfMemory => TileSourceError::OutOfMemory,
            _ => TileSourceError::Io {
                path: path.clone(),
                source,
            },
        })?;
        Texture::from_dds(&bytes, &path)
    }
}
