use glam::Mat4;
use orrery_math::OrientedBox;

use crate::{DeviceError, PatchMesh, TexRange, Texture, TileKey, TileLayer};

/// One tile draw call.
#[derive(Clone, Copy, Debug)]
pub struct TileDraw<'a> {
    pub layer: TileLayer,
    pub key: TileKey,
    pub mesh: &'a PatchMesh,
    /// `None` draws the patch untextured.
    pub texture: Option<&'a Texture>,
    /// Window of `texture` covering this tile.
    pub texrange: TexRange,
    /// Mesh-local to view transform, the mesh origin already folded in.
    pub world_view: Mat4,
}

/// The graphics device tiles are submitted to.
pub trait RenderDevice {
    /// Draw one patch as an indexed triangle list.
    fn draw_tile(&mut self, draw: &TileDraw<'_>) -> Result<(), DeviceError>;

    /// Outline a tile's bounds; only called with tile-bounds debugging on.
    fn draw_bounds(&mut self, _bounds: &OrientedBox, _world_view: &Mat4) -> Result<(), DeviceError> {
        Ok(())
    }
}
