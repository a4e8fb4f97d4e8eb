//! Spherical patch meshes for tiles.

use glam::{DVec3, Vec3};
use orrery_math::OrientedBox;

use crate::extents::surface_normal;
use crate::{ElevationGrid, TileExtents, TileKey};

/// Level from which patch vertices are stored relative to the tile center.
pub const SHIFT_ORIGIN_LEVEL: u8 = 4;

/// One patch vertex. Texture coordinates span the tile's own `[0, 1]`
/// square; ancestor sub-ranges are applied at draw time.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PatchVertex {
    pub position: Vec3,
    pub normal: Vec3,
    pub uv: [f32; 2],
}

/// Indexed triangle list covering one tile.
#[derive(Clone, Debug)]
pub struct PatchMesh {
    pub vertices: Vec<PatchVertex>,
    pub indices: Vec<u32>,
    /// Body-frame point the vertex positions are relative to.
    pub origin: DVec3,
    /// Exact bounds of the vertex positions, relative to `origin`.
    pub bounds: OrientedBox,
}

/// Geometry parameters shared by all patches of a layer.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PatchParams {
    /// Body radius in meters.
    pub body_radius: f64,
    /// Height of the layer above the body radius (cloud altitude, or 0).
    pub mean_elevation: f64,
    /// Quads per side.
    pub resolution: u32,
}

impl PatchMesh {
    /// Build the patch of `key`. Level-0 keys produce hemisphere meshes with
    /// doubled latitude resolution.
    pub fn build(key: &TileKey, params: &PatchParams, elevation: Option<&ElevationGrid>) -> Self {
        let ext = TileExtents::of(key);
        let res = params.resolution.max(1);
        let (nlng, nlat) = if key.level == 0 { (res, res * 2) } else { (res, res) };

        let origin = if key.level >= SHIFT_ORIGIN_LEVEL {
            let (lng, lat) = ext.center();
            surface_normal(lng, lat) * (params.body_radius + params.mean_elevation)
        } else {
            DVec3::ZERO
        };

        let mut vertices = Vec::with_capacity(((nlng + 1) * (nlat + 1)) as usize);
        let mut bounds = OrientedBox::inverted();
        for row in 0..=nlat {
            let v = row as f64 / nlat as f64;
            let lat = ext.lat_max - v * (ext.lat_max - ext.lat_min);
            for col in 0..=nlng {
                let u = col as f64 / nlng as f64;
                let lng = ext.lng_min + u * (ext.lng_max - ext.lng_min);
                let height = elevation.map_or(0.0, |g| g.sample(u, v) as f64);
                let normal = surface_normal(lng, lat);
                let radius = params.body_radius + params.mean_elevation + height;
                let position = (normal * radius - origin).as_vec3();
                bounds.add_point(position);
                vertices.push(PatchVertex {
                    position,
                    normal: normal.as_vec3(),
                    uv: [u as f32, v as f32],
                });
            }
        }
        bounds.recompute_oriented_fields(None, None);

        let stride = nlng + 1;
        let mut indices = Vec::with_capacity((nlng * nlat * 6) as usize);
        for row in 0..nlat {
            for col in 0..nlng {
                let a = row * stride + col;
                let b = a + 1;
                let c = a + stride;
                let d = c + 1;
                indices.extend_from_slice(&[a, c, b, b, c, d]);
            }
        }

        Self {
            vertices,
            indices,
            origin,
            bounds,
        }
    }

    /// Number of triangles.
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Bounds of the mesh in the body frame.
    pub fn body_bounds(&self) -> OrientedBox {
        let shift = self.origin.as_vec3();
        OrientedBox::from_min_max(self.bounds.min() + shift, self.bounds.max() + shift)
    }
}

/// Provisional body-frame bounds of a tile before its mesh exists, from a
/// coarse sample of its footprint at the layer radius.
///
/// `excess` pads the box relative to its size.
pub fn provisional_bounds(key: &TileKey, params: &PatchParams, excess: f64) -> OrientedBox {
    const SAMPLES: u32 = 4;
    let ext = TileExtents::of(key);
    let radius = params.body_radius + params.mean_elevation;
    let mut bounds = OrientedBox::inverted();
    for i in 0..=SAMPLES {
        let lat = ext.lat_min + (ext.lat_max - ext.lat_min) * i as f64 / SAMPLES as f64;
        for j in 0..=SAMPLES {
            let lng = ext.lng_min + (ext.lng_max - ext.lng_min) * j as f64 / SAMPLES as f64;
            bounds.add_point((surface_normal(lng, lat) * radius).as_vec3());
        }
    }
    let pad = (bounds.max() - bounds.min()) * (excess as f32) * 0.5;
    OrientedBox::from_min_max(bounds.min() - pad, bounds.max() + pad)
}
