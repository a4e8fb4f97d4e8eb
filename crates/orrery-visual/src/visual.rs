//! A drawable entity and its visibility queries.

use glam::{Mat4, Vec3};
use orrery_config::CullConfig;
use orrery_cull::{
    DepthRange, FrustumParams, HorizonTest, compute_min_max_distance, is_sphere_visible,
    near_plane,
};
use orrery_math::OrientedBox;

use crate::{BoundsCache, MeshList, MeshVisibility};

/// Camera state shared by all entities of a frame.
#[derive(Clone, Copy, Debug)]
pub struct ViewContext {
    /// Camera-relative world to view space (rotation only).
    pub view: Mat4,
    pub projection: Mat4,
    pub frustum: FrustumParams,
    /// Horizon of the body nearest to the camera, if any.
    pub horizon: Option<HorizonTest>,
}

impl ViewContext {
    pub fn new(view: Mat4, projection: &Mat4) -> Self {
        Self {
            view,
            projection: *projection,
            frustum: FrustumParams::from_projection(projection),
            horizon: None,
        }
    }

    #[must_use]
    pub fn with_horizon(mut self, horizon: HorizonTest) -> Self {
        self.horizon = Some(horizon);
        self
    }

    /// Near clip distance once every entity has folded its depth into
    /// `range`. A configured limit takes precedence over the scene content.
    pub fn near_plane(&self, range: &DepthRange, zfar: f32, culling: &CullConfig) -> f32 {
        near_plane(
            culling.near_plane_limit_m,
            zfar,
            range.closest,
            &self.projection,
            culling.reduced_near_plane,
        )
    }
}

/// An entity made of meshes, positioned relative to the camera.
#[derive(Debug, Clone, Default)]
pub struct Visual {
    meshes: MeshList,
    world: Mat4,
    cache: BoundsCache,
}

impl Visual {
    pub fn new(meshes: MeshList) -> Self {
        Self {
            meshes,
            world: Mat4::IDENTITY,
            cache: BoundsCache::new(),
        }
    }

    pub fn meshes(&self) -> &MeshList {
        &self.meshes
    }

    /// Edit the constituents; bounds follow on the next query.
    pub fn meshes_mut(&mut self) -> &mut MeshList {
        &mut self.meshes
    }

    /// Entity frame to camera-relative world.
    pub fn set_world(&mut self, world: Mat4) {
        self.world = world;
    }

    pub fn world(&self) -> &Mat4 {
        &self.world
    }

    /// Local bounds over externally visible constituents.
    pub fn bounds(&mut self) -> &OrientedBox {
        self.cache.get(&self.meshes, MeshVisibility::BOUNDING)
    }

    /// Camera-relative world position of the bounding sphere.
    pub fn bounding_sphere_pos(&mut self) -> Vec3 {
        let center = self.bounds().center();
        self.world.transform_point3(center)
    }

    pub fn bounding_sphere_radius(&mut self) -> f32 {
        self.bounds().radius()
    }

    /// Frustum test of the bounding sphere, then the horizon of the nearest
    /// body when `ctx` carries one.
    pub fn is_visible(&mut self, ctx: &ViewContext) -> bool {
        let pos = self.bounding_sphere_pos();
        let radius = self.bounding_sphere_radius();
        if !is_sphere_visible(pos, radius, &ctx.view, &ctx.frustum) {
            return false;
        }
        match &ctx.horizon {
            Some(horizon) => !horizon.is_hidden(horizon.camera() + pos.as_dvec3(), radius as f64),
            None => true,
        }
    }

    /// Fold the depth extent of every externally visible mesh into `range`.
    ///
    /// Each mesh is tested with its offset (not its animation transform)
    /// composed into the world-view. Returns how many meshes were accepted.
    pub fn min_max_distance(&mut self, ctx: &ViewContext, range: &mut DepthRange) -> usize {
        let world_view = ctx.view * self.world;
        self.meshes
            .visible(MeshVisibility::BOUNDING)
            .filter(|(_, mesh)| {
                let wv = match &mesh.offset {
                    Some(offset) => world_view * *offset,
                    None => world_view,
                };
                compute_min_max_distance(&mesh.bounds, &wv, &ctx.frustum, range).is_ok()
            })
            .count()
    }
}
