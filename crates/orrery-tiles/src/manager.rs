//! Per-frame traversal of one layer's tile tree.
//!
//! A render pass holds the tree lock from start to finish. It first walks the
//! tree to cull, refine and request tiles, then walks it again to draw. Loader
//! threads block on the lock meanwhile, so a commit never lands between the
//! two walks.

use std::sync::Arc;
use std::time::Duration;

use glam::{DMat4, Mat4};
use orrery_config::{Config, TileConfig};
use orrery_cull::{FrustumParams, is_visible};
use tracing::{debug, info, trace, warn};

use crate::coverage::TileSample;
use crate::loader::{RequestOutcome, TileLoader};
use crate::tree::{LoadStats, SharedTileTree};
use crate::{
    PatchParams, RenderDevice, TextureCache, TileDraw, TileError, TileHandle, TileLayer,
    TileSource, TileTree,
};

/// Camera state for one render pass.
#[derive(Clone, Copy, Debug)]
pub struct FrameParams {
    /// Body frame to view space, camera at the origin looking down +z.
    pub world_view: DMat4,
    /// Left-handed perspective projection.
    pub projection: Mat4,
    /// Viewport height in pixels.
    pub viewport_height: f32,
}

/// What one render pass did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RenderStats {
    pub visited: u32,
    pub culled: u32,
    pub drawn: u32,
    /// Drawn without a texture.
    pub untextured: u32,
    pub subdivided: u32,
    pub collapsed: u32,
    pub requested: u32,
    /// Requests refused by a full queue; retried next frame.
    pub deferred: u32,
}

/// Per-pass values derived once from [`FrameParams`].
struct FrameState {
    world_view: DMat4,
    world_view_f32: Mat4,
    frustum: FrustumParams,
    half_height: f32,
}

impl FrameState {
    fn new(frame: &FrameParams) -> Self {
        Self {
            world_view: frame.world_view,
            world_view_f32: frame.world_view.as_mat4(),
            frustum: FrustumParams::from_projection(&frame.projection),
            half_height: frame.viewport_height * 0.5,
        }
    }

    /// Approximate on-screen radius in pixels of a bounding sphere.
    fn projected_radius(&self, center: glam::Vec3, radius: f32) -> f32 {
        let dist = self.world_view_f32.transform_point3(center).length();
        if dist <= radius {
            return f32::INFINITY;
        }
        radius / (dist * self.frustum.tan_vert) * self.half_height
    }
}

/// Streams and draws one layer (clouds or surface) of one body.
pub struct TileManager {
    layer: TileLayer,
    body: String,
    tree: SharedTileTree,
    cache: Arc<TextureCache>,
    loader: TileLoader,
    threshold_px: f32,
    max_level: u8,
    show_bounds: bool,
    rotation: f64,
}

impl TileManager {
    /// Build the manager and start its loader threads.
    ///
    /// Cloud tiles sit `cloud_altitude_m` above `body_radius`; surface tiles
    /// at the radius itself.
    pub fn new(
        layer: TileLayer,
        body: impl Into<String>,
        body_radius: f64,
        config: &Config,
        source: Arc<dyn TileSource>,
        cache: Arc<TextureCache>,
    ) -> Result<Self, TileError> {
        let tiles: &TileConfig = &config.tiles;
        tiles.validate()?;
        let body = body.into();

        let params = PatchParams {
            body_radius,
            mean_elevation: match layer {
                TileLayer::Cloud => tiles.cloud_altitude_m,
                TileLayer::Surface => 0.0,
            },
            resolution: tiles.patch_resolution,
        };
        let tree = SharedTileTree::new(TileTree::new(
            body.as_str(),
            layer,
            params,
            tiles.tile_bb_excess,
            Arc::clone(&cache),
        ));
        let loader = TileLoader::spawn(
            tree.clone(),
            source,
            Arc::clone(&cache),
            tiles.loader_threads,
            tiles.queue_capacity,
        )?;
        info!(
            %layer,
            body = %body,
            max_level = tiles.max_level,
            threads = loader.threads(),
            "tile manager created"
        );

        Ok(Self {
            layer,
            body,
            tree,
            cache,
            loader,
            threshold_px: tiles.subdivision_threshold_px as f32,
            max_level: tiles.max_level,
            show_bounds: config.debug.show_tile_bounds,
            rotation: 0.0,
        })
    }

    pub fn layer(&self) -> TileLayer {
        self.layer
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    /// The shared tree, for inspection.
    pub fn tree(&self) -> &SharedTileTree {
        &self.tree
    }

    pub fn cache(&self) -> &Arc<TextureCache> {
        &self.cache
    }

    /// Longitude offset of the layer against the body, in radians.
    pub fn set_rotation(&mut self, rotation: f64) {
        self.rotation = rotation;
    }

    pub fn rotation(&self) -> f64 {
        self.rotation
    }

    /// Load counters including requests still in flight.
    pub fn stats(&self) -> LoadStats {
        let mut stats = self.tree.lock().stats();
        stats.in_flight = self.loader.in_flight();
        stats
    }

    /// Block until the loader has drained its queue or `timeout` passes.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        self.loader.wait_idle(timeout)
    }

    /// Tiles overlapping a latitude/longitude rectangle, with the layer
    /// rotation applied.
    pub fn coverage(
        &self,
        lat_min: f64,
        lat_max: f64,
        lng_min: f64,
        lng_max: f64,
        max_level: u8,
    ) -> Vec<TileHandle> {
        self.tree
            .lock()
            .coverage(lat_min, lat_max, lng_min, lng_max, max_level, self.rotation)
    }

    /// Layer height at a body-frame longitude/latitude.
    pub fn sample(&self, lng: f64, lat: f64) -> Option<TileSample> {
        self.tree.lock().sample(lng, lat, self.rotation)
    }

    /// Clip range for drawing the cloud shell from `camera_distance`.
    pub fn depth_range(&self, camera_distance: f64) -> (f64, f64) {
        let tree = self.tree.lock();
        let params = tree.params();
        cloud_depth_range(camera_distance, params.body_radius, params.mean_elevation)
    }

    /// Update the tree for this frame and draw it.
    ///
    /// Once a fatal error has been recorded, every later call returns it
    /// without touching the device.
    pub fn render(
        &self,
        frame: &FrameParams,
        device: &mut dyn RenderDevice,
    ) -> Result<RenderStats, TileError> {
        let mut tree = self.tree.lock();
        if let Some(err) = tree.fatal() {
            return Err(err.clone());
        }

        let state = FrameState::new(frame);
        let mut stats = RenderStats::default();
        for root in tree.roots() {
            self.process_node(&mut tree, root, &state, &mut stats)?;
        }
        for root in tree.roots() {
            self.render_node(&mut tree, root, &state, device, &mut stats)?;
        }
        trace!(layer = %self.layer, ?stats, "tile pass complete");
        Ok(stats)
    }

    fn process_node(
        &self,
        tree: &mut TileTree,
        handle: TileHandle,
        frame: &FrameState,
        stats: &mut RenderStats,
    ) -> Result<(), TileError> {
        let Some(node) = tree.node(handle) else {
            return Ok(());
        };
        let key = node.key();
        let bounds = *node.bounds();
        let had_children = !node.is_leaf();
        let settled = node.state().is_settled();
        stats.visited += 1;

        if !is_visible(&bounds, &frame.world_view_f32, &frame.frustum) {
            stats.culled += 1;
            if let Some(node) = tree.node_mut(handle) {
                node.visible = false;
                node.frame_leaf = true;
            }
            if had_children && tree.can_collapse(handle) {
                tree.collapse(handle);
                stats.collapsed += 1;
            }
            return Ok(());
        }

        self.request(tree, handle, stats)?;

        // Children load only under a settled parent so that they can fall
        // back to its texture.
        let refine = settled
            && key.level < self.max_level
            && frame.projected_radius(bounds.center(), bounds.radius()) > self.threshold_px;
        if refine {
            let children = tree.subdivide(handle);
            if !had_children {
                stats.subdivided += 1;
            }
            if let Some(node) = tree.node_mut(handle) {
                node.visible = true;
                node.frame_leaf = false;
            }
            for child in children {
                self.process_node(tree, child, frame, stats)?;
            }
        } else {
            if had_children && tree.can_collapse(handle) {
                tree.collapse(handle);
                stats.collapsed += 1;
            }
            if let Some(node) = tree.node_mut(handle) {
                node.visible = true;
                node.frame_leaf = true;
            }
        }
        Ok(())
    }

    /// Hand an `Unloaded` node to the loader.
    fn request(
        &self,
        tree: &mut TileTree,
        handle: TileHandle,
        stats: &mut RenderStats,
    ) -> Result<(), TileError> {
        let Some(key) = tree.node(handle).map(|n| n.key()) else {
            return Ok(());
        };
        if !tree.begin_prefetch(handle) {
            return Ok(());
        }
        match self.loader.request(handle, key) {
            Ok(RequestOutcome::Queued) => {
                stats.requested += 1;
                Ok(())
            }
            Ok(RequestOutcome::Full) => {
                tree.cancel_prefetch(handle);
                stats.deferred += 1;
                Ok(())
            }
            Err(err) => {
                tree.cancel_prefetch(handle);
                Err(err)
            }
        }
    }

    fn render_node(
        &self,
        tree: &mut TileTree,
        handle: TileHandle,
        frame: &FrameState,
        device: &mut dyn RenderDevice,
        stats: &mut RenderStats,
    ) -> Result<(), TileError> {
        let Some(node) = tree.node(handle) else {
            return Ok(());
        };
        if !node.visible {
            return Ok(());
        }

        // Children replace the parent only once every visible one can draw.
        if !node.frame_leaf
            && let Some(children) = node.children()
        {
            let ready = children.iter().all(|&c| {
                tree.node(c)
                    .is_some_and(|n| !n.visible || n.state().is_settled())
            });
            if ready {
                for child in children {
                    self.render_node(tree, child, frame, device, stats)?;
                }
                return Ok(());
            }
        }

        if !node.state().is_settled() {
            return Ok(());
        }
        let Some(mesh) = node.mesh().cloned() else {
            return Ok(());
        };
        let key = node.key();
        let bounds = *node.bounds();
        let (texture, texrange) = node.texture().binding();
        let world_view = (frame.world_view * DMat4::from_translation(mesh.origin)).as_mat4();
        let draw = TileDraw {
            layer: self.layer,
            key,
            mesh: &mesh,
            texture,
            texrange,
            world_view,
        };

        let mut result = device.draw_tile(&draw);
        if texture.is_none() {
            stats.untextured += 1;
        }
        if result.is_ok() && self.show_bounds {
            result = device.draw_bounds(&bounds, &frame.world_view_f32);
        }
        match result {
            Ok(()) => {
                stats.drawn += 1;
                Ok(())
            }
            Err(err) => match err.fatal() {
                Some(fatal) => {
                    tree.set_fatal(fatal.clone());
                    Err(fatal)
                }
                None => {
                    warn!(%key, layer = %self.layer, error = %err, "tile draw failed");
                    Ok(())
                }
            },
        }
    }
}

impl Drop for TileManager {
    fn drop(&mut self) {
        debug!(layer = %self.layer, body = %self.body, "tile manager dropped");
    }
}

/// Near and far clip distances that enclose the visible part of a cloud
/// shell of `cloud_altitude` above a body of `body_radius`.
///
/// From outside the shell the far plane is the tangent distance to the
/// shell; from inside it reaches the far side of the shell past the body's
/// horizon. The near plane never drops below 2 m or 1e-4 of the far plane.
pub fn cloud_depth_range(camera_distance: f64, body_radius: f64, cloud_altitude: f64) -> (f64, f64) {
    let d = camera_distance;
    let r = body_radius;
    let rc = body_radius + cloud_altitude;
    let (zmin, zmax) = if d > rc {
        (d - rc, (d * d - rc * rc).sqrt())
    } else {
        let horizon = (d * d - r * r).max(0.0).sqrt();
        (rc - d, horizon + (rc * rc - r * r).sqrt())
    };
    (zmin.min(zmax * 1e-4).max(2.0), zmax)
}
