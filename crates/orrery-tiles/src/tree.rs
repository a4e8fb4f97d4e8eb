//! The per-layer tile quadtree and its shared lock.
//!
//! Nodes live in a [`TileArena`] and refer to each other by [`TileHandle`].
//! A node either has no children or all four; [`TileTree::subdivide`] and
//! [`TileTree::collapse`] are the only operations that change the shape.

use std::sync::{Arc, Mutex, MutexGuard};

use orrery_math::OrientedBox;
use tracing::{debug, error, trace, warn};

use crate::mesh::provisional_bounds;
use crate::{
    ElevationGrid, LoadState, PatchMesh, PatchParams, Texture, TextureCache, TileArena,
    TileError, TileExtents, TileHandle, TileKey, TileLayer, TileNode, TileSourceError,
    TileTexture,
};

/// Counters of completed loads.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LoadStats {
    /// Requests handed to the loader.
    pub requested: u64,
    /// Loads committed to the tree.
    pub committed: u64,
    /// Tiles drawing with an ancestor's texture.
    pub fallbacks: u64,
    /// Tiles with no texture at all.
    pub untextured: u64,
    /// Requests queued or running right now.
    pub in_flight: u64,
}

/// What a loader thread produced for one tile.
#[derive(Debug)]
pub struct LoadedTile {
    pub mesh: PatchMesh,
    pub texture: Result<Arc<Texture>, TileSourceError>,
    pub elevation: Option<ElevationGrid>,
}

/// Quadtree of one tile layer of one body.
pub struct TileTree {
    body: Arc<str>,
    layer: TileLayer,
    params: PatchParams,
    bb_excess: f64,
    arena: TileArena<TileNode>,
    roots: [TileHandle; 2],
    cache: Arc<TextureCache>,
    fatal: Option<TileError>,
    stats: LoadStats,
}

impl TileTree {
    /// Create the two hemisphere roots.
    ///
    /// `body` names the planet the layer wraps; textures are cached under it.
    pub fn new(
        body: impl Into<Arc<str>>,
        layer: TileLayer,
        params: PatchParams,
        bb_excess: f64,
        cache: Arc<TextureCache>,
    ) -> Self {
        let mut arena = TileArena::new();
        let roots = TileKey::roots().map(|key| {
            let bounds = provisional_bounds(&key, &params, bb_excess);
            arena.insert(TileNode::new(key, None, bounds))
        });
        Self {
            body: body.into(),
            layer,
            params,
            bb_excess,
            arena,
            roots,
            cache,
            fatal: None,
            stats: LoadStats::default(),
        }
    }

    pub fn body(&self) -> &Arc<str> {
        &self.body
    }

    pub fn layer(&self) -> TileLayer {
        self.layer
    }

    pub fn params(&self) -> &PatchParams {
        &self.params
    }

    /// Western and eastern hemisphere roots.
    pub fn roots(&self) -> [TileHandle; 2] {
        self.roots
    }

    pub fn node(&self, handle: TileHandle) -> Option<&TileNode> {
        self.arena.get(handle)
    }

    pub(crate) fn node_mut(&mut self, handle: TileHandle) -> Option<&mut TileNode> {
        self.arena.get_mut(handle)
    }

    /// Number of live nodes.
    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    /// Iterate over all live nodes.
    pub fn iter(&self) -> impl Iterator<Item = (TileHandle, &TileNode)> {
        self.arena.iter()
    }

    /// Load counters; `in_flight` is filled in by the manager.
    pub fn stats(&self) -> LoadStats {
        self.stats
    }

    /// The first fatal error reported by a load or a draw.
    pub fn fatal(&self) -> Option<&TileError> {
        self.fatal.as_ref()
    }

    pub(crate) fn set_fatal(&mut self, err: TileError) {
        if self.fatal.is_none() {
            error!(layer = %self.layer, error = %err, "tile manager stopped");
            self.fatal = Some(err);
        }
    }

    /// Handle of the node with `key`, if it exists.
    pub fn find(&self, key: &TileKey) -> Option<TileHandle> {
        let mut handle = self
            .roots
            .into_iter()
            .find(|&h| self.node(h).is_some_and(|n| n.key.contains(key)))?;
        loop {
            let node = self.node(handle)?;
            if node.key == *key {
                return Some(handle);
            }
            handle = node
                .children?
                .into_iter()
                .find(|&c| self.node(c).is_some_and(|n| n.key.contains(key)))?;
        }
    }

    /// Make sure `handle` has all four children and return them.
    ///
    /// New children start `Unloaded` with provisional bounds; the bounds of
    /// `handle` and its ancestors grow to cover them.
    pub fn subdivide(&mut self, handle: TileHandle) -> [TileHandle; 4] {
        let Some(node) = self.node(handle) else {
            error!(%handle, "subdivide on a freed tile");
            panic!("subdivide on freed tile {handle}");
        };
        if let Some(children) = node.children {
            return children;
        }
        let key = node.key;
        let children = key.children().map(|child| {
            let bounds = provisional_bounds(&child, &self.params, self.bb_excess);
            self.arena.insert(TileNode::new(child, Some(handle), bounds))
        });

        let mut union = OrientedBox::inverted();
        for &c in &children {
            if let Some(n) = self.node(c) {
                union.add_box(&n.bounds, None, false);
            }
        }
        if let Some(node) = self.node_mut(handle) {
            node.children = Some(children);
        }
        self.grow_bounds(handle, &union);
        trace!(%key, "subdivided");
        children
    }

    /// True if no strict descendant of `handle` is `Prefetching`.
    pub fn can_collapse(&self, handle: TileHandle) -> bool {
        let Some(children) = self.node(handle).and_then(|n| n.children) else {
            return true;
        };
        children.into_iter().all(|c| {
            self.node(c)
                .is_some_and(|n| n.state != LoadState::Prefetching && self.can_collapse(c))
        })
    }

    /// Free every descendant of `handle`, leaving it a leaf.
    ///
    /// # Panics
    ///
    /// Panics if a descendant is `Prefetching`; check
    /// [`can_collapse`](Self::can_collapse) first.
    pub fn collapse(&mut self, handle: TileHandle) {
        let Some(children) = self.node_mut(handle).and_then(|n| n.children.take()) else {
            return;
        };
        for child in children {
            self.free_subtree(child);
        }
    }

    fn free_subtree(&mut self, handle: TileHandle) {
        let Some(node) = self.arena.remove(handle) else {
            error!(%handle, "freeing a tile that is already gone");
            panic!("tile tree torn: {handle} freed twice");
        };
        if node.state == LoadState::Prefetching {
            error!(key = %node.key, %handle, "freeing a tile while its load is in flight");
            panic!("freed tile {} while Prefetching", node.key);
        }
        if node.texture.is_own() {
            self.cache.release(&self.body, self.layer, &node.key);
        }
        for child in node.children.into_iter().flatten() {
            self.free_subtree(child);
        }
    }

    /// `Unloaded -> Prefetching`. Returns false if the node was not `Unloaded`.
    pub(crate) fn begin_prefetch(&mut self, handle: TileHandle) -> bool {
        match self.node_mut(handle) {
            Some(node) if node.state == LoadState::Unloaded => {
                node.state = LoadState::Prefetching;
                self.stats.requested += 1;
                true
            }
            _ => false,
        }
    }

    /// Undo [`begin_prefetch`](Self::begin_prefetch) for a request the
    /// loader never accepted.
    pub(crate) fn cancel_prefetch(&mut self, handle: TileHandle) {
        if let Some(node) = self.node_mut(handle)
            && node.state == LoadState::Prefetching
        {
            node.state = LoadState::Unloaded;
            self.stats.requested -= 1;
        }
    }

    /// Install a completed load. Called by a loader thread holding the lock.
    ///
    /// A missing or undecodable texture falls back to the nearest textured
    /// ancestor; without one the tile becomes `Invalid` and draws untextured.
    /// Fatal source errors stop the manager.
    ///
    /// # Panics
    ///
    /// Panics if `handle` is not a live `Prefetching` node.
    pub fn commit(&mut self, handle: TileHandle, loaded: LoadedTile) {
        let (key, state) = match self.node(handle) {
            Some(node) => (node.key, node.state),
            None => {
                error!(%handle, "load committed to a freed tile");
                panic!("commit to freed tile {handle}");
            }
        };
        if state != LoadState::Prefetching {
            error!(%key, ?state, "load committed to a tile that did not request it");
            panic!("commit to {key} in state {state:?}");
        }

        let (texture, state) = match loaded.texture {
            Ok(tex) => (TileTexture::Own(tex), LoadState::Ready),
            Err(err) => {
                if let Some(fatal) = err.fatal() {
                    self.set_fatal(fatal);
                    (TileTexture::None, LoadState::Invalid)
                } else {
                    warn!(%key, layer = %self.layer, error = %err, "tile texture unavailable");
                    match self.ancestor_texture(handle) {
                        Some(inherited) => {
                            self.stats.fallbacks += 1;
                            (inherited, LoadState::Ready)
                        }
                        None => {
                            self.stats.untextured += 1;
                            (TileTexture::None, LoadState::Invalid)
                        }
                    }
                }
            }
        };

        let mut bounds = loaded.mesh.body_bounds();
        let children = self.node(handle).and_then(|n| n.children);
        for child in children.into_iter().flatten() {
            if let Some(n) = self.node(child) {
                bounds.add_box(&n.bounds, None, false);
            }
        }
        bounds.recompute_oriented_fields(None, None);

        if let Some(node) = self.node_mut(handle) {
            node.mesh = Some(Arc::new(loaded.mesh));
            node.texture = texture;
            node.elevation = loaded.elevation;
            node.state = state;
            node.bounds = bounds;
        }
        self.stats.committed += 1;
        if let Some(parent) = self.node(handle).and_then(|n| n.parent) {
            self.grow_bounds(parent, &bounds);
        }
        debug!(%key, ?state, "tile committed");
    }

    /// The nearest ancestor texture of `handle`, windowed to its footprint.
    fn ancestor_texture(&self, handle: TileHandle) -> Option<TileTexture> {
        let own = TileExtents::of(&self.node(handle)?.key);
        let mut cursor = self.node(handle)?.parent;
        while let Some(h) = cursor {
            let node = self.node(h)?;
            let source = match &node.texture {
                TileTexture::Own(tex) => Some((Arc::clone(tex), node.key)),
                TileTexture::Inherited { texture, from, .. } => Some((Arc::clone(texture), *from)),
                TileTexture::None => None,
            };
            if let Some((texture, from)) = source {
                let range = TileExtents::of(&from).sub_range(&own);
                return Some(TileTexture::Inherited {
                    texture,
                    from,
                    range,
                });
            }
            cursor = node.parent;
        }
        None
    }

    /// Grow the bounds of `handle` and every ancestor to include `extra`.
    fn grow_bounds(&mut self, handle: TileHandle, extra: &OrientedBox) {
        let mut cursor = Some(handle);
        while let Some(h) = cursor {
            let Some(node) = self.node_mut(h) else {
                break;
            };
            let before = (node.bounds.min(), node.bounds.max());
            node.bounds.add_box(extra, None, false);
            if (node.bounds.min(), node.bounds.max()) == before {
                break;
            }
            node.bounds.recompute_oriented_fields(None, None);
            cursor = node.parent;
        }
    }

    /// Check the structural invariants: children all-or-none, parent links
    /// consistent, keys matching the quadtree addressing, and every node's
    /// bounds covering its children.
    pub fn verify(&self) -> Result<(), String> {
        for (handle, node) in self.arena.iter() {
            if let Some(parent) = node.parent {
                let Some(p) = self.node(parent) else {
                    return Err(format!("{} has a freed parent", node.key));
                };
                if !p.children.is_some_and(|c| c.contains(&handle)) {
                    return Err(format!("{} is not listed by its parent", node.key));
                }
            } else if !self.roots.contains(&handle) {
                return Err(format!("{} is orphaned", node.key));
            }
            let Some(children) = node.children else {
                continue;
            };
            for (child, expected) in children.into_iter().zip(node.key.children()) {
                let Some(c) = self.node(child) else {
                    return Err(format!("{} has a partial child set", node.key));
                };
                if c.key != expected {
                    return Err(format!("{} has child {} at slot of {expected}", node.key, c.key));
                }
                let covered = c.bounds.min().cmpge(node.bounds.min()).all()
                    && c.bounds.max().cmple(node.bounds.max()).all();
                if !covered {
                    return Err(format!("{} bounds do not cover child {}", node.key, c.key));
                }
            }
        }
        Ok(())
    }
}

impl Drop for TileTree {
    fn drop(&mut self) {
        let mut released = 0usize;
        for (_, node) in self.arena.iter() {
            if node.texture.is_own() {
                self.cache.release(&self.body, self.layer, &node.key);
                released += 1;
            }
        }
        debug!(body = %self.body, layer = %self.layer, released, "tile tree released its textures");
    }
}

/// The tree behind the lock shared by the render traversal and the loader.
///
/// The render thread holds the guard for a whole update-and-render pass; a
/// loader thread holds it while committing one tile.
#[derive(Clone)]
pub struct SharedTileTree(Arc<Mutex<TileTree>>);

impl SharedTileTree {
    pub fn new(tree: TileTree) -> Self {
        Self(Arc::new(Mutex::new(tree)))
    }

    /// Acquire the tree.
    ///
    /// # Panics
    ///
    /// Panics if a thread panicked while holding the lock; the tree may be
    /// torn and is not used again.
    pub fn lock(&self) -> MutexGuard<'_, TileTree> {
        match self.0.lock() {
            Ok(guard) => guard,
            Err(_) => {
                error!("tile tree lock poisoned");
                panic!("tile tree lock poisoned by a panicking thread");
            }
        }
    }
}
