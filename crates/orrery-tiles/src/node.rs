//! Quadtree nodes and their load state.

use std::sync::Arc;

use orrery_math::OrientedBox;

use crate::{ElevationGrid, PatchMesh, TexRange, Texture, TileHandle, TileKey};

/// Lifecycle of a tile's data.
///
/// `Unloaded -> Prefetching -> Ready | Invalid`. A node is never freed while
/// `Prefetching`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LoadState {
    /// No data requested yet.
    Unloaded,
    /// A loader thread owns the request.
    Prefetching,
    /// Mesh present, textured with its own or an ancestor's texture.
    Ready,
    /// Mesh present, no texture available anywhere up the tree.
    Invalid,
}

impl LoadState {
    /// True once a load has completed, successfully or not.
    pub fn is_settled(self) -> bool {
        matches!(self, LoadState::Ready | LoadState::Invalid)
    }
}

/// Texture a tile draws with.
#[derive(Clone, Debug, Default)]
pub enum TileTexture {
    /// Nothing to bind.
    #[default]
    None,
    /// The tile's own texture.
    Own(Arc<Texture>),
    /// A sub-rectangle of an ancestor's texture.
    Inherited {
        texture: Arc<Texture>,
        from: TileKey,
        range: TexRange,
    },
}

impl TileTexture {
    /// Texture and window to bind for drawing.
    pub fn binding(&self) -> (Option<&Texture>, TexRange) {
        match self {
            TileTexture::None => (None, TexRange::FULL),
            TileTexture::Own(t) => (Some(t.as_ref()), TexRange::FULL),
            TileTexture::Inherited { texture, range, .. } => (Some(texture.as_ref()), *range),
        }
    }

    pub fn is_own(&self) -> bool {
        matches!(self, TileTexture::Own(_))
    }
}

/// One tile of the quadtree.
#[derive(Debug)]
pub struct TileNode {
    pub(crate) key: TileKey,
    pub(crate) parent: Option<TileHandle>,
    pub(crate) children: Option<[TileHandle; 4]>,
    pub(crate) bounds: OrientedBox,
    pub(crate) mesh: Option<Arc<PatchMesh>>,
    pub(crate) texture: TileTexture,
    pub(crate) elevation: Option<ElevationGrid>,
    pub(crate) state: LoadState,
    /// Passed the frustum test in the current frame.
    pub(crate) visible: bool,
    /// Drawn as itself rather than through its children in the current frame.
    pub(crate) frame_leaf: bool,
}

impl TileNode {
    pub(crate) fn new(key: TileKey, parent: Option<TileHandle>, bounds: OrientedBox) -> Self {
        Self {
            key,
            parent,
            children: None,
            bounds,
            mesh: None,
            texture: TileTexture::None,
            elevation: None,
            state: LoadState::Unloaded,
            visible: false,
            frame_leaf: false,
        }
    }

    pub fn key(&self) -> TileKey {
        self.key
    }

    pub fn parent(&self) -> Option<TileHandle> {
        self.parent
    }

    /// All four children, or `None` for a leaf.
    pub fn children(&self) -> Option<[TileHandle; 4]> {
        self.children
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_none()
    }

    /// Body-frame bounds; provisional until the mesh is committed.
    pub fn bounds(&self) -> &OrientedBox {
        &self.bounds
    }

    pub fn mesh(&self) -> Option<&Arc<PatchMesh>> {
        self.mesh.as_ref()
    }

    pub fn texture(&self) -> &TileTexture {
        &self.texture
    }

    pub fn elevation(&self) -> Option<&ElevationGrid> {
        self.elevation.as_ref()
    }

    pub fn state(&self) -> LoadState {
        self.state
    }
}
