//! Planetary tile streaming for cloud and surface layers.
//!
//! Each layer of a body is a quadtree of latitude/longitude tiles: two
//! hemisphere roots at level 0, four children per node below. The
//! [`TileManager`] walks the tree every frame, culling against the view
//! frustum, refining where tiles project large on screen, and asking a pool
//! of loader threads for data. Tiles without their own texture borrow a
//! window of the nearest textured ancestor.

mod address;
mod arena;
pub mod coverage;
mod device;
mod error;
pub mod extents;
mod loader;
mod manager;
pub mod mesh;
mod node;
mod source;
mod texture;
mod tree;


pub use address::{TileKey, TileLayer};
pub use arena::{TileArena, TileHandle};
pub use coverage::TileSample;
pub use device::{RenderDevice, TileDraw};
pub use error::{DeviceError, TileError, TileSourceError};
pub use extents::{TexRange, TileExtents};
pub use loader::{RequestOutcome, TileLoader};
pub use manager::{FrameParams, RenderStats, TileManager, cloud_depth_range};
pub use mesh::{PatchMesh, PatchParams, PatchVertex};
pub use node::{LoadState, TileNode, TileTexture};
pub use source::{ElevationGrid, FsTileSource, TileSource};
pub use texture::{Texture, TextureCache};
pub use tree::{LoadStats, LoadedTile, SharedTileTree, TileTree};
