//! Bounding volumes of composite entities such as vessels.
//!
//! An entity is a list of meshes, each with an optional offset and an
//! optional animation transform, plus exhaust points. Its local bounds are
//! the hull of all externally visible constituents, recomputed lazily when
//! any of them changed since the last query.

mod aggregate;
mod error;
mod mesh_list;
mod visual;

pub use aggregate::{BoundsCache, compute_bounds};
pub use error::VisualError;
pub use mesh_list::{ExhaustSpec, MeshEntry, MeshList, MeshVisibility};
pub use visual::{ViewContext, Visual};
