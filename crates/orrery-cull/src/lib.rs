//! Frustum visibility for oriented boxes and bounding spheres.
//!
//! All tests work in the left-handed view space of the host renderer: the
//! camera sits at the origin looking down +z, and geometry is expressed
//! camera-relative so that planetary distances keep their precision.

mod frustum;
mod horizon;
mod near_plane;
mod pick;
mod visibility;

pub use frustum::{ANGULAR_TOLERANCE, FrustumParams};
pub use horizon::HorizonTest;
pub use near_plane::near_plane;
pub use pick::world_pick_ray;
pub use visibility::{
    DepthRange, Rejection, compute_min_max_distance, is_sphere_visible, is_visible, status_code,
};
