//! Horizon occlusion against the body nearest to the camera.
//!
//! Positions are body-centered and kept in f64: object and camera distances
//! are planetary, while object radii can be a few meters.

use glam::DVec3;

/// Horizon state for one frame and one occluding body.
#[derive(Clone, Copy, Debug)]
pub struct HorizonTest {
    body_radius: f64,
    camera: DVec3,
    camera_distance: f64,
    /// Angle at the body center between the camera and the horizon tangent point.
    horizon_angle: Option<f64>,
}

impl HorizonTest {
    /// `camera` is the camera position relative to the body center.
    pub fn new(body_radius: f64, camera: DVec3) -> Self {
        let camera_distance = camera.length();
        let horizon_angle = (camera_distance > body_radius && body_radius > 0.0)
            .then(|| (body_radius / camera_distance).acos());
        Self {
            body_radius,
            camera,
            camera_distance,
            horizon_angle,
        }
    }

    /// Camera position relative to the body center.
    pub fn camera(&self) -> DVec3 {
        self.camera
    }

    /// True when a sphere at `center` (body-relative) with `radius` lies
    /// entirely below the horizon.
    ///
    /// The sphere is measured against the plane tangent to the body at the
    /// horizon point on the great circle through the camera and the sphere.
    /// A camera inside the body never hides anything.
    pub fn is_hidden(&self, center: DVec3, radius: f64) -> bool {
        let Some(alfa) = self.horizon_angle else {
            return false;
        };
        let trad = center.length();
        if trad <= f64::EPSILON {
            return false;
        }
        let cos_beta = (center.dot(self.camera) / (self.camera_distance * trad)).clamp(-1.0, 1.0);
        let beta = cos_beta.acos();
        if beta < alfa {
            return false;
        }
        let depth = self.body_radius - trad * (beta - alfa).cos();
        depth > radius
    }

    /// Distance from the camera to its horizon, zero inside the body.
    pub fn horizon_distance(&self) -> f64 {
        if self.horizon_angle.is_none() {
            return 0.0;
        }
        (self.camera_distance * self.camera_distance - self.body_radius * self.body_radius).sqrt()
    }
}
