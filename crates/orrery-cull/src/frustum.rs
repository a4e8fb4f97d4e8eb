//! Per-frame linear field-of-view terms derived from the projection matrix.

use glam::Mat4;

/// Boxes whose angular radius falls below `tan(half vertical fov) * ANGULAR_TOLERANCE`
/// are treated as sub-pixel and rejected.
pub const ANGULAR_TOLERANCE: f32 = 0.0015;

/// The four scalars every visibility test of a frame shares.
///
/// Only the `(0,0)` and `(1,1)` diagonal terms of a perspective projection
/// are read, so any left-handed perspective matrix works regardless of its
/// depth mapping.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrustumParams {
    /// `1 / cos(half vertical fov)`: radius padding of the vertical test.
    pub sec_vert: f32,
    /// `sec_vert` scaled by the aspect ratio: radius padding of the horizontal test.
    pub sec_horiz: f32,
    /// `tan(half vertical fov)`.
    pub tan_vert: f32,
    /// `tan(half vertical fov) * aspect`, the horizontal slope.
    pub tan_horiz: f32,
}

impl FrustumParams {
    /// Derive the terms from a perspective projection matrix.
    pub fn from_projection(proj: &Mat4) -> Self {
        let p11 = proj.x_axis.x;
        let p22 = proj.y_axis.y;
        let a = 1.0 / p22;
        let s = p11 / p22;
        let l = 1.0 / a.atan().cos();
        Self {
            sec_vert: l,
            sec_horiz: l / s,
            tan_vert: a,
            tan_horiz: a / s,
        }
    }

    /// Minimum angular radius a box must have to be considered.
    pub fn tolerance(&self) -> f32 {
        self.tan_vert * ANGULAR_TOLERANCE
    }

    /// Sine of the half-angle of the frustum's corner diagonal. View-space
    /// axes steeper than this are candidates for the separating-axis check.
    pub fn diagonal_sine(&self) -> f32 {
        (self.tan_vert * self.tan_vert + self.tan_horiz * self.tan_horiz)
            .sqrt()
            .atan()
            .sin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sixty_degree_square_projection() {
        let fov = 60f32.to_radians();
        let proj = Mat4::perspective_lh(fov, 1.0, 0.1, 1000.0);
        let f = FrustumParams::from_projection(&proj);
        let tan = (fov * 0.5).tan();
        assert!((f.tan_vert - tan).abs() < 1e-6);
        assert!((f.tan_horiz - tan).abs() < 1e-6);
        assert!((f.sec_vert - 1.0 / (fov * 0.5).cos()).abs() < 1e-5);
        assert!((f.tolerance() - tan * 0.0015).abs() < 1e-9);
    }

    #[test]
    fn test_aspect_widens_horizontal_terms() {
        let proj = Mat4::perspective_lh(50f32.to_radians(), 16.0 / 9.0, 1.0, 1e6);
        let f = FrustumParams::from_projection(&proj);
        assert!((f.tan_horiz / f.tan_vert - 16.0 / 9.0).abs() < 1e-5);
        assert!((f.sec_horiz / f.sec_vert - 16.0 / 9.0).abs() < 1e-5);
    }

    #[test]
    fn test_diagonal_sine_in_unit_range() {
        let proj = Mat4::perspective_lh(90f32.to_radians(), 1.0, 1.0, 10.0);
        let f = FrustumParams::from_projection(&proj);
        // Diagonal half-angle of a 90 degree square frustum is atan(sqrt 2).
        let expected = 2f32.sqrt().atan().sin();
        assert!((f.diagonal_sine() - expected).abs() < 1e-6);
        assert!(f.diagonal_sine() < 1.0);
    }
}
