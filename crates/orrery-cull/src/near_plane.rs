use glam::Mat4;

/// Near-plane ceiling in meters.
const MAX_NEAR: f32 = 500.0;
/// Ceiling used when the reduced near plane is requested.
const MAX_NEAR_REDUCED: f32 = 25.0;

/// Select the near clip distance for a frame.
///
/// `closest` is the closest approach gathered by
/// [`compute_min_max_distance`](crate::compute_min_max_distance); it is
/// projected onto the view axis at the frustum's corner angle. A positive
/// `znear` overrides it. The result is scaled down by the far-plane factor
/// and capped at 500 m (25 m when `reduced`).
pub fn near_plane(znear: f32, zfar: f32, closest: f32, proj: &Mat4, reduced: bool) -> f32 {
    let b = 1.0 / proj.x_axis.x;
    let a = 1.0 / proj.y_axis.y;
    let corner = (a * a + b * b).sqrt().atan();

    let dmin = if znear > 0.0 {
        znear
    } else {
        closest * corner.cos()
    };

    let fact = 1500.0 / zfar.min(10e3);
    let scale = 1.0 + fact * fact;
    let ceiling = if reduced { MAX_NEAR_REDUCED } else { MAX_NEAR };

    (dmin / scale).min(ceiling / scale)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn proj() -> Mat4 {
        Mat4::perspective_lh(60f32.to_radians(), 1.0, 0.1, 1e6)
    }

    #[test]
    fn test_explicit_near_overrides_closest() {
        // zfar >= 10 km: fact = 0.15, scale = 1.0225
        let n = near_plane(10.0, 1e5, 1e4, &proj(), false);
        assert!((n - 10.0 / 1.0225).abs() < 1e-4, "n = {n}");
    }

    #[test]
    fn test_closest_projected_by_corner_angle() {
        let p = proj();
        let tan = 30f32.to_radians().tan();
        let cos = (2.0 * tan * tan).sqrt().atan().cos();
        let n = near_plane(0.0, 1e5, 100.0, &p, false);
        assert!((n - 100.0 * cos / 1.0225).abs() < 1e-3, "n = {n}");
    }

    #[test]
    fn test_ceiling_and_reduced_ceiling() {
        let p = proj();
        let full = near_plane(0.0, 1e5, 1e6, &p, false);
        let reduced = near_plane(0.0, 1e5, 1e6, &p, true);
        assert!((full - 500.0 / 1.0225).abs() < 1e-3);
        assert!((reduced - 25.0 / 1.0225).abs() < 1e-4);
    }

    #[test]
    fn test_short_far_plane_shrinks_near() {
        let p = proj();
        let wide = near_plane(10.0, 1e5, 0.0, &p, false);
        let short = near_plane(10.0, 1500.0, 0.0, &p, false);
        assert!((short - 5.0).abs() < 1e-5);
        assert!(short < wide);
    }
}
