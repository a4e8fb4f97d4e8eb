//! Sphere and oriented-box frustum tests with depth extrema.
//!
//! The tests share one rejection cascade. The sphere stage rejects boxes
//! behind the camera, below the angular tolerance, or outside the vertical
//! or horizontal side planes (padded by the radius). The oriented stage then
//! tries the box's own three view-space axes as separating axes.
//!
//! The oriented stage never considers the frustum's edge/box-edge cross
//! products. It can therefore accept a box that is just outside a frustum
//! corner, but it never rejects a box that intersects the frustum.

use glam::{Mat4, Vec3};
use orrery_math::OrientedBox;

use crate::FrustumParams;

/// Why a box or sphere failed the cascade. The numeric codes are stable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Rejection {
    /// Entirely behind the camera.
    Behind,
    /// Angular size below the tolerance.
    TooSmall,
    /// Outside the top or bottom plane.
    Vertical,
    /// Outside the left or right plane.
    Horizontal,
    /// Separated along the box's X axis.
    SeparatedX,
    /// Separated along the box's Y axis.
    SeparatedY,
    /// Separated along the box's Z axis.
    SeparatedZ,
}

impl Rejection {
    /// Diagnostic status code in `-1..=-7`.
    pub fn code(self) -> i32 {
        match self {
            Rejection::Behind => -1,
            Rejection::TooSmall => -2,
            Rejection::Vertical => -3,
            Rejection::Horizontal => -4,
            Rejection::SeparatedX => -5,
            Rejection::SeparatedY => -6,
            Rejection::SeparatedZ => -7,
        }
    }

    fn separated(axis: usize) -> Self {
        match axis {
            0 => Rejection::SeparatedX,
            1 => Rejection::SeparatedY,
            _ => Rejection::SeparatedZ,
        }
    }
}

/// Status code of a cascade result: 0 on accept, the rejection code otherwise.
pub fn status_code(result: Result<(), Rejection>) -> i32 {
    match result {
        Ok(()) => 0,
        Err(r) => r.code(),
    }
}

/// Running view-space depth extrema and closest approach, accumulated over
/// all accepted boxes of a frame. Drives near/far plane placement.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DepthRange {
    /// Smallest corner depth seen so far.
    pub z_min: f32,
    /// Largest corner depth seen so far.
    pub z_max: f32,
    /// Smallest distance from a box surface to the camera.
    pub closest: f32,
}

impl Default for DepthRange {
    fn default() -> Self {
        Self::empty()
    }
}

impl DepthRange {
    /// Range that any accepted box extends.
    pub fn empty() -> Self {
        Self {
            z_min: f32::INFINITY,
            z_max: f32::NEG_INFINITY,
            closest: f32::INFINITY,
        }
    }

    /// True once at least one box has been folded in.
    pub fn is_valid(&self) -> bool {
        self.z_min <= self.z_max
    }
}

/// Stage 1: the bounding sphere against the camera and the side planes.
fn sphere_stage(view_center: Vec3, radius: f32, f: &FrustumParams) -> Result<(), Rejection> {
    if view_center.z < -radius {
        return Err(Rejection::Behind);
    }
    let zz = view_center.z.abs();
    if radius / zz < f.tolerance() {
        return Err(Rejection::TooSmall);
    }
    if view_center.y.abs() - f.sec_vert * radius > zz * f.tan_vert {
        return Err(Rejection::Vertical);
    }
    if view_center.x.abs() - f.sec_horiz * radius > zz * f.tan_horiz {
        return Err(Rejection::Horizontal);
    }
    Ok(())
}

/// The box in view space, as seen by the oriented stage.
struct ViewBox {
    center: Vec3,
    axes: [Vec3; 3],
    half: Vec3,
    /// Center projected on each axis.
    d: [f32; 3],
    /// Overlap `|d| - half`: positive when the camera is outside that slab.
    ad: [f32; 3],
}

impl ViewBox {
    fn new(b: &OrientedBox, view_center: Vec3, world_view: &Mat4) -> Self {
        let axes = b.axes().map(|a| world_view.transform_vector3(a));
        let half = b.half_extents();
        let d = std::array::from_fn(|i| axes[i].dot(view_center));
        let ad = std::array::from_fn(|i| d[i].abs() - half[i]);
        Self {
            center: view_center,
            axes,
            half,
            d,
            ad,
        }
    }

    /// Stage 2: the box's own axes as separating axes.
    fn oriented_stage(&self, f: &FrustumParams) -> Result<(), Rejection> {
        if self.ad.iter().all(|&ad| ad <= 0.0) {
            return Ok(());
        }
        let fov = f.diagonal_sine();
        for i in 0..3 {
            let signed_face = if self.d[i] < 0.0 {
                self.d[i] + self.half[i]
            } else {
                self.d[i] - self.half[i]
            };
            let axis_z = self.axes[i].z;
            if axis_z.abs() > fov && signed_face * axis_z < 0.0 && self.ad[i] > 0.0 {
                return Err(Rejection::separated(i));
            }
        }
        Ok(())
    }
}

/// Test an oriented box for visibility under `world_view`.
///
/// `b` must have had its oriented fields recomputed for the transform it is
/// drawn with; `world_view` maps that frame into view space.
pub fn is_visible(b: &OrientedBox, world_view: &Mat4, f: &FrustumParams) -> bool {
    let view_center = world_view.transform_point3(b.center());
    if sphere_stage(view_center, b.radius(), f).is_err() {
        return false;
    }
    ViewBox::new(b, view_center, world_view)
        .oriented_stage(f)
        .is_ok()
}

/// Sphere-only pre-filter.
pub fn is_sphere_visible(center: Vec3, radius: f32, world_view: &Mat4, f: &FrustumParams) -> bool {
    let view_center = world_view.transform_point3(center);
    sphere_stage(view_center, radius, f).is_ok()
}

/// Run the full cascade and, if the box is accepted, fold its closest
/// approach and its eight corner depths into `range`.
///
/// Fields of `range` only move outward (or closer, for `closest`).
pub fn compute_min_max_distance(
    b: &OrientedBox,
    world_view: &Mat4,
    f: &FrustumParams,
    range: &mut DepthRange,
) -> Result<(), Rejection> {
    let view_center = world_view.transform_point3(b.center());
    sphere_stage(view_center, b.radius(), f)?;

    let vb = ViewBox::new(b, view_center, world_view);
    vb.oriented_stage(f)?;

    let outside = Vec3::from_array(vb.ad.map(|ad| ad.max(0.0)));
    range.closest = range.closest.min(outside.length());

    let x = vb.axes[0].z * vb.half.x;
    let y = vb.axes[1].z * vb.half.y;
    let z = vb.axes[2].z * vb.half.z;
    let e = vb.center.z;

    let mut lo = f32::INFINITY;
    let mut hi = f32::NEG_INFINITY;
    for sx in [1.0, -1.0] {
        for sy in [1.0, -1.0] {
            for sz in [1.0, -1.0] {
                let q = e + sx * x + sy * y + sz * z;
                lo = lo.min(q);
                hi = hi.max(q);
            }
        }
    }
    range.z_min = range.z_min.min(lo);
    range.z_max = range.z_max.max(hi);
    Ok(())
}

#[cfg(test)]
mod tests {
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    use super::*;

    fn frustum_60() -> FrustumParams {
        let proj = Mat4::perspective_lh(60f32.to_radians(), 1.0, 0.1, 1000.0);
        FrustumParams::from_projection(&proj)
    }

    fn unit_box() -> OrientedBox {
        OrientedBox::from_min_max(Vec3::splat(-1.0), Vec3::splat(1.0))
    }

    /// World-view for a camera at `eye` looking down +z with no rotation.
    fn camera_at(eye: Vec3) -> Mat4 {
        Mat4::from_translation(-eye)
    }

    #[test]
    fn test_box_in_front_of_camera_visible() {
        let wv = camera_at(Vec3::new(0.0, 0.0, -10.0));
        assert!(is_visible(&unit_box(), &wv, &frustum_60()));
    }

    #[test]
    fn test_box_behind_camera_rejected() {
        let wv = camera_at(Vec3::new(0.0, 0.0, 5.0));
        assert!(!is_visible(&unit_box(), &wv, &frustum_60()));
        let mut range = DepthRange::empty();
        let r = compute_min_max_distance(&unit_box(), &wv, &frustum_60(), &mut range);
        assert_eq!(r, Err(Rejection::Behind));
        assert_eq!(range, DepthRange::empty());
    }

    #[test]
    fn test_box_straddling_camera_plane_is_conservatively_accepted() {
        // Camera at z = 0.5, inside the unit box. The center is behind the
        // camera but within one bounding radius of it, and only centers more
        // than a radius behind are rejected: a box the camera sits in or
        // grazes is always reported visible.
        let wv = camera_at(Vec3::new(0.0, 0.0, 0.5));
        assert!(is_visible(&unit_box(), &wv, &frustum_60()));
    }

    #[test]
    fn test_behind_rejection_for_all_radii() {
        let f = frustum_60();
        for radius in [0.0f32, 0.01, 0.5, 1.0, 7.0, 300.0] {
            for extra in [1e-3f32, 0.1, 2.0, 1e4] {
                let z = -radius - extra;
                assert!(
                    !is_sphere_visible(Vec3::new(0.0, 0.0, z), radius, &Mat4::IDENTITY, &f),
                    "sphere r={radius} at z={z} must be rejected"
                );
                let half = radius / 3f32.sqrt();
                let b = OrientedBox::from_min_max(
                    Vec3::new(-half, -half, z - half),
                    Vec3::new(half, half, z + half),
                );
                assert!(!is_visible(&b, &Mat4::IDENTITY, &f), "box r={radius} z={z}");
            }
        }
    }

    #[test]
    fn test_sub_pixel_box_rejected() {
        let f = frustum_60();
        let tiny = OrientedBox::from_min_max(Vec3::splat(-1e-3), Vec3::splat(1e-3));
        let wv = camera_at(Vec3::new(0.0, 0.0, -1e4));
        let mut range = DepthRange::empty();
        assert_eq!(
            compute_min_max_distance(&tiny, &wv, &f, &mut range),
            Err(Rejection::TooSmall)
        );
    }

    #[test]
    fn test_side_plane_rejections() {
        let f = frustum_60();
        let mut range = DepthRange::empty();
        let above = Mat4::from_translation(Vec3::new(0.0, 50.0, 10.0));
        assert_eq!(
            compute_min_max_distance(&unit_box(), &above, &f, &mut range),
            Err(Rejection::Vertical)
        );
        let left = Mat4::from_translation(Vec3::new(-50.0, 0.0, 10.0));
        assert_eq!(
            compute_min_max_distance(&unit_box(), &left, &f, &mut range),
            Err(Rejection::Horizontal)
        );
        assert!(!is_sphere_visible(Vec3::ZERO, 1.0, &left, &f));
    }

    #[test]
    fn test_long_thin_box_separated_along_its_axis() {
        // A slab lying across the view direction, entirely behind the near
        // side of the camera along its own normal, but with a bounding sphere
        // large enough to pass the sphere stage.
        let slab = OrientedBox::from_min_max(
            Vec3::new(-100.0, -100.0, -0.5),
            Vec3::new(100.0, 100.0, 0.5),
        );
        let wv = Mat4::from_translation(Vec3::new(0.0, 0.0, -20.0));
        let f = frustum_60();
        let mut range = DepthRange::empty();
        assert_eq!(
            compute_min_max_distance(&slab, &wv, &f, &mut range),
            Err(Rejection::SeparatedZ)
        );
        assert!(!is_visible(&slab, &wv, &f));
    }

    #[test]
    fn test_status_codes_are_distinct() {
        let all = [
            Rejection::Behind,
            Rejection::TooSmall,
            Rejection::Vertical,
            Rejection::Horizontal,
            Rejection::SeparatedX,
            Rejection::SeparatedY,
            Rejection::SeparatedZ,
        ];
        let codes: Vec<i32> = all.iter().map(|r| r.code()).collect();
        assert_eq!(codes, vec![-1, -2, -3, -4, -5, -6, -7]);
        assert_eq!(status_code(Ok(())), 0);
        assert_eq!(status_code(Err(Rejection::SeparatedY)), -6);
    }

    #[test]
    fn test_depth_range_of_accepted_box() {
        let wv = camera_at(Vec3::new(0.0, 0.0, -10.0));
        let mut range = DepthRange::empty();
        let r = compute_min_max_distance(&unit_box(), &wv, &frustum_60(), &mut range);
        assert_eq!(r, Ok(()));
        assert!((range.z_min - 9.0).abs() < 1e-5, "z_min = {}", range.z_min);
        assert!((range.z_max - 11.0).abs() < 1e-5, "z_max = {}", range.z_max);
        assert!((range.closest - 9.0).abs() < 1e-4, "closest = {}", range.closest);
    }

    #[test]
    fn test_depth_range_only_extends() {
        let f = frustum_60();
        let mut range = DepthRange {
            z_min: 5.0,
            z_max: 50.0,
            closest: 1.0,
        };
        let wv = camera_at(Vec3::new(0.0, 0.0, -10.0));
        compute_min_max_distance(&unit_box(), &wv, &f, &mut range).unwrap();
        assert_eq!(range.z_min, 5.0);
        assert_eq!(range.z_max, 50.0);
        assert_eq!(range.closest, 1.0);
    }

    #[test]
    fn test_status_zero_implies_ordered_range() {
        let f = frustum_60();
        let mut rng = ChaCha8Rng::seed_from_u64(0x2545_f491);
        let mut next = move || rng.random_range(-1.0f32..1.0);
        for _ in 0..500 {
            let b = OrientedBox::from_min_max(
                Vec3::new(next(), next(), next()) * 3.0,
                Vec3::new(next(), next(), next()) * 3.0,
            );
            let wv = Mat4::from_rotation_translation(
                glam::Quat::from_euler(glam::EulerRot::XYZ, next() * 3.0, next() * 3.0, next()),
                Vec3::new(next() * 20.0, next() * 20.0, next() * 40.0),
            );
            let mut range = DepthRange::empty();
            let status = status_code(compute_min_max_distance(&b, &wv, &f, &mut range));
            assert!((-7..=0).contains(&status));
            if status == 0 {
                assert!(range.z_min <= range.z_max, "{range:?}");
                assert!(range.is_valid());
            }
        }
    }

    #[test]
    fn test_rotated_box_uses_world_view_axes() {
        let f = frustum_60();
        let mut b = unit_box();
        let rot = Mat4::from_rotation_y(0.7);
        b.recompute_oriented_fields(Some(&rot), None);
        let wv = camera_at(Vec3::new(0.0, 0.0, -10.0));
        assert!(is_visible(&b, &wv, &f));
        let mut range = DepthRange::empty();
        compute_min_max_distance(&b, &wv, &f, &mut range).unwrap();
        // Rotated about Y, the depth span exceeds the axis-aligned one.
        assert!(range.z_max - range.z_min > 2.0);
    }
}
