use glam::{Mat4, Vec3};

/// Oriented bounding box built by accumulating local-space geometry.
///
/// The box keeps two views of the same volume:
///
/// - `min`/`max`: the axis-aligned corners in the local frame, grown by
///   [`add_point`](Self::add_point) and [`add_box`](Self::add_box).
/// - `center`, the three axes and `radius`: the oriented form produced by
///   [`recompute_oriented_fields`](Self::recompute_oriented_fields). These are
///   only refreshed by that call, so they go stale whenever `min`/`max` or the
///   owning transform change.
///
/// Invariant: the axes are the canonical unit axes pushed through the most
/// recent transform pair; they cannot be set directly.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OrientedBox {
    min: Vec3,
    max: Vec3,
    center: Vec3,
    axes: [Vec3; 3],
    radius: f32,
}

impl Default for OrientedBox {
    fn default() -> Self {
        Self::zeroed()
    }
}

impl OrientedBox {
    /// All fields zero, including the axes.
    pub fn zeroed() -> Self {
        Self {
            min: Vec3::ZERO,
            max: Vec3::ZERO,
            center: Vec3::ZERO,
            axes: [Vec3::ZERO; 3],
            radius: 0.0,
        }
    }

    /// The empty accumulator: `min = +inf`, `max = -inf`.
    pub fn inverted() -> Self {
        Self {
            min: Vec3::INFINITY,
            max: Vec3::NEG_INFINITY,
            center: Vec3::ZERO,
            axes: [Vec3::ZERO; 3],
            radius: 0.0,
        }
    }

    /// Box spanning two local corners, with the oriented fields computed for
    /// the identity transform.
    pub fn from_min_max(min: Vec3, max: Vec3) -> Self {
        let mut b = Self::inverted();
        b.min = min.min(max);
        b.max = min.max(max);
        b.recompute_oriented_fields(None, None);
        b
    }

    /// Return to the empty accumulator state before an accumulation pass.
    pub fn reset(&mut self) {
        self.min = Vec3::INFINITY;
        self.max = Vec3::NEG_INFINITY;
    }

    /// True while nothing has been accumulated since the last reset.
    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    /// Grow the local bounds to include `p`.
    ///
    /// NaN components propagate into the bounds; callers must not pass them.
    pub fn add_point(&mut self, p: Vec3) {
        self.min = self.min.min(p);
        self.max = self.max.max(p);
    }

    /// Grow the local bounds by the local bounds of `other`.
    ///
    /// With `reset` the accumulation starts from the empty state. Without a
    /// transform the corners are merged directly; a translation-only transform
    /// shifts the corners; any other transform moves all eight corners and
    /// takes their axis-aligned hull, which is conservative rather than tight.
    pub fn add_box(&mut self, other: &OrientedBox, transform: Option<&Mat4>, reset: bool) {
        if reset {
            self.reset();
        }

        match transform {
            None => {
                self.min = self.min.min(other.min.min(other.max));
                self.max = self.max.max(other.min.max(other.max));
            }
            Some(m) if is_translation_only(m) => {
                let t = m.w_axis.truncate();
                self.min = self.min.min((other.min + t).min(other.max + t));
                self.max = self.max.max((other.min + t).max(other.max + t));
            }
            Some(m) => {
                for corner in other.corners() {
                    let p = m.transform_point3(corner);
                    self.min = self.min.min(p);
                    self.max = self.max.max(p);
                }
            }
        }
    }

    /// Derive `center`, the axes and `radius` from the local bounds pushed
    /// through `first` and then `second`.
    ///
    /// The axes are not renormalized, so a scaling transform yields scaled
    /// axes. Must run after every change of the owning transform and before
    /// the box is used by a visibility test.
    pub fn recompute_oriented_fields(&mut self, first: Option<&Mat4>, second: Option<&Mat4>) {
        let mut axes = [Vec3::X, Vec3::Y, Vec3::Z];
        let mut lo = self.min;
        let mut hi = self.max;

        for m in [first, second].into_iter().flatten() {
            for axis in &mut axes {
                *axis = m.transform_vector3(*axis);
            }
            lo = m.transform_point3(lo);
            hi = m.transform_point3(hi);
        }

        self.center = (lo + hi) * 0.5;
        self.axes = axes;
        self.radius = (hi - lo).length() * 0.5;
    }

    /// Local minimum corner.
    pub fn min(&self) -> Vec3 {
        self.min
    }

    /// Local maximum corner.
    pub fn max(&self) -> Vec3 {
        self.max
    }

    /// Center in the frame of the last recompute.
    pub fn center(&self) -> Vec3 {
        self.center
    }

    /// The transformed X, Y and Z axes.
    pub fn axes(&self) -> [Vec3; 3] {
        self.axes
    }

    /// Bounding-sphere radius: half the transformed diagonal.
    pub fn radius(&self) -> f32 {
        self.radius
    }

    /// Half of the local size along each local axis.
    pub fn half_extents(&self) -> Vec3 {
        (self.max - self.min) * 0.5
    }

    /// The eight local corners, ordered by the bits (x, y, z) of the index.
    pub fn corners(&self) -> [Vec3; 8] {
        let (lo, hi) = (self.min, self.max);
        std::array::from_fn(|i| {
            Vec3::new(
                if i & 1 == 0 { lo.x } else { hi.x },
                if i & 2 == 0 { lo.y } else { hi.y },
                if i & 4 == 0 { lo.z } else { hi.z },
            )
        })
    }
}

/// True when the upper 3x3 block of `m` is the identity.
pub fn is_translation_only(m: &Mat4) -> bool {
    m.x_axis.truncate() == Vec3::X
        && m.y_axis.truncate() == Vec3::Y
        && m.z_axis.truncate() == Vec3::Z
        && m.row(3) == glam::Vec4::W
}
