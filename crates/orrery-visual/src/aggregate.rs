//! Entity bounds from constituent bounds.

use orrery_math::OrientedBox;
use tracing::trace;

use crate::{ExhaustSpec, MeshEntry, MeshList, MeshVisibility};

/// Hull of every mesh drawn under `mask`, each through its cumulative
/// transform, plus the plume tips of running engines and every exhaust
/// reference point.
///
/// The oriented fields are computed for the entity frame. An entity with
/// no contributing geometry gets the zeroed box.
pub fn compute_bounds<'a>(
    meshes: impl IntoIterator<Item = &'a MeshEntry>,
    exhausts: &[ExhaustSpec],
    mask: MeshVisibility,
) -> OrientedBox {
    let mut bounds = OrientedBox::inverted();
    for mesh in meshes {
        if !mesh.visibility.intersects(mask) {
            continue;
        }
        let transform = mesh.cumulative_transform();
        bounds.add_box(&mesh.bounds, transform.as_ref(), false);
    }
    for tip in exhausts.iter().filter_map(ExhaustSpec::plume_tip) {
        bounds.add_point(tip);
    }
    for spec in exhausts {
        bounds.add_point(spec.position);
    }

    if bounds.is_empty() {
        return OrientedBox::zeroed();
    }
    bounds.recompute_oriented_fields(None, None);
    bounds
}

/// The last [`compute_bounds`] result of a [`MeshList`], reused until a
/// constituent or the mask changes.
#[derive(Debug, Clone, Default)]
pub struct BoundsCache {
    key: Option<(MeshVisibility, Vec<u64>)>,
    bounds: OrientedBox,
    recomputed: u64,
}

impl BoundsCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bounds of `list` under `mask`, recomputed only when stale.
    pub fn get(&mut self, list: &MeshList, mask: MeshVisibility) -> &OrientedBox {
        let key = (mask, list.change_key());
        if self.key.as_ref() != Some(&key) {
            self.bounds = compute_bounds(list.iter().map(|(_, m)| m), list.exhausts(), mask);
            self.key = Some(key);
            self.recomputed += 1;
            trace!(radius = self.bounds.radius(), "entity bounds recomputed");
        }
        &self.bounds
    }

    /// Whether the next [`get`](Self::get) for `list` would recompute.
    pub fn is_stale(&self, list: &MeshList, mask: MeshVisibility) -> bool {
        self.key
            .as_ref()
            .is_none_or(|(m, k)| *m != mask || *k != list.change_key())
    }

    pub fn invalidate(&mut self) {
        self.key = None;
    }

    /// Number of recomputations so far.
    pub fn recomputations(&self) -> u64 {
        self.recomputed
    }
}

#[cfg(test)]
mod tests {
    use glam::{Mat4, Vec3};

    use super::*;

    fn unit_mesh(visibility: MeshVisibility) -> MeshEntry {
        MeshEntry::new(
            OrientedBox::from_min_max(Vec3::splat(-1.0), Vec3::splat(1.0)),
            visibility,
        )
    }

    fn approx(a: Vec3, b: Vec3) -> bool {
        (a - b).abs().max_element() < 1e-5
    }

    #[test]
    fn test_single_mesh_round_trips() {
        let mesh = unit_mesh(MeshVisibility::EXTERNAL);
        let b = compute_bounds([&mesh], &[], MeshVisibility::BOUNDING);
        assert_eq!(b.min(), Vec3::splat(-1.0));
        assert_eq!(b.max(), Vec3::splat(1.0));
        assert!((b.radius() - 3f32.sqrt()).abs() < 1e-6);
    }

    #[test]
    fn test_offsets_shift_meshes() {
        let a = unit_mesh(MeshVisibility::EXTERNAL).with_offset(Vec3::new(5.0, 0.0, 0.0));
        let b = unit_mesh(MeshVisibility::EXTERNAL_PASS).with_offset(Vec3::new(0.0, -3.0, 0.0));
        let bounds = compute_bounds([&a, &b], &[], MeshVisibility::BOUNDING);
        assert_eq!(bounds.min(), Vec3::new(-1.0, -4.0, -1.0));
        assert_eq!(bounds.max(), Vec3::new(6.0, 1.0, 1.0));
        assert!(approx(bounds.center(), Vec3::new(2.5, -1.5, 0.0)));
    }

    #[test]
    fn test_rotated_mesh_gets_conservative_hull() {
        let mut mesh = MeshEntry::new(
            OrientedBox::from_min_max(Vec3::new(-2.0, -1.0, -1.0), Vec3::new(2.0, 1.0, 1.0)),
            MeshVisibility::EXTERNAL,
        );
        mesh.transform = Some(Mat4::from_rotation_z(std::f32::consts::FRAC_PI_4));
        let b = compute_bounds([&mesh], &[], MeshVisibility::BOUNDING);
        // Corners (±2, ±1) rotated by 45° reach 3/√2 on both axes.
        let reach = 3.0 / 2f32.sqrt();
        assert!(approx(b.max(), Vec3::new(reach, reach, 1.0)), "max {}", b.max());
        assert!(approx(b.min(), -Vec3::new(reach, reach, 1.0)), "min {}", b.min());
    }

    #[test]
    fn test_cockpit_meshes_are_ignored() {
        let outside = unit_mesh(MeshVisibility::EXTERNAL);
        let cockpit = unit_mesh(MeshVisibility::COCKPIT).with_offset(Vec3::new(0.0, 50.0, 0.0));
        let b = compute_bounds([&outside, &cockpit], &[], MeshVisibility::BOUNDING);
        assert_eq!(b.max().y, 1.0);
    }

    #[test]
    fn test_exhausts_extend_bounds() {
        let mesh = unit_mesh(MeshVisibility::EXTERNAL);
        let mut spec = ExhaustSpec {
            position: Vec3::new(0.0, 0.0, -1.0),
            direction: Vec3::Z,
            offset: 0.5,
            size: 8.0,
            level: 0.0,
        };
        let idle = compute_bounds([&mesh], &[spec], MeshVisibility::BOUNDING);
        assert_eq!(idle.min().z, -1.0);

        spec.level = 1.0;
        let burning = compute_bounds([&mesh], &[spec], MeshVisibility::BOUNDING);
        assert_eq!(burning.min().z, -9.5);

        // Reference points count even without geometry or thrust.
        spec.level = 0.0;
        spec.position = Vec3::new(0.0, 4.0, 0.0);
        let only_ref = compute_bounds(std::iter::empty(), &[spec], MeshVisibility::BOUNDING);
        assert_eq!(only_ref.min(), only_ref.max());
        assert_eq!(only_ref.max(), Vec3::new(0.0, 4.0, 0.0));
    }

    #[test]
    fn test_nothing_gives_zeroed_box() {
        let b = compute_bounds(std::iter::empty(), &[], MeshVisibility::BOUNDING);
        assert_eq!(b, OrientedBox::zeroed());
    }

    #[test]
    fn test_cache_recomputes_only_on_change() {
        let mut list = MeshList::new();
        list.insert(0, unit_mesh(MeshVisibility::EXTERNAL));
        list.insert(1, unit_mesh(MeshVisibility::EXTERNAL).with_offset(Vec3::X * 4.0));
        let mut cache = BoundsCache::new();

        assert!(cache.is_stale(&list, MeshVisibility::BOUNDING));
        assert_eq!(cache.get(&list, MeshVisibility::BOUNDING).max().x, 5.0);
        assert_eq!(cache.get(&list, MeshVisibility::BOUNDING).max().x, 5.0);
        assert_eq!(cache.recomputations(), 1);
        assert!(!cache.is_stale(&list, MeshVisibility::BOUNDING));

        list.set_transform(1, Some(Mat4::from_translation(Vec3::X))).unwrap();
        assert!(cache.is_stale(&list, MeshVisibility::BOUNDING));
        assert_eq!(cache.get(&list, MeshVisibility::BOUNDING).max().x, 6.0);
        assert_eq!(cache.recomputations(), 2);

        cache.get(&list, MeshVisibility::EXTERNAL);
        assert_eq!(cache.recomputations(), 3);

        cache.invalidate();
        cache.get(&list, MeshVisibility::EXTERNAL);
        assert_eq!(cache.recomputations(), 4);
    }

    #[test]
    fn test_cache_matches_pure_result() {
        let mut list = MeshList::new();
        list.insert(3, unit_mesh(MeshVisibility::ALWAYS).with_offset(Vec3::new(1.0, 2.0, 3.0)));
        list.add_exhaust(ExhaustSpec {
            position: Vec3::new(0.0, 0.0, -2.0),
            direction: Vec3::Z,
            offset: 0.0,
            size: 3.0,
            level: 0.25,
        });
        let mut cache = BoundsCache::new();
        let cached = *cache.get(&list, MeshVisibility::BOUNDING);
        let pure = compute_bounds(list.iter().map(|(_, m)| m), list.exhausts(), MeshVisibility::BOUNDING);
        assert_eq!(cached, pure);
    }
}
