//! The constituents of an entity: meshes and exhaust points.

use glam::{Mat4, Vec3};
use orrery_math::OrientedBox;
use tracing::debug;

use crate::VisualError;

// ── MeshVisibility ──────────────────────────────────────────────────

/// Camera modes a mesh is drawn in. Combines via bitwise OR.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MeshVisibility(pub u16);

impl MeshVisibility {
    /// Never drawn.
    pub const NEVER: Self = Self(0);
    /// Drawn from outside views.
    pub const EXTERNAL: Self = Self(1 << 0);
    /// Drawn in the 2D cockpit view.
    pub const COCKPIT: Self = Self(1 << 1);
    /// External and cockpit.
    pub const ALWAYS: Self = Self(Self::EXTERNAL.0 | Self::COCKPIT.0);
    /// Drawn in the virtual cockpit.
    pub const VIRTUAL_COCKPIT: Self = Self(1 << 2);
    /// Drawn in the external pass even while the camera is inside.
    pub const EXTERNAL_PASS: Self = Self(1 << 4);
    /// Constituents that count towards the entity's bounds.
    pub const BOUNDING: Self = Self(Self::EXTERNAL.0 | Self::EXTERNAL_PASS.0);

    /// Mask of meshes to draw for the current camera mode.
    #[must_use]
    pub fn for_camera(internal: bool, virtual_cockpit: bool) -> Self {
        match (internal, virtual_cockpit) {
            (false, _) => Self::EXTERNAL,
            (true, false) => Self::COCKPIT,
            (true, true) => Self::VIRTUAL_COCKPIT,
        }
    }

    /// Returns true if `self` contains all bits in `other`.
    #[must_use]
    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns true if `self` and `other` share any bit.
    #[must_use]
    pub fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    #[must_use]
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl std::ops::BitOr for MeshVisibility {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl std::ops::BitOrAssign for MeshVisibility {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

// ── MeshEntry ───────────────────────────────────────────────────────

/// One mesh of an entity.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshEntry {
    /// Local bounds of the mesh geometry, oriented fields for identity.
    pub bounds: OrientedBox,
    pub visibility: MeshVisibility,
    /// Placement of the mesh in the entity frame. Only translations occur
    /// in practice.
    pub offset: Option<Mat4>,
    /// The mesh's own (animation) transform.
    pub transform: Option<Mat4>,
    stamp: u64,
}

impl MeshEntry {
    pub fn new(bounds: OrientedBox, visibility: MeshVisibility) -> Self {
        Self {
            bounds,
            visibility,
            offset: None,
            transform: None,
            stamp: 0,
        }
    }

    /// Place the mesh at `offset`; a zero offset leaves it untransformed.
    #[must_use]
    pub fn with_offset(mut self, offset: Vec3) -> Self {
        self.offset = (offset.length() > 0.0).then(|| Mat4::from_translation(offset));
        self
    }

    /// Offset followed by the mesh transform, `None` when neither is set.
    pub fn cumulative_transform(&self) -> Option<Mat4> {
        match (self.offset, self.transform) {
            (Some(offset), Some(tf)) => Some(tf * offset),
            (Some(m), None) | (None, Some(m)) => Some(m),
            (None, None) => None,
        }
    }

    /// Change stamp assigned by the owning [`MeshList`].
    pub fn stamp(&self) -> u64 {
        self.stamp
    }
}

// ── ExhaustSpec ─────────────────────────────────────────────────────

/// An engine exhaust in the entity frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExhaustSpec {
    /// Reference point at the nozzle.
    pub position: Vec3,
    /// Thrust direction (the plume extends against it).
    pub direction: Vec3,
    /// Plume start distance from the reference point.
    pub offset: f32,
    /// Plume length at full thrust.
    pub size: f32,
    /// Thrust level in `[0, 1]`.
    pub level: f64,
}

impl ExhaustSpec {
    /// Far end of the plume, or `None` when the engine is off.
    pub fn plume_tip(&self) -> Option<Vec3> {
        if self.level == 0.0 {
            return None;
        }
        Some(self.position - self.direction * (self.offset + self.size * self.level as f32))
    }
}

// ── MeshList ────────────────────────────────────────────────────────

/// The meshes and exhausts of one entity.
///
/// Every edit stamps the touched constituent with a fresh value from a
/// per-list clock, so a cache can tell whether anything changed.
#[derive(Debug, Clone, Default)]
pub struct MeshList {
    meshes: Vec<Option<MeshEntry>>,
    exhausts: Vec<ExhaustSpec>,
    exhaust_stamps: Vec<u64>,
    clock: u64,
}

impl MeshList {
    pub fn new() -> Self {
        Self::default()
    }

    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    /// Put `entry` in slot `index`, replacing what was there. Slots past
    /// the end are created empty.
    pub fn insert(&mut self, index: usize, mut entry: MeshEntry) {
        if index >= self.meshes.len() {
            self.meshes.resize(index + 1, None);
        }
        entry.stamp = self.tick();
        debug!(
            index,
            offset = ?entry.offset.map(|m| m.w_axis.truncate()),
            "mesh inserted"
        );
        self.meshes[index] = Some(entry);
    }

    /// Empty slot `index`; the slot itself remains.
    pub fn remove(&mut self, index: usize) -> Option<MeshEntry> {
        let removed = self.meshes.get_mut(index)?.take();
        if removed.is_some() {
            self.tick();
        }
        removed
    }

    pub fn clear(&mut self) {
        self.meshes.clear();
        self.tick();
    }

    pub fn get(&self, index: usize) -> Option<&MeshEntry> {
        self.meshes.get(index)?.as_ref()
    }

    fn get_mut(&mut self, index: usize) -> Result<&mut MeshEntry, VisualError> {
        let stamp = self.tick();
        let entry = self
            .meshes
            .get_mut(index)
            .and_then(Option::as_mut)
            .ok_or(VisualError::NoSuchMesh(index))?;
        entry.stamp = stamp;
        Ok(entry)
    }

    /// Set or clear the animation transform of a mesh.
    pub fn set_transform(&mut self, index: usize, transform: Option<Mat4>) -> Result<(), VisualError> {
        self.get_mut(index)?.transform = transform;
        Ok(())
    }

    pub fn set_visibility(&mut self, index: usize, visibility: MeshVisibility) -> Result<(), VisualError> {
        self.get_mut(index)?.visibility = visibility;
        Ok(())
    }

    /// Replace a mesh's local bounds after its geometry changed.
    pub fn set_bounds(&mut self, index: usize, bounds: OrientedBox) -> Result<(), VisualError> {
        self.get_mut(index)?.bounds = bounds;
        Ok(())
    }

    /// Number of slots, empty ones included.
    pub fn len(&self) -> usize {
        self.meshes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.meshes.iter().all(Option::is_none)
    }

    /// Occupied slots in index order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &MeshEntry)> {
        self.meshes
            .iter()
            .enumerate()
            .filter_map(|(i, m)| m.as_ref().map(|m| (i, m)))
    }

    /// Meshes drawn under `mask`.
    pub fn visible(&self, mask: MeshVisibility) -> impl Iterator<Item = (usize, &MeshEntry)> {
        self.iter().filter(move |(_, m)| m.visibility.intersects(mask))
    }

    pub fn add_exhaust(&mut self, spec: ExhaustSpec) -> usize {
        let stamp = self.tick();
        self.exhausts.push(spec);
        self.exhaust_stamps.push(stamp);
        self.exhausts.len() - 1
    }

    pub fn set_exhaust_level(&mut self, index: usize, level: f64) -> Result<(), VisualError> {
        let stamp = self.tick();
        let spec = self
            .exhausts
            .get_mut(index)
            .ok_or(VisualError::NoSuchExhaust(index))?;
        if spec.level != level {
            spec.level = level;
            self.exhaust_stamps[index] = stamp;
        }
        Ok(())
    }

    pub fn exhausts(&self) -> &[ExhaustSpec] {
        &self.exhausts
    }

    /// One stamp per slot and exhaust; equal keys mean no constituent
    /// changed in between.
    pub fn change_key(&self) -> Vec<u64> {
        let mut key = Vec::with_capacity(self.meshes.len() + self.exhausts.len() + 1);
        key.push(self.meshes.len() as u64);
        key.extend(self.meshes.iter().map(|m| m.as_ref().map_or(0, |m| m.stamp)));
        key.extend(self.exhaust_stamps.iter().copied());
        key
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_mesh(visibility: MeshVisibility) -> MeshEntry {
        MeshEntry::new(
            OrientedBox::from_min_max(Vec3::splat(-1.0), Vec3::splat(1.0)),
            visibility,
        )
    }

    #[test]
    fn test_visibility_flags_combine() {
        let both = MeshVisibility::EXTERNAL | MeshVisibility::VIRTUAL_COCKPIT;
        assert!(both.contains(MeshVisibility::EXTERNAL));
        assert!(!both.contains(MeshVisibility::COCKPIT));
        assert!(MeshVisibility::ALWAYS.contains(MeshVisibility::COCKPIT));
        assert!(MeshVisibility::NEVER.is_empty());
        assert!(!MeshVisibility::COCKPIT.intersects(MeshVisibility::BOUNDING));
    }

    #[test]
    fn test_camera_mode_masks() {
        assert_eq!(MeshVisibility::for_camera(false, true), MeshVisibility::EXTERNAL);
        assert_eq!(MeshVisibility::for_camera(true, false), MeshVisibility::COCKPIT);
        assert_eq!(
            MeshVisibility::for_camera(true, true),
            MeshVisibility::VIRTUAL_COCKPIT
        );
    }

    #[test]
    fn test_zero_offset_is_no_transform() {
        let m = unit_mesh(MeshVisibility::EXTERNAL).with_offset(Vec3::ZERO);
        assert!(m.offset.is_none());
        assert!(m.cumulative_transform().is_none());
    }

    #[test]
    fn test_cumulative_transform_applies_offset_first() {
        let mut m = unit_mesh(MeshVisibility::EXTERNAL).with_offset(Vec3::new(1.0, 0.0, 0.0));
        m.transform = Some(Mat4::from_rotation_z(std::f32::consts::FRAC_PI_2));
        let p = m.cumulative_transform().unwrap().transform_point3(Vec3::ZERO);
        assert!((p - Vec3::new(0.0, 1.0, 0.0)).length() < 1e-6, "got {p}");
    }

    #[test]
    fn test_plume_tip_follows_level() {
        let mut spec = ExhaustSpec {
            position: Vec3::new(0.0, 0.0, -5.0),
            direction: Vec3::Z,
            offset: 1.0,
            size: 10.0,
            level: 0.0,
        };
        assert!(spec.plume_tip().is_none());
        spec.level = 0.5;
        assert_eq!(spec.plume_tip(), Some(Vec3::new(0.0, 0.0, -11.0)));
    }

    #[test]
    fn test_insert_pads_with_empty_slots() {
        let mut list = MeshList::new();
        list.insert(2, unit_mesh(MeshVisibility::EXTERNAL));
        assert_eq!(list.len(), 3);
        assert!(list.get(0).is_none());
        assert_eq!(list.iter().map(|(i, _)| i).collect::<Vec<_>>(), vec![2]);
        assert_eq!(list.remove(2).map(|m| m.visibility), Some(MeshVisibility::EXTERNAL));
        assert!(list.is_empty());
        assert_eq!(list.len(), 3);
    }

    #[test]
    fn test_edits_change_the_key() {
        let mut list = MeshList::new();
        list.insert(0, unit_mesh(MeshVisibility::EXTERNAL));
        let e = list.add_exhaust(ExhaustSpec {
            position: Vec3::ZERO,
            direction: Vec3::Z,
            offset: 0.0,
            size: 1.0,
            level: 0.0,
        });

        let k0 = list.change_key();
        assert_eq!(list.change_key(), k0);
        list.set_transform(0, Some(Mat4::IDENTITY)).unwrap();
        let k1 = list.change_key();
        assert_ne!(k1, k0);
        list.set_exhaust_level(e, 0.0).unwrap();
        assert_eq!(list.change_key(), k1, "unchanged level keeps the key");
        list.set_exhaust_level(e, 1.0).unwrap();
        assert_ne!(list.change_key(), k1);

        // Replacing a mesh with an identical one is still a change.
        let k2 = list.change_key();
        list.insert(0, unit_mesh(MeshVisibility::EXTERNAL));
        assert_ne!(list.change_key(), k2);
    }

    #[test]
    fn test_missing_slot_errors() {
        let mut list = MeshList::new();
        assert_eq!(
            list.set_transform(4, None),
            Err(VisualError::NoSuchMesh(4))
        );
        assert_eq!(
            list.set_exhaust_level(0, 1.0),
            Err(VisualError::NoSuchExhaust(0))
        );
    }

    #[test]
    fn test_visible_filters_by_mask() {
        let mut list = MeshList::new();
        list.insert(0, unit_mesh(MeshVisibility::EXTERNAL));
        list.insert(1, unit_mesh(MeshVisibility::COCKPIT));
        list.insert(2, unit_mesh(MeshVisibility::ALWAYS));
        let cockpit: Vec<usize> = list.visible(MeshVisibility::COCKPIT).map(|(i, _)| i).collect();
        assert_eq!(cockpit, vec![1, 2]);
    }
}
