//! Region queries against the tile tree.

use std::f64::consts::{FRAC_PI_2, PI, TAU};

use crate::extents::normalize_lng;
use crate::{TileExtents, TileHandle, TileKey, TileTree};

/// Result of a point query.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TileSample {
    /// Height of the layer at the point in meters above the body radius.
    pub value: f64,
    /// Level of the tile that answered.
    pub level: u8,
    pub handle: TileHandle,
    pub key: TileKey,
}

impl TileTree {
    /// Tiles overlapping a latitude/longitude rectangle, down to `max_level`.
    ///
    /// `rotation` is the layer's longitude offset against the body (the
    /// cloud rotation for cloud layers). Nodes are reported at `max_level`
    /// or where the tree ends above it.
    pub fn coverage(
        &self,
        lat_min: f64,
        lat_max: f64,
        lng_min: f64,
        lng_max: f64,
        max_level: u8,
        rotation: f64,
    ) -> Vec<TileHandle> {
        let mut lng_min = lng_min + rotation;
        let mut lng_max = lng_max + rotation;
        if lng_min > PI {
            lng_min -= TAU;
            lng_max -= TAU;
        }

        // The rectangle may still cross the ±π seam on either side.
        let mut ranges = vec![(lng_min, lng_max)];
        if lng_max > PI {
            ranges.push((lng_min - TAU, lng_max - TAU));
        }
        if lng_min < -PI {
            ranges.push((lng_min + TAU, lng_max + TAU));
        }

        let mut found = Vec::new();
        for root in self.roots() {
            self.collect_coverage(root, lat_min, lat_max, &ranges, max_level, &mut found);
        }
        found
    }

    fn collect_coverage(
        &self,
        handle: TileHandle,
        lat_min: f64,
        lat_max: f64,
        ranges: &[(f64, f64)],
        max_level: u8,
        found: &mut Vec<TileHandle>,
    ) {
        let Some(node) = self.node(handle) else {
            return;
        };
        let ext = TileExtents::of(&node.key());
        let overlaps = ranges
            .iter()
            .any(|&(lo, hi)| ext.overlaps(lat_min, lat_max, lo, hi));
        if !overlaps {
            return;
        }
        match node.children() {
            Some(children) if node.key().level < max_level => {
                for child in children {
                    self.collect_coverage(child, lat_min, lat_max, ranges, max_level, found);
                }
            }
            _ => found.push(handle),
        }
    }

    /// Value of the layer at a point from the deepest settled tile there.
    ///
    /// Returns `None` until a hemisphere root has finished loading.
    pub fn sample(&self, lng: f64, lat: f64, rotation: f64) -> Option<TileSample> {
        let lng = normalize_lng(lng + rotation);
        let lat = lat.clamp(-FRAC_PI_2, FRAC_PI_2);

        let mut cursor = self
            .roots()
            .into_iter()
            .find(|&h| self.node(h).is_some_and(|n| TileExtents::of(&n.key()).contains(lng, lat)));
        let mut best = None;
        while let Some(handle) = cursor {
            let node = self.node(handle)?;
            if !node.state().is_settled() {
                break;
            }
            best = Some(handle);
            cursor = node.children().and_then(|children| {
                children.into_iter().find(|&c| {
                    self.node(c)
                        .is_some_and(|n| TileExtents::of(&n.key()).contains(lng, lat))
                })
            });
        }

        let handle = best?;
        let node = self.node(handle)?;
        let key = node.key();
        let mean = self.params().mean_elevation;
        let value = match node.elevation() {
            Some(grid) => {
                let ext = TileExtents::of(&key);
                let u = (lng - ext.lng_min) / (ext.lng_max - ext.lng_min);
                let v = (ext.lat_max - lat) / (ext.lat_max - ext.lat_min);
                mean + grid.sample(u, v) as f64
            }
            None => mean,
        };
        Some(TileSample {
            value,
            level: key.level,
            handle,
            key,
        })
    }
}
