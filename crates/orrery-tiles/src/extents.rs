//! Angular footprint of tiles and texture sub-ranges.

use std::f64::consts::{FRAC_PI_2, PI, TAU};

use glam::DVec3;

use crate::TileKey;

/// Latitude/longitude rectangle of a tile, in radians.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TileExtents {
    pub lat_min: f64,
    pub lat_max: f64,
    pub lng_min: f64,
    pub lng_max: f64,
}

impl TileExtents {
    /// Footprint of `key`.
    pub fn of(key: &TileKey) -> Self {
        let nlat = TileKey::lat_count(key.level) as f64;
        let nlng = TileKey::lng_count(key.level) as f64;
        Self {
            lat_min: PI * (0.5 - (key.ilat + 1) as f64 / nlat),
            lat_max: PI * (0.5 - key.ilat as f64 / nlat),
            lng_min: TAU * key.ilng as f64 / nlng - PI,
            lng_max: TAU * (key.ilng + 1) as f64 / nlng - PI,
        }
    }

    /// `(lng, lat)` of the rectangle's center.
    pub fn center(&self) -> (f64, f64) {
        (
            (self.lng_min + self.lng_max) * 0.5,
            (self.lat_min + self.lat_max) * 0.5,
        )
    }

    /// True if the point lies in the half-open rectangle. The northern and
    /// eastern edges of the sphere are included.
    pub fn contains(&self, lng: f64, lat: f64) -> bool {
        let lat_ok = (lat >= self.lat_min && lat < self.lat_max)
            || (lat == self.lat_max && self.lat_max >= FRAC_PI_2);
        let lng_ok = (lng >= self.lng_min && lng < self.lng_max)
            || (lng == self.lng_max && self.lng_max >= PI);
        lat_ok && lng_ok
    }

    /// True if the closed rectangles overlap.
    pub fn overlaps(&self, lat_min: f64, lat_max: f64, lng_min: f64, lng_max: f64) -> bool {
        self.lat_min <= lat_max
            && self.lat_max >= lat_min
            && self.lng_min <= lng_max
            && self.lng_max >= lng_min
    }

    /// Where `inner` sits inside `self` as a texture sub-rectangle.
    ///
    /// `u` runs west to east, `v` north to south.
    pub fn sub_range(&self, inner: &TileExtents) -> TexRange {
        let width = self.lng_max - self.lng_min;
        let height = self.lat_max - self.lat_min;
        TexRange {
            tu_min: ((inner.lng_min - self.lng_min) / width) as f32,
            tu_max: ((inner.lng_max - self.lng_min) / width) as f32,
            tv_min: ((self.lat_max - inner.lat_max) / height) as f32,
            tv_max: ((self.lat_max - inner.lat_min) / height) as f32,
        }
    }
}

/// Texture coordinate window `(tu_min, tu_max, tv_min, tv_max)`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TexRange {
    pub tu_min: f32,
    pub tu_max: f32,
    pub tv_min: f32,
    pub tv_max: f32,
}

impl TexRange {
    /// The whole texture.
    pub const FULL: TexRange = TexRange {
        tu_min: 0.0,
        tu_max: 1.0,
        tv_min: 0.0,
        tv_max: 1.0,
    };

    /// Map a `[0, 1]` coordinate pair into the window.
    pub fn map(&self, u: f32, v: f32) -> (f32, f32) {
        (
            self.tu_min + u * (self.tu_max - self.tu_min),
            self.tv_min + v * (self.tv_max - self.tv_min),
        )
    }
}

impl Default for TexRange {
    fn default() -> Self {
        Self::FULL
    }
}

/// Unit direction of a surface point in the body frame (y towards the north
/// pole, longitude zero on +x, east towards +z).
pub fn surface_normal(lng: f64, lat: f64) -> DVec3 {
    let (slat, clat) = lat.sin_cos();
    let (slng, clng) = lng.sin_cos();
    DVec3::new(clat * clng, slat, clat * slng)
}

/// Wrap a longitude into `[-π, π)`.
pub fn normalize_lng(lng: f64) -> f64 {
    (lng + PI).rem_euclid(TAU) - PI
}
