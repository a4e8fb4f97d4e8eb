//! Bounding-volume primitives shared by the culling, tile and visual crates.

mod oriented_box;

pub use oriented_box::{OrientedBox, is_translation_only};
