//! End-to-end streaming from a tile directory on disk.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use glam::{DMat4, DVec3, Mat4};
use orrery_config::Config;
use orrery_tiles::{
    DeviceError, FrameParams, FsTileSource, LoadState, RenderDevice, TexRange, Texture,
    TextureCache, TileDraw, TileKey, TileLayer, TileManager,
};

const RADIUS: f64 = 6_371_000.0;

#[derive(Default)]
struct Recorder {
    draws: Vec<(TileKey, Option<u32>, TexRange)>,
}

impl RenderDevice for Recorder {
    fn draw_tile(&mut self, draw: &TileDraw<'_>) -> Result<(), DeviceError> {
        self.draws
            .push((draw.key, draw.texture.map(|t| t.width), draw.texrange));
        Ok(())
    }
}

fn write_tile(root: &Path, layer: TileLayer, key: TileKey, width: u32) {
    let source = FsTileSource::new(root, "Earth");
    let path = source.path(layer, &key);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, Texture::encode_dds(width, width, &[0u8; 32])).unwrap();
}

fn manager(root: &Path, max_level: u8) -> TileManager {
    let mut config = Config::default();
    config.tiles.texture_root = root.to_path_buf();
    config.tiles.max_level = max_level;
    config.tiles.patch_resolution = 4;
    config.tiles.loader_threads = 2;
    let source = Arc::new(FsTileSource::new(&config.tiles.texture_root, "Earth"));
    TileManager::new(
        TileLayer::Cloud,
        "Earth",
        RADIUS,
        &config,
        source,
        Arc::new(TextureCache::new()),
    )
    .unwrap()
}

fn frame(viewport_height: f32) -> FrameParams {
    let eye = DVec3::new(0.0, 0.0, -3.0 * RADIUS);
    FrameParams {
        world_view: DMat4::look_to_lh(eye, DVec3::Z, DVec3::Y),
        projection: Mat4::perspective_lh(60f32.to_radians(), 1.0, 1_000.0, 1e9),
        viewport_height,
    }
}

/// Render until the loader has nothing left to do.
fn converge(mgr: &TileManager, frame: &FrameParams) -> Recorder {
    for _ in 0..4 {
        mgr.render(frame, &mut Recorder::default()).unwrap();
        assert!(mgr.wait_idle(Duration::from_secs(10)));
    }
    let mut device = Recorder::default();
    mgr.render(frame, &mut device).unwrap();
    device
}

#[test]
fn test_roots_stream_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    for key in TileKey::roots() {
        write_tile(dir.path(), TileLayer::Cloud, key, 256);
    }
    let mgr = manager(dir.path(), 0);

    let device = converge(&mgr, &frame(600.0));
    assert_eq!(device.draws.len(), 2);
    for (key, width, range) in &device.draws {
        assert_eq!(key.level, 0);
        assert_eq!(*width, Some(256));
        assert_eq!(*range, TexRange::FULL);
    }
    assert_eq!(mgr.cache().len(), 2);
}

#[test]
fn test_missing_children_borrow_root_texture() {
    let dir = tempfile::tempdir().unwrap();
    for key in TileKey::roots() {
        write_tile(dir.path(), TileLayer::Cloud, key, 256);
    }
    let mgr = manager(dir.path(), 1);

    let device = converge(&mgr, &frame(2000.0));
    assert!(!device.draws.is_empty());
    for (key, width, range) in &device.draws {
        assert_eq!(key.level, 1);
        // Level-1 tiles have no files and show a quarter of their root.
        assert_eq!(*width, Some(256));
        assert!((range.tu_max - range.tu_min - 0.5).abs() < 1e-6);
        assert!((range.tv_max - range.tv_min - 0.5).abs() < 1e-6);
    }
    let stats = mgr.stats();
    assert!(stats.fallbacks > 0);
    assert_eq!(stats.untextured, 0);
}

#[test]
fn test_empty_directory_draws_untextured() {
    let dir = tempfile::tempdir().unwrap();
    let mgr = manager(dir.path(), 0);

    let device = converge(&mgr, &frame(600.0));
    assert_eq!(device.draws.len(), 2);
    assert!(device.draws.iter().all(|(_, width, _)| width.is_none()));
    let tree = mgr.tree().lock();
    assert!(tree.iter().all(|(_, n)| n.state() == LoadState::Invalid));
}

#[test]
fn test_own_child_texture_wins_over_parent() {
    let dir = tempfile::tempdir().unwrap();
    for key in TileKey::roots() {
        write_tile(dir.path(), TileLayer::Cloud, key, 256);
    }
    // One level-1 tile has its own, smaller texture.
    let own = TileKey::new(1, 0, 1);
    write_tile(dir.path(), TileLayer::Cloud, own, 128);
    let mgr = manager(dir.path(), 1);

    let device = converge(&mgr, &frame(2000.0));
    if let Some((_, width, range)) = device.draws.iter().find(|(k, _, _)| *k == own) {
        assert_eq!(*width, Some(128));
        assert_eq!(*range, TexRange::FULL);
    }
    let tree = mgr.tree().lock();
    let handle = tree.find(&own).unwrap();
    assert!(tree.node(handle).unwrap().texture().is_own());
}
