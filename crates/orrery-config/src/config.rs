//! Configuration structs with sensible defaults and RON persistence.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Deepest quadtree level the tile addressing scheme can express: level `l`
/// has `2^(l+1)` longitude columns and file names carry six index digits.
const ADDRESSABLE_LEVELS: u8 = 18;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Tile streaming and level-of-detail settings.
    pub tiles: TileConfig,
    /// Visibility and clip-plane settings.
    pub culling: CullConfig,
    /// Debug/development settings.
    pub debug: DebugConfig,
}

/// Tile quadtree and loader configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TileConfig {
    /// Root directory that contains one sub-directory per celestial body.
    pub texture_root: PathBuf,
    /// Deepest quadtree level the manager may subdivide to (0 = hemispheres).
    pub max_level: u8,
    /// Projected tile radius in pixels above which a node is subdivided.
    pub subdivision_threshold_px: f64,
    /// Grid resolution (quads per side) of generated patch meshes.
    pub patch_resolution: u32,
    /// Number of background loader threads; 0 picks one from the CPU count.
    pub loader_threads: usize,
    /// Maximum number of queued prefetch requests.
    pub queue_capacity: usize,
    /// Altitude of the cloud shell above the mean surface in meters.
    pub cloud_altitude_m: f64,
    /// Relative padding applied to provisional tile bounding boxes.
    pub tile_bb_excess: f64,
}

/// Visibility test and clip-plane configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CullConfig {
    /// Use the reduced (25 m) near-plane ceiling instead of 500 m.
    pub reduced_near_plane: bool,
    /// Explicit near plane in meters; 0 selects it from the scene content.
    pub near_plane_limit_m: f32,
}

/// Debug/development configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DebugConfig {
    /// Log level override (e.g., "debug", "info", "warn").
    pub log_level: String,
    /// Draw tile bounding boxes.
    pub show_tile_bounds: bool,
}

impl Default for TileConfig {
    fn default() -> Self {
        Self {
            texture_root: PathBuf::from("Textures"),
            max_level: 8,
            subdivision_threshold_px: 192.0,
            patch_resolution: 16,
            loader_threads: 1,
            queue_capacity: 256,
            cloud_altitude_m: 4000.0,
            tile_bb_excess: 0.0,
        }
    }
}

impl Default for CullConfig {
    fn default() -> Self {
        Self {
            reduced_near_plane: false,
            near_plane_limit_m: 0.0,
        }
    }
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            show_tile_bounds: false,
        }
    }
}

impl TileConfig {
    /// Check the settings for values the tile manager cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_level > ADDRESSABLE_LEVELS {
            return Err(ConfigError::Invalid(format!(
                "max_level {} exceeds addressable level {ADDRESSABLE_LEVELS}",
                self.max_level
            )));
        }
        if self.patch_resolution == 0 {
            return Err(ConfigError::Invalid("patch_resolution must be > 0".into()));
        }
        if self.queue_capacity == 0 {
            return Err(ConfigError::Invalid("queue_capacity must be > 0".into()));
        }
        if !(self.subdivision_threshold_px > 0.0) {
            return Err(ConfigError::Invalid(
                "subdivision_threshold_px must be positive".into(),
            ));
        }
        Ok(())
    }
}

// --- Load / Save / Reload ---

impl Config {
    /// Per-user configuration directory, if the platform has one.
    pub fn default_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("orrery"))
    }

    /// Load config from the given directory, or create a default config file.
    pub fn load_or_create(config_dir: &Path) -> Result<Self, ConfigError> {
        let config_path = config_dir.join("config.ron");

        if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path).map_err(ConfigError::ReadError)?;
            let config: Config = ron::from_str(&contents).map_err(ConfigError::ParseError)?;
            config.tiles.validate()?;
            log::info!("Loaded config from {}", config_path.display());
            Ok(config)
        } else {
            let config = Config::default();
            config.save(config_dir)?;
            log::info!("Created default config at {}", config_path.display());
            Ok(config)
        }
    }

    /// Save config to the given directory as `config.ron`.
    pub fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        std::fs::create_dir_all(config_dir).map_err(ConfigError::WriteError)?;

        let config_path = config_dir.join("config.ron");
        let pretty = ron::ser::PrettyConfig::new()
            .depth_limit(3)
            .separate_tuple_members(true)
            .enumerate_arrays(false);

        let serialized =
            ron::ser::to_string_pretty(self, pretty).map_err(ConfigError::SerializeError)?;

        std::fs::write(&config_path, serialized).map_err(ConfigError::WriteError)?;
        Ok(())
    }

    /// Hot-reload: returns `Some(new_config)` if the file changed, `None` otherwise.
    pub fn reload(&self, config_dir: &Path) -> Result<Option<Self>, ConfigError> {
        let config_path = config_dir.join("config.ron");
        let contents = std::fs::read_to_string(&config_path).map_err(ConfigError::ReadError)?;
        let new_config: Config = ron::from_str(&contents).map_err(ConfigError::ParseError)?;
        new_config.tiles.validate()?;

        if &new_config != self {
            log::info!("Config reloaded with changes");
            Ok(Some(new_config))
        } else {
            Ok(None)
        }
    }
}
