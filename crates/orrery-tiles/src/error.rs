//! Error types of the tile pipeline.

use std::path::PathBuf;

use orrery_config::ConfigError;
use thiserror::Error;

/// Failure to produce the data of one tile.
///
/// Only [`OutOfMemory`](Self::OutOfMemory) and
/// [`DeviceLost`](Self::DeviceLost) are fatal; everything else degrades the
/// tile to an ancestor texture or to an untextured patch.
#[derive(Debug, Error)]
pub enum TileSourceError {
    /// No tile file exists for the address.
    #[error("tile not found: {0}")]
    NotFound(PathBuf),
    /// The file exists but could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The file was read but is not a texture we understand.
    #[error("failed to decode {path}: {reason}")]
    Decode { path: PathBuf, reason: String },
    /// The texture could not be allocated.
    #[error("out of memory while loading tile")]
    OutOfMemory,
    /// The graphics device went away while creating the texture.
    #[error("graphics device lost while loading tile")]
    DeviceLost,
}

impl TileSourceError {
    /// True for errors that must stop the tile manager.
    pub fn is_fatal(&self) -> bool {
        self.fatal().is_some()
    }

    /// The manager-level error this failure escalates to, if any.
    pub fn fatal(&self) -> Option<TileError> {
        match self {
            Self::OutOfMemory => Some(TileError::OutOfMemory),
            Self::DeviceLost => Some(TileError::DeviceLost),
            _ => None,
        }
    }
}

/// Failure reported by a [`RenderDevice`](crate::RenderDevice).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DeviceError {
    /// The device was lost; nothing can be drawn until it is recreated.
    #[error("device lost")]
    DeviceLost,
    /// The device ran out of memory.
    #[error("device out of memory")]
    OutOfMemory,
    /// A single draw call was rejected.
    #[error("draw submission failed: {0}")]
    Submit(String),
}

impl DeviceError {
    /// True for errors that must stop the tile manager.
    pub fn is_fatal(&self) -> bool {
        self.fatal().is_some()
    }

    /// The manager-level error this failure escalates to, if any.
    pub fn fatal(&self) -> Option<TileError> {
        match self {
            Self::OutOfMemory => Some(TileError::OutOfMemory),
            Self::DeviceLost => Some(TileError::DeviceLost),
            Self::Submit(_) => None,
        }
    }
}

/// Errors surfaced by the tile manager itself.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum TileError {
    /// Tile settings were rejected.
    #[error("invalid tile configuration: {0}")]
    Config(String),
    /// A tile load or a draw ran out of memory.
    #[error("out of memory")]
    OutOfMemory,
    /// The graphics device was lost.
    #[error("graphics device lost")]
    DeviceLost,
    /// The loader threads are gone.
    #[error("tile loader shut down")]
    LoaderShutDown,
    /// A loader thread could not be started.
    #[error("failed to start tile loader: {0}")]
    Spawn(String),
}

impl From<ConfigError> for TileError {
    fn from(err: ConfigError) -> Self {
        TileError::Config(err.to_string())
    }
}
