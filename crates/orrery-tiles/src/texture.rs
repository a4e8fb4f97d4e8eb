//! Tile textures and the per-session texture cache.

use std::path::Path;
use std::sync::Arc;

use dashmap::DashMap;

use crate::{TileKey, TileLayer, TileSourceError};

const DDS_MAGIC: &[u8; 4] = b"DDS ";
const DDS_HEADER_SIZE: u32 = 124;
/// Magic plus header.
const DDS_DATA_OFFSET: usize = 4 + DDS_HEADER_SIZE as usize;

/// A decoded tile texture.
///
/// The pixel payload is kept in its on-disk (usually block-compressed) form
/// and handed to the device unchanged.
#[derive(Debug, PartialEq, Eq)]
pub struct Texture {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl Texture {
    /// Parse a DDS file image.
    ///
    /// Only the header fields the tile pipeline needs are validated: the
    /// magic, the header size and non-zero dimensions.
    pub fn from_dds(bytes: &[u8], path: &Path) -> Result<Self, TileSourceError> {
        let decode = |reason: &str| TileSourceError::Decode {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        };
        if bytes.len() < DDS_DATA_OFFSET {
            return Err(decode("truncated header"));
        }
        if &bytes[0..4] != DDS_MAGIC {
            return Err(decode("bad magic"));
        }
        let read_u32 = |at: usize| u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]]);
        if read_u32(4) != DDS_HEADER_SIZE {
            return Err(decode("bad header size"));
        }
        let height = read_u32(12);
        let width = read_u32(16);
        if width == 0 || height == 0 {
            return Err(decode("zero dimension"));
        }
        Ok(Self {
            width,
            height,
            data: bytes[DDS_DATA_OFFSET..].to_vec(),
        })
    }

    /// Build a minimal DDS file image; used by tests and tools that write
    /// tile trees.
    pub fn encode_dds(width: u32, height: u32, payload: &[u8]) -> Vec<u8> {
        let mut bytes = vec![0u8; DDS_DATA_OFFSET];
        bytes[0..4].copy_from_slice(DDS_MAGIC);
        bytes[4..8].copy_from_slice(&DDS_HEADER_SIZE.to_le_bytes());
        bytes[12..16].copy_from_slice(&height.to_le_bytes());
        bytes[16..20].copy_from_slice(&width.to_le_bytes());
        bytes.extend_from_slice(payload);
        bytes
    }
}

/// Key of one cached texture: a tile of one layer of one body.
type TextureId = (Arc<str>, TileLayer, TileKey);

/// Textures owned by live tiles, shared between the loader threads and the
/// render traversal.
///
/// One cache is created per session and handed to every tile manager of that
/// session; it is not a process-wide singleton. Entries are keyed by body as
/// well as tile, so managers of different bodies never share or evict each
/// other's textures.
#[derive(Default)]
pub struct TextureCache {
    textures: DashMap<TextureId, Arc<Texture>>,
}

impl TextureCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a freshly loaded texture, returning the shared handle.
    pub fn insert(
        &self,
        body: &Arc<str>,
        layer: TileLayer,
        key: TileKey,
        texture: Texture,
    ) -> Arc<Texture> {
        let texture = Arc::new(texture);
        self.textures
            .insert((Arc::clone(body), layer, key), Arc::clone(&texture));
        texture
    }

    /// Drop the cache's reference when the owning tile is freed.
    pub fn release(&self, body: &Arc<str>, layer: TileLayer, key: &TileKey) {
        self.textures.remove(&(Arc::clone(body), layer, *key));
    }

    #[cfg(test)]
    pub(crate) fn get(&self, body: &str, layer: TileLayer, key: &TileKey) -> Option<Arc<Texture>> {
        self.textures
            .get(&(Arc::from(body), layer, *key))
            .map(|t| Arc::clone(t.value()))
    }

    /// Number of cached textures.
    pub fn len(&self) -> usize {
        self.textures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.textures.is_empty()
    }

    /// Number of cached textures of one body.
    pub fn body_len(&self, body: &str) -> usize {
        self.textures.iter().filter(|t| &*t.key().0 == body).count()
    }

    /// Total payload bytes held by the cache.
    pub fn bytes(&self) -> usize {
        self.textures.iter().map(|t| t.value().data.len()).sum()
    }
}
