//! The on-disk chunk store.
//!
//! A persisted chunk is a gzip-compressed tag tree with a `Level`
//! compound holding the position, the four block arrays, the height map
//! and an optional entity list. [`ChunkReader`] validates and exposes
//! those fields; [`ChunkStore`] finds chunk files under a world
//! directory using the base-36 directory layout.

use crate::chunk::ChunkData;
use chunkwright_core::{ChunkPos, CHUNK_VOLUME, HEIGHT_MAP_LEN, NIBBLE_VOLUME};
use chunkwright_nbt::{NbtError, Value};
use flate2::read::GzDecoder;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors from loading persisted chunks.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("i/o error reading chunk file")]
    Io(#[from] std::io::Error),
    #[error("chunk tag stream is malformed")]
    Nbt(#[from] NbtError),
    #[error("malformed chunk: missing or mistyped {0}")]
    MalformedChunk(&'static str),
}

/// A loaded chunk tag tree with typed accessors over the `Level` paths.
pub struct ChunkReader {
    root: Value,
}

impl ChunkReader {
    /// Parse an uncompressed tag stream.
    pub fn read<R: Read>(reader: &mut R) -> Result<Self, StoreError> {
        let root = chunkwright_nbt::read(reader)?;
        Ok(Self { root })
    }

    /// Parse a gzip-compressed tag stream, the on-disk encoding.
    pub fn read_compressed<R: Read>(reader: R) -> Result<Self, StoreError> {
        let mut decoder = GzDecoder::new(reader);
        Self::read(&mut decoder)
    }

    fn int(&self, path: &'static str) -> Result<i32, StoreError> {
        self.root
            .lookup(path)
            .and_then(Value::as_int)
            .ok_or(StoreError::MalformedChunk(path))
    }

    fn byte_array(&self, path: &'static str, len: usize) -> Result<&[u8], StoreError> {
        let bytes = self
            .root
            .lookup(path)
            .and_then(Value::as_byte_array)
            .ok_or(StoreError::MalformedChunk(path))?;
        if bytes.len() != len {
            return Err(StoreError::MalformedChunk(path));
        }
        Ok(bytes)
    }

    /// World position recorded in the chunk.
    pub fn location(&self) -> Result<ChunkPos, StoreError> {
        Ok(ChunkPos::new(
            self.int("Level/xPos")?,
            self.int("Level/zPos")?,
        ))
    }

    pub fn blocks(&self) -> Result<&[u8], StoreError> {
        self.byte_array("Level/Blocks", CHUNK_VOLUME)
    }

    pub fn block_data(&self) -> Result<&[u8], StoreError> {
        self.byte_array("Level/Data", NIBBLE_VOLUME)
    }

    pub fn block_light(&self) -> Result<&[u8], StoreError> {
        self.byte_array("Level/BlockLight", NIBBLE_VOLUME)
    }

    pub fn sky_light(&self) -> Result<&[u8], StoreError> {
        self.byte_array("Level/SkyLight", NIBBLE_VOLUME)
    }

    pub fn height_map(&self) -> Result<&[u8], StoreError> {
        self.byte_array("Level/HeightMap", HEIGHT_MAP_LEN)
    }

    /// Entity compounds stored with the chunk. A missing list is
    /// tolerated and reads as empty.
    pub fn entities(&self) -> &[Value] {
        self.root
            .lookup("Level/Entities")
            .and_then(Value::as_list)
            .unwrap_or(&[])
    }

    /// The whole tag tree, for callers that need more than the standard
    /// fields.
    pub fn raw_root(&self) -> &Value {
        &self.root
    }

    /// Assemble the block arrays into in-memory chunk data.
    pub fn chunk_data(&self) -> Result<ChunkData, StoreError> {
        ChunkData::from_arrays(
            self.blocks()?,
            self.block_data()?,
            self.block_light()?,
            self.sky_light()?,
            self.height_map()?,
        )
        .ok_or(StoreError::MalformedChunk("Level block arrays"))
    }
}

/// Read-only access to the chunk files of a world directory.
pub struct ChunkStore {
    world_dir: PathBuf,
}

impl ChunkStore {
    pub fn new<P: AsRef<Path>>(world_dir: P) -> Self {
        Self {
            world_dir: world_dir.as_ref().to_path_buf(),
        }
    }

    /// Path of the chunk file for `loc`: two base-36 bucket directories
    /// over the low six bits, then `c.<x>.<z>.dat`.
    pub fn chunk_path(&self, loc: ChunkPos) -> PathBuf {
        self.world_dir
            .join(base36(loc.x.rem_euclid(64) as i64))
            .join(base36(loc.z.rem_euclid(64) as i64))
            .join(format!("c.{}.{}.dat", base36(loc.x as i64), base36(loc.z as i64)))
    }

    /// Load the persisted chunk at `loc`, or `Ok(None)` when no file
    /// exists for it.
    pub fn load(&self, loc: ChunkPos) -> Result<Option<ChunkReader>, StoreError> {
        let path = self.chunk_path(loc);
        let file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(ChunkReader::read_compressed(file)?))
    }
}

/// Lowercase base-36 rendering with a leading minus for negatives.
fn base36(mut n: i64) -> String {
    const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".to_string();
    }
    let negative = n < 0;
    if negative {
        n = -n;
    }
    let mut out = Vec::new();
    while n > 0 {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    if negative {
        out.push(b'-');
    }
    out.reverse();
    String::from_utf8(out).expect("base36 digits are ascii")
}
