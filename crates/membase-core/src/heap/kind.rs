//! Chunk kinds: the per-chunk byte in each page header.
//!
//! Only the head chunk of a large object carries a large-object kind. Interior
//! chunks of a multi-chunk object keep whatever byte they last held and are
//! never consulted.

use std::fmt;

use super::error::HeapError;
use super::size_class::{NUM_SIZE_CLASSES, SizeClass};

/// Kind byte of the head chunk of a free large object.
pub const FREE_LARGE_OBJECT: u8 = 254;
/// Kind byte of the head chunk of a large object in use.
pub const LARGE_OBJECT: u8 = 255;

/// Decoded chunk kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChunkKind {
    /// Carved into slots of one size class.
    Small(SizeClass),
    /// Head of a large object in use.
    LargeObject,
    /// Head of a large object on the large-object freelist.
    FreeLargeObject,
}

impl ChunkKind {
    /// Decodes a header byte, or `None` if no kind uses it.
    #[must_use]
    pub const fn from_byte(byte: u8) -> Option<ChunkKind> {
        match byte {
            LARGE_OBJECT => Some(ChunkKind::LargeObject),
            FREE_LARGE_OBJECT => Some(ChunkKind::FreeLargeObject),
            b if (b as usize) < NUM_SIZE_CLASSES => match SizeClass::from_index(b as usize) {
                Some(class) => Some(ChunkKind::Small(class)),
                None => None,
            },
            _ => None,
        }
    }

    /// Decodes the kind byte found for the chunk holding `ptr`.
    pub fn decode(byte: u8, ptr: usize) -> Result<ChunkKind, HeapError> {
        Self::from_byte(byte).ok_or(HeapError::CorruptChunkKind { ptr, kind: byte })
    }

    /// Header byte for this kind.
    #[must_use]
    pub const fn to_byte(self) -> u8 {
        match self {
            ChunkKind::Small(class) => class.index() as u8,
            ChunkKind::LargeObject => LARGE_OBJECT,
            ChunkKind::FreeLargeObject => FREE_LARGE_OBJECT,
        }
    }
}

impl fmt::Display for ChunkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChunkKind::Small(class) => write!(f, "small:{class}"),
            ChunkKind::LargeObject => f.write_str("large"),
            ChunkKind::FreeLargeObject => f.write_str("free_large"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_kind_survives_its_byte() {
        let kinds = SizeClass::all()
            .map(ChunkKind::Small)
            .chain([ChunkKind::LargeObject, ChunkKind::FreeLargeObject]);
        for kind in kinds {
            assert_eq!(ChunkKind::from_byte(kind.to_byte()), Some(kind));
        }
    }

    #[test]
    fn test_unused_bytes_are_corrupt() {
        for byte in NUM_SIZE_CLASSES as u8..FREE_LARGE_OBJECT {
            assert_eq!(ChunkKind::from_byte(byte), None);
        }
        assert_eq!(
            ChunkKind::decode(77, 0x10200),
            Err(HeapError::CorruptChunkKind {
                ptr: 0x10200,
                kind: 77
            })
        );
    }

    #[test]
    fn test_fresh_page_bytes_read_as_smallest_class() {
        assert_eq!(
            ChunkKind::from_byte(0),
            SizeClass::from_index(0).map(ChunkKind::Small)
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(ChunkKind::Small(SizeClass::WHOLE_CHUNK).to_string(), "small:G32");
        assert_eq!(ChunkKind::FreeLargeObject.to_string(), "free_large");
    }
}
