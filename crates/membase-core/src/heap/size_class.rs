//! Small-object size classes.
//!
//! Requests of at most one chunk are rounded up to a whole number of 8-byte
//! granules and then to the smallest class that holds them. Each class keeps
//! its own LIFO freelist; the largest class (32 granules) is a whole chunk and
//! doubles as the pool that large-object leftovers are recycled into.

use std::fmt;

use super::layout::{CHUNK_SIZE, GRANULE_SIZE};

/// Granule counts for each class, ascending.
pub const SMALL_OBJECT_GRANULES: [usize; NUM_SIZE_CLASSES] = [1, 2, 3, 4, 5, 6, 8, 10, 16, 32];

/// Number of small-object size classes.
pub const NUM_SIZE_CLASSES: usize = 10;

const _: () = assert!(SMALL_OBJECT_GRANULES[NUM_SIZE_CLASSES - 1] * GRANULE_SIZE == CHUNK_SIZE);

/// A small-object size class, identified by its index into
/// [`SMALL_OBJECT_GRANULES`].
///
/// The index doubles as the chunk-kind byte for chunks carved into slots of
/// this class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SizeClass(u8);

impl SizeClass {
    /// The 32-granule class: one slot per chunk.
    pub const WHOLE_CHUNK: SizeClass = SizeClass((NUM_SIZE_CLASSES - 1) as u8);

    /// Returns the class at `index`, or `None` if out of range.
    #[must_use]
    pub const fn from_index(index: usize) -> Option<SizeClass> {
        if index < NUM_SIZE_CLASSES {
            Some(SizeClass(index as u8))
        } else {
            None
        }
    }

    /// Index into the class table (also the chunk-kind byte).
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Granules per slot.
    #[must_use]
    pub const fn granules(self) -> usize {
        SMALL_OBJECT_GRANULES[self.0 as usize]
    }

    /// Bytes per slot.
    #[must_use]
    pub const fn slot_size(self) -> usize {
        self.granules() * GRANULE_SIZE
    }

    /// Slots carved out of one chunk. Any remainder sits at the chunk start
    /// and is never handed out.
    #[must_use]
    pub const fn slots_per_chunk(self) -> usize {
        CHUNK_SIZE / self.slot_size()
    }

    /// All classes, ascending by size.
    pub fn all() -> impl Iterator<Item = SizeClass> {
        (0..NUM_SIZE_CLASSES as u8).map(SizeClass)
    }
}

impl fmt::Display for SizeClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "G{}", self.granules())
    }
}

/// Granules needed for `size` bytes. Zero bytes still take one granule.
#[inline]
#[must_use]
pub const fn size_to_granules(size: usize) -> usize {
    if size == 0 {
        1
    } else {
        size.div_ceil(GRANULE_SIZE)
    }
}

/// Smallest class holding `granules`, or `None` above one chunk.
#[must_use]
pub fn granules_to_class(granules: usize) -> Option<SizeClass> {
    SMALL_OBJECT_GRANULES
        .iter()
        .position(|&g| granules <= g)
        .and_then(SizeClass::from_index)
}

/// Class for a request of `size` bytes, or `None` if it is a large object.
#[must_use]
pub fn size_to_class(size: usize) -> Option<SizeClass> {
    granules_to_class(size_to_granules(size))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_granule_rounding() {
        assert_eq!(size_to_granules(0), 1);
        assert_eq!(size_to_granules(1), 1);
        assert_eq!(size_to_granules(8), 1);
        assert_eq!(size_to_granules(9), 2);
        assert_eq!(size_to_granules(256), 32);
        assert_eq!(size_to_granules(257), 33);
    }

    #[test]
    fn test_class_boundaries() {
        let cases = [
            (1, 8),
            (8, 8),
            (9, 16),
            (24, 24),
            (25, 32),
            (48, 48),
            (49, 64),
            (65, 80),
            (81, 128),
            (129, 256),
            (256, 256),
        ];
        for (size, slot) in cases {
            let class = size_to_class(size).expect("small");
            assert_eq!(class.slot_size(), slot, "size {size}");
        }
    }

    #[test]
    fn test_large_sizes_have_no_class() {
        assert_eq!(size_to_class(257), None);
        assert_eq!(size_to_class(4096), None);
        assert_eq!(granules_to_class(33), None);
    }

    #[test]
    fn test_smallest_fitting_class() {
        for size in 0..=CHUNK_SIZE {
            let class = size_to_class(size).expect("small");
            assert!(class.slot_size() >= size);
            if class.index() > 0 {
                let smaller = SizeClass::from_index(class.index() - 1).expect("in range");
                assert!(smaller.slot_size() < size.max(1), "size {size}");
            }
        }
    }

    #[test]
    fn test_slots_per_chunk() {
        let counts: Vec<usize> = SizeClass::all().map(SizeClass::slots_per_chunk).collect();
        assert_eq!(counts, vec![32, 16, 10, 8, 6, 5, 4, 3, 2, 1]);
        assert_eq!(SizeClass::WHOLE_CHUNK.slot_size(), CHUNK_SIZE);
    }

    #[test]
    fn test_display() {
        assert_eq!(SizeClass::WHOLE_CHUNK.to_string(), "G32");
        assert_eq!(SizeClass::from_index(0).map(|c| c.to_string()), Some("G1".into()));
    }
}
