//! Machine-readable dump of the engine's memory geometry.

use membase_core::heap::layout::{
    CHUNK_SIZE, CHUNKS_PER_PAGE, FIRST_ALLOCATABLE_CHUNK, GRANULE_SIZE, LARGE_OBJECT_HEADER_SIZE,
    LARGE_OBJECT_THRESHOLD, PAGE_HEADER_SIZE, PAGE_SIZE,
};
use membase_core::SizeClass;
use serde::{Deserialize, Serialize};

/// One small-object size class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizeClassRow {
    pub index: usize,
    pub label: String,
    pub granules: usize,
    pub slot_size: usize,
    pub slots_per_chunk: usize,
    /// Bytes at the start of a chunk that no slot covers.
    pub chunk_slack: usize,
}

/// Page, chunk and size-class geometry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutReport {
    pub page_size: usize,
    pub chunk_size: usize,
    pub chunks_per_page: usize,
    pub granule_size: usize,
    pub page_header_size: usize,
    pub first_allocatable_chunk: usize,
    pub large_object_header_size: usize,
    pub large_object_threshold: usize,
    /// Largest payload a single fresh page can hold.
    pub max_single_page_payload: usize,
    pub size_classes: Vec<SizeClassRow>,
}

impl LayoutReport {
    #[must_use]
    pub fn current() -> Self {
        let size_classes = SizeClass::all()
            .map(|class| SizeClassRow {
                index: class.index(),
                label: class.to_string(),
                granules: class.granules(),
                slot_size: class.slot_size(),
                slots_per_chunk: class.slots_per_chunk(),
                chunk_slack: CHUNK_SIZE - class.slots_per_chunk() * class.slot_size(),
            })
            .collect();
        Self {
            page_size: PAGE_SIZE,
            chunk_size: CHUNK_SIZE,
            chunks_per_page: CHUNKS_PER_PAGE,
            granule_size: GRANULE_SIZE,
            page_header_size: PAGE_HEADER_SIZE,
            first_allocatable_chunk: FIRST_ALLOCATABLE_CHUNK,
            large_object_header_size: LARGE_OBJECT_HEADER_SIZE,
            large_object_threshold: LARGE_OBJECT_THRESHOLD,
            max_single_page_payload: PAGE_SIZE - PAGE_HEADER_SIZE - LARGE_OBJECT_HEADER_SIZE,
            size_classes,
        }
    }

    /// Serialize to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
