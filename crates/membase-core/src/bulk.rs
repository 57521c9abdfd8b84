//! Bulk memory operations on byte slices: copy, move, fill.
//!
//! These back the slice-based host memory provider. Counts are clamped to
//! the slices given, so a short buffer never panics.

/// Copies `n` bytes from `src` into `dest`.
///
/// Only `min(n, src.len(), dest.len())` bytes are copied. Returns the count.
pub fn copy(dest: &mut [u8], src: &[u8], n: usize) -> usize {
    let count = n.min(dest.len()).min(src.len());
    dest[..count].copy_from_slice(&src[..count]);
    count
}

/// Moves `n` bytes inside `buf` from offset `src` to offset `dst`. The ranges
/// may overlap.
///
/// The count is clamped so neither range leaves `buf`. Returns the count.
pub fn move_within(buf: &mut [u8], src: usize, dst: usize, n: usize) -> usize {
    let len = buf.len();
    if src >= len || dst >= len {
        return 0;
    }
    let count = n.min(len - src).min(len - dst);
    buf.copy_within(src..src + count, dst);
    count
}

/// Fills the first `n` bytes of `dest` with `value`. Returns the count.
pub fn fill(dest: &mut [u8], value: u8, n: usize) -> usize {
    let count = n.min(dest.len());
    dest[..count].fill(value);
    count
}
