//! Layout and defaults for the shared-memory disruptor.
//!
//! This module contains the handful of constants that producers and
//! consumers in different processes must agree on bit-for-bit, plus the
//! library's default tuning knobs.

/// Size in bytes of one sequence counter (`consumers[i]`, `cursor`, `next`).
///
/// Every offset in the segment layout table below is expressed as a
/// multiple of this width.
pub const SEQUENCE_WIDTH: usize = std::mem::size_of::<u64>();

static_assertions::const_assert_eq!(SEQUENCE_WIDTH, std::mem::size_of::<std::sync::atomic::AtomicU64>());

/// Number of fixed counter fields ahead of the consumer array's per-entry
/// width: `cursor` and `next`.
pub const FIXED_COUNTER_FIELDS: usize = 2;

/// Owner-read/owner-write permission mode used when creating a segment.
pub const SEGMENT_CREATE_MODE: u32 = 0o600;

/// Default `spin_sleep`: non-blocking.
pub const DEFAULT_SPIN_SLEEP_MS: i64 = -1;

/// Maximum shared-memory object name length (POSIX `NAME_MAX` on Linux's
/// `tmpfs`-backed `/dev/shm`, conservatively applied on every platform).
pub const MAX_SEGMENT_NAME_LEN: usize = 255;

/// Compute the total shared segment size for a given layout:
/// `shm_size = (num_consumers + 2) * 8 + num_elements * element_size`.
#[inline]
pub fn shm_size(num_consumers: u32, num_elements: u32, element_size: u32) -> usize {
    (num_consumers as usize + FIXED_COUNTER_FIELDS) * SEQUENCE_WIDTH
        + (num_elements as usize) * (element_size as usize)
}

/// Byte offset of the `cursor` field within the segment.
#[inline]
pub fn cursor_offset(num_consumers: u32) -> usize {
    (num_consumers as usize) * SEQUENCE_WIDTH
}

/// Byte offset of the `next` field within the segment.
#[inline]
pub fn next_offset(num_consumers: u32) -> usize {
    cursor_offset(num_consumers) + SEQUENCE_WIDTH
}

/// Byte offset of the `elements` region within the segment.
#[inline]
pub fn elements_offset(num_consumers: u32) -> usize {
    next_offset(num_consumers) + SEQUENCE_WIDTH
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shm_size_matches_layout_table() {
        // capacity 4, 1 byte per element, 1 consumer:
        // (1 + 2) * 8 + 4 * 1 = 28
        assert_eq!(shm_size(1, 4, 1), 28);
    }

    #[test]
    fn offsets_are_monotonically_increasing() {
        let num_consumers = 3;
        assert!(cursor_offset(num_consumers) < next_offset(num_consumers));
        assert!(next_offset(num_consumers) < elements_offset(num_consumers));
        assert_eq!(cursor_offset(num_consumers), (num_consumers as usize) * SEQUENCE_WIDTH);
        assert_eq!(elements_offset(num_consumers) - next_offset(num_consumers), SEQUENCE_WIDTH);
    }

    #[test]
    fn sequence_width_is_eight_bytes() {
        assert_eq!(SEQUENCE_WIDTH, 8);
    }
}
