//! Error types for the shared-memory disruptor.

use thiserror::Error;

/// Result type alias for disruptor operations.
pub type Result<T> = std::result::Result<T, DisruptorError>;

/// Error taxonomy for the shared-memory disruptor.
///
/// `ContentionMiss` is deliberately absent from this enum: contention is
/// not an error, it is represented in-band as an empty span, an empty
/// span list, or `false` (see the `*_sync`/`*_async` return types in
/// [`crate::ops`]).
#[derive(Error, Debug)]
pub enum DisruptorError {
    /// The named shared-memory object could not be opened (`shm_open` failed).
    #[error("failed to open shared memory segment {name:?}: {source}")]
    SegmentOpenError {
        /// Segment name that failed to open.
        name: String,
        /// Underlying OS error.
        #[source]
        source: std::io::Error,
    },

    /// The segment could not be sized (`ftruncate` failed).
    #[error("failed to size shared memory segment {name:?}: {source}")]
    SegmentSizeError {
        /// Segment name that failed to size.
        name: String,
        /// Underlying OS error.
        #[source]
        source: std::io::Error,
    },

    /// The segment could not be mapped into this process (`mmap` failed).
    #[error("failed to map shared memory segment {name:?}: {source}")]
    SegmentMapError {
        /// Segment name that failed to map.
        name: String,
        /// Underlying OS error.
        #[source]
        source: std::io::Error,
    },

    /// The segment could not be unmapped (`munmap` failed).
    #[error("failed to unmap shared memory segment {name:?}: {source}")]
    SegmentUnmapError {
        /// Segment name that failed to unmap.
        name: String,
        /// Underlying OS error.
        #[source]
        source: std::io::Error,
    },

    /// A configuration parameter is invalid for the segment layout.
    #[error("invalid segment layout: {reason}")]
    InvalidLayout {
        /// Description of what made the layout invalid.
        reason: String,
    },

    /// `consumer_index` was not in `[0, num_consumers)`.
    #[error("consumer index {consumer_index} out of range for {num_consumers} consumers")]
    ConsumerIndexOutOfRange {
        /// The out-of-range index the caller requested.
        consumer_index: u32,
        /// The configured number of consumers.
        num_consumers: u32,
    },
}

impl DisruptorError {
    /// Create an [`DisruptorError::InvalidLayout`] from any displayable reason.
    pub fn invalid_layout(reason: impl Into<String>) -> Self {
        Self::InvalidLayout { reason: reason.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_layout_carries_reason() {
        let err = DisruptorError::invalid_layout("num_elements must be greater than 0");
        assert!(matches!(err, DisruptorError::InvalidLayout { .. }));
        assert!(err.to_string().contains("greater than 0"));
    }

    #[test]
    fn consumer_index_out_of_range_message() {
        let err = DisruptorError::ConsumerIndexOutOfRange { consumer_index: 3, num_consumers: 2 };
        assert!(err.to_string().contains('3'));
        assert!(err.to_string().contains('2'));
    }
}
