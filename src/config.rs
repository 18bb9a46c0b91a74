//! Configuration for opening a shared-memory disruptor handle.

use crate::constants::{shm_size, MAX_SEGMENT_NAME_LEN};
use crate::error::{DisruptorError, Result};
use crate::wait::SpinSleep;

/// Validated construction parameters for [`crate::ops::open`].
///
/// Built incrementally: `new` validates the required parameters, `with_*`
/// setters adjust the rest, each fallible setter re-validating its own
/// invariant immediately.
#[derive(Debug, Clone)]
pub struct SegmentConfig {
    name: String,
    num_elements: u32,
    element_size: u32,
    num_consumers: u32,
    consumer_index: Option<u32>,
    init: bool,
    spin_sleep: SpinSleep,
}

impl SegmentConfig {
    /// Start a configuration for the named segment with the given ring
    /// capacity and per-slot size. Defaults to zero consumers, no
    /// consumer role, non-initializing, non-blocking: the most
    /// conservative reading, a participant that neither creates nor
    /// consumes by default.
    pub fn new(name: impl Into<String>, num_elements: u32, element_size: u32) -> Result<Self> {
        let name = name.into();

        if name.len() > MAX_SEGMENT_NAME_LEN {
            return Err(DisruptorError::invalid_layout(format!(
                "segment name {name:?} exceeds {MAX_SEGMENT_NAME_LEN} bytes"
            )));
        }
        if num_elements == 0 {
            return Err(DisruptorError::invalid_layout("num_elements must be greater than 0"));
        }
        if element_size == 0 {
            return Err(DisruptorError::invalid_layout("element_size must be greater than 0"));
        }

        Ok(Self {
            name,
            num_elements,
            element_size,
            num_consumers: 0,
            consumer_index: None,
            init: false,
            spin_sleep: SpinSleep(crate::constants::DEFAULT_SPIN_SLEEP_MS),
        })
    }

    /// Set the number of consumer cursors allocated in the segment.
    pub fn with_num_consumers(mut self, num_consumers: u32) -> Self {
        self.num_consumers = num_consumers;
        self
    }

    /// This handle acts as consumer `index`; unused for a pure producer.
    pub fn with_consumer_index(mut self, index: u32) -> Self {
        self.consumer_index = Some(index);
        self
    }

    /// Whether this handle initializes (truncates + zero-fills) the
    /// segment on open.
    pub fn with_init(mut self, init: bool) -> Self {
        self.init = init;
        self
    }

    /// Backoff policy shared by claim, commit, and consume_new.
    pub fn with_spin_sleep(mut self, spin_sleep: i64) -> Self {
        self.spin_sleep = SpinSleep(spin_sleep);
        self
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn num_elements(&self) -> u32 {
        self.num_elements
    }

    pub(crate) fn element_size(&self) -> u32 {
        self.element_size
    }

    pub(crate) fn num_consumers(&self) -> u32 {
        self.num_consumers
    }

    pub(crate) fn consumer_index(&self) -> Option<u32> {
        self.consumer_index
    }

    pub(crate) fn init(&self) -> bool {
        self.init
    }

    pub(crate) fn spin_sleep(&self) -> SpinSleep {
        self.spin_sleep
    }

    /// Total size in bytes of the segment this configuration describes.
    pub fn shm_size(&self) -> usize {
        shm_size(self.num_consumers, self.num_elements, self.element_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_zero_capacity() {
        assert!(SegmentConfig::new("/x", 0, 1).is_err());
    }

    #[test]
    fn rejects_zero_element_size() {
        assert!(SegmentConfig::new("/x", 4, 0).is_err());
    }

    #[test]
    fn rejects_oversized_name() {
        let name = format!("/{}", "a".repeat(MAX_SEGMENT_NAME_LEN));
        assert!(SegmentConfig::new(name, 4, 1).is_err());
    }

    #[test]
    fn builder_defaults_to_non_blocking_no_consumer() {
        let config = SegmentConfig::new("/x", 4, 1).unwrap();
        assert_eq!(config.num_consumers(), 0);
        assert_eq!(config.consumer_index(), None);
        assert!(!config.init());
        assert!(config.spin_sleep().is_non_blocking());
    }

    #[test]
    fn shm_size_matches_layout() {
        let config = SegmentConfig::new("/x", 4, 1).unwrap().with_num_consumers(1);
        assert_eq!(config.shm_size(), (1 + 2) * 8 + 4);
    }
}
