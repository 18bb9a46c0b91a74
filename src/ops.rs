//! Operation surface: `open`, `release`, and the sync/async pairs for
//! claim, commit, and consume.
//!
//! There is exactly one algorithm implementation —
//! [`crate::handle::DisruptorHandle`]'s methods. The `_async` variants
//! here are a thin adapter: dispatch the same synchronous body onto a
//! worker thread and hand the result back through a `JoinHandle`. The
//! underlying segment is never touched by more than one in-flight
//! operation's worth of work at a time per handle, so running the
//! identical body on a different thread changes nothing about
//! correctness.

use std::sync::Arc;

use crate::config::SegmentConfig;
use crate::error::{DisruptorError, Result};
use crate::handle::{DisruptorHandle, Span};
use crate::segment::SharedSegment;

/// Open (and, if configured, initialize) a handle onto the named segment.
pub fn open(config: &SegmentConfig) -> Result<DisruptorHandle> {
    let segment = SharedSegment::open(config.name(), config.shm_size(), config.init())?;
    DisruptorHandle::new(
        segment,
        config.num_elements(),
        config.element_size(),
        config.num_consumers(),
        config.consumer_index(),
        config.spin_sleep(),
    )
}

/// Unmap a handle. Idempotent.
pub fn release(handle: &mut DisruptorHandle) -> Result<()> {
    handle.release()
}

/// Claim the next slot, synchronously.
pub fn produce_claim_sync(handle: &DisruptorHandle) -> Span {
    handle.produce_claim()
}

/// Publish a previously claimed slot, synchronously.
pub fn produce_commit_sync(handle: &DisruptorHandle, seq_next: u64) -> bool {
    handle.produce_commit(seq_next)
}

/// Return the unread range as 0, 1, or 2 spans, synchronously.
pub fn consume_new_sync(handle: &DisruptorHandle) -> Result<Vec<Span>> {
    handle.consume_new()
}

/// Advance the consumer cursor past the last `consume_new` range.
///
/// Always synchronous — there is nothing to wait on.
pub fn consume_commit(handle: &DisruptorHandle) {
    handle.consume_commit()
}

#[cfg(feature = "tokio-runtime")]
mod asynchronous {
    use super::*;

    /// Claim the next slot on a worker thread.
    pub async fn produce_claim_async(handle: Arc<DisruptorHandle>) -> Result<Span> {
        tokio::task::spawn_blocking(move || handle.produce_claim())
            .await
            .map_err(|e| DisruptorError::invalid_layout(format!("produce_claim_async worker panicked: {e}")))
    }

    /// Publish a previously claimed slot on a worker thread.
    pub async fn produce_commit_async(handle: Arc<DisruptorHandle>, seq_next: u64) -> Result<bool> {
        tokio::task::spawn_blocking(move || handle.produce_commit(seq_next))
            .await
            .map_err(|e| DisruptorError::invalid_layout(format!("produce_commit_async worker panicked: {e}")))
    }

    /// Return the unread range as 0, 1, or 2 spans, on a worker thread.
    pub async fn consume_new_async(handle: Arc<DisruptorHandle>) -> Result<Vec<Span>> {
        tokio::task::spawn_blocking(move || handle.consume_new())
            .await
            .map_err(|e| DisruptorError::invalid_layout(format!("consume_new_async worker panicked: {e}")))?
    }
}

#[cfg(feature = "tokio-runtime")]
pub use asynchronous::{consume_new_async, produce_claim_async, produce_commit_async};

#[cfg(test)]
mod tests {
    use super::*;

    fn unique_name(tag: &str) -> String {
        format!("/shm-disruptor-test-ops-{tag}-{}", std::process::id())
    }

    fn unlink(name: &str) {
        use std::ffi::CString;
        nix::sys::mman::shm_unlink(CString::new(name).unwrap().as_c_str()).ok();
    }

    #[test]
    fn open_round_trips_a_byte() {
        let name = unique_name("round-trip");
        let config = SegmentConfig::new(&name, 4, 1).unwrap().with_num_consumers(1).with_consumer_index(0).with_init(true);

        let handle = open(&config).unwrap();
        let mut span = produce_claim_sync(&handle);
        span.as_mut_slice()[0] = 7;
        assert!(produce_commit_sync(&handle, span.seq()));

        let spans = consume_new_sync(&handle).unwrap();
        assert_eq!(spans[0].as_slice(), &[7]);
        consume_commit(&handle);

        unlink(&name);
    }

    #[test]
    fn release_then_reopen_same_name() {
        let name = unique_name("release-reopen");
        let config = SegmentConfig::new(&name, 4, 1).unwrap().with_init(true);
        let mut handle = open(&config).unwrap();
        release(&mut handle).unwrap();

        let reopened = open(&config.clone().with_init(false)).unwrap();
        drop(reopened);
        unlink(&name);
    }

    #[cfg(feature = "tokio-runtime")]
    #[tokio::test]
    async fn async_claim_and_commit_round_trip() {
        let name = unique_name("async-round-trip");
        let config = SegmentConfig::new(&name, 4, 1).unwrap().with_num_consumers(1).with_consumer_index(0).with_init(true);
        let handle = Arc::new(open(&config).unwrap());

        let mut span = produce_claim_async(handle.clone()).await.unwrap();
        span.as_mut_slice()[0] = 9;
        let seq = span.seq();
        assert!(produce_commit_async(handle.clone(), seq).await.unwrap());

        let spans = consume_new_async(handle.clone()).await.unwrap();
        assert_eq!(spans[0].as_slice(), &[9]);
        consume_commit(&handle);

        unlink(&name);
    }
}
