//! Per-process handle: claim/commit (producer path) and
//! consume_new/consume_commit (consumer path).
//!
//! Every counter access here is sequentially consistent, full-barrier
//! atomic read-modify-write; this is the one place in the crate where we
//! deliberately don't reach for the cheaper acquire/release orderings a
//! single-process ring buffer would use, since the cost of a stray
//! reorder is a torn read in another process.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::constants::{cursor_offset, elements_offset, next_offset};
use crate::error::{DisruptorError, Result};
use crate::segment::SharedSegment;
use crate::sequence;
use crate::wait::SpinSleep;

/// Sentinel `consumer_index` recorded when a handle has no consumer role,
/// disabling the consumer operations on that handle.
const NO_CONSUMER: u32 = u32::MAX;

/// A byte span inside the shared segment, tagged with the sequence it
/// corresponds to (meaningful for producer spans; `0` for consumer spans,
/// which carry no single sequence).
///
/// Aliases the shared segment directly. Callers must not touch it after
/// the next commit on the same handle.
pub struct Span {
    ptr: *mut u8,
    len: usize,
    seq: u64,
}

// SAFETY: `ptr` addresses memory inside a `MAP_SHARED` segment (see
// `SharedSegment`'s own `Send`/`Sync` impl); a `Span` is a plain
// address+length with no thread affinity, so handing one to another
// thread (e.g. to complete an async operation dispatched via
// `spawn_blocking`) is sound.
unsafe impl Send for Span {}
unsafe impl Sync for Span {}

impl Span {
    fn empty() -> Self {
        Self { ptr: std::ptr::null_mut(), len: 0, seq: 0 }
    }

    /// The sequence this span was claimed at (producer spans only).
    #[inline]
    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// Number of bytes in this span.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether this span carries no bytes (a non-blocking miss).
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Borrow the span's bytes.
    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        if self.len == 0 {
            &[]
        } else {
            // SAFETY: `ptr` points `len` bytes into the mapped segment
            // (see `DisruptorHandle::make_span`/`produce_claim`), which
            // outlives this span for the handle's lifetime.
            unsafe { std::slice::from_raw_parts(self.ptr, self.len) }
        }
    }

    /// Mutably borrow the span's bytes (producers only write before commit).
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        if self.len == 0 {
            &mut []
        } else {
            // SAFETY: see `as_slice`; exclusive access is the caller's
            // responsibility between claim and commit.
            unsafe { std::slice::from_raw_parts_mut(self.ptr, self.len) }
        }
    }
}

/// A per-process handle onto an open shared segment.
pub struct DisruptorHandle {
    segment: SharedSegment,
    num_elements: u32,
    element_size: u32,
    num_consumers: u32,
    consumer_index: u32,
    spin_sleep: SpinSleep,
    pending_consumer: AtomicU64,
    pending_cursor: AtomicU64,
}

impl DisruptorHandle {
    pub(crate) fn new(
        segment: SharedSegment,
        num_elements: u32,
        element_size: u32,
        num_consumers: u32,
        consumer_index: Option<u32>,
        spin_sleep: SpinSleep,
    ) -> Result<Self> {
        let consumer_index = match consumer_index {
            Some(i) if i < num_consumers => i,
            Some(i) => return Err(DisruptorError::ConsumerIndexOutOfRange { consumer_index: i, num_consumers }),
            None => NO_CONSUMER,
        };

        Ok(Self {
            segment,
            num_elements,
            element_size,
            num_consumers,
            consumer_index,
            spin_sleep,
            pending_consumer: AtomicU64::new(0),
            pending_cursor: AtomicU64::new(0),
        })
    }

    /// Unmap the underlying segment. Idempotent.
    pub fn release(&mut self) -> Result<()> {
        self.segment.release()
    }

    #[inline]
    fn num_elements_u64(&self) -> u64 {
        self.num_elements as u64
    }

    #[inline]
    fn base(&self) -> *mut u8 {
        self.segment.as_ptr()
    }

    #[inline]
    fn consumer_seq(&self, index: u32) -> &AtomicU64 {
        // SAFETY: `index < num_consumers` is enforced at every call site
        // (construction-time for `self.consumer_index`, a bounds check in
        // `produce_claim`'s loop over all consumers); the target address
        // is within the segment and naturally aligned per the layout
        // table in the module-level docs.
        unsafe { &*(self.base().add(index as usize * crate::constants::SEQUENCE_WIDTH) as *const AtomicU64) }
    }

    #[inline]
    fn cursor(&self) -> &AtomicU64 {
        // SAFETY: see `consumer_seq`; offset from the segment layout table.
        unsafe { &*(self.base().add(cursor_offset(self.num_consumers)) as *const AtomicU64) }
    }

    #[inline]
    fn next(&self) -> &AtomicU64 {
        // SAFETY: see `consumer_seq`.
        unsafe { &*(self.base().add(next_offset(self.num_consumers)) as *const AtomicU64) }
    }

    #[inline]
    fn elements(&self) -> *mut u8 {
        // SAFETY: see `consumer_seq`.
        unsafe { self.base().add(elements_offset(self.num_consumers)) }
    }

    #[inline]
    fn make_span(&self, pos_start: u64, pos_end: u64, seq: u64) -> Span {
        let offset = pos_start as usize * self.element_size as usize;
        let len = (pos_end - pos_start) as usize * self.element_size as usize;
        // SAFETY: `pos_start`/`pos_end` are bounded by `num_elements`
        // (callers derive them from `sequence::pos`), so the resulting
        // range lies within the `elements` region mapped by the segment.
        let ptr = unsafe { self.elements().add(offset) };
        Span { ptr, len, seq }
    }

    fn require_consumer(&self) -> Result<u32> {
        if self.consumer_index == NO_CONSUMER {
            Err(DisruptorError::ConsumerIndexOutOfRange { consumer_index: NO_CONSUMER, num_consumers: self.num_consumers })
        } else {
            Ok(self.consumer_index)
        }
    }

    /// Claim the next slot. Returns an empty span on a non-blocking miss
    /// (`spin_sleep < 0`).
    pub fn produce_claim(&self) -> Span {
        loop {
            let seq_next = self.next().load(Ordering::SeqCst);
            let pos_next = sequence::pos(seq_next, self.num_elements_u64());

            let mut blocked = false;
            for i in 0..self.num_consumers {
                let consumer_seq = self.consumer_seq(i).load(Ordering::SeqCst);
                if sequence::consumer_blocks_claim(consumer_seq, seq_next, self.num_elements_u64()) {
                    blocked = true;
                    break;
                }
            }

            if !blocked
                && self
                    .next()
                    .compare_exchange(seq_next, seq_next + 1, Ordering::SeqCst, Ordering::SeqCst)
                    .is_ok()
            {
                tracing::trace!(seq_next, "claimed slot");
                return self.make_span(pos_next, pos_next + 1, seq_next);
            }

            if !self.spin_sleep.back_off() {
                return Span::empty();
            }
        }
    }

    /// Publish a previously claimed slot.
    ///
    /// Callers must not retry a call that already returned `true`.
    pub fn produce_commit(&self, seq_next: u64) -> bool {
        loop {
            if self.cursor().compare_exchange(seq_next, seq_next + 1, Ordering::SeqCst, Ordering::SeqCst).is_ok() {
                tracing::trace!(seq_next, "committed slot");
                return true;
            }

            if !self.spin_sleep.back_off() {
                return false;
            }
        }
    }

    /// Return the unread range as 0, 1, or 2 spans.
    ///
    /// Performs the deferred commit of any range returned by a previous
    /// call before computing the new one.
    pub fn consume_new(&self) -> Result<Vec<Span>> {
        let consumer_index = self.require_consumer()?;
        self.consume_commit();

        loop {
            let seq_consumer = self.consumer_seq(consumer_index).load(Ordering::SeqCst);
            // The cursor load happens-after the consumer load in program
            // order; combined with SeqCst on both this guarantees every
            // byte in the returned range was visibly committed.
            let seq_cursor = self.cursor().load(Ordering::SeqCst);

            let pos_c = sequence::pos(seq_consumer, self.num_elements_u64());
            let pos_k = sequence::pos(seq_cursor, self.num_elements_u64());

            if pos_k > pos_c {
                let spans = vec![self.make_span(pos_c, pos_k, 0)];
                self.set_pending(seq_consumer, seq_cursor);
                return Ok(spans);
            } else if seq_cursor != seq_consumer {
                let mut spans = vec![self.make_span(pos_c, self.num_elements_u64(), 0)];
                if pos_k > 0 {
                    spans.push(self.make_span(0, pos_k, 0));
                }
                self.set_pending(seq_consumer, seq_cursor);
                return Ok(spans);
            } else if !self.spin_sleep.back_off() {
                return Ok(Vec::new());
            }
        }
    }

    /// Advance this handle's consumer cursor past the range returned by
    /// the last `consume_new` call, if any. A no-op if there is nothing
    /// pending, including when called twice in a row.
    pub fn consume_commit(&self) {
        let consumer_index = match self.consumer_index {
            NO_CONSUMER => return,
            i => i,
        };

        let pending_cursor = self.pending_cursor.load(Ordering::SeqCst);
        if pending_cursor == 0 {
            return;
        }
        let pending_consumer = self.pending_consumer.load(Ordering::SeqCst);

        // Defense-in-depth: only one thread is expected to operate a
        // given consumer index, so this CAS should never fail in
        // practice.
        let _ = self.consumer_seq(consumer_index).compare_exchange(
            pending_consumer,
            pending_cursor,
            Ordering::SeqCst,
            Ordering::SeqCst,
        );

        self.pending_consumer.store(0, Ordering::SeqCst);
        self.pending_cursor.store(0, Ordering::SeqCst);
    }

    fn set_pending(&self, consumer: u64, cursor: u64) {
        self.pending_consumer.store(consumer, Ordering::SeqCst);
        self.pending_cursor.store(cursor, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::shm_size;

    fn open_handle(name: &str, num_elements: u32, element_size: u32, num_consumers: u32, consumer_index: Option<u32>, init: bool) -> DisruptorHandle {
        let size = shm_size(num_consumers, num_elements, element_size);
        let segment = SharedSegment::open(name, size, init).unwrap();
        DisruptorHandle::new(segment, num_elements, element_size, num_consumers, consumer_index, SpinSleep(-1)).unwrap()
    }

    fn unlink(name: &str) {
        use std::ffi::CString;
        nix::sys::mman::shm_unlink(CString::new(name).unwrap().as_c_str()).ok();
    }

    #[test]
    fn single_producer_single_consumer_round_trip() {
        let name = format!("/shm-disruptor-test-spsc-round-trip-{}", std::process::id());
        let handle = open_handle(&name, 4, 1, 1, Some(0), true);

        let mut span = handle.produce_claim();
        assert_eq!(span.seq(), 0);
        span.as_mut_slice()[0] = 0x41;
        assert!(handle.produce_commit(0));

        let spans = handle.consume_new().unwrap();
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].as_slice(), &[0x41]);
        handle.consume_commit();

        assert_eq!(handle.next().load(Ordering::SeqCst), 1);
        assert_eq!(handle.cursor().load(Ordering::SeqCst), 1);
        assert_eq!(handle.consumer_seq(0).load(Ordering::SeqCst), 1);

        unlink(&name);
    }

    #[test]
    fn wrap_blocks_claim_until_consumed() {
        let name = format!("/shm-disruptor-test-wrap-blocks-claim-{}", std::process::id());
        let handle = open_handle(&name, 4, 1, 1, Some(0), true);

        for b in [0x41u8, 0x42, 0x43, 0x44] {
            let mut span = handle.produce_claim();
            span.as_mut_slice()[0] = b;
            let seq = span.seq();
            assert!(handle.produce_commit(seq));
        }
        assert_eq!(handle.next().load(Ordering::SeqCst), 4);
        assert_eq!(handle.cursor().load(Ordering::SeqCst), 4);

        // Gate fails: consumer is still at 0, same position as seq 4.
        let stalled = handle.produce_claim();
        assert!(stalled.is_empty());

        let spans = handle.consume_new().unwrap();
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].as_slice(), &[0x41, 0x42, 0x43, 0x44]);
        handle.consume_commit();

        let span = handle.produce_claim();
        assert_eq!(span.seq(), 4);

        unlink(&name);
    }

    #[test]
    fn split_span_after_wrap() {
        let name = format!("/shm-disruptor-test-split-span-wrap-{}", std::process::id());
        let handle = open_handle(&name, 4, 1, 1, Some(0), true);

        for b in [0x41u8, 0x42, 0x43] {
            let mut span = handle.produce_claim();
            span.as_mut_slice()[0] = b;
            let seq = span.seq();
            assert!(handle.produce_commit(seq));
        }
        let spans = handle.consume_new().unwrap();
        handle_commit_all(&handle, &spans);

        for b in [0x44u8, 0x45, 0x46] {
            let mut span = handle.produce_claim();
            span.as_mut_slice()[0] = b;
            let seq = span.seq();
            assert!(handle.produce_commit(seq));
        }

        let spans = handle.consume_new().unwrap();
        assert_eq!(spans.len(), 2);
        assert_eq!(spans[0].as_slice(), &[0x44]);
        assert_eq!(spans[1].as_slice(), &[0x45, 0x46]);

        unlink(&name);
    }

    fn handle_commit_all(handle: &DisruptorHandle, _spans: &[Span]) {
        handle.consume_commit();
    }

    #[test]
    fn consume_commit_is_idempotent() {
        let name = format!("/shm-disruptor-test-idempotent-commit-{}", std::process::id());
        let handle = open_handle(&name, 4, 1, 1, Some(0), true);

        let mut span = handle.produce_claim();
        span.as_mut_slice()[0] = 1;
        assert!(handle.produce_commit(span.seq()));

        handle.consume_new().unwrap();
        handle.consume_commit();
        handle.consume_commit(); // second call: no pending, no-op

        assert_eq!(handle.consumer_seq(0).load(Ordering::SeqCst), 1);
        unlink(&name);
    }

    #[test]
    fn pure_producer_cannot_consume() {
        let name = format!("/shm-disruptor-test-no-consumer-{}", std::process::id());
        let handle = open_handle(&name, 4, 1, 1, None, true);
        assert!(handle.consume_new().is_err());
        unlink(&name);
    }

    #[test]
    fn out_of_range_consumer_index_is_rejected() {
        let name = format!("/shm-disruptor-test-oob-consumer-{}", std::process::id());
        let size = shm_size(2, 4, 1);
        let segment = SharedSegment::open(&name, size, true).unwrap();
        let err = DisruptorHandle::new(segment, 4, 1, 2, Some(5), SpinSleep(-1)).unwrap_err();
        assert!(matches!(err, DisruptorError::ConsumerIndexOutOfRange { consumer_index: 5, num_consumers: 2 }));
        unlink(&name);
    }
}
