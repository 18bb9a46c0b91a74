//! Pure sequence arithmetic over the ring's 64-bit sequence space.
//!
//! Every function here is allocation-free and does no I/O. Sequences are
//! assumed never to wrap at 64 bits in any realistic deployment, so they
//! compare with ordinary unsigned order; wrap-around of `num_elements`
//! itself (not the sequence) is the only "wrap" this module is concerned
//! with.

/// Ring position of sequence `seq` for a ring of `num_elements` slots.
#[inline]
pub fn pos(seq: u64, num_elements: u64) -> u64 {
    seq % num_elements
}

/// Whether two sequences land on the same ring slot.
#[inline]
pub fn same_position(a: u64, b: u64, num_elements: u64) -> bool {
    pos(a, num_elements) == pos(b, num_elements)
}

/// The producer's per-consumer claim gate: a consumer blocks the slot at
/// `pos_next` unless it is at the same sequence as the claim (meaning it
/// has never advanced past its start, so the slot is genuinely free on
/// first use).
#[inline]
pub fn consumer_blocks_claim(consumer_seq: u64, seq_next: u64, num_elements: u64) -> bool {
    same_position(consumer_seq, seq_next, num_elements) && consumer_seq != seq_next
}
