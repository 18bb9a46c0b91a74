//! Lock-free MPMC ring buffer over named POSIX shared memory, for
//! cross-process message passing.
//!
//! An inter-process variant of the LMAX Disruptor pattern: producers
//! claim fixed-size slots with a compare-and-swap on a shared `next`
//! counter, commit them in strict sequence order by advancing a shared
//! `cursor`, and each consumer tracks its own read position independently.
//! All coordination is through atomic operations on counters living
//! inside the shared segment — there are no locks, no condition
//! variables, and no kernel wake-ups.
//!
//! ```no_run
//! use shm_disruptor::{ops, SegmentConfig};
//!
//! let config = SegmentConfig::new("/my-ring", 1024, 64)?
//!     .with_num_consumers(1)
//!     .with_consumer_index(0)
//!     .with_init(true);
//!
//! let handle = ops::open(&config)?;
//! let mut span = ops::produce_claim_sync(&handle);
//! if !span.is_empty() {
//!     span.as_mut_slice().copy_from_slice(&[0u8; 64]);
//!     ops::produce_commit_sync(&handle, span.seq());
//! }
//! # Ok::<(), shm_disruptor::DisruptorError>(())
//! ```

pub mod config;
pub mod constants;
pub mod error;
pub mod handle;
pub mod ops;
pub mod segment;
pub mod sequence;
pub mod wait;

pub use config::SegmentConfig;
pub use error::{DisruptorError, Result};
pub use handle::{DisruptorHandle, Span};
pub use segment::SharedSegment;
pub use wait::SpinSleep;

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
