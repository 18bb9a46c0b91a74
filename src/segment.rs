//! Shared Segment Manager.
//!
//! Creates, opens, truncates, maps, and unmaps a named POSIX shared-memory
//! object. The layout of the mapped region is a bit-for-bit contract —
//! every process that opens the same `name` with the same
//! `num_elements`/`element_size`/`num_consumers` sees the same fields at the
//! same offsets.

use std::ffi::CString;
use std::ptr::NonNull;

use nix::fcntl::OFlag;
use nix::sys::mman::{mmap, munmap, shm_open, MapFlags, ProtFlags};
use nix::sys::stat::Mode;
use nix::unistd::ftruncate;

use crate::error::{DisruptorError, Result};

/// A mapped, named shared-memory region.
///
/// Unmaps on drop. Does not `shm_unlink` the underlying object — the
/// segment itself outlives any single process and is removed out of band
/// by the host when no longer needed.
pub struct SharedSegment {
    ptr: NonNull<u8>,
    size: usize,
    name: String,
    released: bool,
}

// SAFETY: the region is backed by `MAP_SHARED` memory explicitly intended
// for concurrent cross-process access; all mutation within it goes through
// atomics on the counter fields (see `handle.rs`) or is bracketed by
// claim/commit so that only one writer touches a given slot at a time.
unsafe impl Send for SharedSegment {}
unsafe impl Sync for SharedSegment {}

impl SharedSegment {
    /// Open (and, if `init`, create/truncate) the named segment and map
    /// `size` bytes of it.
    ///
    /// Always `O_CREAT`, with `O_TRUNC` gated on `init`, never `O_EXCL`. A
    /// non-initializing participant that races ahead of the initializer
    /// will successfully open a zero-length object and then stall on its
    /// first atomic wait until the initializer truncates it to `size` —
    /// sequencing startup so the initializer runs first is a host
    /// responsibility; liveness hazards here are out-of-band.
    pub fn open(name: &str, size: usize, init: bool) -> Result<Self> {
        let c_name = CString::new(name)
            .map_err(|_| DisruptorError::invalid_layout(format!("segment name {name:?} contains a NUL byte")))?;

        let mut flags = OFlag::O_CREAT | OFlag::O_RDWR;
        if init {
            flags |= OFlag::O_TRUNC;
        }

        let fd = shm_open(c_name.as_c_str(), flags, Mode::S_IRUSR | Mode::S_IWUSR).map_err(|e| {
            DisruptorError::SegmentOpenError { name: name.to_string(), source: std::io::Error::from(e) }
        })?;

        if init {
            ftruncate(&fd, size as libc::off_t).map_err(|e| DisruptorError::SegmentSizeError {
                name: name.to_string(),
                source: std::io::Error::from(e),
            })?;
        }

        // SAFETY: `fd` was just opened above with read+write access and,
        // when `init`, sized to exactly `size` bytes by `ftruncate`
        // (whose zero-fill-on-grow guarantee we rely on). `size` is
        // non-zero for any valid layout (checked by `SegmentConfig`
        // before this is ever called).
        let ptr = unsafe {
            mmap(None, std::num::NonZeroUsize::new(size).ok_or_else(|| {
                DisruptorError::invalid_layout("segment size must be non-zero")
            })?, ProtFlags::PROT_READ | ProtFlags::PROT_WRITE, MapFlags::MAP_SHARED, &fd, 0)
        }
        .map_err(|e| DisruptorError::SegmentMapError { name: name.to_string(), source: std::io::Error::from(e) })?;

        tracing::debug!(name, size, init, "opened shared memory segment");

        Ok(Self { ptr: ptr.cast(), size, name: name.to_string(), released: false })
    }

    /// Raw pointer to the start of the mapped region.
    #[inline]
    pub fn as_ptr(&self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    /// Size of the mapped region in bytes.
    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Name of the underlying shared-memory object.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Unmap this segment. Idempotent: calling it again (or letting `Drop`
    /// run afterward) is a no-op.
    pub fn release(&mut self) -> Result<()> {
        if self.released {
            return Ok(());
        }

        // SAFETY: `self.ptr`/`self.size` come from the successful `mmap`
        // call in `open` and have not been unmapped before (`released`
        // guards against a second call).
        unsafe { munmap(self.ptr.cast(), self.size) }.map_err(|e| DisruptorError::SegmentUnmapError {
            name: self.name.clone(),
            source: std::io::Error::from(e),
        })?;

        self.released = true;
        tracing::debug!(name = %self.name, "released shared memory segment");
        Ok(())
    }
}

impl Drop for SharedSegment {
    fn drop(&mut self) {
        if let Err(err) = self.release() {
            tracing::warn!(name = %self.name, %err, "failed to unmap shared memory segment on drop");
        }
    }
}
