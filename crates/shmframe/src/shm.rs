//! Anonymous shared memory: the allocation primitive and the process-local mapping.
//!
//! The allocator only hands out a descriptor sized to the request. Mapping is a
//! separate step so a failed `mmap` can be reported on its own and so the
//! descriptor can be passed to the compositor independently of the mapping.

use std::io;
use std::os::fd::{AsRawFd, BorrowedFd, FromRawFd, OwnedFd, RawFd};
use std::ptr::NonNull;

/// Source of anonymous shared-memory regions.
pub trait ShmAllocator {
    /// Create a region of exactly `size` bytes and return its descriptor.
    fn allocate(&self, size: usize) -> io::Result<OwnedFd>;
}

/// Default allocator.
///
/// Uses `memfd_create` where available. Elsewhere it falls back to a POSIX
/// shared-memory object whose name is unlinked straight after creation, so the
/// returned descriptor is the only reference to the region.
#[derive(Clone, Copy, Debug, Default)]
pub struct AnonShmAllocator;

impl AnonShmAllocator {
    pub fn new() -> Self {
        Self
    }
}

impl ShmAllocator for AnonShmAllocator {
    fn allocate(&self, size: usize) -> io::Result<OwnedFd> {
        let len = libc::off_t::try_from(size).map_err(|_| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                "shared memory size exceeds off_t",
            )
        })?;

        let fd = create_anonymous_fd()?;
        loop {
            // SAFETY: `fd` is a valid, owned descriptor.
            let ret = unsafe { libc::ftruncate(fd.as_raw_fd(), len) };
            if ret == 0 {
                return Ok(fd);
            }
            let err = io::Error::last_os_error();
            if err.kind() != io::ErrorKind::Interrupted {
                return Err(err);
            }
        }
    }
}

#[cfg(any(target_os = "linux", target_os = "android"))]
fn create_anonymous_fd() -> io::Result<OwnedFd> {
    const NAME: &[u8] = b"shmframe-buffer\0";
    // SAFETY: `NAME` is NUL-terminated.
    let fd = unsafe { libc::memfd_create(NAME.as_ptr().cast(), libc::MFD_CLOEXEC) };
    owned_fd(fd)
}

#[cfg(not(any(target_os = "linux", target_os = "android")))]
fn create_anonymous_fd() -> io::Result<OwnedFd> {
    use std::ffi::CString;
    use std::sync::atomic::{AtomicU32, Ordering};

    static SEQ: AtomicU32 = AtomicU32::new(0);

    // A name collision means another process picked the same pid/sequence pair;
    // retry with the next sequence number a bounded number of times.
    for _ in 0..64 {
        let seq = SEQ.fetch_add(1, Ordering::Relaxed);
        let name = CString::new(format!("/shmframe-{}-{seq}", std::process::id()))
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidInput, err))?;
        // SAFETY: `name` is a valid C string.
        let fd = unsafe {
            libc::shm_open(
                name.as_ptr(),
                libc::O_RDWR | libc::O_CREAT | libc::O_EXCL | libc::O_CLOEXEC,
                0o600,
            )
        };
        if fd < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::AlreadyExists {
                continue;
            }
            return Err(err);
        }
        // SAFETY: `name` is a valid C string.
        unsafe { libc::shm_unlink(name.as_ptr()) };
        return owned_fd(fd);
    }
    Err(io::Error::new(
        io::ErrorKind::AlreadyExists,
        "no free shared memory object name",
    ))
}

fn owned_fd(fd: RawFd) -> io::Result<OwnedFd> {
    if fd < 0 {
        return Err(io::Error::last_os_error());
    }
    // SAFETY: `fd` was just returned by the kernel and nothing else owns it.
    Ok(unsafe { OwnedFd::from_raw_fd(fd) })
}

/// A read/write `MAP_SHARED` mapping of a shared-memory descriptor.
///
/// The mapping stays valid after the descriptor is closed and is removed with
/// `munmap` on drop.
pub struct ShmMapping {
    ptr: NonNull<u8>,
    len: usize,
}

impl ShmMapping {
    /// Map the first `len` bytes of `fd`.
    pub fn map(fd: BorrowedFd<'_>, len: usize) -> io::Result<Self> {
        if len == 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "cannot map an empty region",
            ));
        }

        // SAFETY: a fresh mapping at a kernel-chosen address aliases nothing in
        // this process; `fd` is valid for the duration of the call.
        let ptr = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                len,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED,
                fd.as_raw_fd(),
                0,
            )
        };
        if ptr == libc::MAP_FAILED {
            return Err(io::Error::last_os_error());
        }
        let ptr = NonNull::new(ptr.cast::<u8>())
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "mmap returned null"))?;
        Ok(Self { ptr, len })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Base address of the mapping.
    pub fn as_non_null(&self) -> NonNull<u8> {
        self.ptr
    }

    pub fn as_slice(&self) -> &[u8] {
        // SAFETY: the mapping covers `len` readable bytes for the life of `self`.
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        // SAFETY: the mapping covers `len` writable bytes for the life of `self`,
        // and `&mut self` guarantees no other slice from this mapping is live.
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }
}

impl Drop for ShmMapping {
    fn drop(&mut self) {
        // SAFETY: `ptr`/`len` describe a mapping created by `map` and not yet removed.
        let ret = unsafe { libc::munmap(self.ptr.as_ptr().cast(), self.len) };
        if ret != 0 {
            tracing::warn!(
                "munmap of {} bytes failed: {}",
                self.len,
                io::Error::last_os_error()
            );
        }
    }
}

impl std::fmt::Debug for ShmMapping {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShmMapping")
            .field("ptr", &self.ptr)
            .field("len", &self.len)
            .finish()
    }
}
