//! The windowing-protocol side of a shared-memory buffer.
//!
//! Modelled on `wl_shm`: a pool object wraps a descriptor, buffer objects are
//! carved out of a pool, and both are destroyed explicitly. The connection is
//! owned by the caller and must already be initialized.

use std::mem::ManuallyDrop;
use std::os::fd::BorrowedFd;

use crate::error::ProtocolError;

/// `wl_shm.format.argb8888`.
pub const WL_SHM_FORMAT_ARGB8888: u32 = 0;
/// `wl_shm.format.xrgb8888`.
pub const WL_SHM_FORMAT_XRGB8888: u32 = 1;

/// A connection able to create shared-memory pool and buffer objects.
///
/// Implementations are cheap handles: a [`Buffer`](crate::Buffer) keeps a
/// clone so it can destroy its protocol object when it goes away.
pub trait ShmProtocol: Clone {
    type Pool;
    type Buffer;

    /// Create a pool object over the first `size` bytes of `fd`.
    ///
    /// The descriptor is only borrowed; the implementation must duplicate it
    /// (or send it to the server) if the region has to outlive the call.
    fn create_pool(&self, fd: BorrowedFd<'_>, size: i32) -> Result<Self::Pool, ProtocolError>;

    /// Create a buffer object at `offset` inside `pool`.
    ///
    /// `format` is a `wl_shm` format code, see [`protocol_format`](crate::format::protocol_format).
    fn create_buffer(
        &self,
        pool: &Self::Pool,
        offset: i32,
        width: i32,
        height: i32,
        stride: i32,
        format: u32,
    ) -> Result<Self::Buffer, ProtocolError>;

    fn destroy_pool(&self, pool: Self::Pool);

    fn destroy_buffer(&self, buffer: Self::Buffer);
}

/// Convert a size or dimension to the signed 32-bit integers the protocol carries.
pub(crate) fn to_wire(what: &'static str, value: u64) -> Result<i32, ProtocolError> {
    i32::try_from(value).map_err(|_| ProtocolError::OutOfRange { what, value })
}

/// Destroys a transient pool object when it goes out of scope.
pub(crate) struct PoolGuard<'a, P: ShmProtocol> {
    protocol: &'a P,
    pool: ManuallyDrop<P::Pool>,
}

impl<'a, P: ShmProtocol> PoolGuard<'a, P> {
    pub(crate) fn new(protocol: &'a P, pool: P::Pool) -> Self {
        Self {
            protocol,
            pool: ManuallyDrop::new(pool),
        }
    }

    pub(crate) fn get(&self) -> &P::Pool {
        &self.pool
    }
}

impl<P: ShmProtocol> Drop for PoolGuard<'_, P> {
    fn drop(&mut self) {
        // SAFETY: `pool` is never touched again after this.
        let pool = unsafe { ManuallyDrop::take(&mut self.pool) };
        self.protocol.destroy_pool(pool);
    }
}

/// Owns a protocol buffer object and destroys it on drop.
pub(crate) struct HandleGuard<P: ShmProtocol> {
    protocol: P,
    handle: ManuallyDrop<P::Buffer>,
}

impl<P: ShmProtocol> HandleGuard<P> {
    pub(crate) fn new(protocol: P, handle: P::Buffer) -> Self {
        Self {
            protocol,
            handle: ManuallyDrop::new(handle),
        }
    }

    pub(crate) fn get(&self) -> &P::Buffer {
        &self.handle
    }
}

impl<P: ShmProtocol> Drop for HandleGuard<P> {
    fn drop(&mut self) {
        // SAFETY: `handle` is never touched again after this.
        let handle = unsafe { ManuallyDrop::take(&mut self.handle) };
        self.protocol.destroy_buffer(handle);
    }
}
