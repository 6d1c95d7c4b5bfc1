use crate::protocol::ShmProtocol;
use crate::raster::{Rasterizer, SoftwareRasterizer};
use crate::shm::{AnonShmAllocator, ShmAllocator};

/// The three collaborators a [`Buffer`](crate::Buffer) is built from.
///
/// The protocol connection is supplied by the caller and must already be
/// bound; the rasterizer and allocator default to the software view and the
/// anonymous shared-memory allocator.
#[derive(Clone, Debug)]
pub struct ShmContext<P, R = SoftwareRasterizer, A = AnonShmAllocator> {
    pub protocol: P,
    pub rasterizer: R,
    pub allocator: A,
}

impl<P: ShmProtocol> ShmContext<P> {
    pub fn new(protocol: P) -> Self {
        Self {
            protocol,
            rasterizer: SoftwareRasterizer::new(),
            allocator: AnonShmAllocator::new(),
        }
    }
}

impl<P, R, A> ShmContext<P, R, A>
where
    P: ShmProtocol,
    R: Rasterizer,
    A: ShmAllocator,
{
    pub fn with_parts(protocol: P, rasterizer: R, allocator: A) -> Self {
        Self {
            protocol,
            rasterizer,
            allocator,
        }
    }

    /// Swap in a new protocol connection (e.g. after reconnecting to the compositor).
    ///
    /// Buffers created before the swap keep the connection they were made with.
    pub fn replace_protocol(&mut self, protocol: P) {
        self.protocol = protocol;
    }
}
