//! Shape-keyed recycling of [`Buffer`]s.
//!
//! The pool hands out buffers of its current target shape. Idle buffers are
//! kept in release order and reused oldest first. Whenever the target shape
//! changes, idle buffers are destroyed immediately, and buffers that were
//! checked out under the old shape are destroyed when they come back. The
//! idle queue therefore never holds a buffer of any other shape.

use std::collections::VecDeque;
use std::fmt;

use tracing::{debug, trace};

use crate::buffer::{Buffer, BufferShape};
use crate::context::ShmContext;
use crate::error::Result;
use crate::protocol::ShmProtocol;
use crate::raster::{Rasterizer, SoftwareRasterizer};
use crate::shm::{AnonShmAllocator, ShmAllocator};
use crate::stats::PoolStats;

/// A FIFO of idle [`Buffer`]s of one target shape.
///
/// Buffers are handed out by [`acquire`](Self::acquire) and come back through
/// [`release`](Self::release). A returned buffer is queued for reuse only if it
/// still matches the target shape and was created on the current protocol
/// connection; otherwise it is destroyed. Dropping the pool destroys the idle
/// buffers; buffers still checked out belong to their holder.
pub struct BufferPool<P, R = SoftwareRasterizer, A = AnonShmAllocator>
where
    P: ShmProtocol,
    R: Rasterizer,
    A: ShmAllocator,
{
    ctx: ShmContext<P, R, A>,
    shape: BufferShape,
    idle: VecDeque<Buffer<P, R>>,
    /// Bumped by `replace_protocol`; buffers of older generations are never queued.
    generation: u64,
    stats: PoolStats,
}

impl<P: ShmProtocol> BufferPool<P> {
    /// Create a pool using the default rasterizer and allocator.
    pub fn new(protocol: P, shape: BufferShape) -> Self {
        Self::with_context(ShmContext::new(protocol), shape)
    }
}

impl<P, R, A> BufferPool<P, R, A>
where
    P: ShmProtocol,
    R: Rasterizer,
    A: ShmAllocator,
{
    pub fn with_context(ctx: ShmContext<P, R, A>, shape: BufferShape) -> Self {
        Self {
            ctx,
            shape,
            idle: VecDeque::new(),
            generation: 0,
            stats: PoolStats::default(),
        }
    }

    /// The shape handed out by [`acquire`](Self::acquire).
    pub fn shape(&self) -> BufferShape {
        self.shape
    }

    pub fn context(&self) -> &ShmContext<P, R, A> {
        &self.ctx
    }

    /// Number of buffers waiting for reuse.
    pub fn idle_len(&self) -> usize {
        self.idle.len()
    }

    pub fn is_empty(&self) -> bool {
        self.idle.is_empty()
    }

    pub fn stats(&self) -> PoolStats {
        self.stats
    }

    /// Change the target shape.
    ///
    /// Idle buffers are destroyed if any field differs; resizing to the current
    /// shape keeps them.
    pub fn resize(&mut self, shape: BufferShape) {
        if shape != self.shape {
            let discarded = self.clear();
            debug!(
                "buffer pool resized from {} to {shape}, discarded {discarded} idle buffers",
                self.shape
            );
        }
        self.shape = shape;
    }

    /// Take the oldest idle buffer, or create one of the current shape.
    pub fn acquire(&mut self) -> Result<Buffer<P, R>> {
        if let Some(buffer) = self.idle.pop_front() {
            debug_assert_eq!(
                buffer.shape(),
                self.shape,
                "idle queue holds a buffer of a stale shape"
            );
            debug_assert_eq!(
                buffer.generation, self.generation,
                "idle queue holds a buffer of a replaced connection"
            );
            self.stats.inc_reused();
            trace!("reusing idle buffer {}", self.shape);
            return Ok(buffer);
        }

        let mut buffer = Buffer::create(&self.ctx, self.shape)?;
        buffer.generation = self.generation;
        self.stats.inc_allocated();
        Ok(buffer)
    }

    /// Return a buffer to the pool.
    ///
    /// Buffers whose shape no longer matches the target shape, or that were
    /// created on a connection since replaced, are destroyed.
    pub fn release(&mut self, buffer: Buffer<P, R>) {
        if buffer.shape() == self.shape && buffer.generation == self.generation {
            self.idle.push_back(buffer);
            self.stats.inc_recycled();
        } else {
            debug!(
                "dropping released buffer {} (pool shape is {}, connection generation {} vs {})",
                buffer.shape(),
                self.shape,
                buffer.generation,
                self.generation
            );
            buffer.destroy();
            self.stats.add_discarded(1);
        }
    }

    /// Destroy every idle buffer. Returns how many were destroyed.
    pub fn clear(&mut self) -> usize {
        let count = self.idle.len();
        while let Some(buffer) = self.idle.pop_front() {
            buffer.destroy();
        }
        self.stats.add_discarded(count);
        count
    }

    /// Switch to a new protocol connection.
    ///
    /// Idle buffers reference objects of the old connection and are destroyed.
    /// Buffers still checked out keep working against the old connection and
    /// are destroyed when they are released.
    pub fn replace_protocol(&mut self, protocol: P) {
        let discarded = self.clear();
        self.generation += 1;
        debug!("buffer pool switched protocol connection, discarded {discarded} idle buffers");
        self.ctx.replace_protocol(protocol);
    }
}

impl<P, R, A> Drop for BufferPool<P, R, A>
where
    P: ShmProtocol,
    R: Rasterizer,
    A: ShmAllocator,
{
    fn drop(&mut self) {
        let count = self.clear();
        if count > 0 {
            debug!("buffer pool dropped with {count} idle buffers");
        }
    }
}

impl<P, R, A> fmt::Debug for BufferPool<P, R, A>
where
    P: ShmProtocol,
    R: Rasterizer,
    A: ShmAllocator,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferPool")
            .field("shape", &self.shape)
            .field("idle", &self.idle.len())
            .field("stats", &self.stats)
            .finish()
    }
}
