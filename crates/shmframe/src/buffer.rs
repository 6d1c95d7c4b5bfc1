//! A single shared-memory pixel buffer.
//!
//! Construction acquires, in order: the shared-memory descriptor, the mapping,
//! the image view, a transient protocol pool and the protocol buffer handle.
//! Each acquisition is held by a guard, so an early return releases exactly
//! what was acquired so far, in reverse order.

use std::fmt;
use std::os::fd::AsFd;

use tracing::{debug, warn};

use crate::context::ShmContext;
use crate::error::{BufferError, Result};
use crate::format::{protocol_format, raster_format};
use crate::fourcc::Fourcc;
use crate::protocol::{to_wire, HandleGuard, PoolGuard, ShmProtocol};
use crate::raster::{ImageDesc, Rasterizer, SoftwareRasterizer};
use crate::shm::{ShmAllocator, ShmMapping};

/// Geometry and format of a buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BufferShape {
    pub width: u32,
    pub height: u32,
    /// Bytes per row; at least `width * bytes_per_pixel`.
    pub stride: u32,
    pub format: Fourcc,
}

impl BufferShape {
    pub const fn new(width: u32, height: u32, stride: u32, format: Fourcc) -> Self {
        Self {
            width,
            height,
            stride,
            format,
        }
    }

    /// Size of the backing region: `height * stride`.
    pub fn byte_len(&self) -> u64 {
        u64::from(self.height) * u64::from(self.stride)
    }
}

impl fmt::Display for BufferShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}x{} stride {} {}",
            self.width, self.height, self.stride, self.format
        )
    }
}

/// A shared-memory region together with an image view over it and a protocol
/// buffer object referencing it.
///
/// Dropping the buffer destroys it: the protocol handle goes first, then the
/// image view, and the region is unmapped last.
pub struct Buffer<P: ShmProtocol, R: Rasterizer = SoftwareRasterizer> {
    // Field order is drop order.
    handle: HandleGuard<P>,
    image: R::Image,
    mapping: ShmMapping,
    shape: BufferShape,
    /// Connection generation of the pool that created this buffer.
    pub(crate) generation: u64,
}

impl<P: ShmProtocol, R: Rasterizer> Buffer<P, R> {
    /// Allocate a buffer of `shape` using the collaborators in `ctx`.
    pub fn create<A: ShmAllocator>(
        ctx: &ShmContext<P, R, A>,
        shape: BufferShape,
    ) -> Result<Self> {
        let result = Self::create_inner(ctx, shape);
        match &result {
            Ok(_) => debug!("created shm buffer {shape}"),
            Err(err) => warn!("failed to create shm buffer {shape}: {err}"),
        }
        result
    }

    fn create_inner<A: ShmAllocator>(
        ctx: &ShmContext<P, R, A>,
        shape: BufferShape,
    ) -> Result<Self> {
        let format =
            raster_format(shape.format).ok_or(BufferError::UnsupportedFormat(shape.format))?;
        let wire_format = protocol_format(shape.format);

        let len = shape.byte_len();
        // The protocol carries these as i32; reject before taking any resource.
        let wire_size = to_wire("size", len)?;
        let wire_width = to_wire("width", shape.width.into())?;
        let wire_height = to_wire("height", shape.height.into())?;
        let wire_stride = to_wire("stride", shape.stride.into())?;

        let size = usize::try_from(len).map_err(|_| BufferError::Allocation {
            len,
            source: std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "buffer size exceeds the address space",
            ),
        })?;

        let fd = ctx
            .allocator
            .allocate(size)
            .map_err(|source| BufferError::Allocation { len, source })?;

        let mapping = ShmMapping::map(fd.as_fd(), size)
            .map_err(|source| BufferError::Mapping { len, source })?;

        let desc = ImageDesc {
            format,
            width: shape.width,
            height: shape.height,
            stride: shape.stride,
        };
        // SAFETY: the mapping covers `height * stride` bytes and is stored next to
        // the image in the returned buffer, which drops the image first.
        let image = unsafe { ctx.rasterizer.create_image(desc, mapping.as_non_null()) }?;

        let protocol = &ctx.protocol;
        let pool = protocol.create_pool(fd.as_fd(), wire_size)?;
        let pool = PoolGuard::new(protocol, pool);
        let handle = protocol.create_buffer(
            pool.get(),
            0,
            wire_width,
            wire_height,
            wire_stride,
            wire_format,
        );
        // The handle keeps the server-side pool alive on its own.
        drop(pool);
        let handle = HandleGuard::new(protocol.clone(), handle?);

        // The compositor holds its own reference to the region now.
        drop(fd);

        Ok(Self {
            handle,
            image,
            mapping,
            shape,
            generation: 0,
        })
    }

    /// Destroy the buffer, releasing its protocol object, image view and mapping.
    pub fn destroy(self) {
        drop(self);
    }

    pub fn shape(&self) -> BufferShape {
        self.shape
    }

    pub fn width(&self) -> u32 {
        self.shape.width
    }

    pub fn height(&self) -> u32 {
        self.shape.height
    }

    pub fn stride(&self) -> u32 {
        self.shape.stride
    }

    pub fn format(&self) -> Fourcc {
        self.shape.format
    }

    /// Length of the mapped region in bytes.
    pub fn size(&self) -> usize {
        self.mapping.len()
    }

    pub fn pixels(&self) -> &[u8] {
        self.mapping.as_slice()
    }

    pub fn pixels_mut(&mut self) -> &mut [u8] {
        self.mapping.as_mut_slice()
    }

    pub fn image(&self) -> &R::Image {
        &self.image
    }

    pub fn image_mut(&mut self) -> &mut R::Image {
        &mut self.image
    }

    /// The protocol buffer object to attach to a surface.
    pub fn handle(&self) -> &P::Buffer {
        self.handle.get()
    }
}

impl<P: ShmProtocol, R: Rasterizer> Drop for Buffer<P, R> {
    fn drop(&mut self) {
        debug!("destroying shm buffer {}", self.shape);
    }
}

impl<P: ShmProtocol, R: Rasterizer> fmt::Debug for Buffer<P, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Buffer")
            .field("shape", &self.shape)
            .field("mapping", &self.mapping)
            .finish_non_exhaustive()
    }
}
