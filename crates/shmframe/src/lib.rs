//! `shmframe` manages shared-memory pixel buffers for `wl_shm` style presentation.
//!
//! Currently this crate provides:
//! - [`Buffer`]: a shared-memory region mapped into the process, a software
//!   image view over it and the protocol buffer object the compositor reads.
//! - [`BufferPool`]: recycles buffers of one target shape and discards buffers
//!   left over from a previous shape.
//! - The collaborator seams a buffer is built from: [`ShmAllocator`],
//!   [`Rasterizer`] and [`ShmProtocol`], with default implementations for the
//!   first two and a `wl_shm` implementation behind the `wayland` feature.
//!
//! Everything here is single-threaded; buffers and pools are neither `Send`
//! nor `Sync`.

mod buffer;
mod context;
mod error;
mod pool;
mod stats;

pub mod format;
pub mod fourcc;
pub mod protocol;
pub mod raster;
pub mod shm;

#[cfg(feature = "wayland")]
pub mod wayland;

pub use buffer::{Buffer, BufferShape};
pub use context::ShmContext;
pub use error::{BufferError, ImageError, ProtocolError, Result};
pub use fourcc::Fourcc;
pub use pool::BufferPool;
pub use protocol::ShmProtocol;
pub use raster::{ImageDesc, ImageView, RasterFormat, Rasterizer, SoftwareRasterizer};
pub use shm::{AnonShmAllocator, ShmAllocator, ShmMapping};
pub use stats::PoolStats;
