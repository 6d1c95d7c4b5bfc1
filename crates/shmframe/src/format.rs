//! Fourcc translation tables.
//!
//! There are two independent mappings and they are kept apart on purpose:
//! - [`raster_format`] has no fallback. A code outside the table cannot be
//!   turned into an image view and buffer construction fails up front.
//! - [`protocol_format`] only remaps the two formats `wl_shm` gives dedicated
//!   enum values to. Every other code is passed through unchanged, since
//!   `wl_shm` reuses the DRM fourcc value for the rest of its format list.

use crate::fourcc::Fourcc;
use crate::protocol::{WL_SHM_FORMAT_ARGB8888, WL_SHM_FORMAT_XRGB8888};
use crate::raster::RasterFormat;

/// Fourcc codes accepted by [`raster_format`], in table order.
pub const SUPPORTED_FORMATS: [Fourcc; 8] = [
    Fourcc::ARGB8888,
    Fourcc::XRGB8888,
    Fourcc::ABGR8888,
    Fourcc::XBGR8888,
    Fourcc::RGBA8888,
    Fourcc::RGBX8888,
    Fourcc::BGRA8888,
    Fourcc::BGRX8888,
];

/// Map a fourcc to the rasterizer's pixel format, if the rasterizer can view it.
pub fn raster_format(fourcc: Fourcc) -> Option<RasterFormat> {
    let format = match fourcc {
        Fourcc::ARGB8888 => RasterFormat::A8R8G8B8,
        Fourcc::XRGB8888 => RasterFormat::X8R8G8B8,
        Fourcc::ABGR8888 => RasterFormat::A8B8G8R8,
        Fourcc::XBGR8888 => RasterFormat::X8B8G8R8,
        Fourcc::RGBA8888 => RasterFormat::R8G8B8A8,
        Fourcc::RGBX8888 => RasterFormat::R8G8B8X8,
        Fourcc::BGRA8888 => RasterFormat::B8G8R8A8,
        Fourcc::BGRX8888 => RasterFormat::B8G8R8X8,
        _ => return None,
    };
    Some(format)
}

/// Map a fourcc to the numeric format code sent with `wl_shm_pool.create_buffer`.
pub fn protocol_format(fourcc: Fourcc) -> u32 {
    match fourcc {
        Fourcc::ARGB8888 => WL_SHM_FORMAT_ARGB8888,
        Fourcc::XRGB8888 => WL_SHM_FORMAT_XRGB8888,
        other => other.as_u32(),
    }
}
