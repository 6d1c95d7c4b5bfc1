//! Software image views over caller-owned pixel memory.
//!
//! Only view creation lives here. Drawing is left to whatever rasterization
//! library the caller plugs in through [`Rasterizer`].

use std::marker::PhantomData;
use std::ptr::NonNull;

use crate::error::ImageError;

/// Pixel layouts a [`Rasterizer`] can view, named most significant channel first
/// within a native-endian 32-bit word.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RasterFormat {
    A8R8G8B8,
    X8R8G8B8,
    A8B8G8R8,
    X8B8G8R8,
    R8G8B8A8,
    R8G8B8X8,
    B8G8R8A8,
    B8G8R8X8,
}

impl RasterFormat {
    pub fn bits_per_pixel(self) -> u32 {
        32
    }

    pub fn bytes_per_pixel(self) -> u32 {
        self.bits_per_pixel() / 8
    }

    pub fn has_alpha(self) -> bool {
        matches!(
            self,
            RasterFormat::A8R8G8B8
                | RasterFormat::A8B8G8R8
                | RasterFormat::R8G8B8A8
                | RasterFormat::B8G8R8A8
        )
    }
}

/// Format and geometry of an image view.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ImageDesc {
    pub format: RasterFormat,
    pub width: u32,
    pub height: u32,
    /// Bytes between the starts of consecutive rows.
    pub stride: u32,
}

impl ImageDesc {
    /// Bytes covered by the view: `height * stride`.
    pub fn byte_len(&self) -> u64 {
        u64::from(self.height) * u64::from(self.stride)
    }

    /// Bytes of pixel data in a single row: `width * bytes_per_pixel`.
    pub fn row_bytes(&self) -> u64 {
        u64::from(self.width) * u64::from(self.format.bytes_per_pixel())
    }
}

/// Creates image views over existing pixel memory.
///
/// Releasing a view is dropping it.
pub trait Rasterizer {
    type Image;

    /// Create a view described by `desc` over the memory at `bits`.
    ///
    /// # Safety
    ///
    /// `bits` must point to at least `desc.byte_len()` bytes that stay valid
    /// for reads and writes until the returned image is dropped, and nothing
    /// else may access that memory while the image is being used to access it.
    unsafe fn create_image(
        &self,
        desc: ImageDesc,
        bits: NonNull<u8>,
    ) -> Result<Self::Image, ImageError>;
}

/// Validates geometry the same way pixman does for `create_bits` images.
#[derive(Clone, Copy, Debug, Default)]
pub struct SoftwareRasterizer;

impl SoftwareRasterizer {
    pub fn new() -> Self {
        Self
    }
}

impl Rasterizer for SoftwareRasterizer {
    type Image = ImageView;

    unsafe fn create_image(
        &self,
        desc: ImageDesc,
        bits: NonNull<u8>,
    ) -> Result<ImageView, ImageError> {
        validate(&desc)?;
        Ok(ImageView {
            desc,
            bits,
            _not_send: PhantomData,
        })
    }
}

fn validate(desc: &ImageDesc) -> Result<(), ImageError> {
    if desc.width == 0 || desc.height == 0 {
        return Err(ImageError::EmptyGeometry {
            width: desc.width,
            height: desc.height,
        });
    }
    if desc.stride % 4 != 0 {
        return Err(ImageError::UnalignedStride {
            stride: desc.stride,
        });
    }
    let min = desc.row_bytes();
    if u64::from(desc.stride) < min {
        return Err(ImageError::StrideTooSmall {
            stride: desc.stride,
            width: desc.width,
            min,
        });
    }
    Ok(())
}

/// A 32bpp image view produced by [`SoftwareRasterizer`].
///
/// Pixels are addressed as native-endian `u32` words, so `0xAARRGGBB` written
/// to an `A8R8G8B8` view lands in memory as `B, G, R, A` on little-endian hosts.
pub struct ImageView {
    desc: ImageDesc,
    bits: NonNull<u8>,
    _not_send: PhantomData<*mut u8>,
}

impl ImageView {
    pub fn desc(&self) -> ImageDesc {
        self.desc
    }

    pub fn format(&self) -> RasterFormat {
        self.desc.format
    }

    pub fn width(&self) -> u32 {
        self.desc.width
    }

    pub fn height(&self) -> u32 {
        self.desc.height
    }

    pub fn stride(&self) -> u32 {
        self.desc.stride
    }

    /// Pixel bytes of row `y`, without the trailing stride padding.
    pub fn row(&self, y: u32) -> Option<&[u8]> {
        let (offset, len) = self.row_span(y)?;
        // SAFETY: `row_span` keeps the range inside the `height * stride` bytes
        // guaranteed by the `create_image` contract.
        Some(unsafe { std::slice::from_raw_parts(self.bits.as_ptr().add(offset), len) })
    }

    pub fn row_mut(&mut self, y: u32) -> Option<&mut [u8]> {
        let (offset, len) = self.row_span(y)?;
        // SAFETY: as in `row`; `&mut self` makes the borrow exclusive.
        Some(unsafe { std::slice::from_raw_parts_mut(self.bits.as_ptr().add(offset), len) })
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<u32> {
        let start = self.pixel_offset(x)?;
        let row = self.row(y)?;
        let bytes: [u8; 4] = row[start..start + 4].try_into().ok()?;
        Some(u32::from_ne_bytes(bytes))
    }

    pub fn set_pixel(&mut self, x: u32, y: u32, value: u32) -> bool {
        let Some(start) = self.pixel_offset(x) else {
            return false;
        };
        match self.row_mut(y) {
            Some(row) => {
                row[start..start + 4].copy_from_slice(&value.to_ne_bytes());
                true
            }
            None => false,
        }
    }

    fn row_span(&self, y: u32) -> Option<(usize, usize)> {
        if y >= self.desc.height {
            return None;
        }
        let offset = usize::try_from(u64::from(y) * u64::from(self.desc.stride)).ok()?;
        let len = usize::try_from(self.desc.row_bytes()).ok()?;
        Some((offset, len))
    }

    fn pixel_offset(&self, x: u32) -> Option<usize> {
        if x >= self.desc.width {
            return None;
        }
        usize::try_from(u64::from(x) * u64::from(self.desc.format.bytes_per_pixel())).ok()
    }
}

impl std::fmt::Debug for ImageView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageView")
            .field("desc", &self.desc)
            .field("bits", &self.bits)
            .finish()
    }
}
