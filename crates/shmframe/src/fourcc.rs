//! DRM-style four-character pixel format codes.

use core::fmt;

/// A little-endian packed four-character code identifying a pixel memory layout.
///
/// The numeric values match `drm_fourcc.h`, e.g. `ARGB8888` is `"AR24"`.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fourcc(pub u32);

impl Fourcc {
    /// Set on codes that describe a big-endian variant of the base layout.
    pub const BIG_ENDIAN: u32 = 1 << 31;

    pub const ARGB8888: Fourcc = Fourcc::from_chars(*b"AR24");
    pub const XRGB8888: Fourcc = Fourcc::from_chars(*b"XR24");
    pub const ABGR8888: Fourcc = Fourcc::from_chars(*b"AB24");
    pub const XBGR8888: Fourcc = Fourcc::from_chars(*b"XB24");
    pub const RGBA8888: Fourcc = Fourcc::from_chars(*b"RA24");
    pub const RGBX8888: Fourcc = Fourcc::from_chars(*b"RX24");
    pub const BGRA8888: Fourcc = Fourcc::from_chars(*b"BA24");
    pub const BGRX8888: Fourcc = Fourcc::from_chars(*b"BX24");

    pub const fn from_chars(chars: [u8; 4]) -> Self {
        Fourcc(u32::from_le_bytes(chars))
    }

    pub const fn as_u32(self) -> u32 {
        self.0
    }

    pub const fn is_big_endian(self) -> bool {
        self.0 & Self::BIG_ENDIAN != 0
    }

    /// The four characters, with the big-endian flag masked off.
    pub fn chars(self) -> [u8; 4] {
        (self.0 & !Self::BIG_ENDIAN).to_le_bytes()
    }
}

impl From<u32> for Fourcc {
    fn from(value: u32) -> Self {
        Fourcc(value)
    }
}

impl From<Fourcc> for u32 {
    fn from(value: Fourcc) -> Self {
        value.0
    }
}

impl fmt::Display for Fourcc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let chars = self.chars();
        if chars.iter().all(|c| c.is_ascii_graphic() || *c == b' ') {
            for c in chars {
                write!(f, "{}", c as char)?;
            }
            if self.is_big_endian() {
                f.write_str(" (BE)")?;
            }
            Ok(())
        } else {
            write!(f, "0x{:08x}", self.0)
        }
    }
}

impl fmt::Debug for Fourcc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fourcc({self} = 0x{:08x})", self.0)
    }
}
