use std::io;

use thiserror::Error;

use crate::fourcc::Fourcc;

pub type Result<T> = std::result::Result<T, BufferError>;

/// Failure while constructing a [`Buffer`](crate::Buffer).
///
/// Every variant is reported after the resources acquired up to the failing
/// step have been released again; a caller never has anything to clean up.
#[derive(Debug, Error)]
pub enum BufferError {
    #[error("unsupported pixel format {0}")]
    UnsupportedFormat(Fourcc),

    #[error("failed to allocate {len} bytes of shared memory: {source}")]
    Allocation {
        len: u64,
        #[source]
        source: io::Error,
    },

    #[error("failed to map {len} bytes of shared memory: {source}")]
    Mapping {
        len: u64,
        #[source]
        source: io::Error,
    },

    #[error("image view creation failed: {0}")]
    ImageCreation(#[from] ImageError),

    #[error("protocol object creation failed: {0}")]
    ProtocolObject(#[from] ProtocolError),
}

/// Rejection reported by a [`Rasterizer`](crate::Rasterizer).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ImageError {
    #[error("empty image geometry {width}x{height}")]
    EmptyGeometry { width: u32, height: u32 },

    #[error("stride {stride} is not a multiple of 4 bytes")]
    UnalignedStride { stride: u32 },

    #[error("stride {stride} is smaller than a row of {width} pixels ({min} bytes)")]
    StrideTooSmall { stride: u32, width: u32, min: u64 },
}

/// Failure creating or using a windowing-protocol object.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("the compositor connection is no longer alive")]
    Disconnected,

    #[error("{what} {value} does not fit the protocol's 32-bit signed range")]
    OutOfRange { what: &'static str, value: u64 },

    #[error("format code 0x{0:08x} is not part of the protocol's format enumeration")]
    UnknownFormat(u32),
}
