//! Crate-wide error type.

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the DCIMG decoder.
///
/// Parse failures are fatal for the reader that produced them; nothing is
/// retried locally.
#[derive(Error, Debug)]
pub enum Error {
    /// Underlying read or seek failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The first five bytes of the file are not `"DCIMG"`.
    #[error("invalid DCIMG magic: {0:?}")]
    InvalidMagic([u8; 5]),

    /// Version word is neither 0x7 nor a 0x1000000-family value.
    #[error("unknown DCIMG version {0:#x}")]
    UnknownVersion(u32),

    /// The two redundant file-size fields in the prefix disagree.
    #[error("file sizes do not match: {0} != {1}")]
    FileSizeMismatch(u64, u64),

    /// Pixel type code other than MONO8 (0x1) or MONO16 (0x2).
    #[error("unsupported pixel type {0:#x}")]
    UnsupportedPixelType(i32),

    /// The footer replicates the header version; the copies disagree.
    #[error("footer version {found:#x} does not match header version {expected:#x}")]
    FooterVersionMismatch { expected: u32, found: u32 },

    /// A header field is out of the range the format allows.
    #[error("invalid dimensions: {0}")]
    InvalidDimensions(String),

    /// Plane index past the end of the Z*T*C range.
    #[error("plane index {index} out of range for {count} planes")]
    PlaneOutOfRange { index: usize, count: usize },

    /// Destination buffer does not match the requested region.
    #[error("buffer holds {actual} bytes but the region needs {expected}")]
    BufferSizeMismatch { expected: usize, actual: usize },

    /// Requested window extends past the frame.
    #[error("region ({x},{y}) {w}x{h} exceeds frame bounds {size_x}x{size_y}")]
    RegionOutOfBounds {
        x: usize,
        y: usize,
        w: usize,
        h: usize,
        size_x: usize,
        size_y: usize,
    },

    /// Operation on a reader whose byte source was already released.
    #[error("reader is closed")]
    ReaderClosed,
}
