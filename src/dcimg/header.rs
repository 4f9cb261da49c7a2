//! DCIMG header parsing and representation.
//!
//! Supports both header generations: the DCAM 0x7 layout and the
//! 0x1000000-family layout, discriminated by the version word at byte 8.
//! The two generations place the session fields at different offsets and
//! disagree on the width of the data offset, so each has its own parse
//! path over a shared prefix.

use tracing::{debug, trace, warn};

use crate::dcimg::stream::{DcimgStream, MAGIC};
use crate::error::{Error, Result};

/// Version word for the original DCAM header layout.
pub const DCAM_VERSION_0: u32 = 0x7;
/// Smallest version word of the current header layout family.
pub const DCAM_VERSION_1: u32 = 0x100_0000;

/// Dimension order every DCIMG stack presents to callers.
pub const DIMENSION_ORDER: &str = "XYZCT";

/// Global prefix field byte offsets.
mod offsets {
    pub const VERSION: u64 = 8;
    pub const NUM_SESSIONS: u64 = 32;
    pub const HEADER_SIZE: u64 = 40;
    pub const FILE_SIZE: u64 = 48;
    pub const FILE_SIZE2: u64 = 64;
    pub const MYSTERY: u64 = 84;
}

/// Session header field offsets relative to `header_size`, 0x7 layout.
mod offsets_v0 {
    pub const SIZE_T: u64 = 32;
    pub const SIZE_X: u64 = 44;
    pub const DATA_OFFSET: u64 = 68;
}

/// Session header field offsets relative to `header_size`, 0x1000000 layout.
mod offsets_v1 {
    pub const SIZE_T: u64 = 60;
    pub const SIZE_X: u64 = 72;
    pub const BYTES_PER_IMAGE: u64 = 84;
    pub const DATA_OFFSET: u64 = 96;
    pub const FRAME_FOOTER_SIZE: u64 = 124;
}

/// DCIMG header generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DcimgVersion {
    /// Original DCAM layout (version word 0x7).
    V0,
    /// Current layout family (version word >= 0x1000000).
    V1,
}

impl DcimgVersion {
    /// Discriminate the version word. Words newer than the tested
    /// 0x1000000 are accepted with a warning.
    pub fn from_code(code: u32) -> Result<Self> {
        if code == DCAM_VERSION_0 {
            Ok(Self::V0)
        } else if code >= DCAM_VERSION_1 {
            if code > DCAM_VERSION_1 {
                warn!(version = code, "DCIMG version newer than tested");
            }
            Ok(Self::V1)
        } else {
            Err(Error::UnknownVersion(code))
        }
    }
}

/// Pixel sample type. DCIMG stores grayscale only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelType {
    /// Unsigned 8-bit samples (MONO8, code 0x1).
    Mono8,
    /// Unsigned 16-bit samples (MONO16, code 0x2).
    Mono16,
}

impl PixelType {
    /// Parse from the DCIMG pixel type code.
    pub fn from_code(code: i32) -> Result<Self> {
        match code {
            0x1 => Ok(Self::Mono8),
            0x2 => Ok(Self::Mono16),
            _ => Err(Error::UnsupportedPixelType(code)),
        }
    }

    /// Bytes per pixel.
    pub const fn byte_factor(self) -> usize {
        match self {
            Self::Mono8 => 1,
            Self::Mono16 => 2,
        }
    }
}

impl std::fmt::Display for PixelType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Mono8 => write!(f, "u8"),
            Self::Mono16 => write!(f, "u16"),
        }
    }
}

/// Parsed DCIMG header: geometry plus the offsets later stages need.
/// Frozen once parsing succeeds.
#[derive(Debug, Clone)]
pub struct DcimgHeader {
    /// Header generation.
    pub version: DcimgVersion,
    /// Columns per frame.
    pub size_x: usize,
    /// Rows per frame.
    pub size_y: usize,
    /// Frames per file.
    pub size_t: usize,
    /// Sample type of every pixel.
    pub pixel_type: PixelType,
    /// Version word as stored; the V0 footer replicates it.
    pub(crate) raw_version: u32,
    /// Absolute offset of the session header.
    pub(crate) header_size: u64,
    /// Offset of frame data relative to `header_size`.
    pub(crate) data_offset: u64,
    /// Row stride as recorded in the header (explicit in V0 only).
    pub(crate) bytes_per_row: u64,
    /// Frame stride in bytes.
    pub(crate) bytes_per_image: u64,
    /// Offset of the primary footer relative to `header_size` (V0).
    pub(crate) offset_to_footer: u64,
    /// Trailing bytes per frame (V1); encodes patch presence.
    pub(crate) frame_footer_size: u32,
}

impl DcimgHeader {
    /// Parse the prefix and the version-specific session header.
    ///
    /// The cursor position afterwards is unspecified.
    pub fn parse(stream: &mut DcimgStream) -> Result<Self> {
        let mut magic = [0u8; MAGIC.len()];
        stream.seek(0)?;
        stream.read_into(&mut magic)?;
        if &magic != MAGIC {
            return Err(Error::InvalidMagic(magic));
        }

        stream.seek(offsets::VERSION)?;
        let raw_version = stream.read_u32()?;
        let version = DcimgVersion::from_code(raw_version)?;

        stream.seek(offsets::NUM_SESSIONS)?;
        let num_sessions = stream.read_u32()?;
        let num_frames = stream.read_u32()?;

        stream.seek(offsets::HEADER_SIZE)?;
        let header_size = u64::from(stream.read_u32()?);

        stream.seek(offsets::FILE_SIZE)?;
        let file_size = u64::from(stream.read_u32()?);
        stream.seek(offsets::FILE_SIZE2)?;
        let file_size2 = u64::from(stream.read_u32()?);
        if file_size != file_size2 {
            return Err(Error::FileSizeMismatch(file_size, file_size2));
        }

        stream.seek(offsets::MYSTERY)?;
        let mystery = stream.read_u32()?; // 1024 in every sample seen
        trace!(num_sessions, num_frames, mystery, "DCIMG prefix");

        let header = match version {
            DcimgVersion::V0 => Self::parse_v0(stream, raw_version, header_size)?,
            DcimgVersion::V1 => Self::parse_v1(stream, raw_version, header_size)?,
        };

        let expected = header.plane_size();
        if header.bytes_per_image != 0 && header.bytes_per_image != expected as u64 {
            warn!(
                bytes_per_image = header.bytes_per_image,
                expected, "header byte count disagrees with computed frame size"
            );
        }

        debug!(
            version = ?header.version,
            size_x = header.size_x,
            size_y = header.size_y,
            size_t = header.size_t,
            pixel_type = %header.pixel_type,
            "parsed DCIMG header"
        );
        Ok(header)
    }

    fn parse_v0(stream: &mut DcimgStream, raw_version: u32, header_size: u64) -> Result<Self> {
        stream.seek(header_size + offsets_v0::SIZE_T)?;
        let size_t = stream.read_i32()?;
        let pixel_code = stream.read_i32()?;

        stream.seek(header_size + offsets_v0::SIZE_X)?;
        let size_x = stream.read_i32()?;
        let bytes_per_row = stream.read_u32()?;
        let size_y = stream.read_i32()?;
        let bytes_per_image = stream.read_u32()?;

        stream.seek(header_size + offsets_v0::DATA_OFFSET)?;
        let data_offset = stream.read_i32()?;
        let offset_to_footer = stream.read_i64()?;

        Ok(Self {
            version: DcimgVersion::V0,
            size_x: positive(size_x, "sizeX")?,
            size_y: positive(size_y, "sizeY")?,
            size_t: positive(size_t, "sizeT")?,
            pixel_type: PixelType::from_code(pixel_code)?,
            raw_version,
            header_size,
            data_offset: non_negative(i64::from(data_offset), "dataOffset")?,
            bytes_per_row: u64::from(bytes_per_row),
            bytes_per_image: u64::from(bytes_per_image),
            offset_to_footer: non_negative(offset_to_footer, "offsetToFooter")?,
            frame_footer_size: 0,
        })
    }

    fn parse_v1(stream: &mut DcimgStream, raw_version: u32, header_size: u64) -> Result<Self> {
        stream.seek(header_size + offsets_v1::SIZE_T)?;
        let size_t = stream.read_i32()?;
        let pixel_code = stream.read_i32()?;

        stream.seek(header_size + offsets_v1::SIZE_X)?;
        let size_x = stream.read_i32()?;
        let size_y = stream.read_i32()?;

        stream.seek(header_size + offsets_v1::BYTES_PER_IMAGE)?;
        let bytes_per_image = stream.read_u32()?;

        stream.seek(header_size + offsets_v1::DATA_OFFSET)?;
        let data_offset = stream.read_i64()?;

        stream.seek(header_size + offsets_v1::FRAME_FOOTER_SIZE)?;
        let frame_footer_size = stream.read_u32()?;

        Ok(Self {
            version: DcimgVersion::V1,
            size_x: positive(size_x, "sizeX")?,
            size_y: positive(size_y, "sizeY")?,
            size_t: positive(size_t, "sizeT")?,
            pixel_type: PixelType::from_code(pixel_code)?,
            raw_version,
            header_size,
            data_offset: non_negative(data_offset, "dataOffset")?,
            bytes_per_row: 0,
            bytes_per_image: u64::from(bytes_per_image),
            offset_to_footer: 0,
            frame_footer_size,
        })
    }

    /// Bytes per pixel for this header's sample type.
    pub fn byte_factor(&self) -> usize {
        self.pixel_type.byte_factor()
    }

    /// Size of one decoded plane in bytes.
    pub fn plane_size(&self) -> usize {
        self.size_x * self.size_y * self.byte_factor()
    }
}

fn positive(value: i32, field: &str) -> Result<usize> {
    if value > 0 {
        Ok(value as usize)
    } else {
        Err(Error::InvalidDimensions(format!(
            "{field} must be positive, got {value}"
        )))
    }
}

fn non_negative(value: i64, field: &str) -> Result<u64> {
    u64::try_from(value).map_err(|_| {
        Error::InvalidDimensions(format!("{field} must be non-negative, got {value}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_from_code() {
        assert_eq!(DcimgVersion::from_code(0x7).unwrap(), DcimgVersion::V0);
        assert_eq!(
            DcimgVersion::from_code(0x100_0000).unwrap(),
            DcimgVersion::V1
        );
        // Newer than tested is accepted, only warned about.
        assert_eq!(
            DcimgVersion::from_code(0x200_0000).unwrap(),
            DcimgVersion::V1
        );
        assert!(matches!(
            DcimgVersion::from_code(0x8),
            Err(Error::UnknownVersion(0x8))
        ));
        assert!(DcimgVersion::from_code(0).is_err());
    }

    #[test]
    fn test_pixel_type_from_code() {
        assert_eq!(PixelType::from_code(0x1).unwrap(), PixelType::Mono8);
        assert_eq!(PixelType::from_code(0x2).unwrap(), PixelType::Mono16);
        assert!(matches!(
            PixelType::from_code(0x3),
            Err(Error::UnsupportedPixelType(0x3))
        ));
        assert!(PixelType::from_code(0).is_err());
    }

    #[test]
    fn test_byte_factor() {
        assert_eq!(PixelType::Mono8.byte_factor(), 1);
        assert_eq!(PixelType::Mono16.byte_factor(), 2);
    }

    #[test]
    fn test_field_range_helpers() {
        assert_eq!(positive(3, "sizeX").unwrap(), 3);
        assert!(positive(0, "sizeX").is_err());
        assert!(positive(-1, "sizeX").is_err());
        assert_eq!(non_negative(0, "dataOffset").unwrap(), 0);
        assert!(non_negative(-8, "dataOffset").is_err());
    }
}
