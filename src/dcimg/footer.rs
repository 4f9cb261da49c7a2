//! Four-pixel correction.
//!
//! Each DCIMG frame stores the first four pixels of one row out of line:
//! version 0x7 keeps them behind a two-hop pointer chain in the file
//! footer, the 0x1000000 family keeps them in the per-frame trailer. At
//! read time the in-frame stub for that row is replaced by the out-of-line
//! pixels.

use tracing::warn;

use crate::dcimg::header::{DcimgHeader, DcimgVersion};
use crate::dcimg::stream::DcimgStream;
use crate::error::{Error, Result};

/// Footer field offsets relative to `header_size + offset_to_footer`.
mod offsets {
    pub const VERSION: u64 = 0;
    pub const SECOND_FOOTER_OFFSET: u64 = 8;
}

/// Field offsets relative to the secondary footer.
mod offsets_secondary {
    pub const OFFSET_TO_FOUR_PIXELS: u64 = 88;
    pub const FOUR_PIXEL_OFFSET_IN_FRAME: u64 = 100;
    pub const FOUR_PIXEL_SIZE: u64 = 104;
}

/// Location of the out-of-line pixels for one opened reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FourPixelPatch {
    /// Frame row whose first four pixels live out of line.
    pub row: usize,
    /// Absolute file offset of the replacement pixels.
    pub offset: u64,
}

/// Follow the version-0 footer chain and locate the patch, if any.
pub(crate) fn parse_v0_footer(
    stream: &mut DcimgStream,
    header: &DcimgHeader,
) -> Result<Option<FourPixelPatch>> {
    let footer_base = header.header_size + header.offset_to_footer;

    stream.seek(footer_base + offsets::VERSION)?;
    let footer_version = stream.read_u32()?;
    if footer_version != header.raw_version {
        return Err(Error::FooterVersionMismatch {
            expected: header.raw_version,
            found: footer_version,
        });
    }

    stream.seek(footer_base + offsets::SECOND_FOOTER_OFFSET)?;
    let second_footer_offset = stream.read_i64()?;
    let second_base = footer_base
        .checked_add_signed(second_footer_offset)
        .ok_or_else(|| {
            Error::InvalidDimensions(format!(
                "secondary footer offset {second_footer_offset} points before the file"
            ))
        })?;

    stream.seek(second_base + offsets_secondary::OFFSET_TO_FOUR_PIXELS)?;
    let offset_to_four_pixels = stream.read_i64()?;
    stream.seek(second_base + offsets_secondary::FOUR_PIXEL_OFFSET_IN_FRAME)?;
    let four_pixel_offset_in_frame = stream.read_u32()?;
    stream.seek(second_base + offsets_secondary::FOUR_PIXEL_SIZE)?;
    let four_pixel_size = stream.read_i64()?;

    if four_pixel_size <= 0 {
        return Ok(None);
    }
    if header.bytes_per_row == 0 {
        return Err(Error::InvalidDimensions(
            "bytesPerRow is zero but a four-pixel patch is present".into(),
        ));
    }

    // The +1 is empirical; it matches every sample file seen so far.
    let row = (u64::from(four_pixel_offset_in_frame) / header.bytes_per_row + 1) as usize;
    let offset = footer_base.checked_add_signed(offset_to_four_pixels).ok_or_else(|| {
        Error::InvalidDimensions(format!(
            "four-pixel offset {offset_to_four_pixels} points before the file"
        ))
    })?;

    Ok(Some(check_row(FourPixelPatch { row, offset }, header)))
}

/// Derive the patch for a 0x1000000-family file from the frame trailer
/// size. The row choice is a heuristic; `row_override` wins when given.
pub(crate) fn v1_patch(header: &DcimgHeader, row_override: Option<usize>) -> Option<FourPixelPatch> {
    debug_assert_eq!(header.version, DcimgVersion::V1);
    let present = header.frame_footer_size >= 512 || header.frame_footer_size == 32;
    if !present {
        return None;
    }

    let row = row_override.unwrap_or({
        if header.size_y % 2 == 0 {
            header.size_y / 2
        } else {
            header.size_y / 2 + 1
        }
    });
    let offset = header.header_size + header.data_offset + header.bytes_per_image + 12;

    Some(check_row(FourPixelPatch { row, offset }, header))
}

/// A patch row past the last frame row never matches a read; keep it but
/// say so.
fn check_row(patch: FourPixelPatch, header: &DcimgHeader) -> FourPixelPatch {
    if patch.row >= header.size_y {
        warn!(
            row = patch.row,
            size_y = header.size_y,
            "four-pixel patch row is outside the frame"
        );
    }
    patch
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dcimg::header::PixelType;

    fn v1_header(size_y: usize, frame_footer_size: u32) -> DcimgHeader {
        DcimgHeader {
            version: DcimgVersion::V1,
            size_x: 16,
            size_y,
            size_t: 1,
            pixel_type: PixelType::Mono16,
            raw_version: 0x100_0000,
            header_size: 96,
            data_offset: 128,
            bytes_per_row: 0,
            bytes_per_image: (16 * size_y * 2) as u64,
            offset_to_footer: 0,
            frame_footer_size,
        }
    }

    #[test]
    fn test_v1_patch_presence() {
        assert!(v1_patch(&v1_header(8, 0), None).is_none());
        assert!(v1_patch(&v1_header(8, 16), None).is_none());
        assert!(v1_patch(&v1_header(8, 32), None).is_some());
        assert!(v1_patch(&v1_header(8, 511), None).is_none());
        assert!(v1_patch(&v1_header(8, 512), None).is_some());
        assert!(v1_patch(&v1_header(8, 2048), None).is_some());
    }

    #[test]
    fn test_v1_patch_row_parity() {
        assert_eq!(v1_patch(&v1_header(8, 32), None).unwrap().row, 4);
        assert_eq!(v1_patch(&v1_header(9, 32), None).unwrap().row, 5);
    }

    #[test]
    fn test_v1_patch_row_override() {
        assert_eq!(v1_patch(&v1_header(8, 32), Some(6)).unwrap().row, 6);
        // Override is ignored when no patch is present.
        assert!(v1_patch(&v1_header(8, 0), Some(6)).is_none());
    }

    #[test]
    fn test_v1_patch_offset() {
        let header = v1_header(8, 32);
        let patch = v1_patch(&header, None).unwrap();
        assert_eq!(
            patch.offset,
            header.header_size + header.data_offset + header.bytes_per_image + 12
        );
    }
}
