//! Random-access DCIMG plane reader.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::dcimg::footer::{self, FourPixelPatch};
use crate::dcimg::group;
use crate::dcimg::header::{self, DcimgHeader, DcimgVersion, PixelType};
use crate::dcimg::stream::DcimgStream;
use crate::error::{Error, Result};

/// Options for opening a reader.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReaderOptions {
    /// Treat sibling `.dcimg` files in the same directory as additional
    /// Z-slices.
    pub group_files: bool,
    /// Override for the patch row of 0x1000000-family files. The built-in
    /// row choice for that generation is a heuristic; acquisitions that
    /// disagree with it can supply the correct row here.
    pub patch_row: Option<usize>,
}

/// Shape and sample layout of an opened reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    /// Columns per frame.
    pub size_x: usize,
    /// Rows per frame.
    pub size_y: usize,
    /// Files in the group; 1 when grouping is off.
    pub size_z: usize,
    /// Channels; DCIMG is grayscale, always 1.
    pub size_c: usize,
    /// Frames per file.
    pub size_t: usize,
    /// Sample type.
    pub pixel_type: PixelType,
    /// DCIMG is always little-endian.
    pub little_endian: bool,
}

impl Geometry {
    /// Dimension order presented to callers, fixed for the format.
    pub const DIMENSION_ORDER: &'static str = header::DIMENSION_ORDER;

    /// Total number of 2D planes.
    pub fn image_count(&self) -> usize {
        self.size_z * self.size_c * self.size_t
    }

    /// Bytes per pixel.
    pub fn byte_factor(&self) -> usize {
        self.pixel_type.byte_factor()
    }

    /// Size of one full decoded plane in bytes.
    pub fn plane_size(&self) -> usize {
        self.size_x * self.size_y * self.byte_factor()
    }
}

/// Reader over one DCIMG file, or a directory group of them.
///
/// A reader parses everything up front and then serves any number of
/// plane reads. Reads are single-threaded per instance; distinct
/// instances are independent.
///
/// # Example
/// ```ignore
/// let mut reader = dcimgrs::DcimgReader::open("stack.dcimg", false)?;
/// let geom = reader.geometry();
/// let mut plane = vec![0u8; geom.plane_size()];
/// reader.read_plane(0, &mut plane, 0, 0, geom.size_x, geom.size_y)?;
/// ```
#[derive(Debug)]
pub struct DcimgReader {
    path: PathBuf,
    /// `None` once closed.
    stream: Option<DcimgStream>,
    header: DcimgHeader,
    patch: Option<FourPixelPatch>,
    /// Companion set; `files[z]` provides the pixels for slice `z`.
    files: Vec<PathBuf>,
}

impl DcimgReader {
    /// Open `path` and parse its header, footer, and (optionally) its
    /// directory group. On failure no reader exists.
    pub fn open<P: AsRef<Path>>(path: P, group_files: bool) -> Result<Self> {
        Self::open_with(
            path,
            ReaderOptions {
                group_files,
                ..ReaderOptions::default()
            },
        )
    }

    /// [`open`](Self::open) with full [`ReaderOptions`].
    pub fn open_with<P: AsRef<Path>>(path: P, options: ReaderOptions) -> Result<Self> {
        let path = std::fs::canonicalize(path)?;
        let mut stream = DcimgStream::open(&path)?;
        let header = DcimgHeader::parse(&mut stream)?;

        let patch = match header.version {
            DcimgVersion::V0 => footer::parse_v0_footer(&mut stream, &header)?,
            DcimgVersion::V1 => footer::v1_patch(&header, options.patch_row),
        };

        let files = if options.group_files {
            group::companion_files(&path)?
        } else {
            vec![path.clone()]
        };

        debug!(
            path = %path.display(),
            size_z = files.len(),
            patched = patch.is_some(),
            "opened DCIMG reader"
        );
        Ok(Self {
            path,
            stream: Some(stream),
            header,
            patch,
            files,
        })
    }

    /// Header generation of the primary file.
    pub fn version(&self) -> DcimgVersion {
        self.header.version
    }

    /// Location of the four-pixel correction, when the file has one.
    pub fn four_pixel_patch(&self) -> Option<FourPixelPatch> {
        self.patch
    }

    /// Geometry of the opened stack. Frozen at open time.
    pub fn geometry(&self) -> Geometry {
        Geometry {
            size_x: self.header.size_x,
            size_y: self.header.size_y,
            size_z: self.files.len(),
            size_c: 1,
            size_t: self.header.size_t,
            pixel_type: self.header.pixel_type,
            little_endian: true,
        }
    }

    /// Total number of readable planes: `sizeZ * sizeT * sizeC`.
    pub fn image_count(&self) -> usize {
        self.geometry().image_count()
    }

    /// Files backing this reader, in Z order. `None` when asked for the
    /// non-pixel files only: every file in a DCIMG group carries pixels.
    pub fn used_files(&self, no_pixels: bool) -> Option<&[PathBuf]> {
        if no_pixels {
            None
        } else {
            Some(&self.files)
        }
    }

    /// Read the window `(x, y, w, h)` of plane `no` into `buf`, row-major.
    ///
    /// `buf` must hold exactly `w * h * byteFactor` bytes. Frames are
    /// stored column-major; the descending-row loop below is the whole of
    /// the transpose, because the header's sizeX/sizeY are already swapped
    /// relative to the visual convention. Do not add another swap.
    pub fn read_plane(
        &mut self,
        no: usize,
        buf: &mut [u8],
        x: usize,
        y: usize,
        w: usize,
        h: usize,
    ) -> Result<()> {
        if self.stream.is_none() {
            return Err(Error::ReaderClosed);
        }
        let count = self.image_count();
        if no >= count {
            return Err(Error::PlaneOutOfRange { index: no, count });
        }
        let (size_x, size_y) = (self.header.size_x, self.header.size_y);
        let x_end = x.checked_add(w);
        let y_end = y.checked_add(h);
        if x_end.is_none_or(|e| e > size_x) || y_end.is_none_or(|e| e > size_y) {
            return Err(Error::RegionOutOfBounds {
                x,
                y,
                w,
                h,
                size_x,
                size_y,
            });
        }
        let bf = self.header.byte_factor();
        let expected = w * h * bf;
        if buf.len() != expected {
            return Err(Error::BufferSizeMismatch {
                expected,
                actual: buf.len(),
            });
        }

        let z = no / self.header.size_t;
        let t = (no % self.header.size_t) as u64;
        let patch = self.patch;
        let frame_base =
            self.header.header_size + self.header.data_offset + t * self.header.bytes_per_image;

        let Some(primary) = self.stream.as_mut() else {
            return Err(Error::ReaderClosed);
        };
        // Companion slices are opened for this call only and released on
        // every exit path.
        let mut guest;
        let stream: &mut DcimgStream = if self.files[z] == self.path {
            primary
        } else {
            guest = DcimgStream::open(&self.files[z])?;
            &mut guest
        };

        stream.seek(frame_base + (bf * y * size_x) as u64)?;
        for row in (0..h).rev() {
            // The file advances forward while destination rows fill from
            // the bottom up; this row being read is:
            let frame_row = y + (h - 1 - row);
            let dst = bf * row * w;

            let splice = patch.filter(|p| frame_row == p.row && x < 4);
            if let Some(p) = splice {
                // First `head` window pixels come from the out-of-line
                // region; the in-frame stub under them is skipped.
                let head = (4 - x).min(w);
                let pos = stream.tell()?;
                stream.seek(p.offset + (bf * x) as u64)?;
                stream.read_into(&mut buf[dst..dst + bf * head])?;
                stream.seek(pos)?;
                stream.skip((bf * (x + head)) as i64)?;
                stream.read_into(&mut buf[dst + bf * head..dst + bf * w])?;
            } else {
                stream.skip((bf * x) as i64)?;
                stream.read_into(&mut buf[dst..dst + bf * w])?;
            }
            stream.skip((bf * (size_x - w - x)) as i64)?;
        }
        Ok(())
    }

    /// Release the byte source. Terminal: a closed reader cannot be
    /// reopened, and further plane reads fail.
    pub fn close(&mut self) {
        self.stream = None;
    }
}
