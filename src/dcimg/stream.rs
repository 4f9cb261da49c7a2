//! Little-endian random access over a single DCIMG file.
//!
//! Every multi-byte integer in the format is little-endian, so the cursor
//! only exposes little-endian reads. Relative skips go through
//! `BufReader::seek_relative` to keep the read buffer alive across the
//! row-stride skips issued by the plane reader.

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt};

use crate::error::Result;

/// Magic bytes at the start of every DCIMG file.
pub const MAGIC: &[u8; 5] = b"DCIMG";

/// Buffered random-access cursor over one file.
#[derive(Debug)]
pub struct DcimgStream {
    inner: BufReader<File>,
}

impl DcimgStream {
    /// Open a file for reading. No parsing happens here.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        Ok(Self {
            inner: BufReader::new(file),
        })
    }

    /// Move the cursor to an absolute byte offset.
    pub fn seek(&mut self, pos: u64) -> Result<()> {
        self.inner.seek(SeekFrom::Start(pos))?;
        Ok(())
    }

    /// Advance (or rewind) the cursor relative to its current position.
    pub fn skip(&mut self, n: i64) -> Result<()> {
        self.inner.seek_relative(n)?;
        Ok(())
    }

    /// Current absolute cursor position.
    pub fn tell(&mut self) -> Result<u64> {
        Ok(self.inner.stream_position()?)
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        Ok(self.inner.read_u32::<LittleEndian>()?)
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        Ok(self.inner.read_i32::<LittleEndian>()?)
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        Ok(self.inner.read_u64::<LittleEndian>()?)
    }

    pub fn read_i64(&mut self) -> Result<i64> {
        Ok(self.inner.read_i64::<LittleEndian>()?)
    }

    /// Fill `buf` completely from the current position.
    pub fn read_into(&mut self, buf: &mut [u8]) -> Result<()> {
        self.inner.read_exact(buf)?;
        Ok(())
    }

    /// Read five bytes from the current position and compare them to the
    /// DCIMG magic. The cursor advances past the probed bytes either way.
    pub fn matches_magic(&mut self) -> Result<bool> {
        let mut probe = [0u8; MAGIC.len()];
        match self.inner.read_exact(&mut probe) {
            Ok(()) => Ok(&probe == MAGIC),
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

/// Probe whether the file at `path` starts with the DCIMG magic.
///
/// Unreadable files probe as `false`; this never fails.
pub fn is_dcimg<P: AsRef<Path>>(path: P) -> bool {
    match DcimgStream::open(path) {
        Ok(mut stream) => stream.matches_magic().unwrap_or(false),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn stream_over(bytes: &[u8]) -> (NamedTempFile, DcimgStream) {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(bytes).unwrap();
        file.flush().unwrap();
        let stream = DcimgStream::open(file.path()).unwrap();
        (file, stream)
    }

    #[test]
    fn test_little_endian_reads() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&0xDEAD_BEEFu32.to_le_bytes());
        bytes.extend_from_slice(&(-7i32).to_le_bytes());
        bytes.extend_from_slice(&0x0102_0304_0506_0708u64.to_le_bytes());
        let (_file, mut stream) = stream_over(&bytes);

        assert_eq!(stream.read_u32().unwrap(), 0xDEAD_BEEF);
        assert_eq!(stream.read_i32().unwrap(), -7);
        assert_eq!(stream.read_u64().unwrap(), 0x0102_0304_0506_0708);
        assert_eq!(stream.tell().unwrap(), 16);
    }

    #[test]
    fn test_seek_skip_tell() {
        let (_file, mut stream) = stream_over(&[0, 1, 2, 3, 4, 5, 6, 7]);
        stream.seek(4).unwrap();
        assert_eq!(stream.tell().unwrap(), 4);
        stream.skip(2).unwrap();
        assert_eq!(stream.tell().unwrap(), 6);
        stream.skip(-5).unwrap();
        let mut b = [0u8; 1];
        stream.read_into(&mut b).unwrap();
        assert_eq!(b[0], 1);
    }

    #[test]
    fn test_short_read_is_error() {
        let (_file, mut stream) = stream_over(&[0, 1]);
        assert!(stream.read_u32().is_err());
    }

    #[test]
    fn test_magic_probe() {
        let (file, mut stream) = stream_over(b"DCIMG\0\0\0");
        assert!(stream.matches_magic().unwrap());
        assert!(is_dcimg(file.path()));

        let (other, mut stream) = stream_over(b"NOTDC\0\0\0");
        assert!(!stream.matches_magic().unwrap());
        assert!(!is_dcimg(other.path()));

        // Too short to hold the magic probes as false, not as an error.
        let (_tiny, mut stream) = stream_over(b"DC");
        assert!(!stream.matches_magic().unwrap());
    }
}
