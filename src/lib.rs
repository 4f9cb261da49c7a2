//! Reader for Hamamatsu DCIMG camera image stacks.
//!
//! The entry point is [`DcimgReader`]: open a `.dcimg` file (optionally
//! grouping sibling files in the same directory into a Z axis), inspect
//! its [`Geometry`], and read rectangular windows of any plane into
//! caller-owned byte buffers. The decoder handles both DCIMG header
//! generations, the column-major frame layout, and the format's
//! four-pixel correction splice.
//!
//! Warnings (a version newer than tested, a sibling failing the magic
//! check) are emitted through [`tracing`]; install a subscriber to see
//! them.

pub mod dcimg;
pub mod error;

pub use dcimg::{is_dcimg, DcimgReader, DcimgVersion, Geometry, PixelType, ReaderOptions};
pub use error::{Error, Result};
