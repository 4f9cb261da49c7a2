//! Companion file discovery.
//!
//! Acquisitions that span several Z-slices write one `.dcimg` file per
//! slice into a single directory. When grouping is enabled the reader
//! treats every sibling that passes the magic check as one slice, in
//! lexicographic order. Geometry equality across siblings is assumed, not
//! verified.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::dcimg::stream::DcimgStream;
use crate::error::Result;

/// Enumerate the sibling `.dcimg` files of `primary`, sorted
/// lexicographically. `primary` must already be an absolute path; it is
/// subject to the same magic check as its siblings.
pub(crate) fn companion_files(primary: &Path) -> Result<Vec<PathBuf>> {
    let parent = primary.parent().unwrap_or_else(|| Path::new("."));

    let mut files = Vec::new();
    for entry in std::fs::read_dir(parent)? {
        let path = entry?.path();
        if !has_dcimg_extension(&path) {
            continue;
        }
        if passes_magic(&path) {
            files.push(path);
        } else {
            warn!(path = %path.display(), "sibling failed the DCIMG magic check, skipping");
        }
    }
    files.sort();

    debug!(count = files.len(), dir = %parent.display(), "grouped companion files");
    Ok(files)
}

fn has_dcimg_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("dcimg"))
}

/// Siblings are opened only transiently for the probe; an unreadable
/// sibling is treated like a failed probe.
fn passes_magic(path: &Path) -> bool {
    match DcimgStream::open(path) {
        Ok(mut stream) => stream.matches_magic().unwrap_or(false),
        Err(_) => false,
    }
}
