//! Manifest staging
//!
//! The converter reads a line-oriented manifest from its data directory.
//! Before a case runs, the shared manifest is copied into the workspace with
//! every `#TEST_IGNORE_BEGIN` ... `#TEST_IGNORE_END` region removed, and the
//! stylesheets it references are copied next to it.

use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::config::{ManifestMarkers, ManifestSpec};
use crate::error::{HarnessError, Result};

/// What the filter did with a manifest
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FilterStats {
    pub kept: usize,
    /// Lines dropped, marker lines included
    pub dropped: usize,
    /// An ignore region was still open at end of input
    pub unterminated: bool,
}

/// Copy `reader` to `writer`, dropping ignore regions and marker lines.
///
/// Lines are compared as bytes and written back unchanged, line endings
/// included. An ignore region left open swallows the rest of the input.
pub fn filter_lines<R, W>(mut reader: R, mut writer: W, markers: &ManifestMarkers) -> Result<FilterStats>
where
    R: BufRead,
    W: Write,
{
    let begin = markers.ignore_begin.as_bytes();
    let end = markers.ignore_end.as_bytes();

    let mut stats = FilterStats::default();
    let mut ignoring = false;
    let mut line = Vec::new();

    loop {
        line.clear();
        if reader.read_until(b'\n', &mut line)? == 0 {
            break;
        }

        if ignoring {
            if line.starts_with(end) {
                ignoring = false;
            }
            stats.dropped += 1;
        } else if line.starts_with(begin) {
            ignoring = true;
            stats.dropped += 1;
        } else if line.starts_with(end) {
            warn!("dropping unmatched {} line", markers.ignore_end);
            stats.dropped += 1;
        } else {
            writer.write_all(&line)?;
            stats.kept += 1;
        }
    }

    writer.flush()?;
    stats.unterminated = ignoring;
    Ok(stats)
}

/// Filter `source` into `dest` and copy `extra_assets` into `dest`'s directory.
pub fn filter(
    source: &Path,
    dest: &Path,
    extra_assets: &[PathBuf],
    markers: &ManifestMarkers,
) -> Result<FilterStats> {
    let reader = BufReader::new(File::open(source)?);
    let writer = BufWriter::new(File::create(dest)?);
    let stats = filter_lines(reader, writer, markers)?;
    if stats.unterminated {
        warn!(
            manifest = %source.display(),
            "{} is never closed; the rest of the manifest was dropped",
            markers.ignore_begin
        );
    }

    let dest_dir = dest
        .parent()
        .ok_or_else(|| HarnessError::Config(format!("{} has no parent directory", dest.display())))?;
    for asset in extra_assets {
        let name = asset
            .file_name()
            .ok_or_else(|| HarnessError::Config(format!("asset {} has no file name", asset.display())))?;
        fs::copy(asset, dest_dir.join(name))?;
    }

    debug!(
        kept = stats.kept,
        dropped = stats.dropped,
        assets = extra_assets.len(),
        "staged manifest into {}",
        dest_dir.display()
    );
    Ok(stats)
}

/// Stage the manifest and assets of `data_dir` into `workspace_data_dir`.
pub fn stage(data_dir: &Path, workspace_data_dir: &Path, spec: &ManifestSpec) -> Result<FilterStats> {
    let assets: Vec<PathBuf> = spec
        .extra_assets
        .iter()
        .map(|asset| data_dir.join(asset))
        .collect();
    filter(
        &data_dir.join(&spec.file_name),
        &workspace_data_dir.join(&spec.file_name),
        &assets,
        &spec.markers,
    )
}
