//! Turning user input into ordered partition registrations.
//!
//! Two sources are supported:
//! - an explicit `name:path,name:path` list, kept in the order written
//! - a directory scan, one partition per image file named after its stem,
//!   ordered by file name so repeated scans give the same layout

use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::{PayloadError, PayloadResult};
use crate::partition::PartitionSpec;

/// Parse a comma-separated list of `name:path` pairs.
///
/// Whitespace around names and paths is trimmed. A pair without exactly one
/// `:`, or with an empty side, is rejected.
pub fn parse_partition_list(list: &str) -> PayloadResult<Vec<PartitionSpec>> {
    let mut specs = Vec::new();
    for pair in list.split(',') {
        let parts: Vec<&str> = pair.split(':').collect();
        if parts.len() != 2 {
            return Err(PayloadError::InvalidSpecification(format!(
                "invalid partition format {:?}, expected name:image_file",
                pair.trim()
            )));
        }
        let name = parts[0].trim();
        let image = parts[1].trim();
        if image.is_empty() {
            return Err(PayloadError::InvalidSpecification(format!(
                "missing image path for partition {name:?}"
            )));
        }
        specs.push(PartitionSpec::new(name, image)?);
    }
    Ok(specs)
}

/// Find partition images directly inside `dir`.
///
/// Only regular files (or symlinks to them) whose extension equals
/// `extension` are picked up; subdirectories are not descended into. An empty result is an error.
pub fn discover_images(dir: &Path, extension: &str) -> PayloadResult<Vec<PartitionSpec>> {
    if !dir.is_dir() {
        return Err(PayloadError::InvalidSpecification(format!(
            "directory not found: {}",
            dir.display()
        )));
    }

    let mut specs = Vec::new();
    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|e| PayloadError::ReadFailure {
            partition: String::new(),
            path: dir.to_path_buf(),
            source: e.into(),
        })?;
        let path: PathBuf = entry.into_path();
        if path.extension().map(|e| e != extension).unwrap_or(true) {
            debug!(path = %path.display(), "ignoring non-image entry");
            continue;
        }
        // Follows symlinks, so linked images are picked up.
        if !path.is_file() {
            warn!(path = %path.display(), "skipping image entry that is not a regular file");
            continue;
        }
        let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
            warn!(path = %path.display(), "skipping image with non UTF-8 name");
            continue;
        };
        match PartitionSpec::new(name, &path) {
            Ok(spec) => {
                debug!(partition = %spec.name, path = %path.display(), "discovered image");
                specs.push(spec);
            }
            Err(e) => warn!(path = %path.display(), "skipping image: {}", e),
        }
    }

    if specs.is_empty() {
        return Err(PayloadError::InvalidSpecification(format!(
            "no .{extension} files found in directory: {}",
            dir.display()
        )));
    }
    Ok(specs)
}
