use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::collect::global_variables::LIDAR_EXTENSIONS;
use crate::error::{Error, Result};

/// True if `path` has one of the point-cloud extensions (case-insensitive)
pub fn is_lidar_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            LIDAR_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
        .unwrap_or(false)
}

/// List the point-cloud files directly inside `input_dir`, sorted by path.
/// Subdirectories are not descended into.
pub fn list_lidar_files(input_dir: &Path) -> Result<Vec<PathBuf>> {
    if !input_dir.is_dir() {
        return Err(Error::io(
            input_dir,
            std::io::Error::new(std::io::ErrorKind::NotFound, "input directory not found"),
        ));
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(input_dir).min_depth(1).max_depth(1) {
        let entry = entry.map_err(|e| Error::io(input_dir, e.into()))?;
        if entry.file_type().is_file() && is_lidar_file(entry.path()) {
            files.push(entry.into_path());
        }
    }
    files.sort();
    Ok(files)
}
