use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::collect::global_variables::{
    CHM_FILE_NAME, DTM_FILE_NAME, MASK_FILE_NAME, METADATA_FILE_NAME,
};
use crate::error::{Error, Result};
use crate::raster::metadata::Metadata;
use crate::raster::quantize::QuantizedRaster;

/// Everything a run produces, fully encoded in memory
#[derive(Debug, Clone)]
pub struct OutputArtifacts {
    pub chm: QuantizedRaster,
    pub dtm: QuantizedRaster,
    /// 0/1 per pixel, image order
    pub mask: Vec<u8>,
    pub metadata: Metadata,
}

/// Locations of the written artifacts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPaths {
    pub chm: PathBuf,
    pub dtm: PathBuf,
    pub mask: PathBuf,
    pub metadata: PathBuf,
}

impl OutputPaths {
    pub fn in_dir(output_dir: &Path) -> Self {
        OutputPaths {
            chm: output_dir.join(CHM_FILE_NAME),
            dtm: output_dir.join(DTM_FILE_NAME),
            mask: output_dir.join(MASK_FILE_NAME),
            metadata: output_dir.join(METADATA_FILE_NAME),
        }
    }
}

fn stage(output_dir: &Path, bytes: &[u8]) -> Result<NamedTempFile> {
    let mut file = tempfile::Builder::new()
        .prefix(".rschm-")
        .tempfile_in(output_dir)
        .map_err(|e| Error::io(output_dir, e))?;
    file.write_all(bytes)
        .and_then(|_| file.as_file().sync_all())
        .map_err(|e| Error::io(file.path(), e))?;
    Ok(file)
}

/// Move every staged file onto its target. Targets left by a previous run are
/// set aside first; if any move fails, the new files are removed and the old
/// ones put back.
fn persist_all(output_dir: &Path, staged: Vec<(NamedTempFile, &Path)>) -> Result<()> {
    if let Some((_, target)) = staged.iter().find(|(_, target)| target.is_dir()) {
        return Err(Error::io(
            *target,
            std::io::Error::other("artifact path is a directory"),
        ));
    }

    let aside_dir = tempfile::Builder::new()
        .prefix(".rschm-prev-")
        .tempdir_in(output_dir)
        .map_err(|e| Error::io(output_dir, e))?;
    let mut aside: Vec<(PathBuf, PathBuf)> = Vec::new();
    for (i, (_, target)) in staged.iter().enumerate() {
        if !target.exists() {
            continue;
        }
        let saved = aside_dir.path().join(i.to_string());
        if let Err(e) = std::fs::rename(target, &saved) {
            roll_back(&[], &aside);
            return Err(Error::io(*target, e));
        }
        aside.push((target.to_path_buf(), saved));
    }

    let mut moved: Vec<PathBuf> = Vec::new();
    for (file, target) in staged {
        if let Err(e) = file.persist(target) {
            roll_back(&moved, &aside);
            return Err(Error::io(target, e.error));
        }
        moved.push(target.to_path_buf());
    }
    Ok(())
}

fn roll_back(moved: &[PathBuf], aside: &[(PathBuf, PathBuf)]) {
    for target in moved {
        if let Err(e) = std::fs::remove_file(target) {
            log::warn!("Could not remove {}: {}", target.display(), e);
        }
    }
    for (target, saved) in aside {
        if let Err(e) = std::fs::rename(saved, target) {
            log::warn!("Could not restore {}: {}", target.display(), e);
        }
    }
}

impl OutputArtifacts {
    /// Write the three rasters and the metadata into `output_dir`.
    /// All four files are staged first, then moved into place together.
    /// On any failure none of the new files remain and files from a previous
    /// run are restored.
    pub fn write_all(&self, output_dir: &Path) -> Result<OutputPaths> {
        std::fs::create_dir_all(output_dir).map_err(|e| Error::io(output_dir, e))?;
        let paths = OutputPaths::in_dir(output_dir);

        let staged = vec![
            (stage(output_dir, &self.chm.to_le_bytes())?, paths.chm.as_path()),
            (stage(output_dir, &self.dtm.to_le_bytes())?, paths.dtm.as_path()),
            (stage(output_dir, &self.mask)?, paths.mask.as_path()),
            (
                stage(output_dir, self.metadata.to_json()?.as_bytes())?,
                paths.metadata.as_path(),
            ),
        ];
        persist_all(output_dir, staged)?;

        for target in [&paths.chm, &paths.dtm, &paths.mask, &paths.metadata] {
            log::info!("Wrote {}", target.display());
        }
        Ok(paths)
    }
}
