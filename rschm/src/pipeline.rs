//! Two-phase gridding pipeline.
//!
//! Phase 1 folds the extent of every input file, phase 2 bins every point into
//! a grid whose edges come from that extent. Each phase runs one task per file
//! on a bounded rayon pool; partial results travel back over a channel and are
//! merged on the calling thread as they arrive.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;

use rayon::{ThreadPool, ThreadPoolBuilder};
use serde::{Deserialize, Serialize};

#[cfg(feature = "indicatif")]
use crate::commons::basic_functions::file_progress;

use crate::collect::input::list_lidar_files;
use crate::error::{Error, Phase, Result};
use crate::geo_core::{BoundingBox, GeoCore, TransformProvider};
use crate::geometric::extent::{reduce_extent, Axis, GlobalExtent};
use crate::geometric::grid::{accumulate_grids, GridEdges, PartialGrids};
use crate::geometric::lidar::{ChunkedPointReader, PointBatch};
use crate::geometric::surface::DerivedSurfaces;
use crate::raster::metadata::Metadata;
use crate::raster::quantize::{encode_mask, to_image_order, Encoding, QuantizedRaster};
use crate::raster::writer::{OutputArtifacts, OutputPaths};

/// Everything a run needs. The caller chooses every value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineConfig {
    /// Directory holding the .las/.laz tiles
    pub input_dir: PathBuf,
    /// Directory receiving the rasters and metadata
    pub output_dir: PathBuf,
    /// Cells per axis (N)
    pub resolution: usize,
    /// Maximum points per streamed batch
    pub chunk_size: usize,
    /// CRS of the input tiles
    pub source_crs: String,
    /// Worker pool size
    pub workers: usize,
    /// Classification code treated as ground
    pub ground_class: u8,
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.resolution == 0 {
            return Err(Error::InvalidConfig("resolution must be at least 1".into()));
        }
        if self.chunk_size == 0 {
            return Err(Error::InvalidConfig("chunk size must be at least 1".into()));
        }
        if self.workers == 0 {
            return Err(Error::InvalidConfig("workers must be at least 1".into()));
        }
        if self.source_crs.trim().is_empty() {
            return Err(Error::InvalidConfig("source CRS must not be empty".into()));
        }
        Ok(())
    }
}

/// Intermediate and final products of a run, before anything is written
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub files: Vec<PathBuf>,
    pub extent: GlobalExtent,
    pub edges: GridEdges,
    pub grids: PartialGrids,
    pub surfaces: DerivedSurfaces,
    pub artifacts: OutputArtifacts,
}

/// Result of a completed run
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub output: PipelineOutput,
    pub paths: OutputPaths,
}

pub struct Pipeline<P: TransformProvider> {
    config: PipelineConfig,
    geo_core: GeoCore,
    provider: P,
    pool: ThreadPool,
}

impl<P: TransformProvider> Pipeline<P> {
    /// Validate the configuration and start the worker pool
    pub fn new(config: PipelineConfig, provider: P) -> Result<Self> {
        config.validate()?;
        let pool = ThreadPoolBuilder::new()
            .num_threads(config.workers)
            .thread_name(|i| format!("rschm-worker-{}", i))
            .build()?;
        Ok(Pipeline {
            geo_core: GeoCore::new(config.source_crs.clone()),
            config,
            provider,
            pool,
        })
    }

    /// Point-cloud files of the input directory, in path order
    pub fn discover_inputs(&self) -> Result<Vec<PathBuf>> {
        list_lidar_files(&self.config.input_dir)
    }

    /// Phase 1: global extent of all files in the processing CRS
    pub fn compute_extent(&self, files: &[PathBuf]) -> Result<GlobalExtent> {
        let bbox = run_phase(
            &self.pool,
            Phase::Bounds,
            files,
            BoundingBox::empty(),
            |path, abort| {
                let transform = self.geo_core.to_processing(&self.provider)?;
                let batches = open_batches(path, self.config.chunk_size, abort)?;
                reduce_extent(batches, &transform)
            },
            |acc, bbox| *acc = acc.merge(bbox),
        )?;
        GlobalExtent::finalize(bbox, files.len())
    }

    /// Phase 2: merged DSM/DTM sums and counts over all files
    pub fn compute_grids(&self, files: &[PathBuf], edges: &GridEdges) -> Result<PartialGrids> {
        let ground_class = self.config.ground_class;
        run_phase(
            &self.pool,
            Phase::Grids,
            files,
            PartialGrids::zeros(edges.resolution()),
            |path, abort| {
                let transform = self.geo_core.to_processing(&self.provider)?;
                let batches = open_batches(path, self.config.chunk_size, abort)?;
                accumulate_grids(batches, &transform, edges, ground_class)
            },
            |acc, grids| acc.merge(grids),
        )
    }

    /// Quantize the surfaces and build the metadata
    pub fn encode(
        &self,
        extent: &GlobalExtent,
        surfaces: &DerivedSurfaces,
        warnings: Vec<String>,
    ) -> Result<OutputArtifacts> {
        let n = surfaces.resolution;
        let chm = QuantizedRaster::encode(
            "chm",
            &to_image_order(&surfaces.chm, n),
            n,
            n,
            Encoding::ZeroAnchored,
        )?;
        let dtm = QuantizedRaster::encode(
            "dtm",
            &to_image_order(&surfaces.dtm_mean, n),
            n,
            n,
            Encoding::Offset,
        )?;
        let mask = encode_mask(&to_image_order(&surfaces.valid_mask, n));

        let to_geographic = self.geo_core.to_geographic(&self.provider)?;
        let geographic = extent.bbox().transform(&to_geographic)?;

        let metadata = Metadata::new(
            n,
            extent.bbox(),
            &geographic,
            self.geo_core.processing_crs(),
            &self.geo_core.source_crs,
            &chm,
            &dtm,
            warnings,
        );

        Ok(OutputArtifacts {
            chm,
            dtm,
            mask,
            metadata,
        })
    }

    /// Run both phases and encode the results without writing anything
    pub fn process(&self) -> Result<PipelineOutput> {
        let files = self.discover_inputs()?;
        log::info!(
            "Found {} LiDAR file(s) in {}",
            files.len(),
            self.config.input_dir.display()
        );
        log::info!("Using {} workers", self.config.workers);

        let extent = self.compute_extent(&files)?;
        let bbox = extent.bbox();
        log::info!(
            "Global extent ({}): [{:.3}, {:.3}] x [{:.3}, {:.3}]",
            self.geo_core.processing_crs(),
            bbox.min_x,
            bbox.max_x,
            bbox.min_y,
            bbox.max_y
        );

        let mut warnings = Vec::new();
        for axis in extent.degenerate_axes() {
            let warning = match axis {
                Axis::X => "extent has zero width; raster is flat along x",
                Axis::Y => "extent has zero height; raster is flat along y",
            };
            log::warn!("{}", warning);
            warnings.push(warning.to_string());
        }

        let edges = GridEdges::build(&extent, self.config.resolution)?;
        let grids = self.compute_grids(&files, &edges)?;
        log::info!(
            "Binned {} points ({} ground) into a {}x{} grid",
            grids.total_dsm_points(),
            grids.total_dtm_points(),
            edges.resolution(),
            edges.resolution()
        );

        let surfaces = DerivedSurfaces::derive(&grids);
        let artifacts = self.encode(&extent, &surfaces, warnings)?;

        Ok(PipelineOutput {
            files,
            extent,
            edges,
            grids,
            surfaces,
            artifacts,
        })
    }

    /// Full run: process, then write all four artifacts or none
    pub fn run(&self) -> Result<RunSummary> {
        let output = self.process()?;
        let paths = output.artifacts.write_all(&self.config.output_dir)?;
        Ok(RunSummary { output, paths })
    }
}

/// Batches of one file, cut short once `abort` is raised
fn open_batches<'a>(
    path: &Path,
    chunk_size: usize,
    abort: &'a AtomicBool,
) -> Result<impl Iterator<Item = Result<PointBatch>> + 'a> {
    let reader = ChunkedPointReader::open(path, chunk_size)?;
    Ok(reader.map(move |batch| {
        if abort.load(Ordering::Relaxed) {
            Err(Error::Cancelled)
        } else {
            batch
        }
    }))
}

/// Run `task` once per file on `pool` and fold the results with `merge` on the
/// calling thread. The first failure raises the abort flag, stops merging and
/// is returned tagged with the phase and file.
fn run_phase<T, F, M>(
    pool: &ThreadPool,
    phase: Phase,
    files: &[PathBuf],
    init: T,
    task: F,
    mut merge: M,
) -> Result<T>
where
    T: Send,
    F: Fn(&Path, &AtomicBool) -> Result<T> + Sync,
    M: FnMut(&mut T, T),
{
    let total = files.len();
    let abort = AtomicBool::new(false);
    let (tx, rx) = mpsc::channel::<(usize, Result<T>)>();

    #[cfg(feature = "indicatif")]
    let progress = file_progress(
        total,
        match phase {
            Phase::Bounds => "Bounds",
            Phase::Grids => "Grids",
        },
    );

    let mut acc = init;
    let mut failure: Option<Error> = None;

    pool.in_place_scope(|scope| {
        for (index, path) in files.iter().enumerate() {
            let tx = tx.clone();
            let task = &task;
            let abort = &abort;
            scope.spawn(move |_| {
                let result = if abort.load(Ordering::Relaxed) {
                    Err(Error::Cancelled)
                } else {
                    task(path.as_path(), abort)
                };
                // the receiver lives until every task has reported
                let _ = tx.send((index, result));
            });
        }
        drop(tx);

        let mut done = 0;
        for (index, result) in rx {
            done += 1;
            #[cfg(feature = "indicatif")]
            progress.inc(1);

            match result {
                Ok(partial) => {
                    if failure.is_none() {
                        merge(&mut acc, partial);
                        log::info!("[{}] {}/{} files processed", phase, done, total);
                    }
                }
                Err(Error::Cancelled) => {}
                Err(e) => {
                    if failure.is_none() {
                        log::error!("[{}] {} failed: {}", phase, files[index].display(), e);
                        abort.store(true, Ordering::Relaxed);
                        failure = Some(Error::Task {
                            phase,
                            path: files[index].clone(),
                            source: Box::new(e),
                        });
                    } else {
                        log::debug!("[{}] {} also failed: {}", phase, files[index].display(), e);
                    }
                }
            }
        }
    });

    #[cfg(feature = "indicatif")]
    progress.finish_and_clear();

    match failure {
        Some(e) => Err(e),
        None => Ok(acc),
    }
}
