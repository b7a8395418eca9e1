use crate::commons::basic_functions::linspace;
use crate::error::{Error, Result};
use crate::geo_core::CoordinateTransform;
use crate::geometric::extent::GlobalExtent;
use crate::geometric::lidar::PointBatch;

/// Cell boundaries of the N x N grid
/// Built once from the global extent and then only read.
#[derive(Debug, Clone, PartialEq)]
pub struct GridEdges {
    resolution: usize,
    x_edges: Vec<f64>,
    y_edges: Vec<f64>,
}

impl GridEdges {
    /// `resolution + 1` evenly spaced edges per axis, from min to max inclusive
    pub fn build(extent: &GlobalExtent, resolution: usize) -> Result<Self> {
        if resolution == 0 {
            return Err(Error::InvalidConfig(
                "resolution must be at least 1".to_string(),
            ));
        }
        let bbox = extent.bbox();
        Ok(GridEdges {
            resolution,
            x_edges: linspace(bbox.min_x, bbox.max_x, resolution + 1),
            y_edges: linspace(bbox.min_y, bbox.max_y, resolution + 1),
        })
    }

    pub fn resolution(&self) -> usize {
        self.resolution
    }

    pub fn x_edges(&self) -> &[f64] {
        &self.x_edges
    }

    pub fn y_edges(&self) -> &[f64] {
        &self.y_edges
    }

    /// Cell of `(x, y)` as `(ix, iy)`, or None if the point is outside the grid
    pub fn cell_of(&self, x: f64, y: f64) -> Option<(usize, usize)> {
        Some((bin_index(&self.x_edges, x)?, bin_index(&self.y_edges, y)?))
    }
}

/// Histogram bin of `v`: `edges[i] <= v < edges[i + 1]`, last bin closed.
/// Values outside `[edges[0], edges[n]]` and NaN have no bin.
/// On a zero-width axis every in-range value lands in the last bin.
pub fn bin_index(edges: &[f64], v: f64) -> Option<usize> {
    let bins = edges.len().checked_sub(1).filter(|&n| n > 0)?;
    let lo = edges[0];
    let hi = edges[bins];
    if !(v >= lo && v <= hi) {
        return None;
    }
    if hi == lo {
        return Some(bins - 1);
    }

    let mut i = (((v - lo) / (hi - lo)) * bins as f64).floor() as usize;
    if i >= bins {
        i = bins - 1;
    }
    // linspace rounding can put v on the wrong side of a computed edge
    while i > 0 && v < edges[i] {
        i -= 1;
    }
    while i + 1 < bins && v >= edges[i + 1] {
        i += 1;
    }
    Some(i)
}

/// Per-cell Neumaier-compensated sums
#[derive(Debug, Clone, PartialEq)]
struct CompensatedGrid {
    sum: Vec<f64>,
    compensation: Vec<f64>,
}

impl CompensatedGrid {
    fn zeros(len: usize) -> Self {
        CompensatedGrid {
            sum: vec![0.0; len],
            compensation: vec![0.0; len],
        }
    }

    #[inline]
    fn add(&mut self, index: usize, value: f64) {
        let s = self.sum[index];
        let t = s + value;
        if s.abs() >= value.abs() {
            self.compensation[index] += (s - t) + value;
        } else {
            self.compensation[index] += (value - t) + s;
        }
        self.sum[index] = t;
    }

    fn merge(&mut self, other: CompensatedGrid) {
        for (index, (sum, compensation)) in other
            .sum
            .into_iter()
            .zip(other.compensation)
            .enumerate()
        {
            self.add(index, sum);
            self.compensation[index] += compensation;
        }
    }

    #[inline]
    fn value(&self, index: usize) -> f64 {
        self.sum[index] + self.compensation[index]
    }
}

/// Sum and count rasters of one or more files
/// Cells are stored x-major: cell (ix, iy) lives at `ix * resolution + iy`.
#[derive(Debug, Clone, PartialEq)]
pub struct PartialGrids {
    resolution: usize,
    dsm_sum: CompensatedGrid,
    dsm_count: Vec<u64>,
    dtm_sum: CompensatedGrid,
    dtm_count: Vec<u64>,
}

impl PartialGrids {
    /// All-zero grids, the identity of `merge`
    pub fn zeros(resolution: usize) -> Self {
        let cells = resolution * resolution;
        PartialGrids {
            resolution,
            dsm_sum: CompensatedGrid::zeros(cells),
            dsm_count: vec![0; cells],
            dtm_sum: CompensatedGrid::zeros(cells),
            dtm_count: vec![0; cells],
        }
    }

    pub fn resolution(&self) -> usize {
        self.resolution
    }

    pub fn cells(&self) -> usize {
        self.resolution * self.resolution
    }

    #[inline]
    fn index(&self, ix: usize, iy: usize) -> usize {
        ix * self.resolution + iy
    }

    pub fn dsm_sum(&self, ix: usize, iy: usize) -> f64 {
        self.dsm_sum.value(self.index(ix, iy))
    }

    pub fn dsm_count(&self, ix: usize, iy: usize) -> u64 {
        self.dsm_count[self.index(ix, iy)]
    }

    pub fn dtm_sum(&self, ix: usize, iy: usize) -> f64 {
        self.dtm_sum.value(self.index(ix, iy))
    }

    pub fn dtm_count(&self, ix: usize, iy: usize) -> u64 {
        self.dtm_count[self.index(ix, iy)]
    }

    /// Total number of points binned into the DSM
    pub fn total_dsm_points(&self) -> u64 {
        self.dsm_count.iter().sum()
    }

    /// Total number of ground points binned into the DTM
    pub fn total_dtm_points(&self) -> u64 {
        self.dtm_count.iter().sum()
    }

    /// Bin already-transformed points. Every point feeds the DSM, points whose
    /// class equals `ground_class` also feed the DTM.
    pub fn add_points(
        &mut self,
        edges: &GridEdges,
        xs: &[f64],
        ys: &[f64],
        zs: &[f64],
        classification: &[u8],
        ground_class: u8,
    ) {
        debug_assert_eq!(edges.resolution(), self.resolution);
        for (((&x, &y), &z), &class) in xs.iter().zip(ys).zip(zs).zip(classification) {
            let Some((ix, iy)) = edges.cell_of(x, y) else {
                continue;
            };
            let index = self.index(ix, iy);
            self.dsm_sum.add(index, z);
            self.dsm_count[index] += 1;
            if class == ground_class {
                self.dtm_sum.add(index, z);
                self.dtm_count[index] += 1;
            }
        }
    }

    /// Element-wise addition of another file's grids
    pub fn merge(&mut self, other: PartialGrids) {
        assert_eq!(
            self.resolution, other.resolution,
            "cannot merge grids of different resolution"
        );
        self.dsm_sum.merge(other.dsm_sum);
        self.dtm_sum.merge(other.dtm_sum);
        for (a, b) in self.dsm_count.iter_mut().zip(other.dsm_count) {
            *a += b;
        }
        for (a, b) in self.dtm_count.iter_mut().zip(other.dtm_count) {
            *a += b;
        }
    }
}

/// Accumulate every batch of one file into fresh grids
pub fn accumulate_grids<I, T>(
    batches: I,
    transform: &T,
    edges: &GridEdges,
    ground_class: u8,
) -> Result<PartialGrids>
where
    I: IntoIterator<Item = Result<PointBatch>>,
    T: CoordinateTransform,
{
    let mut grids = PartialGrids::zeros(edges.resolution());
    for batch in batches {
        let batch = batch?;
        if batch.is_empty() {
            continue;
        }
        let (xs, ys) = transform.transform(&batch.x, &batch.y)?;
        grids.add_points(edges, &xs, &ys, &batch.z, &batch.classification, ground_class);
    }
    Ok(grids)
}
