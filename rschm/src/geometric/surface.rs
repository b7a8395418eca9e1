use crate::geometric::grid::PartialGrids;

/// Mean DSM/DTM, canopy height and validity per cell
/// Same x-major layout as `PartialGrids`.
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedSurfaces {
    pub resolution: usize,
    /// Mean elevation of all returns, 0 where the cell is empty
    pub dsm_mean: Vec<f64>,
    /// Mean elevation of ground returns, 0 where the cell has none
    pub dtm_mean: Vec<f64>,
    /// max(dsm_mean - dtm_mean, 0)
    pub chm: Vec<f64>,
    /// Cell has at least one return and at least one ground return
    pub valid_mask: Vec<bool>,
}

#[inline]
fn mean(sum: f64, count: u64) -> f64 {
    if count > 0 {
        sum / count as f64
    } else {
        0.0
    }
}

impl DerivedSurfaces {
    /// Derive the surfaces from merged grids. Pure and deterministic.
    pub fn derive(grids: &PartialGrids) -> Self {
        let n = grids.resolution();
        let cells = grids.cells();
        let mut dsm_mean = Vec::with_capacity(cells);
        let mut dtm_mean = Vec::with_capacity(cells);
        let mut chm = Vec::with_capacity(cells);
        let mut valid_mask = Vec::with_capacity(cells);

        for ix in 0..n {
            for iy in 0..n {
                let dsm_count = grids.dsm_count(ix, iy);
                let dtm_count = grids.dtm_count(ix, iy);
                let dsm = mean(grids.dsm_sum(ix, iy), dsm_count);
                let dtm = mean(grids.dtm_sum(ix, iy), dtm_count);
                let height = dsm - dtm;

                dsm_mean.push(dsm);
                dtm_mean.push(dtm);
                // NaN passes through so the encoder can reject it
                chm.push(if height < 0.0 { 0.0 } else { height });
                valid_mask.push(dsm_count > 0 && dtm_count > 0);
            }
        }

        DerivedSurfaces {
            resolution: n,
            dsm_mean,
            dtm_mean,
            chm,
            valid_mask,
        }
    }

    #[inline]
    pub fn index(&self, ix: usize, iy: usize) -> usize {
        ix * self.resolution + iy
    }
}
