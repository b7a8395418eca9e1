use crate::error::{Error, Result};
use crate::geo_core::{BoundingBox, CoordinateTransform};
use crate::geometric::lidar::PointBatch;

/// Fold every batch of one file into a bounding box in the target CRS
/// z and classification are not looked at
pub fn reduce_extent<I, T>(batches: I, transform: &T) -> Result<BoundingBox>
where
    I: IntoIterator<Item = Result<PointBatch>>,
    T: CoordinateTransform,
{
    let mut bbox = BoundingBox::empty();
    for batch in batches {
        let batch = batch?;
        if batch.is_empty() {
            continue;
        }
        let (xs, ys) = transform.transform(&batch.x, &batch.y)?;
        bbox.include_all(&xs, &ys);
    }
    Ok(bbox)
}

/// Axis of the processing CRS
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
}

/// Non-empty extent covering every input file
/// Output of the bounds phase; the only thing grid edges can be built from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GlobalExtent {
    bbox: BoundingBox,
}

impl GlobalExtent {
    /// Accept a merged box, rejecting it if no point ever reached it.
    /// `files` is the number of files that were folded, for the error message.
    pub fn finalize(bbox: BoundingBox, files: usize) -> Result<Self> {
        if bbox.is_empty() {
            return Err(Error::NoValidData { files });
        }
        Ok(GlobalExtent { bbox })
    }

    pub fn bbox(&self) -> &BoundingBox {
        &self.bbox
    }

    /// Axes with zero extent. Rasters are flat along these.
    pub fn degenerate_axes(&self) -> Vec<Axis> {
        let mut axes = Vec::new();
        if self.bbox.min_x == self.bbox.max_x {
            axes.push(Axis::X);
        }
        if self.bbox.min_y == self.bbox.max_y {
            axes.push(Axis::Y);
        }
        axes
    }
}
