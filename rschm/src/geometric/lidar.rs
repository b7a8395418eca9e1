use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// One chunk of LiDAR returns, stored column-wise
/// All four vectors always have the same length
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PointBatch {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub z: Vec<f64>,
    /// Raw ASPRS classification code
    pub classification: Vec<u8>,
}

impl PointBatch {
    pub fn with_capacity(capacity: usize) -> Self {
        PointBatch {
            x: Vec::with_capacity(capacity),
            y: Vec::with_capacity(capacity),
            z: Vec::with_capacity(capacity),
            classification: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, x: f64, y: f64, z: f64, classification: u8) {
        self.x.push(x);
        self.y.push(y);
        self.z.push(z);
        self.classification.push(classification);
    }

    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }
}

/// Streaming reader over a LAS/LAZ file
/// Yields batches of at most `batch_size` points in file order, never holding
/// more than one batch in memory. Reopen the file to read it again.
pub struct ChunkedPointReader {
    path: PathBuf,
    reader: las::Reader,
    batch_size: usize,
    number_of_points: u64,
    finished: bool,
}

impl ChunkedPointReader {
    /// Open `path` for batched reading
    /// Fails with `Error::Read` if the file is missing or not a readable LAS/LAZ container
    pub fn open(path: &Path, batch_size: usize) -> Result<Self> {
        if batch_size == 0 {
            return Err(Error::InvalidConfig(
                "batch size must be at least 1".to_string(),
            ));
        }
        let reader = las::Reader::from_path(path).map_err(|e| Error::read(path, e))?;
        let number_of_points = reader.header().number_of_points();

        Ok(ChunkedPointReader {
            path: path.to_path_buf(),
            reader,
            batch_size,
            number_of_points,
            finished: false,
        })
    }

    /// Point count declared in the file header
    pub fn number_of_points(&self) -> u64 {
        self.number_of_points
    }

    fn read_batch(&mut self) -> Result<PointBatch> {
        let capacity = self.batch_size.min(self.number_of_points as usize);
        let mut batch = PointBatch::with_capacity(capacity);
        for point in self.reader.points().take(self.batch_size) {
            let point = point.map_err(|e| Error::read(&self.path, e))?;
            batch.push(
                point.x,
                point.y,
                point.z,
                u8::from(point.classification),
            );
        }
        Ok(batch)
    }
}

impl Iterator for ChunkedPointReader {
    type Item = Result<PointBatch>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.read_batch() {
            Ok(batch) if batch.is_empty() => {
                self.finished = true;
                None
            }
            Ok(batch) => {
                if batch.len() < self.batch_size {
                    self.finished = true;
                }
                Some(Ok(batch))
            }
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}
