use serde::{Deserialize, Serialize};

#[cfg(feature = "proj")]
use proj::Proj;

use crate::error::{Error, Result};

/// Planar CRS every point is reprojected into before gridding (Web Mercator)
pub const PROCESSING_CRS: &str = "EPSG:3857";

/// Geographic CRS used for the secondary bounds in the metadata (WGS84)
pub const GEOGRAPHIC_CRS: &str = "EPSG:4326";

/// CRS handling for a run
/// Holds the source CRS of the input tiles and the fixed processing/geographic pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeoCore {
    /// CRS identifier of the input point clouds (e.g. "EPSG:3067")
    pub source_crs: String,
}

impl GeoCore {
    pub fn new(source_crs: impl Into<String>) -> Self {
        GeoCore {
            source_crs: source_crs.into(),
        }
    }

    /// CRS the grids are built in
    pub fn processing_crs(&self) -> &'static str {
        PROCESSING_CRS
    }

    /// Transformer from the source CRS into the processing CRS
    pub fn to_processing<P: TransformProvider>(&self, provider: &P) -> Result<P::Transform> {
        provider.transformer(&self.source_crs, PROCESSING_CRS)
    }

    /// Transformer from the processing CRS to longitude/latitude
    pub fn to_geographic<P: TransformProvider>(&self, provider: &P) -> Result<P::Transform> {
        provider.transformer(PROCESSING_CRS, GEOGRAPHIC_CRS)
    }
}

/// Vectorized 2D point transform between a fixed CRS pair.
pub trait CoordinateTransform {
    /// Map `(xs[i], ys[i])` into the target CRS. Both slices have the same length.
    fn transform(&self, xs: &[f64], ys: &[f64]) -> Result<(Vec<f64>, Vec<f64>)>;
}

/// Builds transforms for a CRS pair. Shared by all workers, each of which
/// creates its own transform.
pub trait TransformProvider: Sync {
    type Transform: CoordinateTransform;

    fn transformer(&self, from_crs: &str, to_crs: &str) -> Result<Self::Transform>;
}

/// Transform that returns its input unchanged
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityTransform;

impl CoordinateTransform for IdentityTransform {
    fn transform(&self, xs: &[f64], ys: &[f64]) -> Result<(Vec<f64>, Vec<f64>)> {
        Ok((xs.to_vec(), ys.to_vec()))
    }
}

/// Provider for inputs already in the processing CRS
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityProvider;

impl TransformProvider for IdentityProvider {
    type Transform = IdentityTransform;

    fn transformer(&self, _from_crs: &str, _to_crs: &str) -> Result<IdentityTransform> {
        Ok(IdentityTransform)
    }
}

/// PROJ-backed transform. Axis order is normalized to x = easting/longitude.
#[cfg(feature = "proj")]
pub struct ProjTransform {
    proj: Proj,
    from_crs: String,
    to_crs: String,
}

#[cfg(feature = "proj")]
impl ProjTransform {
    pub fn new(from_crs: &str, to_crs: &str) -> Result<Self> {
        let proj = Proj::new_known_crs(from_crs, to_crs, None).map_err(|e| {
            Error::transform(format!(
                "failed to create transformation {} -> {}: {}",
                from_crs, to_crs, e
            ))
        })?;
        Ok(ProjTransform {
            proj,
            from_crs: from_crs.to_string(),
            to_crs: to_crs.to_string(),
        })
    }
}

#[cfg(feature = "proj")]
impl CoordinateTransform for ProjTransform {
    fn transform(&self, xs: &[f64], ys: &[f64]) -> Result<(Vec<f64>, Vec<f64>)> {
        let mut coords: Vec<(f64, f64)> = xs.iter().copied().zip(ys.iter().copied()).collect();
        let count = coords.len();
        self.proj.convert_array(&mut coords).map_err(|e| {
            Error::transform(format!(
                "failed to transform {} points {} -> {}: {}",
                count,
                self.from_crs,
                self.to_crs,
                e
            ))
        })?;
        Ok(coords.into_iter().unzip())
    }
}

/// Provider creating one PROJ transformation per caller
#[cfg(feature = "proj")]
#[derive(Debug, Clone, Copy, Default)]
pub struct ProjProvider;

#[cfg(feature = "proj")]
impl TransformProvider for ProjProvider {
    type Transform = ProjTransform;

    fn transformer(&self, from_crs: &str, to_crs: &str) -> Result<ProjTransform> {
        ProjTransform::new(from_crs, to_crs)
    }
}

/// Bounding box structure
/// Starts as the (+inf, +inf, -inf, -inf) identity of the min/max fold
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Default for BoundingBox {
    fn default() -> Self {
        BoundingBox::empty()
    }
}

impl BoundingBox {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        BoundingBox {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Identity element of `merge`
    pub fn empty() -> Self {
        BoundingBox::new(
            f64::INFINITY,
            f64::INFINITY,
            f64::NEG_INFINITY,
            f64::NEG_INFINITY,
        )
    }

    /// True while no point has been folded in
    pub fn is_empty(&self) -> bool {
        !(self.min_x.is_finite()
            && self.min_y.is_finite()
            && self.max_x.is_finite()
            && self.max_y.is_finite())
    }

    /// Grow the box to contain `(x, y)`. Non-finite coordinates are ignored.
    pub fn include(&mut self, x: f64, y: f64) {
        if !(x.is_finite() && y.is_finite()) {
            return;
        }
        self.min_x = self.min_x.min(x);
        self.min_y = self.min_y.min(y);
        self.max_x = self.max_x.max(x);
        self.max_y = self.max_y.max(y);
    }

    /// Fold a batch of coordinates into the box
    pub fn include_all(&mut self, xs: &[f64], ys: &[f64]) {
        for (&x, &y) in xs.iter().zip(ys) {
            self.include(x, y);
        }
    }

    /// Element-wise min/max; commutative and associative with `empty()` as identity
    pub fn merge(self, other: BoundingBox) -> BoundingBox {
        BoundingBox::new(
            self.min_x.min(other.min_x),
            self.min_y.min(other.min_y),
            self.max_x.max(other.max_x),
            self.max_y.max(other.max_y),
        )
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// Transform the min and max corners into another CRS
    pub fn transform<T: CoordinateTransform>(&self, transform: &T) -> Result<Self> {
        let (xs, ys) = transform.transform(&[self.min_x, self.max_x], &[self.min_y, self.max_y])?;
        match (xs.as_slice(), ys.as_slice()) {
            ([min_x, max_x], [min_y, max_y]) => {
                Ok(BoundingBox::new(*min_x, *min_y, *max_x, *max_y))
            }
            _ => Err(Error::transform(format!(
                "expected 2 corners, got {} x / {} y values",
                xs.len(),
                ys.len()
            ))),
        }
    }
}
