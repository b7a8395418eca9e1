use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::geo_core::BoundingBox;
use crate::raster::quantize::QuantizedRaster;

/// Extent in the processing CRS
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub minx: f64,
    pub miny: f64,
    pub maxx: f64,
    pub maxy: f64,
}

impl From<&BoundingBox> for Bounds {
    fn from(bbox: &BoundingBox) -> Self {
        Bounds {
            minx: bbox.min_x,
            miny: bbox.min_y,
            maxx: bbox.max_x,
            maxy: bbox.max_y,
        }
    }
}

/// Extent in longitude/latitude degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeographicBounds {
    pub lat_min: f64,
    pub lon_min: f64,
    pub lat_max: f64,
    pub lon_max: f64,
}

impl From<&BoundingBox> for GeographicBounds {
    fn from(bbox: &BoundingBox) -> Self {
        GeographicBounds {
            lat_min: bbox.min_y,
            lon_min: bbox.min_x,
            lat_max: bbox.max_y,
            lon_max: bbox.max_x,
        }
    }
}

/// Descriptor written next to the binary rasters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    pub width: usize,
    pub height: usize,
    pub bounds: Bounds,
    pub bounds_wgs84: GeographicBounds,
    /// Processing CRS of `bounds`
    pub crs: String,
    /// CRS of the input point clouds
    pub source_crs: String,
    pub chm_scale: f64,
    pub chm_offset: f64,
    pub chm_min_height: f64,
    pub chm_max_height: f64,
    pub dtm_scale: f64,
    pub dtm_offset: f64,
    pub dtm_min_height: f64,
    pub dtm_max_height: f64,
    /// Cell size along x
    pub dx: f64,
    /// Cell size along y
    pub dy: f64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl Metadata {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        resolution: usize,
        bbox: &BoundingBox,
        geographic: &BoundingBox,
        crs: &str,
        source_crs: &str,
        chm: &QuantizedRaster,
        dtm: &QuantizedRaster,
        warnings: Vec<String>,
    ) -> Self {
        Metadata {
            width: resolution,
            height: resolution,
            bounds: Bounds::from(bbox),
            bounds_wgs84: GeographicBounds::from(geographic),
            crs: crs.to_string(),
            source_crs: source_crs.to_string(),
            chm_scale: chm.scale,
            chm_offset: chm.offset,
            chm_min_height: chm.min,
            chm_max_height: chm.max,
            dtm_scale: dtm.scale,
            dtm_offset: dtm.offset,
            dtm_min_height: dtm.min,
            dtm_max_height: dtm.max,
            dx: bbox.width() / resolution as f64,
            dy: bbox.height() / resolution as f64,
            warnings,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::EncodingRange {
            raster: "metadata",
            reason: e.to_string(),
        })
    }

    /// Read a metadata file written by a previous run
    pub fn read(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        serde_json::from_str(&text).map_err(|e| Error::read(path, e))
    }
}
