//! Parallel gridding of LiDAR tiles into quantized DSM/DTM/CHM rasters.
//!
//! Input tiles are streamed in batches, reprojected into Web Mercator and binned
//! into an N x N grid in two parallel phases (extent, then accumulation). The
//! merged grids yield mean surface and terrain elevations, a canopy height
//! model and a validity mask, written as compact u16/u8 rasters plus a JSON
//! descriptor.

pub mod collect;
pub mod commons;
pub mod error;
pub mod geo_core;
pub mod geometric;
pub mod pipeline;
pub mod raster;

pub use error::{Error, Phase, Result};
pub use geo_core::{BoundingBox, CoordinateTransform, IdentityProvider, TransformProvider};
#[cfg(feature = "proj")]
pub use geo_core::ProjProvider;
pub use pipeline::{Pipeline, PipelineConfig, PipelineOutput, RunSummary};
