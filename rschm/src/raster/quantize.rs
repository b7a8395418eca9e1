use crate::error::{Error, Result};

/// Largest encodable level of a u16 raster
pub const U16_LEVELS: f64 = 65535.0;

/// How a raster's value range is mapped onto `[0, 65535]`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    /// Non-negative values anchored at zero (canopy height): offset = 0, scale = max / 65535
    ZeroAnchored,
    /// Arbitrary range (terrain): offset = min, scale = (max - min) / 65535
    Offset,
}

/// Reorder an x-major `n x n` grid into image order:
/// row 0 is the maximum-Y edge, column 0 the minimum-X edge.
pub fn to_image_order<T: Copy>(grid: &[T], n: usize) -> Vec<T> {
    debug_assert_eq!(grid.len(), n * n);
    let mut image = Vec::with_capacity(n * n);
    for row in 0..n {
        let iy = n - 1 - row;
        for ix in 0..n {
            image.push(grid[ix * n + iy]);
        }
    }
    image
}

/// A raster quantized to u16 levels, row-major in image order
/// value = level * scale + offset
#[derive(Debug, Clone, PartialEq)]
pub struct QuantizedRaster {
    pub width: usize,
    pub height: usize,
    pub scale: f64,
    pub offset: f64,
    /// Observed minimum of the raw raster
    pub min: f64,
    /// Observed maximum of the raw raster
    pub max: f64,
    pub data: Vec<u16>,
}

impl QuantizedRaster {
    /// Quantize an image-ordered raster. `name` labels errors.
    /// Non-finite values are rejected; levels saturate at 0 and 65535.
    pub fn encode(
        name: &'static str,
        image: &[f64],
        width: usize,
        height: usize,
        encoding: Encoding,
    ) -> Result<Self> {
        if image.len() != width * height || image.is_empty() {
            return Err(Error::EncodingRange {
                raster: name,
                reason: format!(
                    "expected {}x{} values, got {}",
                    width,
                    height,
                    image.len()
                ),
            });
        }
        if let Some(pos) = image.iter().position(|v| !v.is_finite()) {
            return Err(Error::EncodingRange {
                raster: name,
                reason: format!("non-finite value {} at pixel {}", image[pos], pos),
            });
        }

        let min = image.iter().copied().fold(f64::INFINITY, f64::min);
        let max = image.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let (scale, offset) = match encoding {
            Encoding::ZeroAnchored => (if max > 0.0 { max / U16_LEVELS } else { 1.0 }, 0.0),
            Encoding::Offset => (
                if max > min {
                    (max - min) / U16_LEVELS
                } else {
                    1.0
                },
                min,
            ),
        };
        if !(scale.is_finite() && scale > 0.0) {
            return Err(Error::EncodingRange {
                raster: name,
                reason: format!("unusable scale {} for range [{}, {}]", scale, min, max),
            });
        }

        let data = image
            .iter()
            .map(|&v| ((v - offset) / scale).round_ties_even().clamp(0.0, U16_LEVELS) as u16)
            .collect();

        Ok(QuantizedRaster {
            width,
            height,
            scale,
            offset,
            min,
            max,
            data,
        })
    }

    pub fn get(&self, row: usize, col: usize) -> u16 {
        self.data[row * self.width + col]
    }

    /// Dequantize the whole raster
    pub fn decode(&self) -> Vec<f64> {
        self.data
            .iter()
            .map(|&level| level as f64 * self.scale + self.offset)
            .collect()
    }

    /// Little-endian u16 pixels, row-major
    pub fn to_le_bytes(&self) -> Vec<u8> {
        self.data.iter().flat_map(|v| v.to_le_bytes()).collect()
    }
}

/// Parse a little-endian u16 raster file body
pub fn decode_u16_le(bytes: &[u8]) -> Result<Vec<u16>> {
    if bytes.len() % 2 != 0 {
        return Err(Error::EncodingRange {
            raster: "u16",
            reason: format!("odd byte length {}", bytes.len()),
        });
    }
    Ok(bytes
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect())
}

/// Validity mask as 0/1 bytes
pub fn encode_mask(mask_image: &[bool]) -> Vec<u8> {
    mask_image.iter().map(|&valid| u8::from(valid)).collect()
}
