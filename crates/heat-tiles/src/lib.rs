//! Tile Renderer
//!
//! Turns the sparse point store into smooth 256x256 RGBA heat tiles:
//!
//! 1. tile bounds via slippy math, padded by ~3 sigma so off-tile points
//!    still bleed in
//! 2. bulk bbox query against the store (capped, silently truncated)
//! 3. per-point Gaussian splat into numerator/denominator grids
//! 4. per-pixel normalized heat (a KDE, not a raw sum: overlapping points
//!    average instead of saturating), gamma-compressed
//! 5. green-yellow-red color ramp with a nonzero alpha floor, encoded as
//!    lossless PNG
//!
//! Output is byte-identical across renders of the same tile against an
//! unchanged store.

use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use risk_model::{clamp01, meters_to_deg_lat, FieldConfig};
use risk_store::RiskStore;

pub mod kernel;
pub mod mercator;

pub use kernel::GaussianKernel;
pub use mercator::{meters_per_pixel, tile_bounds, TileAddress};

/// Minimum bbox padding in degrees, whatever sigma says.
const MIN_PADDING_DEG: f64 = 0.002;

/// Minimum pixel-space sigma; keeps low zooms from degenerating to dots.
const MIN_SIGMA_PX: f64 = 5.0;

/// A pixel gets heat only when it received at least this much weight.
const DEN_EPSILON: f32 = 1e-6;

/// Mid-tone boost applied to normalized heat.
const GAMMA: f64 = 0.7;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("PNG encoding failed: {0}")]
    Encode(#[from] image::ImageError),
}

pub type Result<T> = std::result::Result<T, RenderError>;

/// Normalized per-pixel heat in [0, 1] for one tile.
pub struct HeatGrid {
    size: u32,
    data: Vec<f32>,
}

impl HeatGrid {
    fn zero(size: u32) -> Self {
        Self {
            size,
            data: vec![0.0; (size * size) as usize],
        }
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn get(&self, x: u32, y: u32) -> f32 {
        self.data[(y * self.size + x) as usize]
    }

    pub fn max(&self) -> f32 {
        self.data.iter().copied().fold(0.0, f32::max)
    }
}

/// Renders heat tiles against a shared store.
///
/// Stateless per request; any number of renders may run concurrently
/// against the same store.
pub struct TileRenderer {
    store: Arc<RiskStore>,
    config: FieldConfig,
}

impl TileRenderer {
    pub fn new(store: Arc<RiskStore>, config: FieldConfig) -> Self {
        Self { store, config }
    }

    /// Compute the normalized heat grid for a tile.
    pub fn render_heat(&self, tile: TileAddress) -> HeatGrid {
        let size = self.config.tile_size;
        let bounds = tile_bounds(tile);

        // Pad so a point just outside the visible tile still contributes
        // its kernel footprint.
        let padding_deg = meters_to_deg_lat(3.0 * self.config.sigma_m).max(MIN_PADDING_DEG);
        let points = self
            .store
            .query_bbox(&bounds, padding_deg, self.config.tile_candidate_limit);

        // Mercator distortion correction at the tile's center latitude;
        // per-tile, not per-point, an accepted approximation.
        let center_lat = (bounds.south + bounds.north) * 0.5;
        let mpp = meters_per_pixel(center_lat, tile.z, size);
        let sigma_px = (self.config.sigma_m / mpp.max(1e-9)).max(MIN_SIGMA_PX);
        let kernel = GaussianKernel::new(sigma_px);
        let radius = kernel.radius();

        let mut num = vec![0.0f32; (size * size) as usize];
        let mut den = vec![0.0f32; (size * size) as usize];

        let origin_x = (tile.x * size) as f64;
        let origin_y = (tile.y * size) as f64;
        let edge = size as i64 - 1;

        let mut splatted = 0usize;
        for point in &points {
            let intensity = (point.scores.max_score() * self.config.strength) as f32;
            if intensity <= 0.0 {
                continue;
            }

            let (wx, wy) = mercator::lnglat_to_world_px(point.lng, point.lat, tile.z, size);
            let px = (wx - origin_x).floor() as i64;
            let py = (wy - origin_y).floor() as i64;

            // Kernel footprint intersected with the raster.
            let x0 = (px - radius).max(0);
            let x1 = (px + radius).min(edge);
            let y0 = (py - radius).max(0);
            let y1 = (py + radius).min(edge);
            if x0 > x1 || y0 > y1 {
                continue;
            }

            for y in y0..=y1 {
                let row = (y as u32 * size) as usize;
                for x in x0..=x1 {
                    let w = kernel.weight(x - px, y - py);
                    num[row + x as usize] += intensity * w;
                    den[row + x as usize] += w;
                }
            }
            splatted += 1;
        }

        let mut heat = HeatGrid::zero(size);
        for i in 0..heat.data.len() {
            if den[i] > DEN_EPSILON {
                let h = clamp01((num[i] / den[i]) as f64);
                heat.data[i] = h.powf(GAMMA) as f32;
            }
        }

        debug!(
            z = tile.z,
            x = tile.x,
            y = tile.y,
            candidates = points.len(),
            splatted,
            sigma_px,
            "tile rendered"
        );
        heat
    }

    /// Render a tile to a raw RGBA buffer (row-major, 4 bytes/pixel).
    pub fn render_rgba(&self, tile: TileAddress) -> Vec<u8> {
        colorize(&self.render_heat(tile))
    }

    /// Render a tile to an encoded PNG.
    pub fn render_png(&self, tile: TileAddress) -> Result<Vec<u8>> {
        let size = self.config.tile_size;
        let rgba = self.render_rgba(tile);

        let mut out = Vec::new();
        PngEncoder::new(&mut out).write_image(&rgba, size, size, ExtendedColorType::Rgba8)?;
        Ok(out)
    }
}

/// Green -> yellow -> red ramp with a low-opacity floor.
///
/// Green starts fading above the midpoint; alpha rises nonlinearly from a
/// floor of 25 so empty terrain stays faintly visible instead of leaving
/// fully transparent holes.
pub fn colorize(heat: &HeatGrid) -> Vec<u8> {
    let mut rgba = Vec::with_capacity(heat.data.len() * 4);
    for &h in &heat.data {
        let v = clamp01(h as f64);
        let r = (255.0 * v) as u8;
        let g = (255.0 * (1.0 - (v - 0.5).max(0.0) * 2.0)) as u8;
        let b = (60.0 * (1.0 - v)) as u8;
        let a = (25.0 + 200.0 * (1.0 - (-3.0 * v).exp())) as u8;
        rgba.extend_from_slice(&[r, g, b, a]);
    }
    rgba
}
