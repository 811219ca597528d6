//! Risk Model
//!
//! Shared domain types for the geospatial risk field engine:
//!
//! - `Category` - closed taxonomy of risk categories
//! - `RiskVector` - fixed-size per-category score vector, clamped to [0,1]
//! - `BoundingBox` - rectangular WGS84 query window
//! - `FieldConfig` - shared tuning constants injected into every component
//! - `geo` - haversine and degree/meter helpers

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod geo;

pub use geo::{clamp01, haversine_m, meters_to_deg_lat, meters_to_deg_lng};

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Invalid latitude: {0}")]
    InvalidLatitude(f64),
    #[error("Invalid longitude: {0}")]
    InvalidLongitude(f64),
    #[error("Blend factor out of range: {0}")]
    InvalidBlendFactor(f64),
}

pub type Result<T> = std::result::Result<T, ModelError>;

/// Validate latitude is in valid range
pub fn is_valid_latitude(lat: f64) -> bool {
    (-90.0..=90.0).contains(&lat) && lat.is_finite()
}

/// Validate longitude is in valid range
pub fn is_valid_longitude(lng: f64) -> bool {
    (-180.0..=180.0).contains(&lng) && lng.is_finite()
}

/// Check a (lat, lng) pair, returning the first offending component.
pub fn check_coordinate(lat: f64, lng: f64) -> Result<()> {
    if !is_valid_latitude(lat) {
        return Err(ModelError::InvalidLatitude(lat));
    }
    if !is_valid_longitude(lng) {
        return Err(ModelError::InvalidLongitude(lng));
    }
    Ok(())
}

/// Closed risk-category taxonomy.
///
/// Shared by the store, the tile renderer and the router. Upstream
/// classifiers may emit arbitrary labels; anything outside this set
/// collapses to [`Category::Other`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Crime,
    PublicSafety,
    Transport,
    Infrastructure,
    Policy,
    Protest,
    Weather,
    Other,
}

impl Category {
    pub const COUNT: usize = 8;

    pub const ALL: [Category; Self::COUNT] = [
        Category::Crime,
        Category::PublicSafety,
        Category::Transport,
        Category::Infrastructure,
        Category::Policy,
        Category::Protest,
        Category::Weather,
        Category::Other,
    ];

    /// Position of this category in every [`RiskVector`].
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Crime => "crime",
            Category::PublicSafety => "public_safety",
            Category::Transport => "transport",
            Category::Infrastructure => "infrastructure",
            Category::Policy => "policy",
            Category::Protest => "protest",
            Category::Weather => "weather",
            Category::Other => "other",
        }
    }

    /// Parse an upstream label. Unrecognized labels collapse to `Other`.
    pub fn from_label(label: &str) -> Self {
        match label {
            "crime" => Category::Crime,
            "public_safety" => Category::PublicSafety,
            "transport" => Category::Transport,
            "infrastructure" => Category::Infrastructure,
            "policy" => Category::Policy,
            "protest" => Category::Protest,
            "weather" => Category::Weather,
            _ => Category::Other,
        }
    }
}

/// Per-category score vector, every component clamped to [0,1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct RiskVector([f64; Category::COUNT]);

impl RiskVector {
    pub fn zero() -> Self {
        Self([0.0; Category::COUNT])
    }

    pub fn get(&self, category: Category) -> f64 {
        self.0[category.index()]
    }

    pub fn set(&mut self, category: Category, value: f64) {
        self.0[category.index()] = clamp01(value);
    }

    /// Worst-category dominance: the field value of this vector.
    ///
    /// A single severe category must not be diluted by calm ones, so
    /// this is a max, not an average.
    pub fn max_score(&self) -> f64 {
        self.0.iter().copied().fold(0.0, f64::max)
    }

    /// EMA blend of one category: `stored = (1-alpha)*stored + alpha*observed`.
    pub fn blend(&mut self, category: Category, observed: f64, alpha: f64) {
        let i = category.index();
        self.0[i] = clamp01((1.0 - alpha) * self.0[i] + alpha * clamp01(observed));
    }

    pub fn scores(&self) -> &[f64; Category::COUNT] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = (Category, f64)> + '_ {
        Category::ALL.iter().map(move |&c| (c, self.get(c)))
    }
}

/// A geographic bounding box in WGS84 coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Western longitude boundary.
    pub west: f64,
    /// Southern latitude boundary.
    pub south: f64,
    /// Eastern longitude boundary.
    pub east: f64,
    /// Northern latitude boundary.
    pub north: f64,
}

impl BoundingBox {
    pub const fn new(west: f64, south: f64, east: f64, north: f64) -> Self {
        Self {
            west,
            south,
            east,
            north,
        }
    }

    /// Expand every side by `padding_deg` degrees.
    pub fn padded(&self, padding_deg: f64) -> Self {
        Self {
            west: self.west - padding_deg,
            south: self.south - padding_deg,
            east: self.east + padding_deg,
            north: self.north + padding_deg,
        }
    }

    pub fn contains(&self, lat: f64, lng: f64) -> bool {
        lng >= self.west && lng <= self.east && lat >= self.south && lat <= self.north
    }
}

/// Shared tuning constants for every component of the engine.
///
/// Constructed once at process start and injected into the store
/// consumers, so tests can run against synthetic configurations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldConfig {
    /// Hard search radius for point-risk queries (meters).
    pub search_radius_m: f64,
    /// Candidate cap for the nearest-point bbox prefilter.
    pub nearest_candidate_limit: usize,
    /// Raster tile edge length in pixels.
    pub tile_size: u32,
    /// Kernel smoothing radius (meters).
    pub sigma_m: f64,
    /// Global intensity multiplier applied to every point.
    pub strength: f64,
    /// Candidate cap for the per-tile bulk query.
    pub tile_candidate_limit: usize,
    /// Default EMA blend factor for store updates.
    pub blend_alpha: f64,
    /// Edge sample cap when computing the router's length scale.
    pub length_sample_cap: usize,
    /// Maximum distance an endpoint may snap to a graph node (meters).
    pub max_snap_m: f64,
}

impl Default for FieldConfig {
    fn default() -> Self {
        Self {
            search_radius_m: 150.0,
            nearest_candidate_limit: 50,
            tile_size: 256,
            sigma_m: 180.0,
            strength: 1.0,
            tile_candidate_limit: 50_000,
            blend_alpha: 0.25,
            length_sample_cap: 50_000,
            max_snap_m: 500.0,
        }
    }
}
