//! Field Query
//!
//! Answers "how risky is this exact coordinate" against the sparse point
//! store: a rectangular prefilter, a true great-circle refine to the
//! nearest point, then worst-category dominance with Gaussian distance
//! decay inside a hard search radius.
//!
//! Outside the radius the field is exactly zero: unknown terrain defaults
//! to zero risk, and the cutoff is independent of the decay curve.

use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::trace;

use risk_model::{check_coordinate, meters_to_deg_lat, BoundingBox, FieldConfig, ModelError};
use risk_store::RiskStore;

#[derive(Error, Debug)]
pub enum FieldError {
    #[error(transparent)]
    Model(#[from] ModelError),
}

pub type Result<T> = std::result::Result<T, FieldError>;

/// Read-only view of the risk field at arbitrary coordinates.
#[derive(Clone)]
pub struct RiskField {
    store: Arc<RiskStore>,
    config: FieldConfig,
}

impl RiskField {
    pub fn new(store: Arc<RiskStore>, config: FieldConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &FieldConfig {
        &self.config
    }

    /// Field value at (lat, lng) in [0, 1].
    ///
    /// Nearest stored point within the search radius R, scored as
    /// `max(category scores) * exp(-(d / (0.6 R))^2)`; exactly 0.0 when no
    /// point lies within R.
    pub fn risk_at(&self, lat: f64, lng: f64) -> Result<f64> {
        check_coordinate(lat, lng)?;
        Ok(self.evaluate(lat, lng))
    }

    /// Infallible twin of [`risk_at`] for coordinates the caller has
    /// already validated, e.g. edge midpoints of a validated graph. The
    /// validity requirement is debug-asserted, not re-checked.
    pub fn risk_at_validated(&self, lat: f64, lng: f64) -> f64 {
        debug_assert!(
            check_coordinate(lat, lng).is_ok(),
            "caller promised a valid coordinate ({lat}, {lng})"
        );
        self.evaluate(lat, lng)
    }

    fn evaluate(&self, lat: f64, lng: f64) -> f64 {
        let r = self.config.search_radius_m;
        let pad_deg = meters_to_deg_lat(r);
        let window = BoundingBox::new(lng - pad_deg, lat - pad_deg, lng + pad_deg, lat + pad_deg);
        let candidates =
            self.store
                .query_bbox(&window, 0.0, self.config.nearest_candidate_limit);

        let mut best: Option<&risk_store::RiskPoint> = None;
        let mut best_d = f64::INFINITY;
        for point in &candidates {
            let d = risk_model::haversine_m(lat, lng, point.lat, point.lng);
            if d < best_d {
                best_d = d;
                best = Some(point);
            }
        }

        let Some(point) = best else {
            return 0.0;
        };
        // Hard cutoff: the rectangle over-reaches at the corners, refine
        // with the true distance before trusting it.
        if best_d > r {
            return 0.0;
        }

        let base = point.scores.max_score();
        let decay = (-(best_d / (r * 0.6)).powi(2)).exp();
        let risk = risk_model::clamp01(base * decay);
        trace!(lat, lng, distance_m = best_d, base, risk, "field query");
        risk
    }
}

/// Per-computation memo of field values.
///
/// One route evaluates the field at every edge midpoint; edges sharing a
/// node would otherwise repeat identical queries. The memo is scoped to a
/// single computation and keyed by exact coordinate bits, so it never
/// observes a blend that lands mid-route as a mixed result.
pub struct RiskMemo {
    cache: HashMap<(u64, u64), f64>,
}

impl RiskMemo {
    pub fn new() -> Self {
        Self {
            cache: HashMap::new(),
        }
    }

    /// Memoized [`RiskField::risk_at_validated`]; the caller upholds the
    /// same validity requirement.
    pub fn risk_at_validated(&mut self, field: &RiskField, lat: f64, lng: f64) -> f64 {
        let key = (lat.to_bits(), lng.to_bits());
        if let Some(&risk) = self.cache.get(&key) {
            return risk;
        }
        let risk = field.risk_at_validated(lat, lng);
        self.cache.insert(key, risk);
        risk
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}

impl Default for RiskMemo {
    fn default() -> Self {
        Self::new()
    }
}
