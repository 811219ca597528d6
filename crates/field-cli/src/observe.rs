//! Single-observation ingest.
//!
//! Blends one observed category score into the store through the EMA
//! write path, the same operation a live ingest feed would perform.

use risk_model::{Category, FieldConfig};
use risk_store::{Result, RiskStore};
use tracing::info;

/// Blend one observation into the store.
///
/// `alpha` falls back to the configured EMA default when not supplied,
/// and unrecognized category labels collapse to `other`.
pub fn record_observation(
    store: &RiskStore,
    lat: f64,
    lng: f64,
    label: &str,
    observed: f64,
    alpha: Option<f64>,
) -> Result<()> {
    let alpha = alpha.unwrap_or(FieldConfig::default().blend_alpha);
    let category = Category::from_label(label);
    store.update(lat, lng, category, observed, alpha)?;
    info!(
        lat,
        lng,
        category = category.as_str(),
        observed,
        alpha,
        "observation recorded"
    );
    Ok(())
}
