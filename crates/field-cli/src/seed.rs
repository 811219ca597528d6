//! Synthetic field seeding.
//!
//! Generates a smooth, spatially consistent risk field over a bounding
//! box: random anchors carry structured category vectors, and each grid
//! point gets the Gaussian-distance-weighted blend of all anchors plus a
//! little local noise. Deterministic for a given seed.

use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::info;

use risk_model::{
    clamp01, haversine_m, meters_to_deg_lat, meters_to_deg_lng, BoundingBox, Category,
};
use risk_store::{Result, RiskStore};

/// Tuning knobs for the synthetic field.
#[derive(Debug, Clone)]
pub struct SeedConfig {
    pub bounds: BoundingBox,
    /// Grid resolution in meters; smaller means more rows.
    pub grid_step_m: f64,
    /// Random anchors carrying category structure.
    pub anchors: usize,
    /// Additional near-maximum-strength pockets.
    pub hotspots: usize,
    /// Blending radius: bigger means smoother neighborhoods.
    pub sigma_m: f64,
    /// Overall riskiness baseline.
    pub base_risk: f64,
    /// How strong anchors can get above the baseline.
    pub risk_variance: f64,
    pub seed: u64,
}

impl Default for SeedConfig {
    fn default() -> Self {
        Self {
            // London-ish bounds
            bounds: BoundingBox::new(-0.65, 51.20, 0.45, 51.75),
            grid_step_m: 250.0,
            anchors: 60,
            hotspots: 6,
            sigma_m: 900.0,
            base_risk: 0.15,
            risk_variance: 0.65,
            seed: 1337,
        }
    }
}

struct Anchor {
    lat: f64,
    lng: f64,
    scores: [f64; Category::COUNT],
    strength: f64,
}

/// Category vector with some structure: one or two dominant categories,
/// mild correlated noise on the rest.
fn random_category_vec(
    rng: &mut ChaCha8Rng,
    strength: f64,
    base_risk: f64,
) -> [f64; Category::COUNT] {
    let mut scores = [0.0; Category::COUNT];

    let dominant_count = if rng.gen::<f64>() < 0.55 { 2 } else { 1 };
    let dominant: Vec<Category> = Category::ALL
        .choose_multiple(rng, dominant_count)
        .copied()
        .collect();

    for category in Category::ALL {
        let i = category.index();
        if dominant.contains(&category) {
            scores[i] = clamp01(base_risk + strength * (0.6 + 0.4 * rng.gen::<f64>()));
        } else {
            scores[i] = clamp01(
                base_risk * (0.3 + 0.7 * rng.gen::<f64>()) + strength * 0.05 * rng.gen::<f64>(),
            );
        }
    }
    scores
}

fn gaussian_weight(d_m: f64, sigma_m: f64) -> f64 {
    (-(d_m * d_m) / (2.0 * sigma_m * sigma_m)).exp()
}

fn generate_anchors(rng: &mut ChaCha8Rng, config: &SeedConfig) -> Vec<Anchor> {
    let b = &config.bounds;
    let mut anchors = Vec::with_capacity(config.anchors + config.hotspots);

    for _ in 0..config.anchors {
        let lat = rng.gen_range(b.south..=b.north);
        let lng = rng.gen_range(b.west..=b.east);
        let strength = clamp01(rng.gen::<f64>() * config.risk_variance);
        let scores = random_category_vec(rng, strength, config.base_risk);
        anchors.push(Anchor {
            lat,
            lng,
            scores,
            strength,
        });
    }

    for _ in 0..config.hotspots {
        let lat = rng.gen_range(b.south..=b.north);
        let lng = rng.gen_range(b.west..=b.east);
        let strength = clamp01(0.85 + 0.15 * rng.gen::<f64>());
        let scores = random_category_vec(rng, strength, config.base_risk);
        anchors.push(Anchor {
            lat,
            lng,
            scores,
            strength,
        });
    }

    anchors
}

/// Gaussian-weighted average of all anchor vectors at one grid point.
fn blend_at(lat: f64, lng: f64, anchors: &[Anchor], sigma_m: f64) -> [f64; Category::COUNT] {
    let mut out = [0.0; Category::COUNT];
    let mut wsum = 0.0;

    for anchor in anchors {
        let d = haversine_m(lat, lng, anchor.lat, anchor.lng);
        let w = gaussian_weight(d, sigma_m) * (0.35 + 0.65 * anchor.strength);
        if w < 1e-6 {
            continue;
        }
        wsum += w;
        for (o, s) in out.iter_mut().zip(anchor.scores.iter()) {
            *o += w * s;
        }
    }

    if wsum > 1e-9 {
        for o in out.iter_mut() {
            *o = clamp01(*o / wsum);
        }
    }
    out
}

/// Seed a store with a deterministic synthetic field. Returns the number
/// of grid points written.
pub fn seed_store(store: &RiskStore, config: &SeedConfig) -> Result<usize> {
    let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
    let anchors = generate_anchors(&mut rng, config);
    let b = &config.bounds;

    info!(
        anchors = anchors.len(),
        sigma_m = config.sigma_m,
        grid_step_m = config.grid_step_m,
        "seeding synthetic field"
    );

    let mut written = 0usize;
    let dlat = meters_to_deg_lat(config.grid_step_m);
    let mut lat = b.south;
    while lat <= b.north {
        let dlng = meters_to_deg_lng(config.grid_step_m, lat);
        let mut lng = b.west;
        while lng <= b.east {
            let mut scores = blend_at(lat, lng, &anchors, config.sigma_m);
            // Tiny local noise so the field does not look too perfect
            for s in scores.iter_mut() {
                *s = clamp01(*s + rng.gen_range(-0.02..=0.02));
            }
            // alpha = 1 blend sets each cell to exactly the observed value,
            // so bulk seeding goes through the same write path as live
            // observations.
            for category in Category::ALL {
                store.update(lat, lng, category, scores[category.index()], 1.0)?;
            }
            written += 1;
            lng += dlng;
        }
        lat += dlat;
    }

    info!(written, "synthetic field seeded");
    Ok(written)
}
