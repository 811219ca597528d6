//! Risk Store
//!
//! Persistent table of spatial risk points. Each row is keyed by an exact
//! (lat, lng) coordinate and carries one score per [`Category`], clamped to
//! [0, 1], plus a last-update timestamp.
//!
//! Write contract:
//! - `upsert` idempotently creates a zero-vector row
//! - `update` is the sole mutation path: a single-cell EMA blend
//! - rows are never deleted; stale points persist (no TTL)
//!
//! Read contract:
//! - `query_bbox` - padded rectangle scan, truncated at a caller limit
//! - `query_nearest` - closest point by planar degree-space distance
//!
//! Reads take a shared lock and may run concurrently with a blend; the
//! visible effect is a momentarily stale scalar, never structural
//! corruption. Concurrent blends to the same cell are last-write-wins.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use thiserror::Error;
use tracing::{debug, warn};

use risk_model::{check_coordinate, BoundingBox, Category, ModelError, RiskVector};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Model(#[from] ModelError),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// One stored spatial observation point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskPoint {
    pub lat: f64,
    pub lng: f64,
    pub scores: RiskVector,
    pub updated_at: DateTime<Utc>,
}

impl RiskPoint {
    fn new(lat: f64, lng: f64) -> Self {
        Self {
            lat,
            lng,
            scores: RiskVector::zero(),
            updated_at: Utc::now(),
        }
    }
}

/// Exact-equality coordinate key, ordered for deterministic iteration.
///
/// Raw IEEE bit patterns: two coordinates address the same row only when
/// they are bitwise identical, matching the original exact-key contract.
/// The ordering is not geographic, it only has to be stable so that
/// truncated queries and render accumulation are reproducible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct PointKey(u64, u64);

impl PointKey {
    fn of(lat: f64, lng: f64) -> Self {
        Self(lat.to_bits(), lng.to_bits())
    }
}

/// In-memory implementation of the four-operation persistence contract,
/// with JSON snapshot save/load standing in for the storage engine.
pub struct RiskStore {
    points: RwLock<BTreeMap<PointKey, RiskPoint>>,
    /// Count of spatial queries that hit their candidate cap.
    truncated_queries: AtomicU64,
}

impl RiskStore {
    pub fn new() -> Self {
        Self {
            points: RwLock::new(BTreeMap::new()),
            truncated_queries: AtomicU64::new(0),
        }
    }

    /// Idempotently ensure a zero-vector row exists at (lat, lng).
    pub fn upsert(&self, lat: f64, lng: f64) -> Result<()> {
        check_coordinate(lat, lng)?;
        let mut points = self.points.write().expect("store lock poisoned");
        points
            .entry(PointKey::of(lat, lng))
            .or_insert_with(|| RiskPoint::new(lat, lng));
        Ok(())
    }

    /// EMA-blend one category cell: `stored = (1-alpha)*stored + alpha*observed`.
    ///
    /// This is the sole write path for scores. Creates the row if absent.
    pub fn update(
        &self,
        lat: f64,
        lng: f64,
        category: Category,
        observed: f64,
        alpha: f64,
    ) -> Result<()> {
        check_coordinate(lat, lng)?;
        if !(0.0..=1.0).contains(&alpha) || !alpha.is_finite() {
            return Err(ModelError::InvalidBlendFactor(alpha).into());
        }

        let mut points = self.points.write().expect("store lock poisoned");
        let point = points
            .entry(PointKey::of(lat, lng))
            .or_insert_with(|| RiskPoint::new(lat, lng));
        point.scores.blend(category, observed, alpha);
        point.updated_at = Utc::now();
        Ok(())
    }

    /// Exact-key read.
    pub fn get(&self, lat: f64, lng: f64) -> Option<RiskPoint> {
        let points = self.points.read().expect("store lock poisoned");
        points.get(&PointKey::of(lat, lng)).cloned()
    }

    /// All points inside the bbox expanded by `padding_deg`, truncated at
    /// `limit`.
    ///
    /// The cap is a documented lossy cut, not a statistical sample: when it
    /// is hit the result covers an arbitrary (but stable) prefix of the
    /// rectangle, and the truncation counter is bumped so operators can see
    /// the quality degradation.
    pub fn query_bbox(&self, bbox: &BoundingBox, padding_deg: f64, limit: usize) -> Vec<RiskPoint> {
        let window = bbox.padded(padding_deg);
        let points = self.points.read().expect("store lock poisoned");

        let mut out = Vec::new();
        let mut truncated = false;
        for point in points.values() {
            if window.contains(point.lat, point.lng) {
                if out.len() >= limit {
                    truncated = true;
                    break;
                }
                out.push(point.clone());
            }
        }
        drop(points);

        if truncated {
            self.truncated_queries.fetch_add(1, Ordering::Relaxed);
            warn!(
                limit,
                west = window.west,
                south = window.south,
                east = window.east,
                north = window.north,
                "bbox query hit candidate cap, result truncated"
            );
        } else {
            debug!(count = out.len(), "bbox query");
        }
        out
    }

    /// The single closest point by planar degree-space distance.
    ///
    /// Valid only at city scale; callers refine with the true great-circle
    /// distance before trusting the result.
    pub fn query_nearest(&self, lat: f64, lng: f64) -> Option<RiskPoint> {
        let points = self.points.read().expect("store lock poisoned");

        let mut best: Option<&RiskPoint> = None;
        let mut best_d2 = f64::INFINITY;
        for point in points.values() {
            let d2 = (point.lat - lat).powi(2) + (point.lng - lng).powi(2);
            if d2 < best_d2 {
                best_d2 = d2;
                best = Some(point);
            }
        }
        best.cloned()
    }

    pub fn len(&self) -> usize {
        self.points.read().expect("store lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// How many spatial queries have hit their candidate cap.
    pub fn truncated_queries(&self) -> u64 {
        self.truncated_queries.load(Ordering::Relaxed)
    }

    /// Write a JSON snapshot of every row.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let points = self.points.read().expect("store lock poisoned");
        let rows: Vec<&RiskPoint> = points.values().collect();

        let file = File::create(path.as_ref())?;
        serde_json::to_writer(BufWriter::new(file), &rows)?;
        debug!(rows = rows.len(), path = %path.as_ref().display(), "store snapshot written");
        Ok(())
    }

    /// Load a store from a JSON snapshot. Rows with invalid coordinates are
    /// skipped and counted.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        let rows: Vec<RiskPoint> = serde_json::from_reader(BufReader::new(file))?;

        let mut map = BTreeMap::new();
        let mut skipped = 0usize;
        for row in rows {
            if check_coordinate(row.lat, row.lng).is_err() {
                skipped += 1;
                continue;
            }
            map.insert(PointKey::of(row.lat, row.lng), row);
        }
        if skipped > 0 {
            warn!(skipped, "snapshot rows with invalid coordinates skipped");
        }

        Ok(Self {
            points: RwLock::new(map),
            truncated_queries: AtomicU64::new(0),
        })
    }
}

impl Default for RiskStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_upsert_is_idempotent() {
        let store = RiskStore::new();
        store.upsert(51.5, -0.1).unwrap();
        store.update(51.5, -0.1, Category::Crime, 1.0, 1.0).unwrap();
        store.upsert(51.5, -0.1).unwrap();

        assert_eq!(store.len(), 1);
        // Re-upsert must not reset the vector
        let p = store.get(51.5, -0.1).unwrap();
        assert_eq!(p.scores.get(Category::Crime), 1.0);
    }

    #[test]
    fn test_update_alpha_identities() {
        let store = RiskStore::new();
        store.update(51.5, -0.1, Category::Crime, 0.6, 1.0).unwrap();

        store.update(51.5, -0.1, Category::Crime, 0.1, 0.0).unwrap();
        let p = store.get(51.5, -0.1).unwrap();
        assert_eq!(p.scores.get(Category::Crime), 0.6);

        store.update(51.5, -0.1, Category::Crime, 0.1, 1.0).unwrap();
        let p = store.get(51.5, -0.1).unwrap();
        assert_eq!(p.scores.get(Category::Crime), 0.1);
    }

    #[test]
    fn test_update_blends() {
        let store = RiskStore::new();
        store.update(51.5, -0.1, Category::Crime, 0.8, 0.25).unwrap();
        let p = store.get(51.5, -0.1).unwrap();
        assert!((p.scores.get(Category::Crime) - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_update_rejects_bad_input() {
        let store = RiskStore::new();
        assert!(store.update(91.0, 0.0, Category::Crime, 0.5, 0.25).is_err());
        assert!(store.update(51.5, -0.1, Category::Crime, 0.5, 1.5).is_err());
        assert!(store
            .update(51.5, -0.1, Category::Crime, 0.5, f64::NAN)
            .is_err());
    }

    #[test]
    fn test_bbox_query_and_truncation_counter() {
        let store = RiskStore::new();
        for i in 0..10 {
            store.upsert(51.50 + i as f64 * 0.001, -0.10).unwrap();
        }
        // One point well outside
        store.upsert(52.5, -0.10).unwrap();

        let bbox = BoundingBox::new(-0.2, 51.4, 0.0, 51.6);
        let all = store.query_bbox(&bbox, 0.0, 100);
        assert_eq!(all.len(), 10);
        assert_eq!(store.truncated_queries(), 0);

        let capped = store.query_bbox(&bbox, 0.0, 4);
        assert_eq!(capped.len(), 4);
        assert_eq!(store.truncated_queries(), 1);
    }

    #[test]
    fn test_bbox_padding_reaches_outside_points() {
        let store = RiskStore::new();
        store.upsert(51.61, -0.1).unwrap();

        let bbox = BoundingBox::new(-0.2, 51.4, 0.0, 51.6);
        assert!(store.query_bbox(&bbox, 0.0, 10).is_empty());
        assert_eq!(store.query_bbox(&bbox, 0.02, 10).len(), 1);
    }

    #[test]
    fn test_nearest() {
        let store = RiskStore::new();
        store.upsert(51.50, -0.10).unwrap();
        store.upsert(51.60, -0.10).unwrap();

        let p = store.query_nearest(51.52, -0.10).unwrap();
        assert_eq!(p.lat, 51.50);

        let empty = RiskStore::new();
        assert!(empty.query_nearest(51.5, -0.1).is_none());
    }

    #[test]
    fn test_snapshot_roundtrip() {
        let store = RiskStore::new();
        store.update(51.5, -0.1, Category::Crime, 0.9, 1.0).unwrap();
        store
            .update(51.51, -0.11, Category::Weather, 0.4, 1.0)
            .unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("field.json");
        store.save(&path).unwrap();

        let restored = RiskStore::load(&path).unwrap();
        assert_eq!(restored.len(), 2);
        let p = restored.get(51.5, -0.1).unwrap();
        assert_eq!(p.scores.get(Category::Crime), 0.9);
    }

    proptest! {
        /// Every stored category value stays in [0,1] under arbitrary
        /// update sequences.
        #[test]
        fn prop_scores_stay_clamped(
            updates in prop::collection::vec(
                (0usize..8, -5.0f64..5.0, 0.0f64..=1.0),
                1..64,
            )
        ) {
            let store = RiskStore::new();
            for (cat_idx, observed, alpha) in updates {
                let category = Category::ALL[cat_idx];
                store.update(51.5, -0.1, category, observed, alpha).unwrap();
            }
            let p = store.get(51.5, -0.1).unwrap();
            for (_, score) in p.scores.iter() {
                prop_assert!((0.0..=1.0).contains(&score));
            }
        }
    }
}
