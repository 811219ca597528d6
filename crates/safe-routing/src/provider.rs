//! Graph acquisition.
//!
//! Retrieving a region's street network is expensive, so the engine keeps
//! a local JSON cache and only goes to the source on a cold start. Source
//! failure at startup is fatal: one retry, then surface the error. The
//! engine must not serve tile or route requests without a loaded graph.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use tracing::{info, warn};

use crate::graph::{RoadGraph, RoadNetworkData};
use crate::{Result, RoutingError};

/// External provider of a named region's walkable street network.
pub trait GraphSource {
    fn load(&self, region: &str) -> Result<RoadNetworkData>;
}

/// Graph source backed by a local JSON file, for offline and test use.
pub struct FileGraphSource {
    path: std::path::PathBuf,
}

impl FileGraphSource {
    pub fn new(path: impl Into<std::path::PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl GraphSource for FileGraphSource {
    fn load(&self, _region: &str) -> Result<RoadNetworkData> {
        let file = File::open(&self.path)?;
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }
}

/// Load the region graph from `cache_path` if present, otherwise fetch it
/// from `source` (retrying once) and write the cache for the next start.
pub fn load_or_fetch(
    cache_path: impl AsRef<Path>,
    source: &dyn GraphSource,
    region: &str,
) -> Result<RoadGraph> {
    let cache_path = cache_path.as_ref();

    if cache_path.exists() {
        info!(cache = %cache_path.display(), region, "loading cached road graph");
        let file = File::open(cache_path)?;
        let data: RoadNetworkData = serde_json::from_reader(BufReader::new(file))?;
        return RoadGraph::from_data(data);
    }

    info!(region, "no cached graph, fetching from source");
    let data = match source.load(region) {
        Ok(data) => data,
        Err(first) => {
            warn!(region, error = %first, "graph fetch failed, retrying once");
            source
                .load(region)
                .map_err(|second| RoutingError::SourceUnavailable {
                    region: region.to_string(),
                    reason: second.to_string(),
                })?
        }
    };

    // Cache write failure is not fatal; the next start just refetches.
    match File::create(cache_path) {
        Ok(file) => {
            if let Err(err) = serde_json::to_writer(BufWriter::new(file), &data) {
                warn!(cache = %cache_path.display(), error = %err, "graph cache write failed");
            } else {
                info!(cache = %cache_path.display(), "road graph cached");
            }
        }
        Err(err) => warn!(cache = %cache_path.display(), error = %err, "graph cache create failed"),
    }

    RoadGraph::from_data(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{RoadEdge, RoadNode};
    use std::cell::RefCell;

    fn sample_data() -> RoadNetworkData {
        RoadNetworkData {
            nodes: vec![
                RoadNode {
                    id: 1,
                    lng: -0.1,
                    lat: 51.5,
                },
                RoadNode {
                    id: 2,
                    lng: -0.1,
                    lat: 51.501,
                },
            ],
            edges: vec![RoadEdge {
                u: 1,
                v: 2,
                length_m: 111.0,
            }],
        }
    }

    /// Source that fails a configured number of times before succeeding.
    struct FlakySource {
        failures_left: RefCell<usize>,
        calls: RefCell<usize>,
    }

    impl FlakySource {
        fn new(failures: usize) -> Self {
            Self {
                failures_left: RefCell::new(failures),
                calls: RefCell::new(0),
            }
        }
    }

    impl GraphSource for FlakySource {
        fn load(&self, region: &str) -> Result<RoadNetworkData> {
            *self.calls.borrow_mut() += 1;
            let mut left = self.failures_left.borrow_mut();
            if *left > 0 {
                *left -= 1;
                return Err(RoutingError::SourceUnavailable {
                    region: region.to_string(),
                    reason: "synthetic outage".to_string(),
                });
            }
            Ok(sample_data())
        }
    }

    #[test]
    fn test_fetch_writes_cache_then_reuses_it() {
        let dir = tempfile::tempdir().unwrap();
        let cache = dir.path().join("region.json");

        let source = FlakySource::new(0);
        let graph = load_or_fetch(&cache, &source, "london").unwrap();
        assert_eq!(graph.node_count(), 2);
        assert!(cache.exists());
        assert_eq!(*source.calls.borrow(), 1);

        // Second start must hit the cache, not the source
        let graph = load_or_fetch(&cache, &source, "london").unwrap();
        assert_eq!(graph.node_count(), 2);
        assert_eq!(*source.calls.borrow(), 1);
    }

    #[test]
    fn test_single_retry_recovers_transient_failure() {
        let dir = tempfile::tempdir().unwrap();
        let cache = dir.path().join("region.json");

        let source = FlakySource::new(1);
        let graph = load_or_fetch(&cache, &source, "london").unwrap();
        assert_eq!(graph.node_count(), 2);
        assert_eq!(*source.calls.borrow(), 2);
    }

    #[test]
    fn test_persistent_failure_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let cache = dir.path().join("region.json");

        let source = FlakySource::new(usize::MAX);
        let err = load_or_fetch(&cache, &source, "london").unwrap_err();
        assert!(matches!(err, RoutingError::SourceUnavailable { .. }));
        assert_eq!(*source.calls.borrow(), 2);
        assert!(!cache.exists());
    }

    #[test]
    fn test_file_source_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("net.json");
        let file = File::create(&path).unwrap();
        serde_json::to_writer(BufWriter::new(file), &sample_data()).unwrap();

        let source = FileGraphSource::new(&path);
        let data = source.load("london").unwrap();
        assert_eq!(data.nodes.len(), 2);
        assert_eq!(data.edges.len(), 1);
    }
}
