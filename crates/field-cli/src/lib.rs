//! Operator toolbox for the risk field engine.
//!
//! Library half of the `riskfield` binary: synthetic field seeding and
//! single-observation ingest live here so they can be tested without the
//! CLI wrapper.

pub mod observe;
pub mod seed;

pub use observe::record_observation;
pub use seed::{seed_store, SeedConfig};
