//! Data layer for review-insight.
//!
//! Responsible for locating and reading dataset artifacts, normalizing raw
//! review rows into a [`normalizer::DatasetSnapshot`], and deriving every
//! aggregate view from that snapshot.

pub mod aggregator;
pub mod analysis;
pub mod breakdown;
pub mod deep_dive;
pub mod diagnosis;
pub mod explorer;
pub mod hierarchy;
pub mod impact;
pub mod normalizer;
pub mod reader;
pub mod trends;
pub mod versions;

pub use insight_core as core;
