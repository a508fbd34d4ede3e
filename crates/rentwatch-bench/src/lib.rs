//! Rentwatch Benchmark Suite
//!
//! Deterministic listing fixtures for the Criterion benchmarks in
//! `benches/`.
//!
//! # Benchmark Categories
//!
//! - **Filter**: range and string-match filters over a populated store
//! - **Diff**: splitting an incoming crawl batch into new and known listings

pub mod fixtures;

pub use fixtures::{generate_listings, populated_store, Scale};
