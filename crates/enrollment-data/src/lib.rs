//! Report processing layer for the enrollment pipeline.
//!
//! Responsible for discovering and reading report files, splitting lines into
//! fields, normalizing them into typed records, aggregating and exporting the
//! resulting tables, and running the top-level pipeline.

pub mod aggregator;
pub mod analysis;
pub mod exporter;
pub mod normalizer;
pub mod reader;
pub mod statistics;
pub mod tokenizer;

pub use enrollment_core as core;
