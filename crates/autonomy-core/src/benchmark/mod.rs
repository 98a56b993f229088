//! Multi-dimensional benchmark scoring.
//!
//! Layout:
//!   .autonomy/benchmarks/latest.json                  most recent suite result
//!   .autonomy/benchmarks/<suite>-<timestamp>.json     history, one per run

pub mod measure;
pub mod runner;
pub mod spec;

pub use measure::{DimensionMeasurer, FileMeasurer};
pub use runner::{BenchmarkResult, BenchmarkRunner, SuiteResult, SuiteSummary};
pub use spec::{
    BenchmarkSpec, BenchmarkSuite, Dimension, ExpectedOutcomes, FilePattern,
    DEFAULT_DIMENSION_WEIGHTS,
};
