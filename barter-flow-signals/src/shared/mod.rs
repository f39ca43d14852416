/// Shared modules for the flow signal pipeline
pub mod adaptive;
pub mod aggregation;
pub mod burst;
pub mod classifier;
pub mod config;
pub mod detectors;
pub mod engine;
pub mod error;
pub mod pipeline;
pub mod score;
pub mod types;
pub mod worker;
