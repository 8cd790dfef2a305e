//! File type identification by magic bytes and extension, plus the small HTTP
//! service that exposes it.

pub mod classify;
pub mod config;
pub mod error;
pub mod exec;
pub mod routes;
pub mod storage;
pub mod tables;

pub use classify::{
    aggregate, classify, classify_file, format_size, AggregateStats, Classification,
    ClassificationResult, DetectionMethod, Report,
};
pub use error::AppError;
