//! Detector error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DetectorError {
    #[error("file watch error: {0}")]
    Watch(#[from] notify::Error),

    #[error("invalid ignore pattern {pattern:?}: {source}")]
    IgnorePattern {
        pattern: String,
        source: globset::Error,
    },

    #[error("invalid indicator pattern {pattern:?}: {source}")]
    IndicatorPattern {
        pattern: String,
        source: regex::Error,
    },
}

pub type Result<T> = std::result::Result<T, DetectorError>;
