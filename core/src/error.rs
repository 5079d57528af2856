//! Error types for the configuration and log replay layers.
//!
//! The numerical core never fails; only the surfaces that touch files or user supplied
//! parameters return [CpiError].

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CpiError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Need at least two samples inside [{start}, {end}], found {found}")]
    InsufficientSamples { start: f64, end: f64, found: usize },
}

impl From<serde_json::Error> for CpiError {
    fn from(e: serde_json::Error) -> Self {
        CpiError::Parse(e.to_string())
    }
}

impl From<serde_yaml::Error> for CpiError {
    fn from(e: serde_yaml::Error) -> Self {
        CpiError::Parse(e.to_string())
    }
}

impl From<toml::de::Error> for CpiError {
    fn from(e: toml::de::Error) -> Self {
        CpiError::Parse(e.to_string())
    }
}

impl From<toml::ser::Error> for CpiError {
    fn from(e: toml::ser::Error) -> Self {
        CpiError::Parse(e.to_string())
    }
}
