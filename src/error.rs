use thiserror::Error;

use crate::types::{MeasureMethod, PieceId};

/// Invalid material configuration. Fatal for the material it belongs to only.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("fixed stock length list is empty")]
    EmptyLengthList,

    #[error("stock lengths must be non-zero")]
    ZeroLength,

    #[error("range step must be positive")]
    ZeroStep,

    #[error("invalid stock range {min}..{max}")]
    InvalidRange { min: u32, max: u32 },

    #[error("stock range yields {count} lengths, more than {limit}")]
    TooManyLengths { count: u64, limit: u64 },

    #[error("{field} must be non-negative, got {value}")]
    NegativeRate { field: &'static str, value: f64 },
}

/// An alternate measurement could not be obtained.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MeasureError {
    #[error("no {method:?} measurement for piece {piece}")]
    Unavailable { piece: PieceId, method: MeasureMethod },

    #[error("non-positive {method:?} measurement {value} for piece {piece}")]
    NonPositive {
        piece: PieceId,
        method: MeasureMethod,
        value: f64,
    },
}

/// Failure of an external provider (element source, attribute sink).
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("invalid record at line {line}: {message}")]
    InvalidRecord { line: u64, message: String },

    #[error("attribute write rejected for piece {0}")]
    Rejected(PieceId),
}

#[derive(Error, Debug)]
pub enum ConfigFileError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
