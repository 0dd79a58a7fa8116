use thiserror::Error;

/// Errors produced by the rasterization engine and its configuration layer. Points that are
/// geometrically implausible for a sensor are never errors, they are dropped silently.
#[derive(Error, Debug)]
pub enum RaysError {
    #[error("shape error: {0}")]
    Shape(String),

    #[error("non-finite position at point {index}: [{x}, {y}, {z}]")]
    NonFinite { index: usize, x: f64, y: f64, z: f64 },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("invalid sensor: {0}")]
    InvalidSensor(String),

    #[error("unknown lidar type: {0}")]
    UnknownLidar(String),

    #[error("configuration error: {0}")]
    Config(#[from] serde_json::Error),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("attribute store error: {0}")]
    Store(String),
}

pub type Result<T> = std::result::Result<T, RaysError>;
