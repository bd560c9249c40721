//! Error types for the ray tracer.

use thiserror::Error;

/// Errors produced while building a scene or moving images in and out.
///
/// Rendering itself never fails; every per-pixel computation yields a color.
#[derive(Error, Debug)]
pub enum TracerError {
    #[error("transform is not invertible (determinant is zero)")]
    NonInvertible,

    #[error("shape {0} is not a group and cannot hold children")]
    NotAGroup(usize),

    #[error("invalid scene hierarchy: {0}")]
    InvalidHierarchy(String),

    #[error("OBJ error on line {line}: {message}")]
    Obj { line: usize, message: String },

    #[error("PPM error: {0}")]
    Ppm(String),

    #[error("scene description error: {0}")]
    Scene(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, TracerError>;
