//! Error types.

use thiserror::Error;

/// Errors raised while recording telemetry or driving traffic lights.
#[derive(Error, Debug)]
pub enum Error {
    /// Two adjacent junctions share the same coordinates.
    #[error("geometry error: junction at ({x}, {y}) coincides with its neighbour")]
    Geometry { x: i32, y: i32 },

    /// The static configuration is invalid or incomplete.
    #[error("config error: {0}")]
    Config(String),

    /// The simulation engine failed or has already been shut down.
    #[error("resource error: {0}")]
    Resource(String),

    /// A junction identifier could not be parsed.
    #[error("invalid junction id: {0:?}")]
    InvalidJunctionId(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
