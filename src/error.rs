// Fatal error conditions the caller may want to tell apart.
//
// Everything else travels as a plain `anyhow::Error` with context.
// A stale surface is not an error at all: it is reported through the
// outcome enums in `crate::frame`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RendererError {
    #[error("Instance extension not available: {0}")]
    MissingInstanceExtension(String),

    #[error("Validation layer not available: {0}")]
    MissingLayer(String),

    #[error("No GPU with graphics and present queues and the required extensions found")]
    NoSuitableDevice,

    #[error("Surface reports no supported formats")]
    NoSurfaceFormat,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}
