pub mod palette;
pub mod reconstruct;
pub mod tessellate;

pub mod errors {
    use thiserror::Error;

    #[derive(Debug, Error, PartialEq)]
    pub enum EngineError {
        #[error("{name} must be at least {min}, got {value}")]
        InvalidSegments {
            name: &'static str,
            value: usize,
            min: usize,
        },
        #[error("target envelope size must be a positive finite number, got {0}")]
        InvalidEnvelope(f64),
        #[error("plane offset must be finite, got {0}")]
        InvalidPlaneOffset(f64),
    }
}

pub use errors::EngineError;
pub use reconstruct::{
    NormalizationTransform, ReconstructOptions, ReconstructedDrawing, Reconstructor, SceneMapping,
    Tessellation, reconstruct,
};
