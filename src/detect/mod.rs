//! Face detection capability.
//!
//! The loop only sees [`FaceBackend`]: locate boxes, embed a box, and a boolean
//! match oracle. The stub backend is always available; the ONNX backend is
//! behind the `backend-tract` feature.

mod backend;
mod backends;
mod embedding;

use anyhow::Result;

pub use backend::{FaceBackend, DEFAULT_TOLERANCE};
pub use backends::StubBackend;
#[cfg(feature = "backend-tract")]
pub use backends::TractBackend;
pub use embedding::Embedding;

use crate::config::{DetectorKind, DetectorSettings};
use crate::error::FacelinkError;

/// Build the configured backend.
pub fn build_backend(settings: &DetectorSettings) -> Result<Box<dyn FaceBackend>> {
    let mut backend: Box<dyn FaceBackend> = match settings.kind {
        DetectorKind::Stub => Box::new(StubBackend::new().with_tolerance(settings.tolerance)),
        DetectorKind::Tract => build_tract(settings)?,
    };
    backend.warm_up()?;
    log::info!(
        "face backend '{}' ready (tolerance {:.2})",
        backend.name(),
        backend.tolerance()
    );
    Ok(backend)
}

#[cfg(feature = "backend-tract")]
fn build_tract(settings: &DetectorSettings) -> Result<Box<dyn FaceBackend>> {
    let (Some(detector), Some(embedder)) = (&settings.detector_model, &settings.embedder_model)
    else {
        return Err(FacelinkError::Config(
            "tract backend needs detector_model and embedder_model".to_string(),
        )
        .into());
    };
    Ok(Box::new(
        TractBackend::new(
            detector,
            embedder,
            settings.working.width,
            settings.working.height,
        )?
        .with_tolerance(settings.tolerance),
    ))
}

#[cfg(not(feature = "backend-tract"))]
fn build_tract(_settings: &DetectorSettings) -> Result<Box<dyn FaceBackend>> {
    Err(FacelinkError::Config("tract backend requires the backend-tract feature".to_string()).into())
}
