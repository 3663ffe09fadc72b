use anyhow::Result;

use super::embedding::Embedding;
use crate::frame::{BoundingBox, Frame};

/// Default match tolerance: distances at or below this are the same person.
pub const DEFAULT_TOLERANCE: f32 = 0.6;

/// Face detection and embedding capability.
///
/// The loop treats implementations as a black box: boxes in, vectors out, and a
/// boolean match oracle. Implementations receive RGB frames at the working
/// resolution and must be deterministic for identical pixels.
pub trait FaceBackend: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Locate every face in the image.
    fn locate_faces(&mut self, image: &Frame) -> Result<Vec<BoundingBox>>;

    /// Compute the embedding of the face at `location`.
    fn embed(&mut self, image: &Frame, location: &BoundingBox) -> Result<Embedding>;

    /// Distance threshold used by [`FaceBackend::matches`].
    fn tolerance(&self) -> f32 {
        DEFAULT_TOLERANCE
    }

    /// One boolean per known embedding, `true` where the candidate is within tolerance.
    fn matches(&self, known: &[Embedding], candidate: &Embedding) -> Vec<bool> {
        let tolerance = self.tolerance();
        known
            .iter()
            .map(|k| k.distance(candidate) <= tolerance)
            .collect()
    }

    /// Optional warm-up hook.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}
