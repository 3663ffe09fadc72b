use anyhow::{anyhow, Result};

use crate::detect::backend::{FaceBackend, DEFAULT_TOLERANCE};
use crate::detect::embedding::Embedding;
use crate::frame::{BoundingBox, Frame};

/// Pixels whose brightest channel is at or below this level are background.
const BACKGROUND_LEVEL: u8 = 16;
/// Embedding units per channel step; 64 puts pure primaries ~5.7 apart.
const CHANNEL_SCALE: f32 = 64.0;

/// Stub backend for synthetic runs and tests.
///
/// Treats the bounding box of all non-background pixels as the single face in
/// the image and embeds it as its mean colour. Deterministic and dependency
/// free, so `stub://` sources and fixture images exercise the whole loop.
pub struct StubBackend {
    tolerance: f32,
}

impl StubBackend {
    pub fn new() -> Self {
        Self {
            tolerance: DEFAULT_TOLERANCE,
        }
    }

    /// Override the default match tolerance.
    pub fn with_tolerance(mut self, tolerance: f32) -> Self {
        self.tolerance = tolerance;
        self
    }
}

impl Default for StubBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl FaceBackend for StubBackend {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn locate_faces(&mut self, image: &Frame) -> Result<Vec<BoundingBox>> {
        let mut extent: Option<BoundingBox> = None;
        for y in 0..image.height() {
            for x in 0..image.width() {
                let Some(px) = image.rgb_at(x, y) else {
                    continue;
                };
                if px.iter().all(|&c| c <= BACKGROUND_LEVEL) {
                    continue;
                }
                let b = extent.get_or_insert(BoundingBox::new(y, x + 1, y + 1, x));
                b.top = b.top.min(y);
                b.bottom = b.bottom.max(y + 1);
                b.left = b.left.min(x);
                b.right = b.right.max(x + 1);
            }
        }
        Ok(extent.into_iter().collect())
    }

    fn embed(&mut self, image: &Frame, location: &BoundingBox) -> Result<Embedding> {
        let mut sums = [0u64; 3];
        let mut count = 0u64;
        for y in location.top..location.bottom {
            for x in location.left..location.right {
                if let Some(px) = image.rgb_at(x, y) {
                    for (sum, &c) in sums.iter_mut().zip(px.iter()) {
                        *sum += c as u64;
                    }
                    count += 1;
                }
            }
        }
        if count == 0 {
            return Err(anyhow!("face box {:?} lies outside the image", location));
        }
        Ok(Embedding::new(
            sums.iter()
                .map(|&s| s as f32 / count as f32 / CHANNEL_SCALE)
                .collect(),
        ))
    }

    fn tolerance(&self) -> f32 {
        self.tolerance
    }
}
