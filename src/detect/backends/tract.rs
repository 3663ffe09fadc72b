#![cfg(feature = "backend-tract")]

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use image::{imageops, ImageBuffer, Rgb};
use tract_onnx::prelude::*;

use crate::detect::backend::FaceBackend;
use crate::detect::embedding::Embedding;
use crate::frame::{BoundingBox, Frame, PixelFormat};

type Plan = TypedRunnableModel<TypedModel>;

const EMBED_SIDE: u32 = 112;
const IOU_THRESHOLD: f32 = 0.3;

/// Tract-based backend running two local ONNX models.
///
/// - detector: UltraFace-style network taking `1x3xHxW` and producing
///   `scores [1, N, 2]` and corner-form `boxes [1, N, 4]` in 0..1 coordinates.
/// - embedder: ArcFace-style network taking `1x3x112x112` and producing `[1, D]`.
///
/// No network I/O; models are read once at construction.
pub struct TractBackend {
    detector: Plan,
    embedder: Plan,
    width: u32,
    height: u32,
    score_threshold: f32,
    tolerance: f32,
}

impl TractBackend {
    pub fn new<P: AsRef<Path>, Q: AsRef<Path>>(
        detector_path: P,
        embedder_path: Q,
        width: u32,
        height: u32,
    ) -> Result<Self> {
        let detector = load_plan(detector_path.as_ref(), width, height)?;
        let embedder = load_plan(embedder_path.as_ref(), EMBED_SIDE, EMBED_SIDE)?;
        Ok(Self {
            detector,
            embedder,
            width,
            height,
            score_threshold: 0.7,
            tolerance: 1.0,
        })
    }

    /// Override the default match tolerance (L2 distance between unit embeddings).
    pub fn with_tolerance(mut self, tolerance: f32) -> Self {
        self.tolerance = tolerance;
        self
    }
}

fn load_plan(path: &Path, width: u32, height: u32) -> Result<Plan> {
    tract_onnx::onnx()
        .model_for_path(path)
        .with_context(|| format!("failed to load ONNX model from {}", path.display()))?
        .with_input_fact(
            0,
            InferenceFact::dt_shape(
                f32::datum_type(),
                tvec!(1, 3, height as usize, width as usize),
            ),
        )
        .context("failed to set input fact")?
        .into_optimized()
        .context("failed to optimize ONNX model")?
        .into_runnable()
        .context("failed to build runnable ONNX model")
}

fn to_tensor(pixels: &[u8], width: u32, height: u32, mean: f32, scale: f32) -> Result<Tensor> {
    let expected = (width as usize) * (height as usize) * 3;
    if pixels.len() != expected {
        return Err(anyhow!(
            "expected {} RGB bytes, received {}",
            expected,
            pixels.len()
        ));
    }
    let width = width as usize;
    let input = tract_ndarray::Array4::from_shape_fn(
        (1, 3, height as usize, width),
        |(_, channel, y, x)| (pixels[(y * width + x) * 3 + channel] as f32 - mean) / scale,
    );
    Ok(input.into_tensor())
}

fn iou(a: &[f32; 4], b: &[f32; 4]) -> f32 {
    let ix = (a[2].min(b[2]) - a[0].max(b[0])).max(0.0);
    let iy = (a[3].min(b[3]) - a[1].max(b[1])).max(0.0);
    let inter = ix * iy;
    let area = |r: &[f32; 4]| (r[2] - r[0]).max(0.0) * (r[3] - r[1]).max(0.0);
    let union = area(a) + area(b) - inter;
    if union <= 0.0 {
        0.0
    } else {
        inter / union
    }
}

impl FaceBackend for TractBackend {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn locate_faces(&mut self, image: &Frame) -> Result<Vec<BoundingBox>> {
        if image.format() != PixelFormat::Rgb24 {
            return Err(anyhow!("tract backend expects RGB frames"));
        }
        let input = if image.width() != self.width || image.height() != self.height {
            image.resize(crate::frame::Resolution::new(self.width, self.height))?
        } else {
            image.clone()
        };
        let tensor = to_tensor(input.pixels(), self.width, self.height, 127.0, 128.0)?;
        let outputs = self
            .detector
            .run(tvec!(tensor.into()))
            .context("face detector inference failed")?;
        let scores = outputs
            .first()
            .ok_or_else(|| anyhow!("detector produced no score output"))?
            .to_array_view::<f32>()
            .context("detector scores were not f32")?
            .into_dimensionality::<tract_ndarray::Ix3>()
            .context("detector scores were not rank 3")?;
        let boxes = outputs
            .get(1)
            .ok_or_else(|| anyhow!("detector produced no box output"))?
            .to_array_view::<f32>()
            .context("detector boxes were not f32")?
            .into_dimensionality::<tract_ndarray::Ix3>()
            .context("detector boxes were not rank 3")?;

        let mut candidates: Vec<(f32, [f32; 4])> = Vec::new();
        let count = scores.shape()[1].min(boxes.shape()[1]);
        for i in 0..count {
            let score = scores[[0, i, 1]];
            if score < self.score_threshold {
                continue;
            }
            candidates.push((
                score,
                [
                    boxes[[0, i, 0]],
                    boxes[[0, i, 1]],
                    boxes[[0, i, 2]],
                    boxes[[0, i, 3]],
                ],
            ));
        }
        candidates.sort_by(|a, b| b.0.total_cmp(&a.0));

        let mut kept: Vec<[f32; 4]> = Vec::new();
        for (_, rect) in candidates {
            if kept.iter().all(|k| iou(k, &rect) < IOU_THRESHOLD) {
                kept.push(rect);
            }
        }

        let (w, h) = (image.width() as f32, image.height() as f32);
        let bounds = image.resolution();
        Ok(kept
            .into_iter()
            .map(|r| {
                BoundingBox::new(
                    (r[1].max(0.0) * h) as u32,
                    (r[2].max(0.0) * w) as u32,
                    (r[3].max(0.0) * h) as u32,
                    (r[0].max(0.0) * w) as u32,
                )
                .clamp_to(bounds)
            })
            .collect())
    }

    fn embed(&mut self, image: &Frame, location: &BoundingBox) -> Result<Embedding> {
        if location.width() == 0 || location.height() == 0 {
            return Err(anyhow!("empty face box {:?}", location));
        }
        let rgb = image.to_rgb_image()?;
        let face = imageops::crop_imm(
            &rgb,
            location.left,
            location.top,
            location.width(),
            location.height(),
        )
        .to_image();
        let face: ImageBuffer<Rgb<u8>, Vec<u8>> = imageops::resize(
            &face,
            EMBED_SIDE,
            EMBED_SIDE,
            imageops::FilterType::Triangle,
        );
        let tensor = to_tensor(face.as_raw(), EMBED_SIDE, EMBED_SIDE, 127.5, 128.0)?;
        let outputs = self
            .embedder
            .run(tvec!(tensor.into()))
            .context("face embedder inference failed")?;
        let output = outputs
            .first()
            .ok_or_else(|| anyhow!("embedder produced no outputs"))?
            .to_array_view::<f32>()
            .context("embedder output tensor was not f32")?;
        let values: Vec<f32> = output.iter().copied().collect();
        let norm = values.iter().map(|v| v * v).sum::<f32>().sqrt();
        if !norm.is_finite() || norm == 0.0 {
            return Err(anyhow!("embedder produced a degenerate vector"));
        }
        Ok(Embedding::new(values.into_iter().map(|v| v / norm).collect()))
    }

    fn tolerance(&self) -> f32 {
        self.tolerance
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iou_of_disjoint_and_identical_boxes() {
        let a = [0.0, 0.0, 0.5, 0.5];
        let b = [0.6, 0.6, 1.0, 1.0];
        assert_eq!(iou(&a, &b), 0.0);
        assert!((iou(&a, &a) - 1.0).abs() < 1e-6);
    }
}
