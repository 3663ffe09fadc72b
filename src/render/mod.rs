//! Render surface.
//!
//! Boxes come out of the processor at working resolution; [`annotations`]
//! scales them back onto the captured frame before anything is drawn. The
//! surface owns the only user-facing exit control (the quit key).

mod headless;
pub mod overlay;
#[cfg(feature = "render-opencv")]
mod window;

use anyhow::Result;

pub use headless::HeadlessSurface;
#[cfg(feature = "render-opencv")]
pub use window::WindowSurface;

use crate::config::{RenderMode, RenderSettings};
use crate::frame::{BoundingBox, Frame, Resolution};
use crate::processor::FrameResult;

/// One labelled box in full-frame coordinates.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Annotation {
    pub bbox: BoundingBox,
    pub label: String,
}

/// Scale a working-resolution result onto a frame of size `frame`.
pub fn annotations(result: &FrameResult, frame: Resolution, working: Resolution) -> Vec<Annotation> {
    result
        .iter()
        .map(|(bbox, label)| Annotation {
            bbox: bbox.rescale(working, frame).clamp_to(frame),
            label: label.to_string(),
        })
        .collect()
}

pub trait RenderSurface {
    /// Show `frame` with `annotations` drawn over it.
    fn present(&mut self, frame: &Frame, annotations: &[Annotation]) -> Result<()>;

    /// True once the user has asked to quit. Must not block.
    fn poll_quit(&mut self) -> Result<bool>;

    fn close(&mut self) -> Result<()>;
}

pub fn build_surface(settings: &RenderSettings) -> Result<Box<dyn RenderSurface>> {
    match settings.mode {
        RenderMode::Headless => Ok(Box::new(HeadlessSurface::new(settings)?)),
        RenderMode::Window => build_window(settings),
    }
}

#[cfg(feature = "render-opencv")]
fn build_window(settings: &RenderSettings) -> Result<Box<dyn RenderSurface>> {
    Ok(Box::new(WindowSurface::open(settings)?))
}

#[cfg(not(feature = "render-opencv"))]
fn build_window(_settings: &RenderSettings) -> Result<Box<dyn RenderSurface>> {
    Err(crate::error::FacelinkError::Config(
        "render mode 'window' requires the render-opencv feature (use --headless)".to_string(),
    )
    .into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scales_boxes_by_the_downscale_factor() {
        let result = FrameResult {
            locations: vec![BoundingBox::new(10, 60, 50, 20)],
            names: vec!["A".to_string()],
        };
        let scaled = annotations(&result, Resolution::new(960, 720), Resolution::new(320, 240));
        assert_eq!(
            scaled,
            vec![Annotation {
                bbox: BoundingBox::new(30, 180, 150, 60),
                label: "A".to_string(),
            }]
        );
    }

    #[test]
    fn full_size_boxes_are_clamped_inside_the_frame() {
        let result = FrameResult {
            locations: vec![BoundingBox::new(0, 320, 240, 0)],
            names: vec!["A".to_string()],
        };
        let scaled = annotations(&result, Resolution::new(960, 720), Resolution::new(320, 240));
        assert_eq!(scaled[0].bbox, BoundingBox::new(0, 959, 719, 0));
    }
}
