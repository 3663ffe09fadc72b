//! OpenCV window surface (feature: render-opencv).

use anyhow::{Context, Result};
use opencv::core::{self, Mat, Point, Rect, Scalar, Size};
use opencv::prelude::*;
use opencv::{highgui, imgproc};

use super::overlay::{label_origin, BOX_RGB, BOX_THICKNESS, LABEL_RGB};
use super::{Annotation, RenderSurface};
use crate::config::RenderSettings;
use crate::frame::{Frame, Resolution};

pub struct WindowSurface {
    title: String,
    quit_key: char,
    display: Resolution,
    quit_requested: bool,
    open: bool,
}

impl WindowSurface {
    pub fn open(settings: &RenderSettings) -> Result<Self> {
        highgui::named_window(&settings.window_title, highgui::WINDOW_AUTOSIZE)
            .with_context(|| format!("open window '{}'", settings.window_title))?;
        log::info!("render window '{}' open", settings.window_title);
        Ok(Self {
            title: settings.window_title.clone(),
            quit_key: settings.quit_key,
            display: settings.display,
            quit_requested: false,
            open: true,
        })
    }
}

/// OpenCV scalars are BGR.
fn bgr_scalar(rgb: [u8; 3]) -> Scalar {
    Scalar::new(rgb[2] as f64, rgb[1] as f64, rgb[0] as f64, 0.0)
}

fn to_mat(frame: &Frame) -> Result<Mat> {
    let bgr = frame.clone().into_bgr();
    let mut mat = Mat::new_rows_cols_with_default(
        bgr.height() as i32,
        bgr.width() as i32,
        core::CV_8UC3,
        Scalar::all(0.0),
    )?;
    mat.data_bytes_mut()?.copy_from_slice(bgr.pixels());
    Ok(mat)
}

impl RenderSurface for WindowSurface {
    fn present(&mut self, frame: &Frame, annotations: &[Annotation]) -> Result<()> {
        let mut mat = to_mat(frame)?;
        for annotation in annotations {
            let b = &annotation.bbox;
            imgproc::rectangle(
                &mut mat,
                Rect::new(b.left as i32, b.top as i32, b.width() as i32, b.height() as i32),
                bgr_scalar(BOX_RGB),
                BOX_THICKNESS as i32,
                imgproc::LINE_8,
                0,
            )?;
            let (x, y) = label_origin(b);
            imgproc::put_text(
                &mut mat,
                &annotation.label,
                Point::new(x, y),
                imgproc::FONT_HERSHEY_DUPLEX,
                1.0,
                bgr_scalar(LABEL_RGB),
                1,
                imgproc::LINE_8,
                false,
            )?;
        }

        let mut shown = Mat::default();
        imgproc::resize(
            &mat,
            &mut shown,
            Size::new(self.display.width as i32, self.display.height as i32),
            0.0,
            0.0,
            imgproc::INTER_LINEAR,
        )?;
        highgui::imshow(&self.title, &shown)?;

        // Key events are only delivered while the window pumps its queue.
        let key = highgui::wait_key(1)?;
        if key >= 0 && (key & 0xff) as u8 as char == self.quit_key {
            self.quit_requested = true;
        }
        Ok(())
    }

    fn poll_quit(&mut self) -> Result<bool> {
        Ok(self.quit_requested)
    }

    fn close(&mut self) -> Result<()> {
        if self.open {
            self.open = false;
            highgui::destroy_all_windows()?;
            log::info!("render window '{}' closed", self.title);
        }
        Ok(())
    }
}
