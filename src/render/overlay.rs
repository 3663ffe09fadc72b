//! Overlay drawing on raw frames.

use crate::frame::{BoundingBox, Frame, PixelFormat};

pub const BOX_RGB: [u8; 3] = [255, 0, 0];
pub const LABEL_RGB: [u8; 3] = [0, 0, 255];
pub const BOX_THICKNESS: u32 = 2;
/// Cell size of the label marker drawn where no font is available.
pub const LABEL_CELL_WIDTH: u32 = 6;
pub const LABEL_CELL_HEIGHT: u32 = 8;

/// Label baseline origin for a box: just above its top-left corner.
pub fn label_origin(bbox: &BoundingBox) -> (i32, i32) {
    (bbox.left as i32 + 6, bbox.top as i32 - 6)
}

/// Draw an unfilled rectangle of `thickness` pixels, clipped to the frame.
pub fn draw_box(frame: &mut Frame, bbox: &BoundingBox, rgb: [u8; 3], thickness: u32) {
    let bounds = frame.resolution();
    if bounds.is_empty() {
        return;
    }
    let b = bbox.clamp_to(bounds);
    let t = thickness.max(1);
    for i in 0..t {
        let top = (b.top + i).min(b.bottom);
        let bottom = b.bottom.saturating_sub(i).max(b.top);
        let left = (b.left + i).min(b.right);
        let right = b.right.saturating_sub(i).max(b.left);
        for x in b.left..=b.right {
            put(frame, x, top, rgb);
            put(frame, x, bottom, rgb);
        }
        for y in b.top..=b.bottom {
            put(frame, left, y, rgb);
            put(frame, right, y, rgb);
        }
    }
}

/// Fill a bar standing on the label origin, one cell per character of
/// `label`. Parts above or beside the frame are dropped.
pub fn draw_label_marker(frame: &mut Frame, bbox: &BoundingBox, label: &str, rgb: [u8; 3]) {
    let bounds = frame.resolution();
    let (x0, baseline) = label_origin(bbox);
    let cells = label.chars().count() as i64;
    if bounds.is_empty() || cells == 0 {
        return;
    }
    let x_end = (i64::from(x0) + cells * i64::from(LABEL_CELL_WIDTH)).min(i64::from(bounds.width));
    let y_start = i64::from(baseline) - i64::from(LABEL_CELL_HEIGHT) + 1;
    let y_end = (i64::from(baseline) + 1).min(i64::from(bounds.height));
    for y in y_start.max(0)..y_end {
        for x in i64::from(x0).max(0)..x_end {
            put(frame, x as u32, y as u32, rgb);
        }
    }
}

fn put(frame: &mut Frame, x: u32, y: u32, rgb: [u8; 3]) {
    let format = frame.format();
    let width = frame.width() as usize;
    let offset = (y as usize * width + x as usize) * 3;
    let px = match frame.pixels_mut().get_mut(offset..offset + 3) {
        Some(px) => px,
        None => return,
    };
    match format {
        PixelFormat::Rgb24 => px.copy_from_slice(&rgb),
        PixelFormat::Bgr24 => px.copy_from_slice(&[rgb[2], rgb[1], rgb[0]]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn draws_outline_only() {
        let mut frame = Frame::solid(20, 20, [0, 0, 0], PixelFormat::Bgr24);
        draw_box(&mut frame, &BoundingBox::new(2, 12, 12, 2), BOX_RGB, 1);
        assert_eq!(frame.rgb_at(2, 2), Some(BOX_RGB));
        assert_eq!(frame.rgb_at(12, 7), Some(BOX_RGB));
        assert_eq!(frame.rgb_at(7, 7), Some([0, 0, 0]));
        assert_eq!(frame.rgb_at(15, 15), Some([0, 0, 0]));
    }

    #[test]
    fn out_of_frame_boxes_are_clipped() {
        let mut frame = Frame::solid(10, 10, [0, 0, 0], PixelFormat::Rgb24);
        draw_box(&mut frame, &BoundingBox::new(5, 40, 40, 5), BOX_RGB, 2);
        assert_eq!(frame.rgb_at(9, 9), Some(BOX_RGB));
        assert_eq!(frame.rgb_at(8, 8), Some(BOX_RGB));
    }

    #[test]
    fn label_marker_fills_one_cell_per_character() {
        let mut frame = Frame::solid(200, 200, [0, 0, 0], PixelFormat::Bgr24);
        draw_label_marker(&mut frame, &BoundingBox::new(30, 180, 150, 60), "Ann", LABEL_RGB);
        assert_eq!(frame.rgb_at(66, 24), Some(LABEL_RGB));
        assert_eq!(frame.rgb_at(83, 17), Some(LABEL_RGB));
        assert_eq!(frame.rgb_at(84, 24), Some([0, 0, 0]));
        assert_eq!(frame.rgb_at(66, 25), Some([0, 0, 0]));
        assert_eq!(frame.rgb_at(66, 16), Some([0, 0, 0]));
    }

    #[test]
    fn label_marker_above_the_frame_is_dropped() {
        let mut frame = Frame::solid(50, 50, [0, 0, 0], PixelFormat::Rgb24);
        draw_label_marker(&mut frame, &BoundingBox::new(0, 40, 40, 0), "Ann", LABEL_RGB);
        assert!(frame.pixels().iter().all(|&v| v == 0));
    }

    #[test]
    fn label_sits_above_the_box() {
        assert_eq!(label_origin(&BoundingBox::new(30, 180, 150, 60)), (66, 24));
    }
}
