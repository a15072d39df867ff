//! Debug rendering helpers.
//!
//! Streams render onto an RGB canvas for inspection. Only simple primitives
//! are drawn here; richer visualization belongs to the viewer.

use crate::core::types::Object;
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_line_segment_mut};
use imageproc::rect::Rect;

/// Canvas that streams render to.
pub type Canvas = RgbImage;

pub const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
pub const BLACK: Rgb<u8> = Rgb([0, 0, 0]);
pub const RED: Rgb<u8> = Rgb([255, 0, 22]);
pub const GREEN: Rgb<u8> = Rgb([0, 200, 60]);

/// Fill the whole canvas with one color.
pub fn clear(canvas: &mut Canvas, color: Rgb<u8>) {
    for pixel in canvas.pixels_mut() {
        *pixel = color;
    }
}

/// Plot a series of values as a polyline scaled to the canvas.
pub fn plot_series(canvas: &mut Canvas, values: &[f64]) {
    clear(canvas, WHITE);
    let (width, height) = canvas.dimensions();
    if width < 2 || height < 2 {
        return;
    }
    let (w, h) = ((width - 1) as f32, (height - 1) as f32);

    // axes
    draw_line_segment_mut(canvas, (0.0, h), (w, h), BLACK);
    draw_line_segment_mut(canvas, (0.0, 0.0), (0.0, h), BLACK);

    let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.is_empty() {
        return;
    }
    let min = finite.iter().copied().fold(f64::INFINITY, f64::min);
    let max = finite.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let span = if max - min > f64::EPSILON { max - min } else { 1.0 };
    let step = if finite.len() > 1 {
        w / (finite.len() - 1) as f32
    } else {
        0.0
    };
    let point = |i: usize, v: f64| (i as f32 * step, h - ((v - min) / span) as f32 * h);

    if finite.len() == 1 {
        let (x, y) = point(0, finite[0]);
        draw_line_segment_mut(canvas, (x, y), (w, y), RED);
        return;
    }
    for (i, pair) in finite.windows(2).enumerate() {
        draw_line_segment_mut(canvas, point(i, pair[0]), point(i + 1, pair[1]), RED);
    }
}

/// Draw the bounding box of an object.
pub fn draw_object(canvas: &mut Canvas, object: &Object, color: Rgb<u8>) {
    let width = object.width.max(1.0) as u32;
    let height = object.height.max(1.0) as u32;
    let rect = Rect::at(object.x as i32, object.y as i32).of_size(width, height);
    draw_hollow_rect_mut(canvas, rect, color);
}
