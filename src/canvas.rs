//! Pixel canvas for the painter backend.
//!
//! One `Canvas` is exclusively owned by one conversion call. All primitive
//! renderers mutate it in place through the helpers below, which map onto
//! anti-aliased tiny-skia path fills and strokes.

use crate::color::Rgba;
use crate::error::InkfallError;
use image::RgbaImage;
use tiny_skia::{
    FillRule, Paint, Path, PathBuilder, Pixmap, PixmapPaint, Rect, Stroke, Transform,
};

// Circle-to-cubic approximation constant.
const KAPPA: f32 = 0.552_284_75;

#[derive(Debug)]
pub struct Canvas {
    pixmap: Pixmap,
}

impl Canvas {
    pub fn new(width: u32, height: u32, fill: Rgba) -> Result<Self, InkfallError> {
        let mut pixmap = Pixmap::new(width, height).ok_or_else(|| {
            InkfallError::InvalidConfiguration(format!("invalid canvas size {width}x{height}"))
        })?;
        pixmap.fill(fill.to_skia());
        Ok(Self { pixmap })
    }

    pub fn width(&self) -> u32 {
        self.pixmap.width()
    }

    pub fn height(&self) -> u32 {
        self.pixmap.height()
    }

    pub(crate) fn fill_path(&mut self, path: &Path, color: Rgba) {
        let paint = solid_paint(color);
        self.pixmap
            .fill_path(path, &paint, FillRule::Winding, Transform::identity(), None);
    }

    pub(crate) fn stroke_path(&mut self, path: &Path, color: Rgba, width: f32) {
        if width <= 0.0 {
            return;
        }
        let paint = solid_paint(color);
        let stroke = Stroke {
            width,
            ..Stroke::default()
        };
        self.pixmap
            .stroke_path(path, &paint, &stroke, Transform::identity(), None);
    }

    pub(crate) fn fill_rect(&mut self, x: f32, y: f32, w: f32, h: f32, color: Rgba) {
        if let Some(rect) = Rect::from_xywh(x, y, w, h) {
            let path = PathBuilder::from_rect(rect);
            self.fill_path(&path, color);
        }
    }

    pub(crate) fn stroke_rect(&mut self, x: f32, y: f32, w: f32, h: f32, color: Rgba, width: f32) {
        if let Some(rect) = Rect::from_xywh(x, y, w, h) {
            let path = PathBuilder::from_rect(rect);
            self.stroke_path(&path, color, width);
        }
    }

    pub(crate) fn fill_rounded_rect(
        &mut self,
        x: f32,
        y: f32,
        w: f32,
        h: f32,
        radius: f32,
        color: Rgba,
    ) {
        if let Some(path) = rounded_rect_path(x, y, w, h, radius) {
            self.fill_path(&path, color);
        }
    }

    pub(crate) fn fill_ellipse(&mut self, cx: f32, cy: f32, rx: f32, ry: f32, color: Rgba) {
        if let Some(path) = ellipse_path(cx, cy, rx, ry) {
            self.fill_path(&path, color);
        }
    }

    pub(crate) fn stroke_ellipse(
        &mut self,
        cx: f32,
        cy: f32,
        rx: f32,
        ry: f32,
        color: Rgba,
        width: f32,
    ) {
        if let Some(path) = ellipse_path(cx, cy, rx, ry) {
            self.stroke_path(&path, color, width);
        }
    }

    pub(crate) fn stroke_line(
        &mut self,
        x1: f32,
        y1: f32,
        x2: f32,
        y2: f32,
        color: Rgba,
        width: f32,
    ) {
        let mut builder = PathBuilder::new();
        builder.move_to(x1, y1);
        builder.line_to(x2, y2);
        if let Some(path) = builder.finish() {
            self.stroke_path(&path, color, width);
        }
    }

    pub(crate) fn stroke_polyline(&mut self, points: &[(f32, f32)], color: Rgba, width: f32) {
        if let Some(path) = polyline_path(points, false) {
            self.stroke_path(&path, color, width);
        }
    }

    pub(crate) fn fill_polygon(&mut self, points: &[(f32, f32)], color: Rgba) {
        if let Some(path) = polyline_path(points, true) {
            self.fill_path(&path, color);
        }
    }

    pub(crate) fn stroke_polygon(&mut self, points: &[(f32, f32)], color: Rgba, width: f32) {
        if let Some(path) = polyline_path(points, true) {
            self.stroke_path(&path, color, width);
        }
    }

    /// Alpha-composites a decoded bitmap at an integer pixel offset.
    pub(crate) fn composite_bitmap(&mut self, bitmap: &RgbaImage, x: i32, y: i32) {
        let Some(source) = bitmap_to_pixmap(bitmap) else {
            return;
        };
        self.pixmap.draw_pixmap(
            x,
            y,
            source.as_ref(),
            &PixmapPaint::default(),
            Transform::identity(),
            None,
        );
    }

    /// Composites a uniform translucent layer over the whole canvas.
    pub(crate) fn overlay(&mut self, color: Rgba) {
        let w = self.width() as f32;
        let h = self.height() as f32;
        self.fill_rect(0.0, 0.0, w, h, color);
    }

    /// Reads back one pixel with straight (demultiplied) alpha.
    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgba> {
        let px = self.pixmap.pixel(x, y)?.demultiply();
        Some(Rgba::new(px.red(), px.green(), px.blue(), px.alpha()))
    }

    pub fn encode_png(&self) -> Result<Vec<u8>, InkfallError> {
        self.pixmap
            .encode_png()
            .map_err(|e| InkfallError::Asset(format!("png encode failed: {e}")))
    }
}

fn solid_paint(color: Rgba) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color(color.to_skia());
    paint.anti_alias = true;
    paint
}

fn polyline_path(points: &[(f32, f32)], close: bool) -> Option<Path> {
    let (&(x0, y0), rest) = points.split_first()?;
    if rest.is_empty() {
        return None;
    }
    let mut builder = PathBuilder::new();
    builder.move_to(x0, y0);
    for &(x, y) in rest {
        builder.line_to(x, y);
    }
    if close {
        builder.close();
    }
    builder.finish()
}

fn ellipse_path(cx: f32, cy: f32, rx: f32, ry: f32) -> Option<Path> {
    if rx <= 0.0 || ry <= 0.0 {
        return None;
    }
    let oval = Rect::from_ltrb(cx - rx, cy - ry, cx + rx, cy + ry)?;
    let mut builder = PathBuilder::new();
    builder.push_oval(oval);
    builder.finish()
}

fn rounded_rect_path(x: f32, y: f32, w: f32, h: f32, radius: f32) -> Option<Path> {
    if w <= 0.0 || h <= 0.0 {
        return None;
    }
    let r = radius.clamp(0.0, (w.min(h)) / 2.0);
    if r <= 0.0 {
        return Rect::from_xywh(x, y, w, h).map(PathBuilder::from_rect);
    }
    let k = KAPPA * r;
    let mut pb = PathBuilder::new();
    pb.move_to(x + r, y);
    pb.line_to(x + w - r, y);
    pb.cubic_to(x + w - r + k, y, x + w, y + r - k, x + w, y + r);
    pb.line_to(x + w, y + h - r);
    pb.cubic_to(x + w, y + h - r + k, x + w - r + k, y + h, x + w - r, y + h);
    pb.line_to(x + r, y + h);
    pb.cubic_to(x + r - k, y + h, x, y + h - r + k, x, y + h - r);
    pb.line_to(x, y + r);
    pb.cubic_to(x, y + r - k, x + r - k, y, x + r, y);
    pb.close();
    pb.finish()
}

/// Converts a straight-alpha bitmap into a premultiplied pixmap for
/// compositing.
fn bitmap_to_pixmap(bitmap: &RgbaImage) -> Option<Pixmap> {
    let (width, height) = bitmap.dimensions();
    let mut pixmap = Pixmap::new(width, height)?;
    let src = bitmap.as_raw();
    let dst = pixmap.data_mut();
    for (src_px, dst_px) in src.chunks_exact(4).zip(dst.chunks_exact_mut(4)) {
        let a = src_px[3];
        dst_px[0] = premul_u8(src_px[0], a);
        dst_px[1] = premul_u8(src_px[1], a);
        dst_px[2] = premul_u8(src_px[2], a);
        dst_px[3] = a;
    }
    Some(pixmap)
}

fn premul_u8(channel: u8, alpha: u8) -> u8 {
    let prod = (channel as u16) * (alpha as u16) + 127;
    ((prod + (prod >> 8)) >> 8) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_canvas_is_filled_with_base_color() {
        let canvas = Canvas::new(4, 4, Rgba::new(20, 24, 38, 255)).unwrap();
        assert_eq!(canvas.pixel(2, 2), Some(Rgba::new(20, 24, 38, 255)));
    }

    #[test]
    fn zero_sized_canvas_is_rejected() {
        assert!(Canvas::new(0, 10, Rgba::BLACK).is_err());
    }

    #[test]
    fn filled_rect_interior_is_exact() {
        let mut canvas = Canvas::new(20, 20, Rgba::BLACK).unwrap();
        canvas.fill_rect(5.0, 5.0, 10.0, 10.0, Rgba::new(255, 0, 0, 255));
        assert_eq!(canvas.pixel(10, 10), Some(Rgba::new(255, 0, 0, 255)));
        assert_eq!(canvas.pixel(1, 1), Some(Rgba::BLACK));
    }

    #[test]
    fn composite_bitmap_respects_alpha() {
        let mut canvas = Canvas::new(4, 4, Rgba::WHITE).unwrap();
        let mut bitmap = RgbaImage::new(4, 4);
        for px in bitmap.pixels_mut() {
            *px = image::Rgba([0, 0, 255, 0]);
        }
        bitmap.put_pixel(1, 1, image::Rgba([0, 0, 255, 255]));
        canvas.composite_bitmap(&bitmap, 0, 0);
        assert_eq!(canvas.pixel(1, 1), Some(Rgba::new(0, 0, 255, 255)));
        // Fully transparent source pixels leave the canvas untouched.
        assert_eq!(canvas.pixel(2, 2), Some(Rgba::WHITE));
    }

    #[test]
    fn overlay_darkens_uniformly() {
        let mut canvas = Canvas::new(4, 4, Rgba::WHITE).unwrap();
        canvas.overlay(Rgba::new(0, 0, 0, 160));
        let px = canvas.pixel(0, 0).unwrap();
        assert_eq!(canvas.pixel(3, 3), Some(px));
        assert!(px.r < 120, "scrim should darken white: {px:?}");
    }

    #[test]
    fn rounded_rect_clips_corner() {
        let mut canvas = Canvas::new(40, 40, Rgba::BLACK).unwrap();
        canvas.fill_rounded_rect(0.0, 0.0, 40.0, 40.0, 12.0, Rgba::WHITE);
        // Center painted, extreme corner left at the base color.
        assert_eq!(canvas.pixel(20, 20), Some(Rgba::WHITE));
        assert_eq!(canvas.pixel(0, 0), Some(Rgba::BLACK));
    }
}
