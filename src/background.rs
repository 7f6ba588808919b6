//! Backdrop composition.
//!
//! Every conversion starts from an opaque canvas. With a configured backdrop
//! bitmap the canvas gets the bitmap (stretched, or tiled vertically for very
//! tall outputs) plus a darkening scrim so foreground content stays legible.
//! Without one, the document's `background-color` attribute or a fixed dark
//! navy fills the canvas.

use crate::assets::AssetRegistry;
use crate::canvas::Canvas;
use crate::color::{Rgba, parse_color};
use crate::error::InkfallError;
use image::imageops::{self, FilterType};
use log::debug;

const SCRIM: Rgba = Rgba::new(0, 0, 0, 160);
const FALLBACK: Rgba = Rgba::new(20, 24, 38, 255);

/// Outputs taller than this multiple of the backdrop's aspect ratio are tiled
/// instead of stretched.
const TILE_THRESHOLD: f32 = 1.5;

pub(crate) fn compose(
    registry: &AssetRegistry,
    out_w: u32,
    out_h: u32,
    root: roxmltree::Node<'_, '_>,
) -> Result<Canvas, InkfallError> {
    let Some(backdrop) = registry.background() else {
        let base = parse_color(root.attribute("background-color").unwrap_or(""), Some(FALLBACK))
            .unwrap_or(FALLBACK);
        return Canvas::new(out_w, out_h, base);
    };

    let (bg_w, bg_h) = backdrop.dimensions();
    if bg_w == 0 || bg_h == 0 {
        return Canvas::new(out_w, out_h, FALLBACK);
    }

    let mut canvas = Canvas::new(out_w, out_h, Rgba::BLACK)?;
    let bg_ratio = bg_h as f32 / bg_w as f32;
    let out_ratio = out_h as f32 / out_w as f32;

    if out_ratio > bg_ratio * TILE_THRESHOLD {
        // Tall output: repeat the backdrop downward at its own aspect ratio,
        // cropping the final partial tile.
        let tile_w = out_w;
        let tile_h = ((tile_w as f32 * bg_ratio) as u32).max(1);
        let tile = imageops::resize(backdrop, tile_w, tile_h, FilterType::Lanczos3);
        debug!("tiling backdrop {}x{} over {}x{}", tile_w, tile_h, out_w, out_h);

        let mut y = 0u32;
        while y < out_h {
            let remaining = out_h - y;
            if remaining >= tile_h {
                canvas.composite_bitmap(&tile, 0, y as i32);
            } else {
                let partial = imageops::crop_imm(&tile, 0, 0, tile_w, remaining).to_image();
                canvas.composite_bitmap(&partial, 0, y as i32);
            }
            y += tile_h;
        }
    } else {
        let stretched = imageops::resize(backdrop, out_w, out_h, FilterType::Lanczos3);
        canvas.composite_bitmap(&stretched, 0, 0);
    }

    canvas.overlay(SCRIM);
    Ok(canvas)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbaImage;

    fn solid(w: u32, h: u32, rgba: [u8; 4]) -> RgbaImage {
        let mut bitmap = RgbaImage::new(w, h);
        for px in bitmap.pixels_mut() {
            *px = image::Rgba(rgba);
        }
        bitmap
    }

    fn root_of<'a, 'input>(doc: &'a roxmltree::Document<'input>) -> roxmltree::Node<'a, 'input> {
        doc.root_element()
    }

    #[test]
    fn without_backdrop_uses_document_background_color() {
        let registry = AssetRegistry::empty();
        let doc = roxmltree::Document::parse(r##"<svg background-color="#102030"/>"##).unwrap();
        let canvas = compose(&registry, 10, 10, root_of(&doc)).unwrap();
        assert_eq!(canvas.pixel(5, 5), Some(Rgba::new(0x10, 0x20, 0x30, 255)));
    }

    #[test]
    fn without_backdrop_falls_back_to_dark_navy() {
        let registry = AssetRegistry::empty();
        let doc = roxmltree::Document::parse("<svg/>").unwrap();
        let canvas = compose(&registry, 10, 10, root_of(&doc)).unwrap();
        assert_eq!(canvas.pixel(5, 5), Some(FALLBACK));
    }

    #[test]
    fn backdrop_gets_a_scrim() {
        let registry = AssetRegistry::with_background(solid(8, 8, [255, 255, 255, 255]));
        let doc = roxmltree::Document::parse("<svg/>").unwrap();
        let canvas = compose(&registry, 16, 16, root_of(&doc)).unwrap();
        let px = canvas.pixel(8, 8).unwrap();
        assert!(px.r < 120, "scrim should darken the backdrop: {px:?}");
        assert_eq!(px.a, 255);
    }

    fn row_gradient(w: u32, h: u32) -> RgbaImage {
        let mut bitmap = RgbaImage::new(w, h);
        for (_, y, px) in bitmap.enumerate_pixels_mut() {
            *px = image::Rgba([0, (y * 24) as u8, 120, 255]);
        }
        bitmap
    }

    #[test]
    fn tall_output_tiles_instead_of_stretching() {
        // Square backdrop with distinct rows, 5:1 output: tiles are one
        // output-width tall, so the gradient repeats every 20 rows.
        let registry = AssetRegistry::with_background(row_gradient(8, 8));
        let doc = roxmltree::Document::parse("<svg/>").unwrap();
        let canvas = compose(&registry, 20, 100, root_of(&doc)).unwrap();

        // Points one tile height apart see the same tile row.
        let a = canvas.pixel(10, 3).unwrap();
        let b = canvas.pixel(10, 23).unwrap();
        let c = canvas.pixel(10, 43).unwrap();
        assert_eq!(a, b);
        assert_eq!(b, c);
        // Rows within one tile keep the gradient; a stretch would put
        // different source rows here.
        assert_ne!(canvas.pixel(10, 2), canvas.pixel(10, 17));
        // The cropped trailing tile is still covered.
        assert_eq!(canvas.pixel(10, 99).unwrap().a, 255);
    }

    #[test]
    fn moderate_aspect_stretches_single_image() {
        let registry = AssetRegistry::with_background(solid(8, 8, [0, 0, 255, 255]));
        let doc = roxmltree::Document::parse("<svg/>").unwrap();
        let canvas = compose(&registry, 20, 24, root_of(&doc)).unwrap();
        let top = canvas.pixel(10, 1).unwrap();
        let bottom = canvas.pixel(10, 22).unwrap();
        assert_eq!(top, bottom);
    }
}
