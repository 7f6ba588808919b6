//! Embedded `<image>` handling.
//!
//! Image references are never fetched. The reference is reduced to a lookup
//! key (last path segment, `.png` suffix dropped, percent-decoded) and
//! resolved against the local artwork index; a miss skips the element.

use crate::assets::AssetRegistry;
use crate::canvas::Canvas;
use crate::render::RenderContext;
use crate::units;
use image::RgbaImage;
use image::imageops::{self, FilterType};
use log::debug;
use percent_encoding::percent_decode_str;

const XLINK_NS: &str = "http://www.w3.org/1999/xlink";

/// Derives the artwork lookup key from an image reference.
pub(crate) fn artwork_key(reference: &str) -> Option<String> {
    let segment = reference.rsplit('/').next()?;
    let stem = segment.strip_suffix(".png").unwrap_or(segment);
    if stem.is_empty() {
        return None;
    }
    Some(percent_decode_str(stem).decode_utf8_lossy().into_owned())
}

pub(crate) fn draw_image(
    node: roxmltree::Node<'_, '_>,
    ctx: &RenderContext,
    canvas: &mut Canvas,
    registry: &AssetRegistry,
) {
    let Some(reference) = node
        .attribute("href")
        .or_else(|| node.attribute((XLINK_NS, "href")))
    else {
        return;
    };
    let Some(key) = artwork_key(reference) else {
        return;
    };
    let Some(artwork) = registry.artwork(&key) else {
        debug!("no local artwork for {key:?}; skipping image");
        return;
    };

    let x = units::parse_length(node.attribute("x").unwrap_or("0")) * ctx.scale_x + ctx.offset_x;
    let y = units::parse_length(node.attribute("y").unwrap_or("0")) * ctx.scale_y + ctx.offset_y;
    let width =
        units::resolve_extent(node.attribute("width").unwrap_or("0"), ctx.doc_width, ctx.scale_x);
    let height = units::resolve_extent(
        node.attribute("height").unwrap_or("0"),
        ctx.doc_height,
        ctx.scale_y,
    );

    let target_w = width.round().max(0.0) as u32;
    let target_h = height.round().max(0.0) as u32;
    if target_w == 0 || target_h == 0 {
        return;
    }

    let cover = node
        .attribute("preserveAspectRatio")
        .is_some_and(|v| v.contains("slice"));
    let fitted = if cover {
        cover_crop(&artwork, target_w, target_h)
    } else {
        imageops::resize(&artwork, target_w, target_h, FilterType::Lanczos3)
    };

    canvas.composite_bitmap(&fitted, x.round() as i32, y.round() as i32);
}

/// Scales so the bitmap covers the target box, then center-crops the excess.
fn cover_crop(source: &RgbaImage, target_w: u32, target_h: u32) -> RgbaImage {
    let (src_w, src_h) = source.dimensions();
    if src_w == 0 || src_h == 0 {
        return RgbaImage::new(target_w, target_h);
    }

    let scale = (target_w as f32 / src_w as f32).max(target_h as f32 / src_h as f32);
    let scaled_w = ((src_w as f32 * scale).round() as u32).max(target_w);
    let scaled_h = ((src_h as f32 * scale).round() as u32).max(target_h);

    let scaled = imageops::resize(source, scaled_w, scaled_h, FilterType::Lanczos3);
    let crop_x = (scaled_w - target_w) / 2;
    let crop_y = (scaled_h - target_h) / 2;
    imageops::crop_imm(&scaled, crop_x, crop_y, target_w, target_h).to_image()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Rgba;

    #[test]
    fn key_takes_last_segment_and_drops_png_suffix() {
        assert_eq!(
            artwork_key("https://cdn.example.com/art/SpeedUp.png"),
            Some("SpeedUp".to_string())
        );
        assert_eq!(artwork_key("SpeedUp.png"), Some("SpeedUp".to_string()));
        assert_eq!(artwork_key("cover.jpg"), Some("cover.jpg".to_string()));
        assert_eq!(artwork_key("a/b/"), None);
    }

    #[test]
    fn key_is_percent_decoded() {
        assert_eq!(
            artwork_key("art/Speed%20Up%21.png"),
            Some("Speed Up!".to_string())
        );
    }

    #[test]
    fn cover_crop_fills_target_exactly() {
        // 4:1 source into a square target: sides get cropped away.
        let mut source = RgbaImage::new(40, 10);
        for px in source.pixels_mut() {
            *px = image::Rgba([0, 255, 0, 255]);
        }
        let out = cover_crop(&source, 10, 10);
        assert_eq!(out.dimensions(), (10, 10));
        assert_eq!(out.get_pixel(5, 5).0, [0, 255, 0, 255]);
    }

    #[test]
    fn missing_artwork_changes_nothing() {
        let registry = AssetRegistry::empty();
        let doc = roxmltree::Document::parse(
            r#"<image xmlns:xlink="http://www.w3.org/1999/xlink"
                     xlink:href="nope.png" x="0" y="0" width="10" height="10"/>"#,
        )
        .unwrap();
        let mut canvas = Canvas::new(20, 20, Rgba::BLACK).unwrap();
        let ctx = RenderContext::root(1.0, 1.0, 20.0, 20.0);
        draw_image(doc.root_element(), &ctx, &mut canvas, &registry);
        for y in 0..20 {
            for x in 0..20 {
                assert_eq!(canvas.pixel(x, y), Some(Rgba::BLACK));
            }
        }
    }

    #[test]
    fn exact_resize_composites_at_position() {
        let dir = std::env::temp_dir().join(format!("inkfall_embed_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("tile.png");
        let mut art = RgbaImage::new(4, 4);
        for px in art.pixels_mut() {
            *px = image::Rgba([255, 0, 0, 255]);
        }
        art.save(&path).unwrap();

        let registry = AssetRegistry::new(crate::assets::AssetConfig {
            artwork_dir: Some(dir.clone()),
            ..Default::default()
        });
        let doc = roxmltree::Document::parse(
            r#"<image href="tile.png" x="5" y="5" width="8" height="8"/>"#,
        )
        .unwrap();
        let mut canvas = Canvas::new(20, 20, Rgba::BLACK).unwrap();
        let ctx = RenderContext::root(1.0, 1.0, 20.0, 20.0);
        draw_image(doc.root_element(), &ctx, &mut canvas, &registry);

        assert_eq!(canvas.pixel(9, 9), Some(Rgba::new(255, 0, 0, 255)));
        assert_eq!(canvas.pixel(2, 2), Some(Rgba::BLACK));

        std::fs::remove_file(&path).ok();
        std::fs::remove_dir(&dir).ok();
    }
}
