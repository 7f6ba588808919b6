//! Text element rendering.
//!
//! Glyphs are outlined straight from the resolved face into a tiny-skia path
//! and filled twice, a dark offset shadow first and then the main color. The
//! anchor point is the element's top-left corner, so the baseline sits one
//! ascent below the `y` attribute.

use crate::assets::{AssetRegistry, SizedFont};
use crate::canvas::Canvas;
use crate::color::{Rgba, parse_color};
use crate::render::RenderContext;
use crate::units;
use log::warn;
use tiny_skia::PathBuilder;

const DEFAULT_FONT_SIZE: f32 = 16.0;
const MIN_FONT_SIZE: u32 = 8;
const MAX_FONT_SIZE: u32 = 200;
const SHADOW: Rgba = Rgba::new(0, 0, 0, 128);

pub(crate) fn draw_text(
    node: roxmltree::Node<'_, '_>,
    ctx: &RenderContext,
    canvas: &mut Canvas,
    registry: &AssetRegistry,
) {
    let content = collect_text(node);
    if content.trim().is_empty() {
        return;
    }

    let size = resolve_font_size(node.attribute("font-size"), ctx.scale_x.min(ctx.scale_y));
    let Some(font) = registry.font(size) else {
        warn!("no usable font; skipping text run");
        return;
    };

    let fill = parse_color(node.attribute("fill").unwrap_or(""), Some(Rgba::WHITE))
        .unwrap_or(Rgba::WHITE);
    let x = node
        .attribute("x")
        .map(units::parse_length)
        .unwrap_or(0.0)
        * ctx.scale_x
        + ctx.offset_x;
    let y = node
        .attribute("y")
        .map(units::parse_length)
        .unwrap_or(0.0)
        * ctx.scale_y
        + ctx.offset_y;

    draw_run(canvas, &font, &content, x + 1.0, y + 1.0, SHADOW);
    draw_run(canvas, &font, &content, x, y, fill);
}

/// Concatenates the element's own text with the text of its `tspan` children,
/// in document order.
pub(crate) fn collect_text(node: roxmltree::Node<'_, '_>) -> String {
    let mut out = String::new();
    for child in node.children() {
        if child.is_text() {
            out.push_str(child.text().unwrap_or(""));
        } else if child.is_element() && child.tag_name().name() == "tspan" {
            if let Some(text) = child.text() {
                out.push_str(text);
            }
        }
    }
    out
}

/// Resolves the `font-size` attribute into a device pixel size, scaled by the
/// smaller axis factor and clamped to a legible range.
pub(crate) fn resolve_font_size(raw: Option<&str>, scale: f32) -> u32 {
    let mut size = raw.map(units::parse_length).unwrap_or(DEFAULT_FONT_SIZE);
    if size <= 0.0 {
        size = DEFAULT_FONT_SIZE;
    }
    ((size * scale).round() as u32).clamp(MIN_FONT_SIZE, MAX_FONT_SIZE)
}

fn draw_run(canvas: &mut Canvas, font: &SizedFont, text: &str, x: f32, y: f32, color: Rgba) {
    let Ok(face) = ttf_parser::Face::parse(&font.data, 0) else {
        return;
    };

    let baseline = y + font.ascent;
    let mut pen = x;
    let mut builder = PathBuilder::new();

    for ch in text.chars() {
        match face.glyph_index(ch) {
            Some(glyph) => {
                let mut outliner = GlyphOutliner {
                    builder: &mut builder,
                    origin_x: pen,
                    origin_y: baseline,
                    scale: font.scale,
                };
                face.outline_glyph(glyph, &mut outliner);
                let advance = face.glyph_hor_advance(glyph).unwrap_or(0) as f32 * font.scale;
                pen += if advance > 0.0 {
                    advance
                } else {
                    font.size as f32 / 2.0
                };
            }
            // Half an em keeps columns roughly aligned for missing glyphs.
            None => pen += font.size as f32 / 2.0,
        }
    }

    if let Some(path) = builder.finish() {
        canvas.fill_path(&path, color);
    }
}

/// Maps font-unit outlines into device space. Font outlines grow upward, the
/// canvas grows downward, so the y axis flips around the baseline.
struct GlyphOutliner<'a> {
    builder: &'a mut PathBuilder,
    origin_x: f32,
    origin_y: f32,
    scale: f32,
}

impl GlyphOutliner<'_> {
    fn point(&self, x: f32, y: f32) -> (f32, f32) {
        (
            self.origin_x + x * self.scale,
            self.origin_y - y * self.scale,
        )
    }
}

impl ttf_parser::OutlineBuilder for GlyphOutliner<'_> {
    fn move_to(&mut self, x: f32, y: f32) {
        let (x, y) = self.point(x, y);
        self.builder.move_to(x, y);
    }

    fn line_to(&mut self, x: f32, y: f32) {
        let (x, y) = self.point(x, y);
        self.builder.line_to(x, y);
    }

    fn quad_to(&mut self, x1: f32, y1: f32, x: f32, y: f32) {
        let (x1, y1) = self.point(x1, y1);
        let (x, y) = self.point(x, y);
        self.builder.quad_to(x1, y1, x, y);
    }

    fn curve_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, x: f32, y: f32) {
        let (x1, y1) = self.point(x1, y1);
        let (x2, y2) = self.point(x2, y2);
        let (x, y) = self.point(x, y);
        self.builder.cubic_to(x1, y1, x2, y2, x, y);
    }

    fn close(&mut self) {
        self.builder.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collects_direct_text_and_tspans() {
        let doc = roxmltree::Document::parse(
            r#"<text>Score: <tspan>1,000,000</tspan><tspan> pts</tspan></text>"#,
        )
        .unwrap();
        assert_eq!(collect_text(doc.root_element()), "Score: 1,000,000 pts");
    }

    #[test]
    fn font_size_scales_and_clamps() {
        assert_eq!(resolve_font_size(Some("16px"), 1.0), 16);
        assert_eq!(resolve_font_size(Some("16"), 2.0), 32);
        assert_eq!(resolve_font_size(None, 1.0), 16);
        assert_eq!(resolve_font_size(Some("2"), 1.0), 8);
        assert_eq!(resolve_font_size(Some("900"), 1.0), 200);
        assert_eq!(resolve_font_size(Some("garbage"), 1.0), 16);
    }

    #[test]
    fn text_run_marks_pixels_when_a_font_exists() {
        let registry = AssetRegistry::empty();
        let Some(_) = registry.font(32) else {
            // Host has no usable font; nothing to assert.
            return;
        };

        let doc = roxmltree::Document::parse(r##"<text x="10" y="10" fill="#ff0000">W</text>"##)
            .unwrap();
        let mut canvas = Canvas::new(100, 100, Rgba::BLACK).unwrap();
        let ctx = RenderContext::root(2.0, 2.0, 100.0, 100.0);
        draw_text(doc.root_element(), &ctx, &mut canvas, &registry);

        let mut touched = 0usize;
        for y in 0..100 {
            for x in 0..100 {
                if canvas.pixel(x, y) != Some(Rgba::BLACK) {
                    touched += 1;
                }
            }
        }
        assert!(touched > 0, "glyph should have painted pixels");
    }

    #[test]
    fn empty_text_is_a_no_op() {
        let registry = AssetRegistry::empty();
        let doc = roxmltree::Document::parse(r#"<text x="0" y="0">   </text>"#).unwrap();
        let mut canvas = Canvas::new(10, 10, Rgba::BLACK).unwrap();
        let ctx = RenderContext::root(1.0, 1.0, 10.0, 10.0);
        draw_text(doc.root_element(), &ctx, &mut canvas, &registry);
        assert_eq!(canvas.pixel(5, 5), Some(Rgba::BLACK));
    }
}
