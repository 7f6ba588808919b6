//! Painter backend core: size resolution and the document walk.
//!
//! The walker visits elements in document order, painting leaves and carrying
//! a per-subtree transform of independent x/y scale factors plus translation
//! offsets. Definition-only subtrees are never entered.

use crate::assets::AssetRegistry;
use crate::background;
use crate::canvas::Canvas;
use crate::embed;
use crate::error::InkfallError;
use crate::shapes;
use crate::text;
use crate::units;
use log::debug;

/// Native outputs wider than this are scaled down before rasterizing.
const MAX_DEFAULT_WIDTH: f32 = 2400.0;
/// Hard per-axis output bound.
const MAX_OUTPUT_EDGE: u32 = 4096;

/// Requested output extents. A missing axis is derived from the document's
/// aspect ratio.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SizeHint {
    pub width: Option<u32>,
    pub height: Option<u32>,
}

impl SizeHint {
    pub const NATIVE: SizeHint = SizeHint {
        width: None,
        height: None,
    };

    pub fn width(width: u32) -> Self {
        Self {
            width: Some(width),
            height: None,
        }
    }

    pub fn exact(width: u32, height: u32) -> Self {
        Self {
            width: Some(width),
            height: Some(height),
        }
    }
}

/// Resolves the output pixel size from the document size and the caller's
/// hint, then clamps both axes into `1..=4096`.
pub(crate) fn resolve_output_size(doc_w: f32, doc_h: f32, hint: SizeHint) -> (u32, u32) {
    let aspect = doc_h / doc_w;
    let (w, h) = match (hint.width, hint.height) {
        (Some(w), Some(h)) => (w as f32, h as f32),
        (Some(w), None) => (w as f32, w as f32 * aspect),
        (None, Some(h)) => (h as f32 / aspect, h as f32),
        (None, None) => {
            if doc_w > MAX_DEFAULT_WIDTH {
                (MAX_DEFAULT_WIDTH, MAX_DEFAULT_WIDTH * aspect)
            } else {
                (doc_w, doc_h)
            }
        }
    };
    (
        (w.round() as u32).clamp(1, MAX_OUTPUT_EDGE),
        (h.round() as u32).clamp(1, MAX_OUTPUT_EDGE),
    )
}

/// Per-subtree paint state. Scale factors are fixed for the whole document;
/// offsets accumulate through `translate` transforms on groups.
pub(crate) struct RenderContext {
    pub scale_x: f32,
    pub scale_y: f32,
    pub offset_x: f32,
    pub offset_y: f32,
    pub doc_width: f32,
    pub doc_height: f32,
}

impl RenderContext {
    pub(crate) fn root(scale_x: f32, scale_y: f32, doc_width: f32, doc_height: f32) -> Self {
        Self {
            scale_x,
            scale_y,
            offset_x: 0.0,
            offset_y: 0.0,
            doc_width,
            doc_height,
        }
    }

    fn with_offset(&self, dx: f32, dy: f32) -> Self {
        Self {
            scale_x: self.scale_x,
            scale_y: self.scale_y,
            offset_x: self.offset_x + dx * self.scale_x,
            offset_y: self.offset_y + dy * self.scale_y,
            doc_width: self.doc_width,
            doc_height: self.doc_height,
        }
    }
}

/// Extracts the `translate(dx[, dy])` portion of a transform attribute. Other
/// transform functions are ignored.
pub(crate) fn parse_translate(transform: &str) -> Option<(f32, f32)> {
    let start = transform.find("translate(")? + "translate(".len();
    let body = transform[start..].split(')').next()?;
    let mut numbers = body
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|part| !part.is_empty())
        .map(|part| part.parse::<f32>().unwrap_or(0.0));
    let dx = numbers.next()?;
    let dy = numbers.next().unwrap_or(0.0);
    Some((dx, dy))
}

/// Subtrees that only define resources and must not be painted.
const SKIPPED_TAGS: &[&str] = &["defs", "style", "linearGradient", "radialGradient", "filter", "stop"];

fn render_node(
    node: roxmltree::Node<'_, '_>,
    ctx: &RenderContext,
    canvas: &mut Canvas,
    registry: &AssetRegistry,
) {
    for child in node.children().filter(|c| c.is_element()) {
        let tag = child.tag_name().name();
        if SKIPPED_TAGS.contains(&tag) {
            continue;
        }

        match tag {
            "g" => {
                let (dx, dy) = child
                    .attribute("transform")
                    .and_then(parse_translate)
                    .unwrap_or((0.0, 0.0));
                let nested = ctx.with_offset(dx, dy);
                render_node(child, &nested, canvas, registry);
                continue;
            }
            "rect" => shapes::draw_rect(child, ctx, canvas),
            "circle" => shapes::draw_circle(child, ctx, canvas),
            "ellipse" => shapes::draw_ellipse(child, ctx, canvas),
            "line" => shapes::draw_line(child, ctx, canvas),
            "polyline" => shapes::draw_polyline(child, ctx, canvas),
            "polygon" => shapes::draw_polygon(child, ctx, canvas),
            "path" => shapes::draw_path(child, ctx, canvas),
            "text" => text::draw_text(child, ctx, canvas, registry),
            "image" => embed::draw_image(child, ctx, canvas, registry),
            _ => {}
        }
        render_node(child, ctx, canvas, registry);
    }
}

/// Rasterizes SVG markup onto a freshly composed backdrop canvas.
pub(crate) fn render_to_canvas(
    svg: &str,
    hint: SizeHint,
    registry: &AssetRegistry,
) -> Result<Canvas, InkfallError> {
    let doc = roxmltree::Document::parse(svg)
        .map_err(|e| InkfallError::Parse(format!("invalid svg markup: {e}")))?;
    let root = doc.root_element();

    let (doc_w, doc_h) = units::document_size(root);
    let (out_w, out_h) = resolve_output_size(doc_w, doc_h, hint);
    debug!("document {doc_w}x{doc_h} -> output {out_w}x{out_h}");

    let mut canvas = background::compose(registry, out_w, out_h, root)?;
    let ctx = RenderContext::root(out_w as f32 / doc_w, out_h as f32 / doc_h, doc_w, doc_h);
    render_node(root, &ctx, &mut canvas, registry);
    Ok(canvas)
}
