//! Geometry primitive renderers.
//!
//! Each renderer reads its shape attributes plus `fill`, `stroke`, and
//! `stroke-width`, resolves them through the unit and color resolvers, and
//! paints into the canvas. Misses (absent paint, degenerate geometry) skip
//! silently; nothing here can fail a conversion.

use crate::canvas::Canvas;
use crate::color::{Rgba, parse_color};
use crate::render::RenderContext;
use crate::units;
use log::debug;

/// Fill alpha above which a canvas-covering rect counts as a full-bleed
/// background (200/255 ~ 0.78).
const FULL_BLEED_ALPHA: u8 = 200;

/// Line segments per flattened curve command.
const CURVE_SEGMENTS: u32 = 8;

fn fill_of(node: roxmltree::Node<'_, '_>) -> Option<Rgba> {
    parse_color(node.attribute("fill").unwrap_or("none"), None)
}

fn stroke_of(node: roxmltree::Node<'_, '_>) -> Option<Rgba> {
    parse_color(node.attribute("stroke").unwrap_or("none"), None)
}

fn stroke_width_of(node: roxmltree::Node<'_, '_>, ctx: &RenderContext) -> f32 {
    let raw = node
        .attribute("stroke-width")
        .and_then(|v| v.trim().parse::<f32>().ok())
        .unwrap_or(1.0);
    raw * ctx.scale_x.min(ctx.scale_y)
}

fn scalar(node: roxmltree::Node<'_, '_>, name: &str) -> f32 {
    node.attribute(name)
        .and_then(|v| v.trim().parse::<f32>().ok())
        .unwrap_or(0.0)
}

pub(crate) fn draw_rect(node: roxmltree::Node<'_, '_>, ctx: &RenderContext, canvas: &mut Canvas) {
    let x = units::parse_length(node.attribute("x").unwrap_or("0")) * ctx.scale_x + ctx.offset_x;
    let y = units::parse_length(node.attribute("y").unwrap_or("0")) * ctx.scale_y + ctx.offset_y;
    let width_raw = node.attribute("width").unwrap_or("0");
    let height_raw = node.attribute("height").unwrap_or("0");
    let width = units::resolve_extent(width_raw, ctx.doc_width, ctx.scale_x);
    let height = units::resolve_extent(height_raw, ctx.doc_height, ctx.scale_y);

    // A nearly-opaque rect covering the whole document is treated as the
    // document's own background fill and skipped, so the compositor's
    // backdrop stays visible. Tolerance is 1px per axis.
    let full_bleed = (width_raw == "100%" || width >= ctx.doc_width * ctx.scale_x - 1.0)
        && (height_raw == "100%" || height >= ctx.doc_height * ctx.scale_y - 1.0);

    let fill = fill_of(node);
    let stroke = stroke_of(node);
    let stroke_width = stroke_width_of(node, ctx);
    let rx = scalar(node, "rx") * ctx.scale_x;
    let ry = scalar(node, "ry") * ctx.scale_y;

    if full_bleed && fill.is_some_and(|c| c.a > FULL_BLEED_ALPHA) {
        debug!("suppressing full-bleed background rect");
        return;
    }

    if let Some(fill) = fill {
        if rx > 0.0 || ry > 0.0 {
            canvas.fill_rounded_rect(x, y, width, height, rx.max(ry), fill);
        } else {
            canvas.fill_rect(x, y, width, height, fill);
        }
    }
    if let Some(stroke) = stroke {
        canvas.stroke_rect(x, y, width, height, stroke, stroke_width);
    }
}

pub(crate) fn draw_circle(node: roxmltree::Node<'_, '_>, ctx: &RenderContext, canvas: &mut Canvas) {
    let cx = scalar(node, "cx") * ctx.scale_x + ctx.offset_x;
    let cy = scalar(node, "cy") * ctx.scale_y + ctx.offset_y;
    let r = scalar(node, "r") * ctx.scale_x.min(ctx.scale_y);

    if let Some(fill) = fill_of(node) {
        canvas.fill_ellipse(cx, cy, r, r, fill);
    }
    if let Some(stroke) = stroke_of(node) {
        canvas.stroke_ellipse(cx, cy, r, r, stroke, stroke_width_of(node, ctx));
    }
}

pub(crate) fn draw_ellipse(
    node: roxmltree::Node<'_, '_>,
    ctx: &RenderContext,
    canvas: &mut Canvas,
) {
    let cx = scalar(node, "cx") * ctx.scale_x + ctx.offset_x;
    let cy = scalar(node, "cy") * ctx.scale_y + ctx.offset_y;
    let rx = scalar(node, "rx") * ctx.scale_x;
    let ry = scalar(node, "ry") * ctx.scale_y;

    if let Some(fill) = fill_of(node) {
        canvas.fill_ellipse(cx, cy, rx, ry, fill);
    }
    if let Some(stroke) = stroke_of(node) {
        canvas.stroke_ellipse(cx, cy, rx, ry, stroke, stroke_width_of(node, ctx));
    }
}

pub(crate) fn draw_line(node: roxmltree::Node<'_, '_>, ctx: &RenderContext, canvas: &mut Canvas) {
    let x1 = scalar(node, "x1") * ctx.scale_x + ctx.offset_x;
    let y1 = scalar(node, "y1") * ctx.scale_y + ctx.offset_y;
    let x2 = scalar(node, "x2") * ctx.scale_x + ctx.offset_x;
    let y2 = scalar(node, "y2") * ctx.scale_y + ctx.offset_y;

    let stroke = parse_color(node.attribute("stroke").unwrap_or("black"), Some(Rgba::BLACK))
        .unwrap_or(Rgba::BLACK);
    canvas.stroke_line(x1, y1, x2, y2, stroke, stroke_width_of(node, ctx));
}

pub(crate) fn draw_polyline(
    node: roxmltree::Node<'_, '_>,
    ctx: &RenderContext,
    canvas: &mut Canvas,
) {
    let points = parse_point_list(node.attribute("points").unwrap_or(""), ctx);
    if points.len() < 2 {
        return;
    }
    let stroke = parse_color(node.attribute("stroke").unwrap_or("black"), Some(Rgba::BLACK))
        .unwrap_or(Rgba::BLACK);
    canvas.stroke_polyline(&points, stroke, stroke_width_of(node, ctx));
}

pub(crate) fn draw_polygon(
    node: roxmltree::Node<'_, '_>,
    ctx: &RenderContext,
    canvas: &mut Canvas,
) {
    let points = parse_point_list(node.attribute("points").unwrap_or(""), ctx);
    if points.len() < 3 {
        return;
    }
    if let Some(fill) = fill_of(node) {
        canvas.fill_polygon(&points, fill);
    }
    if let Some(stroke) = stroke_of(node) {
        canvas.stroke_polygon(&points, stroke, stroke_width_of(node, ctx));
    }
}

/// Tokenizes a comma-or-space separated coordinate list into device-space
/// points. Dangling or unparseable pairs are dropped.
pub(crate) fn parse_point_list(raw: &str, ctx: &RenderContext) -> Vec<(f32, f32)> {
    let tokens: Vec<&str> = raw
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|t| !t.is_empty())
        .collect();

    let mut points = Vec::with_capacity(tokens.len() / 2);
    for pair in tokens.chunks_exact(2) {
        let (Ok(x), Ok(y)) = (pair[0].parse::<f32>(), pair[1].parse::<f32>()) else {
            continue;
        };
        points.push((
            x * ctx.scale_x + ctx.offset_x,
            y * ctx.scale_y + ctx.offset_y,
        ));
    }
    points
}

pub(crate) fn draw_path(node: roxmltree::Node<'_, '_>, ctx: &RenderContext, canvas: &mut Canvas) {
    let data = node.attribute("d").unwrap_or("");
    if data.is_empty() {
        return;
    }

    let fill = fill_of(node);
    let stroke = stroke_of(node);
    let stroke_width = stroke_width_of(node, ctx);

    let mut points: Vec<(f32, f32)> = Vec::new();
    let mut cx = 0.0f32;
    let mut cy = 0.0f32;

    let flush = |points: &mut Vec<(f32, f32)>, canvas: &mut Canvas| {
        if points.len() > 2 {
            if let Some(fill) = fill {
                canvas.fill_polygon(points, fill);
            }
            if let Some(stroke) = stroke {
                canvas.stroke_polygon(points, stroke, stroke_width);
            }
        }
        points.clear();
    };

    for (cmd, args) in tokenize_path(data) {
        match cmd {
            'M' if args.len() >= 2 => {
                cx = args[0] * ctx.scale_x + ctx.offset_x;
                cy = args[1] * ctx.scale_y + ctx.offset_y;
                if points.is_empty() {
                    points.push((cx, cy));
                }
            }
            'm' if args.len() >= 2 => {
                cx += args[0] * ctx.scale_x;
                cy += args[1] * ctx.scale_y;
                if points.is_empty() {
                    points.push((cx, cy));
                }
            }
            'L' if args.len() >= 2 => {
                cx = args[0] * ctx.scale_x + ctx.offset_x;
                cy = args[1] * ctx.scale_y + ctx.offset_y;
                points.push((cx, cy));
            }
            'l' if args.len() >= 2 => {
                cx += args[0] * ctx.scale_x;
                cy += args[1] * ctx.scale_y;
                points.push((cx, cy));
            }
            'H' if !args.is_empty() => {
                cx = args[0] * ctx.scale_x + ctx.offset_x;
                points.push((cx, cy));
            }
            'h' if !args.is_empty() => {
                cx += args[0] * ctx.scale_x;
                points.push((cx, cy));
            }
            'V' if !args.is_empty() => {
                cy = args[0] * ctx.scale_y + ctx.offset_y;
                points.push((cx, cy));
            }
            'v' if !args.is_empty() => {
                cy += args[0] * ctx.scale_y;
                points.push((cx, cy));
            }
            'C' | 'c' if args.len() >= 6 => {
                let abs = cmd == 'C';
                let map = |i: usize| map_pair(&args, i, abs, cx, cy, ctx);
                let (x1, y1) = map(0);
                let (x2, y2) = map(2);
                let (x3, y3) = map(4);
                flatten_cubic((cx, cy), (x1, y1), (x2, y2), (x3, y3), &mut points);
                cx = x3;
                cy = y3;
            }
            'Q' | 'q' if args.len() >= 4 => {
                let abs = cmd == 'Q';
                let map = |i: usize| map_pair(&args, i, abs, cx, cy, ctx);
                let (x1, y1) = map(0);
                let (x2, y2) = map(2);
                flatten_quad((cx, cy), (x1, y1), (x2, y2), &mut points);
                cx = x2;
                cy = y2;
            }
            // Smooth curves and arcs collapse to their endpoints so the
            // current point stays anchored for subsequent commands.
            'S' | 's' if args.len() >= 4 => {
                let (x, y) = map_pair(&args, 2, cmd == 'S', cx, cy, ctx);
                points.push((x, y));
                cx = x;
                cy = y;
            }
            'T' | 't' if args.len() >= 2 => {
                let (x, y) = map_pair(&args, 0, cmd == 'T', cx, cy, ctx);
                points.push((x, y));
                cx = x;
                cy = y;
            }
            'A' | 'a' if args.len() >= 7 => {
                let (x, y) = map_pair(&args, 5, cmd == 'A', cx, cy, ctx);
                points.push((x, y));
                cx = x;
                cy = y;
            }
            'Z' | 'z' => flush(&mut points, canvas),
            _ => {}
        }
    }

    // Trailing open subpath: fill if it encloses area, stroke as a polyline.
    if points.len() > 1 {
        if points.len() > 2 {
            if let Some(fill) = fill {
                canvas.fill_polygon(&points, fill);
            }
        }
        if let Some(stroke) = stroke {
            canvas.stroke_polyline(&points, stroke, stroke_width);
        }
    }
}

fn map_pair(
    args: &[f32],
    index: usize,
    absolute: bool,
    cx: f32,
    cy: f32,
    ctx: &RenderContext,
) -> (f32, f32) {
    if absolute {
        (
            args[index] * ctx.scale_x + ctx.offset_x,
            args[index + 1] * ctx.scale_y + ctx.offset_y,
        )
    } else {
        (cx + args[index] * ctx.scale_x, cy + args[index + 1] * ctx.scale_y)
    }
}

fn flatten_cubic(
    p0: (f32, f32),
    p1: (f32, f32),
    p2: (f32, f32),
    p3: (f32, f32),
    out: &mut Vec<(f32, f32)>,
) {
    for step in 1..=CURVE_SEGMENTS {
        let t = step as f32 / CURVE_SEGMENTS as f32;
        let u = 1.0 - t;
        let x = u * u * u * p0.0
            + 3.0 * u * u * t * p1.0
            + 3.0 * u * t * t * p2.0
            + t * t * t * p3.0;
        let y = u * u * u * p0.1
            + 3.0 * u * u * t * p1.1
            + 3.0 * u * t * t * p2.1
            + t * t * t * p3.1;
        out.push((x, y));
    }
}

fn flatten_quad(p0: (f32, f32), p1: (f32, f32), p2: (f32, f32), out: &mut Vec<(f32, f32)>) {
    for step in 1..=CURVE_SEGMENTS {
        let t = step as f32 / CURVE_SEGMENTS as f32;
        let u = 1.0 - t;
        let x = u * u * p0.0 + 2.0 * u * t * p1.0 + t * t * p2.0;
        let y = u * u * p0.1 + 2.0 * u * t * p1.1 + t * t * p2.1;
        out.push((x, y));
    }
}

/// Splits path data into (command, numeric arguments) pairs. Unknown bytes
/// between commands are treated as argument separators.
pub(crate) fn tokenize_path(data: &str) -> Vec<(char, Vec<f32>)> {
    const COMMANDS: &str = "MmLlHhVvCcSsQqTtAaZz";
    let mut out = Vec::new();
    let mut current: Option<char> = None;
    let mut args = String::new();

    for ch in data.chars() {
        if COMMANDS.contains(ch) {
            if let Some(cmd) = current {
                out.push((cmd, parse_numbers(&args)));
            }
            current = Some(ch);
            args.clear();
        } else {
            args.push(ch);
        }
    }
    if let Some(cmd) = current {
        out.push((cmd, parse_numbers(&args)));
    }
    out
}

fn parse_numbers(raw: &str) -> Vec<f32> {
    let mut numbers = Vec::new();
    let mut token = String::new();

    let flush = |token: &mut String, numbers: &mut Vec<f32>| {
        if !token.is_empty() {
            if let Ok(value) = token.parse::<f32>() {
                numbers.push(value);
            }
            token.clear();
        }
    };

    for ch in raw.chars() {
        match ch {
            '0'..='9' | '.' => token.push(ch),
            '+' | '-' => {
                flush(&mut token, &mut numbers);
                token.push(ch);
            }
            _ => flush(&mut token, &mut numbers),
        }
    }
    flush(&mut token, &mut numbers);
    numbers
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> RenderContext {
        RenderContext::root(1.0, 1.0, 100.0, 100.0)
    }

    #[test]
    fn tokenizes_commands_with_mixed_separators() {
        let tokens = tokenize_path("M10 20L30,40 Z");
        assert_eq!(tokens.len(), 3);
        assert_eq!(tokens[0], ('M', vec![10.0, 20.0]));
        assert_eq!(tokens[1], ('L', vec![30.0, 40.0]));
        assert_eq!(tokens[2], ('Z', vec![]));
    }

    #[test]
    fn negative_numbers_split_without_separator() {
        let tokens = tokenize_path("M10-20l-5-5");
        assert_eq!(tokens[0], ('M', vec![10.0, -20.0]));
        assert_eq!(tokens[1], ('l', vec![-5.0, -5.0]));
    }

    #[test]
    fn point_list_tolerates_commas_and_spaces() {
        let points = parse_point_list("0,0 10 0, 10,10", &ctx());
        assert_eq!(points, vec![(0.0, 0.0), (10.0, 0.0), (10.0, 10.0)]);
    }

    #[test]
    fn point_list_drops_dangling_coordinate() {
        let points = parse_point_list("0,0 10", &ctx());
        assert_eq!(points, vec![(0.0, 0.0)]);
    }

    #[test]
    fn closed_triangle_path_fills_interior() {
        let doc = roxmltree::Document::parse(
            r##"<path d="M 10 80 L 50 10 L 90 80 Z" fill="#ff0000"/>"##,
        )
        .unwrap();
        let mut canvas = crate::canvas::Canvas::new(100, 100, Rgba::BLACK).unwrap();
        draw_path(doc.root_element(), &ctx(), &mut canvas);
        assert_eq!(canvas.pixel(50, 60), Some(Rgba::new(255, 0, 0, 255)));
        assert_eq!(canvas.pixel(5, 5), Some(Rgba::BLACK));
    }

    #[test]
    fn full_bleed_rect_is_suppressed() {
        let doc = roxmltree::Document::parse(
            r##"<rect width="100%" height="100%" fill="#141824"/>"##,
        )
        .unwrap();
        let mut canvas = crate::canvas::Canvas::new(100, 100, Rgba::WHITE).unwrap();
        draw_rect(doc.root_element(), &ctx(), &mut canvas);
        assert_eq!(canvas.pixel(50, 50), Some(Rgba::WHITE));
    }

    #[test]
    fn translucent_full_bleed_rect_still_paints() {
        let doc = roxmltree::Document::parse(
            r##"<rect width="100%" height="100%" fill="rgba(0,0,0,0.5)"/>"##,
        )
        .unwrap();
        let mut canvas = crate::canvas::Canvas::new(100, 100, Rgba::WHITE).unwrap();
        draw_rect(doc.root_element(), &ctx(), &mut canvas);
        let px = canvas.pixel(50, 50).unwrap();
        assert!(px.r < 200, "expected translucent fill to darken: {px:?}");
    }

    #[test]
    fn near_full_coverage_triggers_suppression_within_tolerance() {
        let doc = roxmltree::Document::parse(
            r##"<rect x="0" y="0" width="99.5" height="99.5" fill="#000000"/>"##,
        )
        .unwrap();
        let mut canvas = crate::canvas::Canvas::new(100, 100, Rgba::WHITE).unwrap();
        draw_rect(doc.root_element(), &ctx(), &mut canvas);
        assert_eq!(canvas.pixel(50, 50), Some(Rgba::WHITE));
    }

    #[test]
    fn cubic_curves_are_flattened_not_dropped() {
        let doc = roxmltree::Document::parse(
            r##"<path d="M 10 50 C 10 10 90 10 90 50 Z" fill="#00ff00"/>"##,
        )
        .unwrap();
        let mut canvas = crate::canvas::Canvas::new(100, 100, Rgba::BLACK).unwrap();
        draw_path(doc.root_element(), &ctx(), &mut canvas);
        // A point inside the dome enclosed by the flattened curve.
        assert_eq!(canvas.pixel(50, 40), Some(Rgba::new(0, 255, 0, 255)));
    }
}
