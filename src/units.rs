//! Length and document-size resolution.
//!
//! Lengths are handled on a best-effort basis: unit suffixes are stripped and
//! the numeric part is taken as raw pixels, percentages resolve against a
//! caller-supplied reference extent, and anything unparseable becomes zero so
//! that one malformed attribute never aborts a conversion.

const UNIT_SUFFIXES: &[&str] = &["px", "pt", "pc", "cm", "mm", "in", "em", "ex"];

pub(crate) const FALLBACK_WIDTH: f32 = 800.0;
pub(crate) const FALLBACK_HEIGHT: f32 = 600.0;

/// Parses a plain length value. Percentages yield 0 here; they need a
/// reference extent and go through [`resolve_extent`] instead.
pub(crate) fn parse_length(raw: &str) -> f32 {
    let value = raw.trim().to_ascii_lowercase();
    if value.is_empty() || value.ends_with('%') {
        return 0.0;
    }

    let mut numeric = value.as_str();
    for unit in UNIT_SUFFIXES {
        if let Some(stripped) = numeric.strip_suffix(unit) {
            numeric = stripped;
            break;
        }
    }

    numeric.trim().parse::<f32>().unwrap_or(0.0)
}

/// Resolves an extent attribute (width/height) into device pixels, handling
/// percentages against `reference` and scaling by the axis factor.
pub(crate) fn resolve_extent(raw: &str, reference: f32, scale: f32) -> f32 {
    let value = raw.trim();
    if let Some(percent) = value.strip_suffix('%') {
        let fraction = percent.trim().parse::<f32>().unwrap_or(0.0) / 100.0;
        return reference * fraction * scale;
    }
    parse_length(value) * scale
}

pub(crate) fn parse_viewbox(raw: &str) -> Option<(f32, f32, f32, f32)> {
    let mut numbers = raw
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|part| !part.is_empty())
        .map(|part| part.parse::<f32>());
    let min_x = numbers.next()?.ok()?;
    let min_y = numbers.next()?.ok()?;
    let width = numbers.next()?.ok()?;
    let height = numbers.next()?.ok()?;
    if !(min_x.is_finite() && min_y.is_finite() && width.is_finite() && height.is_finite()) {
        return None;
    }
    Some((min_x, min_y, width, height))
}

/// Resolves the document's own size. A viewBox with positive extent wins over
/// `width`/`height` attributes; a missing or non-positive result falls back to
/// 800x600 per axis.
pub(crate) fn document_size(root: roxmltree::Node<'_, '_>) -> (f32, f32) {
    if let Some(raw) = root.attribute("viewBox") {
        if let Some((_, _, vb_width, vb_height)) = parse_viewbox(raw) {
            if vb_width > 0.0 && vb_height > 0.0 {
                return (vb_width, vb_height);
            }
        }
    }

    let mut width = root.attribute("width").map(parse_length).unwrap_or(0.0);
    let mut height = root.attribute("height").map(parse_length).unwrap_or(0.0);
    if width <= 0.0 {
        width = FALLBACK_WIDTH;
    }
    if height <= 0.0 {
        height = FALLBACK_HEIGHT;
    }
    (width, height)
}
