//! Color string resolution for the painter backend.
//!
//! Supported forms: `#rgb`, `#rrggbb`, `rgb(r,g,b)`, `rgba(r,g,b,a)` with a
//! 0..1 float alpha, and a small table of named colors. Anything else falls
//! back to the caller-supplied default; `None` as a default means "do not
//! paint", which is how shape renderers express an absent fill or stroke.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const BLACK: Rgba = Rgba::new(0, 0, 0, 255);
    pub const WHITE: Rgba = Rgba::new(255, 255, 255, 255);
    pub const TRANSPARENT: Rgba = Rgba::new(0, 0, 0, 0);

    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub(crate) fn to_skia(self) -> tiny_skia::Color {
        tiny_skia::Color::from_rgba8(self.r, self.g, self.b, self.a)
    }
}

const NAMED_COLORS: &[(&str, Rgba)] = &[
    ("black", Rgba::new(0, 0, 0, 255)),
    ("white", Rgba::new(255, 255, 255, 255)),
    ("red", Rgba::new(255, 0, 0, 255)),
    ("green", Rgba::new(0, 128, 0, 255)),
    ("blue", Rgba::new(0, 0, 255, 255)),
    ("yellow", Rgba::new(255, 255, 0, 255)),
    ("cyan", Rgba::new(0, 255, 255, 255)),
    ("magenta", Rgba::new(255, 0, 255, 255)),
    ("silver", Rgba::new(192, 192, 192, 255)),
    ("gray", Rgba::new(128, 128, 128, 255)),
    ("grey", Rgba::new(128, 128, 128, 255)),
    ("maroon", Rgba::new(128, 0, 0, 255)),
    ("olive", Rgba::new(128, 128, 0, 255)),
    ("lime", Rgba::new(0, 255, 0, 255)),
    ("aqua", Rgba::new(0, 255, 255, 255)),
    ("teal", Rgba::new(0, 128, 128, 255)),
    ("navy", Rgba::new(0, 0, 128, 255)),
    ("fuchsia", Rgba::new(255, 0, 255, 255)),
    ("purple", Rgba::new(128, 0, 128, 255)),
];

/// Resolves a color attribute value. `none`, empty, and unparseable input all
/// yield `default`.
pub fn parse_color(raw: &str, default: Option<Rgba>) -> Option<Rgba> {
    let value = raw.trim().to_ascii_lowercase();
    if value.is_empty() || value == "none" {
        return default;
    }

    if let Some(body) = value
        .strip_prefix("rgba(")
        .and_then(|rest| rest.strip_suffix(')'))
    {
        return parse_rgba_body(body).or(default);
    }

    if let Some(body) = value
        .strip_prefix("rgb(")
        .and_then(|rest| rest.strip_suffix(')'))
    {
        return parse_rgb_body(body).or(default);
    }

    if let Some(hex) = value.strip_prefix('#') {
        return parse_hex(hex).or(default);
    }

    NAMED_COLORS
        .iter()
        .find(|(name, _)| *name == value)
        .map(|(_, color)| *color)
        .or(default)
}

fn parse_rgb_body(body: &str) -> Option<Rgba> {
    let mut parts = body.split(',').map(str::trim);
    let r = parts.next()?.parse::<u8>().ok()?;
    let g = parts.next()?.parse::<u8>().ok()?;
    let b = parts.next()?.parse::<u8>().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some(Rgba::new(r, g, b, 255))
}

fn parse_rgba_body(body: &str) -> Option<Rgba> {
    let mut parts = body.split(',').map(str::trim);
    let r = parts.next()?.parse::<u8>().ok()?;
    let g = parts.next()?.parse::<u8>().ok()?;
    let b = parts.next()?.parse::<u8>().ok()?;
    let alpha = parts.next()?.parse::<f32>().ok()?;
    if parts.next().is_some() || !alpha.is_finite() {
        return None;
    }
    let a = (alpha * 255.0).clamp(0.0, 255.0) as u8;
    Some(Rgba::new(r, g, b, a))
}

fn parse_hex(hex: &str) -> Option<Rgba> {
    match hex.len() {
        3 => {
            let r = u8::from_str_radix(&hex[0..1].repeat(2), 16).ok()?;
            let g = u8::from_str_radix(&hex[1..2].repeat(2), 16).ok()?;
            let b = u8::from_str_radix(&hex[2..3].repeat(2), 16).ok()?;
            Some(Rgba::new(r, g, b, 255))
        }
        6 => {
            let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
            let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
            let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
            Some(Rgba::new(r, g, b, 255))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_six_digit_hex() {
        assert_eq!(
            parse_color("#141824", None),
            Some(Rgba::new(0x14, 0x18, 0x24, 255))
        );
    }

    #[test]
    fn parses_three_digit_hex_by_doubling() {
        assert_eq!(parse_color("#f0a", None), Some(Rgba::new(255, 0, 170, 255)));
    }

    #[test]
    fn parses_rgb_and_rgba_functions() {
        assert_eq!(
            parse_color("rgb(10, 20, 30)", None),
            Some(Rgba::new(10, 20, 30, 255))
        );
        assert_eq!(
            parse_color("RGBA(255, 0, 0, 0.5)", None),
            Some(Rgba::new(255, 0, 0, 127))
        );
    }

    #[test]
    fn named_colors_are_case_insensitive() {
        assert_eq!(parse_color("White", None), Some(Rgba::WHITE));
        assert_eq!(parse_color("NAVY", None), Some(Rgba::new(0, 0, 128, 255)));
    }

    #[test]
    fn none_and_unknown_return_default() {
        assert_eq!(parse_color("none", None), None);
        assert_eq!(parse_color("", Some(Rgba::BLACK)), Some(Rgba::BLACK));
        assert_eq!(parse_color("blurple", Some(Rgba::WHITE)), Some(Rgba::WHITE));
        assert_eq!(parse_color("#12", Some(Rgba::BLACK)), Some(Rgba::BLACK));
    }

    #[test]
    fn out_of_range_components_fall_back() {
        assert_eq!(parse_color("rgb(300, 0, 0)", None), None);
        assert_eq!(
            parse_color("rgb(300, 0, 0)", Some(Rgba::BLACK)),
            Some(Rgba::BLACK)
        );
    }
}
