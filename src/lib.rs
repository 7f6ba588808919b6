//! inkfall converts SVG markup into PNG bitmaps for chat-bot result cards.
//!
//! Conversion runs through a [`Pipeline`] of backends tried in order: an
//! optional full vector rasterizer (feature `vector`), an external `inkscape`
//! binary when one is installed, and the built-in painter, which has no
//! external requirements and understands the subset of SVG these cards use.
//!
//! The painter draws onto a composed backdrop (a configured wallpaper bitmap
//! with a darkening scrim, or a solid color), resolves `<image>` references
//! against a local artwork directory instead of the network, and renders text
//! through a cross-platform font fallback chain.
//!
//! ```no_run
//! use inkfall::{AssetConfig, Pipeline, SizeHint, shared_registry};
//!
//! # fn main() -> Result<(), inkfall::InkfallError> {
//! let registry = shared_registry(AssetConfig::default())?;
//! let pipeline = Pipeline::new(registry);
//! let png = pipeline.convert("<svg viewBox=\"0 0 100 100\"/>", SizeHint::width(800))?;
//! # let _ = png;
//! # Ok(())
//! # }
//! ```

mod assets;
mod backend;
mod background;
mod canvas;
mod color;
mod embed;
mod error;
mod render;
mod shapes;
mod text;
mod units;

pub use assets::{AssetConfig, AssetRegistry, BACKGROUND_FILE, SizedFont, shared_registry};
pub use backend::{Backend, InkscapeBackend, PainterBackend, Pipeline};
#[cfg(feature = "vector")]
pub use backend::VectorBackend;
pub use canvas::Canvas;
pub use color::{Rgba, parse_color};
pub use error::InkfallError;
pub use render::SizeHint;

use std::sync::Arc;

/// One-shot conversion through the built-in painter with no configured
/// assets. Deterministic and dependency-free; callers that want the full
/// backend chain or local artwork should build a [`Pipeline`] instead.
pub fn convert_svg_to_png(svg: &str, hint: SizeHint) -> Result<Vec<u8>, InkfallError> {
    let painter = PainterBackend::new(Arc::new(AssetRegistry::empty()));
    Pipeline::with_backends(vec![Box::new(painter)]).convert(svg, hint)
}
