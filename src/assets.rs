//! Process-wide asset registry for the painter backend.
//!
//! Holds the local artwork index, the optional background bitmap, and the
//! font fallback chain. The registry is constructed once and injected into
//! the pipeline; caches are append-only and hand out copies, so concurrent
//! conversions never observe cross-call mutation.

use crate::error::InkfallError;
use image::RgbaImage;
use log::{debug, info, warn};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Fixed file name of the backdrop bitmap inside the configured base dir.
pub const BACKGROUND_FILE: &str = "default_wallpaper.jpg";

/// Bundled font locations relative to the base dir, tried before any system
/// font.
const BUNDLED_FONT_FILES: &[&str] = &[
    "resources/font.ttf",
    "resources/font.otf",
    "font.ttf",
    "font.otf",
];

/// Best-effort system font chain covering CJK and Latin scripts, in
/// descending preference order.
const SYSTEM_FONT_FILES: &[&str] = &[
    // Windows
    "C:/Windows/Fonts/msyh.ttc",
    "C:/Windows/Fonts/simhei.ttf",
    "C:/Windows/Fonts/msyhbd.ttc",
    "C:/Windows/Fonts/simsun.ttc",
    "C:/Windows/Fonts/msgothic.ttc",
    "C:/Windows/Fonts/malgun.ttf",
    // Linux
    "/usr/share/fonts/truetype/wqy/wqy-zenhei.ttc",
    "/usr/share/fonts/truetype/wqy/wqy-microhei.ttc",
    "/usr/share/fonts/opentype/noto/NotoSansCJK-Regular.ttc",
    "/usr/share/fonts/truetype/noto/NotoSansCJK-Regular.ttc",
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/truetype/freefont/FreeSans.ttf",
    "/usr/share/fonts/truetype/ubuntu/Ubuntu-R.ttf",
    "/usr/share/fonts/google-noto-cjk/NotoSansCJK-Regular.ttc",
    "/usr/share/fonts/google-noto/NotoSans-Regular.ttf",
    "/usr/share/fonts/truetype/arphic/uming.ttc",
    "/usr/share/fonts/truetype/arphic/ukai.ttc",
    // macOS
    "/System/Library/Fonts/PingFang.ttc",
    "/System/Library/Fonts/STHeiti Light.ttc",
    "/System/Library/Fonts/Hiragino Sans GB.ttc",
    "/Library/Fonts/Arial Unicode.ttf",
];

#[derive(Debug, Clone, Default)]
pub struct AssetConfig {
    /// Directory of PNG artwork, indexed by normalized file stem.
    pub artwork_dir: Option<PathBuf>,
    /// Directory holding the background bitmap and bundled fonts.
    pub base_dir: Option<PathBuf>,
    /// Extra font files tried before the bundled/system chain.
    pub font_paths: Vec<PathBuf>,
}

/// A font face resolved for one pixel size. The face data is shared; the
/// per-size scale and ascent are precomputed so the text renderer can lay
/// glyphs out without re-deriving metrics.
pub struct SizedFont {
    pub data: Arc<Vec<u8>>,
    pub size: u32,
    pub scale: f32,
    pub ascent: f32,
}

pub struct AssetRegistry {
    artwork_index: HashMap<String, PathBuf>,
    artwork_cache: Mutex<HashMap<String, Arc<RgbaImage>>>,
    background: Option<RgbaImage>,
    font_paths: Vec<PathBuf>,
    font_data: Mutex<Option<Option<Arc<Vec<u8>>>>>,
    font_cache: Mutex<HashMap<u32, Option<Arc<SizedFont>>>>,
}

impl AssetRegistry {
    pub fn new(config: AssetConfig) -> Self {
        let artwork_index = config
            .artwork_dir
            .as_deref()
            .map(build_artwork_index)
            .unwrap_or_default();

        let background = config.base_dir.as_deref().and_then(load_background);

        let mut font_paths = config.font_paths;
        if let Some(base) = config.base_dir.as_deref() {
            for name in BUNDLED_FONT_FILES {
                let path = base.join(name);
                if path.exists() {
                    font_paths.push(path);
                }
            }
        }
        for name in SYSTEM_FONT_FILES {
            let path = PathBuf::from(name);
            if path.exists() {
                font_paths.push(path);
            }
        }
        if font_paths.is_empty() {
            warn!("no font candidates found; text elements will be skipped");
        } else {
            info!("{} font candidates available", font_paths.len());
        }

        Self {
            artwork_index,
            artwork_cache: Mutex::new(HashMap::new()),
            background,
            font_paths,
            font_data: Mutex::new(None),
            font_cache: Mutex::new(HashMap::new()),
        }
    }

    /// Registry with no disk-backed assets. Useful for tests and for callers
    /// that only convert geometry.
    pub fn empty() -> Self {
        Self::new(AssetConfig::default())
    }

    /// Registry with an in-memory background bitmap instead of the fixed
    /// on-disk location.
    pub fn with_background(background: RgbaImage) -> Self {
        let mut registry = Self::empty();
        registry.background = Some(background);
        registry
    }

    pub fn background(&self) -> Option<&RgbaImage> {
        self.background.as_ref()
    }

    pub fn artwork_count(&self) -> usize {
        self.artwork_index.len()
    }

    /// Looks up an artwork bitmap by normalized key: exact lowercased stem
    /// first, then the stem portion before the first `.`. A copy is handed
    /// out; the cached original stays immutable.
    pub fn artwork(&self, key: &str) -> Option<RgbaImage> {
        if key.is_empty() {
            return None;
        }

        if let Ok(cache) = self.artwork_cache.lock() {
            if let Some(hit) = cache.get(key) {
                return Some(hit.as_ref().clone());
            }
        }

        let lower = key.to_ascii_lowercase();
        let path = self.artwork_index.get(&lower).or_else(|| {
            lower
                .split_once('.')
                .and_then(|(prefix, _)| self.artwork_index.get(prefix))
        })?;

        let bitmap = match image::open(path) {
            Ok(decoded) => decoded.to_rgba8(),
            Err(e) => {
                warn!("failed to decode artwork {}: {e}", path.display());
                return None;
            }
        };

        let shared = Arc::new(bitmap);
        if let Ok(mut cache) = self.artwork_cache.lock() {
            cache.entry(key.to_string()).or_insert_with(|| shared.clone());
        }
        Some(shared.as_ref().clone())
    }

    /// Resolves the first loadable face in the fallback chain at the given
    /// pixel size. Results, including misses, are cached by size.
    pub fn font(&self, size: u32) -> Option<Arc<SizedFont>> {
        if let Ok(cache) = self.font_cache.lock() {
            if let Some(entry) = cache.get(&size) {
                return entry.clone();
            }
        }

        let loaded = self
            .resolve_font_data()
            .and_then(|data| sized_font(data, size));
        if let Ok(mut cache) = self.font_cache.lock() {
            cache.insert(size, loaded.clone());
        }
        loaded
    }

    /// Clears the mutable caches; the next lookup repopulates them.
    pub fn reset(&self) {
        if let Ok(mut cache) = self.artwork_cache.lock() {
            cache.clear();
        }
        if let Ok(mut cache) = self.font_cache.lock() {
            cache.clear();
        }
        if let Ok(mut data) = self.font_data.lock() {
            *data = None;
        }
    }

    fn resolve_font_data(&self) -> Option<Arc<Vec<u8>>> {
        if let Ok(cached) = self.font_data.lock() {
            if let Some(resolved) = cached.as_ref() {
                return resolved.clone();
            }
        }

        let mut resolved: Option<Arc<Vec<u8>>> = None;
        for path in &self.font_paths {
            let Ok(bytes) = std::fs::read(path) else {
                continue;
            };
            if ttf_parser::Face::parse(&bytes, 0).is_ok() {
                debug!("using font {}", path.display());
                resolved = Some(Arc::new(bytes));
                break;
            }
        }

        if let Ok(mut cached) = self.font_data.lock() {
            *cached = Some(resolved.clone());
        }
        resolved
    }
}

fn sized_font(data: Arc<Vec<u8>>, size: u32) -> Option<Arc<SizedFont>> {
    let face = ttf_parser::Face::parse(&data, 0).ok()?;
    let units_per_em = face.units_per_em().max(1) as f32;
    let scale = size as f32 / units_per_em;
    let ascent = face.ascender() as f32 * scale;
    Some(Arc::new(SizedFont {
        data: data.clone(),
        size,
        scale,
        ascent,
    }))
}

fn build_artwork_index(dir: &Path) -> HashMap<String, PathBuf> {
    let mut index = HashMap::new();
    let Ok(entries) = std::fs::read_dir(dir) else {
        return index;
    };

    for entry in entries.flatten() {
        let path = entry.path();
        let is_png = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("png"));
        if !is_png {
            continue;
        }
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        let lower = stem.to_ascii_lowercase();
        // The stem-before-separator alias lets a bare title match artwork
        // named "Title.Composer.png".
        if let Some((prefix, _)) = lower.split_once('.') {
            index
                .entry(prefix.to_string())
                .or_insert_with(|| path.clone());
        }
        index.insert(lower, path);
    }

    info!("indexed {} artwork entries from {}", index.len(), dir.display());
    index
}

fn load_background(base_dir: &Path) -> Option<RgbaImage> {
    let path = base_dir.join(BACKGROUND_FILE);
    if !path.exists() {
        debug!("no background bitmap at {}", path.display());
        return None;
    }
    match image::open(&path) {
        Ok(decoded) => {
            let bitmap = decoded.to_rgba8();
            info!(
                "loaded background {} ({}x{})",
                path.display(),
                bitmap.width(),
                bitmap.height()
            );
            Some(bitmap)
        }
        Err(e) => {
            warn!("failed to load background {}: {e}", path.display());
            None
        }
    }
}

/// Convenience for callers that need the registry behind a shared handle.
pub fn shared_registry(config: AssetConfig) -> Result<Arc<AssetRegistry>, InkfallError> {
    Ok(Arc::new(AssetRegistry::new(config)))
}
