//! Conversion backends and the fallback pipeline.
//!
//! Backends are probed once per pipeline and tried in order until one
//! produces PNG bytes. The painter backend always probes available, so a
//! pipeline that includes it can only fail on malformed input.

use crate::assets::AssetRegistry;
use crate::error::InkfallError;
use crate::render::{self, SizeHint};
use log::{debug, info, warn};
use std::io;
use std::path::Path;
use std::process::{Command, ExitStatus, Stdio};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

const PROBE_TIMEOUT: Duration = Duration::from_secs(5);
const CONVERT_TIMEOUT: Duration = Duration::from_secs(30);

pub trait Backend: Send + Sync {
    fn name(&self) -> &'static str;

    /// One-shot availability check. Called once per pipeline; the result is
    /// cached.
    fn probe(&self) -> bool;

    fn convert(&self, svg: &str, hint: SizeHint) -> Result<Vec<u8>, InkfallError>;
}

/// The built-in rasterizer. Always available.
pub struct PainterBackend {
    registry: Arc<AssetRegistry>,
}

impl PainterBackend {
    pub fn new(registry: Arc<AssetRegistry>) -> Self {
        Self { registry }
    }
}

impl Backend for PainterBackend {
    fn name(&self) -> &'static str {
        "painter"
    }

    fn probe(&self) -> bool {
        true
    }

    fn convert(&self, svg: &str, hint: SizeHint) -> Result<Vec<u8>, InkfallError> {
        render::render_to_canvas(svg, hint, &self.registry)?.encode_png()
    }
}

/// Shells out to an `inkscape` binary when one is installed.
pub struct InkscapeBackend {
    binary: String,
}

impl InkscapeBackend {
    pub fn new() -> Self {
        Self {
            binary: "inkscape".to_string(),
        }
    }

    pub fn with_binary(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    fn error(&self, message: String) -> InkfallError {
        InkfallError::Backend {
            name: "inkscape",
            message,
        }
    }
}

impl Default for InkscapeBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl Backend for InkscapeBackend {
    fn name(&self) -> &'static str {
        "inkscape"
    }

    fn probe(&self) -> bool {
        let mut command = Command::new(&self.binary);
        command
            .arg("--version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        matches!(
            run_with_timeout(&mut command, PROBE_TIMEOUT),
            Ok(Some(status)) if status.success()
        )
    }

    fn convert(&self, svg: &str, hint: SizeHint) -> Result<Vec<u8>, InkfallError> {
        let stamp = temp_stamp();
        let input = std::env::temp_dir().join(format!("inkfall_{stamp}.svg"));
        let output = std::env::temp_dir().join(format!("inkfall_{stamp}.png"));
        std::fs::write(&input, svg)?;

        let mut command = Command::new(&self.binary);
        command
            .arg(&input)
            .arg("--export-type=png")
            .arg(format!("--export-filename={}", output.display()))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        if let Some(width) = hint.width {
            command.arg(format!("--export-width={width}"));
        }
        if let Some(height) = hint.height {
            command.arg(format!("--export-height={height}"));
        }

        let outcome = run_with_timeout(&mut command, CONVERT_TIMEOUT);
        let result = match outcome {
            Ok(Some(status)) if status.success() => {
                std::fs::read(&output).map_err(InkfallError::from)
            }
            Ok(Some(status)) => Err(self.error(format!("exited with {status}"))),
            Ok(None) => Err(self.error(format!(
                "timed out after {}s",
                CONVERT_TIMEOUT.as_secs()
            ))),
            Err(e) => Err(self.error(format!("failed to launch: {e}"))),
        };

        std::fs::remove_file(&input).ok();
        std::fs::remove_file(&output).ok();
        result
    }
}

/// Spawns the command and polls it, killing on timeout. `Ok(None)` means the
/// deadline passed.
fn run_with_timeout(
    command: &mut Command,
    timeout: Duration,
) -> io::Result<Option<ExitStatus>> {
    let mut child = command.spawn()?;
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if Instant::now() >= deadline {
            child.kill().ok();
            child.wait().ok();
            return Ok(None);
        }
        std::thread::sleep(Duration::from_millis(50));
    }
}

fn temp_stamp() -> String {
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    format!(
        "{}_{}",
        std::process::id(),
        COUNTER.fetch_add(1, Ordering::Relaxed)
    )
}

#[cfg(feature = "vector")]
pub use vector::VectorBackend;

#[cfg(feature = "vector")]
mod vector {
    use super::*;
    use resvg::usvg::{Options, Tree, fontdb};

    fn shared_fontdb() -> Arc<fontdb::Database> {
        static DB: OnceLock<Arc<fontdb::Database>> = OnceLock::new();
        DB.get_or_init(|| {
            let mut db = fontdb::Database::new();
            db.load_system_fonts();
            Arc::new(db)
        })
        .clone()
    }

    /// Full vector rasterizer, compiled in behind the `vector` feature.
    pub struct VectorBackend;

    impl VectorBackend {
        pub fn new() -> Self {
            Self
        }

        fn render(&self, svg: &str, hint: SizeHint) -> Result<Vec<u8>, InkfallError> {
            let error = |message: String| InkfallError::Backend {
                name: "vector",
                message,
            };

            let mut options = Options::default();
            options.fontdb = shared_fontdb();
            let tree =
                Tree::from_str(svg, &options).map_err(|e| error(format!("parse failed: {e}")))?;

            let size = tree.size();
            let (out_w, out_h) =
                render::resolve_output_size(size.width(), size.height(), hint);
            let mut pixmap = resvg::tiny_skia::Pixmap::new(out_w, out_h)
                .ok_or_else(|| error(format!("invalid output size {out_w}x{out_h}")))?;

            let transform = resvg::tiny_skia::Transform::from_scale(
                out_w as f32 / size.width(),
                out_h as f32 / size.height(),
            );
            resvg::render(&tree, transform, &mut pixmap.as_mut());
            pixmap
                .encode_png()
                .map_err(|e| error(format!("png encode failed: {e}")))
        }
    }

    impl Default for VectorBackend {
        fn default() -> Self {
            Self::new()
        }
    }

    impl Backend for VectorBackend {
        fn name(&self) -> &'static str {
            "vector"
        }

        fn probe(&self) -> bool {
            let probe_doc = r#"<svg xmlns="http://www.w3.org/2000/svg" width="10" height="10"/>"#;
            self.render(probe_doc, SizeHint::NATIVE).is_ok()
        }

        fn convert(&self, svg: &str, hint: SizeHint) -> Result<Vec<u8>, InkfallError> {
            self.render(svg, hint)
        }
    }
}

/// Ordered backend chain with probe-once caching.
pub struct Pipeline {
    backends: Vec<Box<dyn Backend>>,
    probes: OnceLock<Vec<bool>>,
}

impl Pipeline {
    /// The default chain: vector rasterizer (when compiled in), external
    /// inkscape, then the built-in painter.
    pub fn new(registry: Arc<AssetRegistry>) -> Self {
        let mut backends: Vec<Box<dyn Backend>> = Vec::new();
        #[cfg(feature = "vector")]
        backends.push(Box::new(VectorBackend::new()));
        backends.push(Box::new(InkscapeBackend::new()));
        backends.push(Box::new(PainterBackend::new(registry)));
        Self::with_backends(backends)
    }

    pub fn with_backends(backends: Vec<Box<dyn Backend>>) -> Self {
        Self {
            backends,
            probes: OnceLock::new(),
        }
    }

    fn probes(&self) -> &[bool] {
        self.probes.get_or_init(|| {
            self.backends
                .iter()
                .map(|backend| {
                    let available = backend.probe();
                    debug!("backend {} available: {available}", backend.name());
                    available
                })
                .collect()
        })
    }

    /// Names of the backends that probed available, in try order.
    pub fn available(&self) -> Vec<&'static str> {
        self.backends
            .iter()
            .zip(self.probes())
            .filter(|&(_, &ok)| ok)
            .map(|(backend, _)| backend.name())
            .collect()
    }

    /// Converts markup by trying each available backend in order.
    pub fn convert(&self, svg: &str, hint: SizeHint) -> Result<Vec<u8>, InkfallError> {
        let probes = self.probes().to_vec();
        for (backend, available) in self.backends.iter().zip(probes) {
            if !available {
                continue;
            }
            match backend.convert(svg, hint) {
                Ok(png) => {
                    info!("converted via {} ({} bytes)", backend.name(), png.len());
                    return Ok(png);
                }
                Err(e) => warn!("backend {} failed: {e}", backend.name()),
            }
        }
        Err(InkfallError::AllBackendsFailed)
    }

    /// File-to-file conversion.
    pub fn convert_file(
        &self,
        input: &Path,
        output: &Path,
        hint: SizeHint,
    ) -> Result<(), InkfallError> {
        if !input.exists() {
            return Err(InkfallError::MissingInput(input.to_path_buf()));
        }
        let svg = std::fs::read_to_string(input)?;
        let png = self.convert(&svg, hint)?;
        std::fs::write(output, png)?;
        Ok(())
    }

    /// Runs the conversion on a worker thread so callers with their own event
    /// loop are not blocked by subprocess waits.
    pub fn convert_offloaded(
        self: &Arc<Self>,
        svg: String,
        hint: SizeHint,
    ) -> std::thread::JoinHandle<Result<Vec<u8>, InkfallError>> {
        let pipeline = self.clone();
        std::thread::spawn(move || pipeline.convert(&svg, hint))
    }
}
