//! Rasterizing converted HTML
//!
//! Every backend implements [`Renderer`]: load an HTML document, wait for it
//! to become ready where the backend can tell, and write a PNG. Backends are
//! chosen by configuration and share the oracle and workspace logic.

use std::fmt::Debug;
use std::path::Path;
use std::time::Duration;

#[cfg(feature = "browser")]
use crate::config::HarnessConfig;
use crate::error::Result;

#[cfg(feature = "browser")]
mod browser;
#[cfg(feature = "browser")]
mod remote;
mod static_tool;

#[cfg(feature = "browser")]
pub use browser::{LocalBrowserRenderer, SourceAddressing, DEFAULT_WEBDRIVER_URL};
#[cfg(feature = "browser")]
pub use remote::{
    browser_matrix, BrowserTarget, BuildMetadata, RemoteBrowserRenderer, DEFAULT_BASE_URL,
};
pub use static_tool::{StaticRenderer, DEFAULT_RASTERIZER, DEFAULT_RASTERIZER_ARGS};

/// Id of the element whose presence marks a converted page as loaded
pub const READY_MARKER: &str = "page-container";
/// Longest wait for [`READY_MARKER`]
pub const READY_TIMEOUT: Duration = Duration::from_secs(5);
/// Browser window size used for screenshots
pub const BROWSER_VIEWPORT: Viewport = Viewport {
    width: 800,
    height: 1200,
};

/// Window size in CSS pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

/// Turns an HTML document into a raster image.
pub trait Renderer: Debug {
    /// Short backend name for logs
    fn name(&self) -> &str;

    /// Render `source` to a PNG at `dest`.
    ///
    /// When `must_load` is false, a page that never becomes ready is still
    /// captured as-is instead of failing.
    fn render(&mut self, source: &Path, dest: &Path, must_load: bool) -> Result<()>;

    /// Report the outcome of the case that just used this renderer.
    fn conclude(&mut self, _case: &str, _passed: bool) -> Result<()> {
        Ok(())
    }

    /// Release any session held by the renderer.
    fn shutdown(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Browser renderers selected by `config`.
///
/// With remote testing enabled this is one renderer per entry of
/// [`browser_matrix`], loading pages from `served_root` through
/// [`DEFAULT_BASE_URL`]; otherwise a single local Firefox.
#[cfg(feature = "browser")]
pub fn browser_renderers(
    config: &HarnessConfig,
    served_root: &Path,
) -> Result<Vec<Box<dyn Renderer>>> {
    match config.remote_credentials() {
        Some(credentials) => {
            let metadata = BuildMetadata::from_env();
            browser_matrix()
                .into_iter()
                .map(|target| {
                    RemoteBrowserRenderer::new(
                        target,
                        credentials.clone(),
                        metadata.clone(),
                        served_root.to_path_buf(),
                        DEFAULT_BASE_URL,
                    )
                    .map(|renderer| Box::new(renderer) as Box<dyn Renderer>)
                })
                .collect()
        }
        None => Ok(vec![Box::new(LocalBrowserRenderer::firefox(
            DEFAULT_WEBDRIVER_URL,
        )?)]),
    }
}
