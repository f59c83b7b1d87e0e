//! WebDriver-backed rendering
//!
//! The session is opened lazily on the first render, so a run that never
//! renders (for example in record mode) never needs a browser.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde_json::{json, Map, Value};
use thirtyfour::prelude::*;
use tokio::runtime::Runtime;
use tracing::{debug, info, warn};

use super::{Renderer, Viewport, BROWSER_VIEWPORT, READY_MARKER, READY_TIMEOUT};
use crate::error::{HarnessError, Result};

/// Default local WebDriver endpoint (geckodriver)
pub const DEFAULT_WEBDRIVER_URL: &str = "http://localhost:4444";

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// How a local file is turned into an address the browser can load
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceAddressing {
    /// `file://` URL of the absolute path
    FileUrl,
    /// Path relative to `root`, appended to `base_url` of an HTTP server
    /// serving `root`
    Served { root: PathBuf, base_url: String },
}

impl SourceAddressing {
    pub fn url_for(&self, source: &Path) -> Result<String> {
        match self {
            SourceAddressing::FileUrl => {
                let absolute = fs::canonicalize(source)?;
                Ok(format!("file://{}", absolute.display()))
            }
            SourceAddressing::Served { root, base_url } => {
                let relative = source.strip_prefix(root).map_err(|_| {
                    HarnessError::Config(format!(
                        "{} is not under the served root {}",
                        source.display(),
                        root.display()
                    ))
                })?;
                let path: Vec<String> = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect();
                Ok(format!("{}/{}", base_url.trim_end_matches('/'), path.join("/")))
            }
        }
    }
}

/// Which side gets the blame when the session cannot be opened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Endpoint {
    Local,
    Remote,
}

/// One WebDriver session driven from a private tokio runtime
pub(super) struct BrowserSession {
    runtime: Runtime,
    endpoint: Endpoint,
    server_url: String,
    capabilities: Map<String, Value>,
    viewport: Viewport,
    ready_timeout: Duration,
    addressing: SourceAddressing,
    driver: Option<WebDriver>,
}

impl std::fmt::Debug for BrowserSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // The server URL and capabilities may carry credentials.
        f.debug_struct("BrowserSession")
            .field("endpoint", &self.endpoint)
            .field("viewport", &self.viewport)
            .field("addressing", &self.addressing)
            .field("connected", &self.driver.is_some())
            .finish()
    }
}

impl BrowserSession {
    pub(super) fn new(
        endpoint: Endpoint,
        server_url: String,
        capabilities: Map<String, Value>,
        addressing: SourceAddressing,
    ) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        Ok(Self {
            runtime,
            endpoint,
            server_url,
            capabilities,
            viewport: BROWSER_VIEWPORT,
            ready_timeout: READY_TIMEOUT,
            addressing,
            driver: None,
        })
    }

    pub(super) fn set_ready_timeout(&mut self, timeout: Duration) {
        self.ready_timeout = timeout;
    }

    pub(super) fn block_on<F: std::future::Future>(&self, future: F) -> F::Output {
        self.runtime.block_on(future)
    }

    pub(super) fn session_id(&self) -> Option<String> {
        self.driver.as_ref().map(|driver| driver.session_id().to_string())
    }

    fn connect(&mut self) -> Result<()> {
        if self.driver.is_some() {
            return Ok(());
        }
        let server_url = self.server_url.clone();
        let capabilities = self.capabilities.clone();
        let viewport = self.viewport;
        let connected = self.runtime.block_on(async move {
            let driver = WebDriver::new(server_url, capabilities).await?;
            driver
                .set_window_rect(0, 0, viewport.width, viewport.height)
                .await?;
            Ok::<_, WebDriverError>(driver)
        });

        match connected {
            Ok(driver) => {
                info!(endpoint = ?self.endpoint, session = %driver.session_id(), "browser session started");
                self.driver = Some(driver);
                Ok(())
            }
            Err(e) => Err(match self.endpoint {
                Endpoint::Local => HarnessError::Environment {
                    tool: format!("WebDriver at {}", self.server_url),
                    reason: e.to_string(),
                },
                Endpoint::Remote => HarnessError::RemoteService(format!("cannot open a session: {}", e)),
            }),
        }
    }

    /// Load `source`, wait for the ready marker and save a screenshot.
    pub(super) fn capture(&mut self, source: &Path, dest: &Path, must_load: bool) -> Result<()> {
        self.connect()?;
        let url = self.addressing.url_for(source)?;
        let source_ref = source.display().to_string();
        let timeout = self.ready_timeout;
        let driver = self.driver.as_ref().ok_or_else(|| HarnessError::Render {
            source_ref: source_ref.clone(),
            reason: "browser session is not open".to_string(),
        })?;

        debug!(%url, "loading page");
        let loaded = self.runtime.block_on(async {
            driver.goto(url.as_str()).await?;
            let ready = driver
                .query(By::Id(READY_MARKER))
                .wait(timeout, POLL_INTERVAL)
                .exists()
                .await?;
            let png = driver.screenshot_as_png().await?;
            Ok::<_, WebDriverError>((ready, png))
        });

        let (ready, png) = loaded.map_err(|e| match self.endpoint {
            Endpoint::Remote => HarnessError::RemoteService(e.to_string()),
            Endpoint::Local => HarnessError::Render {
                source_ref: source_ref.clone(),
                reason: e.to_string(),
            },
        })?;

        if !ready {
            if must_load {
                return Err(HarnessError::RenderTimeout {
                    source_ref,
                    marker: READY_MARKER.to_string(),
                    timeout,
                });
            }
            warn!(source = %source_ref, "page never became ready; capturing it anyway");
        }
        fs::write(dest, png)?;
        Ok(())
    }

    pub(super) fn quit(&mut self) -> Result<()> {
        if let Some(driver) = self.driver.take() {
            let endpoint = self.endpoint;
            self.runtime.block_on(driver.quit()).map_err(|e| match endpoint {
                Endpoint::Remote => HarnessError::RemoteService(e.to_string()),
                Endpoint::Local => HarnessError::Render {
                    source_ref: "<session>".to_string(),
                    reason: format!("failed to close browser: {}", e),
                },
            })?;
            debug!("browser session closed");
        }
        Ok(())
    }
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        if let Err(e) = self.quit() {
            warn!("failed to close browser session: {}", e);
        }
    }
}

/// Headless Firefox through a local WebDriver server
#[derive(Debug)]
pub struct LocalBrowserRenderer {
    session: BrowserSession,
}

impl LocalBrowserRenderer {
    /// Firefox behind the WebDriver server at `webdriver_url`.
    pub fn firefox(webdriver_url: &str) -> Result<Self> {
        Ok(Self {
            session: BrowserSession::new(
                Endpoint::Local,
                webdriver_url.to_string(),
                firefox_capabilities(),
                SourceAddressing::FileUrl,
            )?,
        })
    }

    pub fn with_ready_timeout(mut self, timeout: Duration) -> Self {
        self.session.set_ready_timeout(timeout);
        self
    }
}

fn firefox_capabilities() -> Map<String, Value> {
    let mut capabilities = Map::new();
    capabilities.insert("browserName".to_string(), json!("firefox"));
    capabilities.insert(
        "moz:firefoxOptions".to_string(),
        json!({ "args": ["-headless"] }),
    );
    capabilities
}

impl Renderer for LocalBrowserRenderer {
    fn name(&self) -> &str {
        "local-firefox"
    }

    fn render(&mut self, source: &Path, dest: &Path, must_load: bool) -> Result<()> {
        self.session.capture(source, dest, must_load)
    }

    fn shutdown(&mut self) -> Result<()> {
        self.session.quit()
    }
}
