//! Cloud browsers through Sauce Labs
//!
//! Pages are loaded from an HTTP server reachable by the remote browser
//! (normally through a Sauce Connect tunnel). After each case the job is
//! tagged with its outcome and the CI build it belongs to.

use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::{json, Map, Value};
use tracing::info;

use super::browser::{BrowserSession, Endpoint, SourceAddressing};
use super::Renderer;
use crate::config::RemoteCredentials;
use crate::error::{HarnessError, Result};

/// Sauce Labs WebDriver hub
pub const SAUCE_HUB_URL: &str = "https://ondemand.saucelabs.com/wd/hub";
/// Sauce Labs REST API root
pub const SAUCE_API_URL: &str = "https://saucelabs.com/rest/v1";
/// Where the remote browser finds the served test tree
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000/";

/// One browser/platform combination
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowserTarget {
    pub name: &'static str,
    pub platform: &'static str,
    pub browser: &'static str,
    pub version: &'static str,
}

/// Browsers every remote run covers; `beta` tracks the next stable release.
pub fn browser_matrix() -> Vec<BrowserTarget> {
    let target = |name, platform, browser, version| BrowserTarget {
        name,
        platform,
        browser,
        version,
    };
    vec![
        target("win_ie", "Windows 8.1", "internet explorer", "11"),
        target("win_firefox", "Windows 8.1", "firefox", "beta"),
        target("win_chrome", "Windows 8.1", "chrome", "beta"),
        target("mac_firefox", "OS X 10.9", "firefox", "beta"),
        // beta is not offered here
        target("mac_chrome", "OS X 10.9", "chrome", "40.0"),
        target("linux_firefox", "Linux", "firefox", "beta"),
        target("linux_chrome", "Linux", "chrome", "beta"),
    ]
}

/// CI context attached to every remote job
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildMetadata {
    pub build: String,
    pub name: String,
    pub public: String,
    pub tags: Vec<String>,
    #[serde(skip)]
    pub tunnel_identifier: Option<String>,
}

impl BuildMetadata {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let pull_request = lookup("TRAVIS_PULL_REQUEST").unwrap_or_else(|| "false".to_string());
        let tag = if pull_request != "false" {
            pull_request
        } else {
            lookup("TRAVIS_BRANCH").unwrap_or_else(|| "manual".to_string())
        };
        Self {
            build: lookup("TRAVIS_BUILD_NUMBER").unwrap_or_else(|| "0".to_string()),
            name: "pdf2htmlEX".to_string(),
            public: "public restricted".to_string(),
            tags: vec![tag],
            tunnel_identifier: lookup("TRAVIS_JOB_NUMBER").filter(|v| !v.is_empty()),
        }
    }
}

#[derive(Serialize)]
struct JobUpdate<'a> {
    passed: bool,
    #[serde(flatten)]
    metadata: &'a BuildMetadata,
}

/// A browser from the Sauce Labs matrix
#[derive(Debug)]
pub struct RemoteBrowserRenderer {
    session: BrowserSession,
    target: BrowserTarget,
    credentials: RemoteCredentials,
    metadata: BuildMetadata,
    http: reqwest::Client,
}

impl RemoteBrowserRenderer {
    /// `served_root` is the local directory the tunnelled server at
    /// `base_url` exposes.
    pub fn new(
        target: BrowserTarget,
        credentials: RemoteCredentials,
        metadata: BuildMetadata,
        served_root: PathBuf,
        base_url: &str,
    ) -> Result<Self> {
        let capabilities = capabilities(&target, &credentials, &metadata);
        let session = BrowserSession::new(
            Endpoint::Remote,
            SAUCE_HUB_URL.to_string(),
            capabilities,
            SourceAddressing::Served {
                root: served_root,
                base_url: base_url.to_string(),
            },
        )?;
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| HarnessError::RemoteService(e.to_string()))?;
        Ok(Self {
            session,
            target,
            credentials,
            metadata,
            http,
        })
    }

    pub fn target(&self) -> &BrowserTarget {
        &self.target
    }
}

fn capabilities(
    target: &BrowserTarget,
    credentials: &RemoteCredentials,
    metadata: &BuildMetadata,
) -> Map<String, Value> {
    let mut sauce = json!({
        "username": credentials.username,
        "accessKey": credentials.access_key,
        "recordVideo": false,
        "build": metadata.build,
        "name": metadata.name,
    });
    if let Some(tunnel) = &metadata.tunnel_identifier {
        sauce["tunnelIdentifier"] = json!(tunnel);
    }

    let mut capabilities = Map::new();
    capabilities.insert("browserName".to_string(), json!(target.browser));
    capabilities.insert("browserVersion".to_string(), json!(target.version));
    capabilities.insert("platformName".to_string(), json!(target.platform));
    capabilities.insert("sauce:options".to_string(), sauce);
    capabilities
}

impl Renderer for RemoteBrowserRenderer {
    fn name(&self) -> &str {
        self.target.name
    }

    fn render(&mut self, source: &Path, dest: &Path, must_load: bool) -> Result<()> {
        self.session.capture(source, dest, must_load)
    }

    /// Tag the remote job with the case outcome and build metadata.
    fn conclude(&mut self, case: &str, passed: bool) -> Result<()> {
        let Some(session_id) = self.session.session_id() else {
            // Nothing was rendered, so there is no job to update.
            return Ok(());
        };
        let url = format!(
            "{}/{}/jobs/{}",
            SAUCE_API_URL, self.credentials.username, session_id
        );
        let body = JobUpdate {
            passed,
            metadata: &self.metadata,
        };
        let request = self
            .http
            .put(&url)
            .basic_auth(&self.credentials.username, Some(&self.credentials.access_key))
            .json(&body);

        self.session
            .block_on(async {
                request.send().await?.error_for_status()?;
                Ok::<_, reqwest::Error>(())
            })
            .map_err(|e| HarnessError::RemoteService(format!("job update failed: {}", e)))?;

        info!(case, browser = self.target.name, passed, job = %session_id, "updated remote job");
        Ok(())
    }

    fn shutdown(&mut self) -> Result<()> {
        self.session.quit()
    }
}
