//! Harness configuration
//!
//! Every toggle the harness honours lives in [`HarnessConfig`], built once and
//! handed to [`crate::Harness::new`]. It can be read from the process
//! environment, from a JSON file, or assembled in code.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{HarnessError, Result};
use crate::compare::Tolerance;

/// Generating mode toggle
pub const ENV_GENERATING: &str = "P2H_TEST_GEN";
/// Preserve-temp toggle
pub const ENV_SAVE_TMP: &str = "P2H_TEST_SAVE_TMP";
/// Override for the preserved workspace location
pub const ENV_TMP_DIR: &str = "P2H_TEST_TMP_DIR";
/// Remote browser toggle
pub const ENV_REMOTE: &str = "P2H_TEST_REMOTE";
pub const ENV_SAUCE_USERNAME: &str = "SAUCE_USERNAME";
pub const ENV_SAUCE_ACCESS_KEY: &str = "SAUCE_ACCESS_KEY";
/// Converter binary override
pub const ENV_CONVERTER: &str = "P2H_CONVERTER";
pub const ENV_DATA_DIR: &str = "P2H_DATA_DIR";
pub const ENV_FIXTURES_DIR: &str = "P2H_FIXTURES_DIR";

/// Default converter binary name, resolved through `PATH`
pub const DEFAULT_CONVERTER: &str = "pdf2htmlEX";

/// Whether references are compared against or rewritten
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OracleMode {
    /// Compare fresh output against recorded references
    #[default]
    Verify,
    /// Record fresh output as the new references
    Record,
}

/// Credentials for the remote browser service
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteCredentials {
    pub username: String,
    pub access_key: String,
}

impl std::fmt::Debug for RemoteCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteCredentials")
            .field("username", &self.username)
            .field("access_key", &"<redacted>")
            .finish()
    }
}

/// Marker lines delimiting manifest regions the harness strips
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestMarkers {
    pub ignore_begin: String,
    pub ignore_end: String,
}

impl Default for ManifestMarkers {
    fn default() -> Self {
        Self {
            ignore_begin: "#TEST_IGNORE_BEGIN".to_string(),
            ignore_end: "#TEST_IGNORE_END".to_string(),
        }
    }
}

/// Which shared data files are staged into each workspace
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManifestSpec {
    /// Manifest file name inside the data directory
    pub file_name: String,
    pub markers: ManifestMarkers,
    /// Data files copied verbatim next to the filtered manifest
    pub extra_assets: Vec<String>,
}

impl Default for ManifestSpec {
    fn default() -> Self {
        Self {
            file_name: "manifest".to_string(),
            markers: ManifestMarkers::default(),
            extra_assets: vec!["base.css".to_string(), "fancy.css".to_string()],
        }
    }
}

/// Harness configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    pub mode: OracleMode,
    /// Reuse a fixed, inspectable workspace instead of an ephemeral one
    pub preserve_temp: bool,
    pub preserve_dir: PathBuf,
    /// Allow the remote browser renderer
    pub remote_enabled: bool,
    pub remote: Option<RemoteCredentials>,
    /// Converter binary under test
    pub converter: PathBuf,
    /// Shared data directory holding the manifest and stylesheets
    pub data_dir: PathBuf,
    /// Root of the reference fixtures
    pub fixtures_dir: PathBuf,
    pub tolerance: Tolerance,
    pub manifest: ManifestSpec,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            mode: OracleMode::Verify,
            preserve_temp: false,
            preserve_dir: std::env::temp_dir().join("golden-harness-preserved"),
            remote_enabled: false,
            remote: None,
            converter: PathBuf::from(DEFAULT_CONVERTER),
            data_dir: PathBuf::from("share"),
            fixtures_dir: PathBuf::from("test"),
            tolerance: Tolerance::Exact,
            manifest: ManifestSpec::default(),
        }
    }
}

impl HarnessConfig {
    /// Read the configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary variable lookup.
    ///
    /// Toggles are on when their variable is set to a non-empty value.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let value = |key: &str| lookup(key).filter(|v| !v.is_empty());
        let flag = |key: &str| value(key).is_some();

        let mut config = Self::default();
        if flag(ENV_GENERATING) {
            config.mode = OracleMode::Record;
        }
        config.preserve_temp = flag(ENV_SAVE_TMP);
        if let Some(dir) = value(ENV_TMP_DIR) {
            config.preserve_dir = PathBuf::from(dir);
        }
        config.remote_enabled = flag(ENV_REMOTE);
        config.remote = match (value(ENV_SAUCE_USERNAME), value(ENV_SAUCE_ACCESS_KEY)) {
            (Some(username), Some(access_key)) => Some(RemoteCredentials {
                username,
                access_key,
            }),
            _ => None,
        };
        if let Some(converter) = value(ENV_CONVERTER) {
            config.converter = PathBuf::from(converter);
        }
        if let Some(dir) = value(ENV_DATA_DIR) {
            config.data_dir = PathBuf::from(dir);
        }
        if let Some(dir) = value(ENV_FIXTURES_DIR) {
            config.fixtures_dir = PathBuf::from(dir);
        }
        config
    }

    /// Load a configuration from a JSON file.
    pub fn from_json_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn generating(&self) -> bool {
        self.mode == OracleMode::Record
    }

    /// Credentials for the remote renderer, if it may be used at all.
    pub fn remote_credentials(&self) -> Option<&RemoteCredentials> {
        if self.remote_enabled {
            self.remote.as_ref()
        } else {
            None
        }
    }

    /// Reject contradictory settings.
    pub fn validate(&self) -> Result<()> {
        if self.remote_enabled && self.remote.is_none() {
            return Err(HarnessError::Config(format!(
                "remote testing is enabled but {} / {} are not set",
                ENV_SAUCE_USERNAME, ENV_SAUCE_ACCESS_KEY
            )));
        }
        self.tolerance.validate()?;
        if self.manifest.file_name.is_empty() {
            return Err(HarnessError::Config("manifest file name is empty".to_string()));
        }
        Ok(())
    }
}
