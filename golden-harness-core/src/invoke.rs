//! Running the converter under test

use std::collections::BTreeSet;
use std::ffi::OsString;
use std::fmt::Display;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{HarnessError, Result};

/// Converter arguments after the harness-controlled directory options
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConverterArgs(Vec<String>);

impl ConverterArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arg<S: Into<String>>(mut self, arg: S) -> Self {
        self.0.push(arg.into());
        self
    }

    /// Append `name value`.
    pub fn opt<S: Into<String>, V: Display>(mut self, name: S, value: V) -> Self {
        self.0.push(name.into());
        self.0.push(value.to_string());
        self
    }

    pub fn extend<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.0.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Value following the last occurrence of `name`.
    pub fn value_of(&self, name: &str) -> Option<&str> {
        self.0
            .windows(2)
            .rev()
            .find(|pair| pair[0] == name)
            .map(|pair| pair[1].as_str())
    }
}

impl<S: Into<String>> FromIterator<S> for ConverterArgs {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

impl From<Vec<String>> for ConverterArgs {
    fn from(args: Vec<String>) -> Self {
        Self(args)
    }
}

/// Exit status and produced files of one converter run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationResult {
    /// `None` when the process was killed by a signal
    pub exit_code: Option<i32>,
    /// Immediate entries of the destination directory
    pub output_files: BTreeSet<String>,
}

impl InvocationResult {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Turn a failed run into [`HarnessError::Invocation`].
    pub fn require_success(self, binary: &Path) -> Result<Self> {
        if self.success() {
            Ok(self)
        } else {
            Err(HarnessError::Invocation {
                binary: binary.to_path_buf(),
                exit_code: self.exit_code,
            })
        }
    }
}

/// Runs one converter binary
#[derive(Debug, Clone)]
pub struct ConverterInvoker {
    binary: PathBuf,
}

impl ConverterInvoker {
    pub fn new<P: Into<PathBuf>>(binary: P) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    /// Full argument vector, binary first.
    pub fn argv(&self, data_dir: &Path, dest_dir: &Path, args: &ConverterArgs) -> Vec<OsString> {
        let mut argv: Vec<OsString> = vec![
            self.binary.clone().into_os_string(),
            "--data-dir".into(),
            data_dir.as_os_str().to_os_string(),
            "--dest-dir".into(),
            dest_dir.as_os_str().to_os_string(),
        ];
        argv.extend(args.as_slice().iter().map(OsString::from));
        argv
    }

    /// Run the converter to completion and list what it wrote.
    ///
    /// Blocks without a timeout. A non-zero exit is reported in the result,
    /// not as an error; callers decide via [`InvocationResult::require_success`].
    pub fn invoke(&self, data_dir: &Path, dest_dir: &Path, args: &ConverterArgs) -> Result<InvocationResult> {
        let argv = self.argv(data_dir, dest_dir, args);
        info!(
            binary = %self.binary.display(),
            args = ?args.as_slice(),
            "running converter"
        );

        let status = Command::new(&argv[0])
            .args(&argv[1..])
            .stdin(Stdio::null())
            .status()
            .map_err(|e| spawn_error(&self.binary, e))?;

        let output_files = list_dir(dest_dir)?;
        let result = InvocationResult {
            exit_code: status.code(),
            output_files,
        };
        if result.success() {
            debug!(files = ?result.output_files, "converter finished");
        } else {
            warn!(exit_code = ?result.exit_code, "converter failed");
        }
        Ok(result)
    }
}

fn spawn_error(binary: &Path, e: std::io::Error) -> HarnessError {
    match e.kind() {
        ErrorKind::NotFound | ErrorKind::PermissionDenied => HarnessError::Environment {
            tool: binary.display().to_string(),
            reason: e.to_string(),
        },
        _ => HarnessError::Io(e),
    }
}

/// Names of the immediate entries of `dir`.
pub fn list_dir(dir: &Path) -> Result<BTreeSet<String>> {
    let mut names = BTreeSet::new();
    for entry in fs::read_dir(dir)? {
        names.insert(entry?.file_name().to_string_lossy().into_owned());
    }
    Ok(names)
}

/// Check that `tool --version` runs and succeeds.
///
/// Used as a preflight before any case of a suite that needs the tool.
pub fn require_tool<S: AsRef<std::ffi::OsStr>>(tool: S) -> Result<()> {
    let tool = tool.as_ref();
    let name = tool.to_string_lossy().into_owned();
    let output = Command::new(tool)
        .arg("--version")
        .stdin(Stdio::null())
        .output()
        .map_err(|e| HarnessError::Environment {
            tool: name.clone(),
            reason: e.to_string(),
        })?;

    if !output.status.success() {
        return Err(HarnessError::Environment {
            tool: name,
            reason: format!("--version exited with {}", output.status),
        });
    }
    let version = String::from_utf8_lossy(&output.stdout);
    debug!(tool = %name, version = %version.lines().next().unwrap_or("").trim(), "found tool");
    Ok(())
}
