//! Per-case orchestration
//!
//! A [`Harness`] is built once per run from a [`HarnessConfig`]. Each case
//! goes through [`Harness::begin`], which hands out a [`CaseRun`] owning a
//! fresh workspace with the manifest already staged. Phases run in order
//! (convert, assert, settle) and the workspace is released when the run is
//! finished or dropped.

use std::collections::BTreeSet;
use std::path::Path;

use tracing::{debug, info_span};

use crate::config::HarnessConfig;
use crate::error::Result;
use crate::fileset;
use crate::invoke::{ConverterArgs, ConverterInvoker, InvocationResult};
use crate::manifest;
use crate::oracle::{self, GoldenOracle, Settlement, TreeCase};
use crate::render::Renderer;
use crate::workspace::{Workspace, WorkspaceManager};

/// Shared state for a run of cases
#[derive(Debug)]
pub struct Harness {
    config: HarnessConfig,
    workspaces: WorkspaceManager,
    oracle: Box<dyn GoldenOracle>,
    invoker: ConverterInvoker,
}

impl Harness {
    /// Validate `config` and select the oracle for its mode.
    pub fn new(config: HarnessConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            workspaces: WorkspaceManager::from_config(&config),
            oracle: oracle::oracle_for(&config),
            invoker: ConverterInvoker::new(&config.converter),
            config,
        })
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    pub fn oracle(&self) -> &dyn GoldenOracle {
        self.oracle.as_ref()
    }

    pub fn invoker(&self) -> &ConverterInvoker {
        &self.invoker
    }

    pub fn generating(&self) -> bool {
        self.config.generating()
    }

    /// Set up the workspace for `case`.
    pub fn begin(&self, case: &str) -> Result<CaseRun<'_>> {
        let workspace = self.workspaces.acquire()?;
        manifest::stage(&self.config.data_dir, &workspace.data_dir(), &self.config.manifest)?;
        debug!(case, root = %workspace.root().display(), "case ready");
        Ok(CaseRun {
            harness: self,
            case: case.to_string(),
            workspace,
        })
    }
}

/// One case in flight
#[derive(Debug)]
pub struct CaseRun<'h> {
    harness: &'h Harness,
    case: String,
    workspace: Workspace,
}

impl CaseRun<'_> {
    pub fn case(&self) -> &str {
        &self.case
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    /// Run the converter; a failed run ends the case before any oracle.
    pub fn convert(&self, args: &ConverterArgs) -> Result<InvocationResult> {
        let _span = info_span!("convert", case = %self.case).entered();
        let invoker = &self.harness.invoker;
        invoker
            .invoke(&self.workspace.data_dir(), &self.workspace.output_dir(), args)?
            .require_success(invoker.binary())
    }

    pub fn assert_outputs(&self, result: &InvocationResult, expected: &BTreeSet<String>) -> Result<()> {
        fileset::assert_outputs(&result.output_files, expected)
    }

    /// Settle a rendered image against `reference`, with diagnostics in the
    /// workspace render directory.
    pub fn settle_image(&self, candidate: &Path, reference: &Path) -> Result<Settlement> {
        let render_dir = self.workspace.ensure_render_dir()?;
        self.harness
            .oracle
            .settle_image(&self.case, candidate, reference, &render_dir)
    }

    /// Settle the converter's output tree against `reference_dir`.
    pub fn settle_tree(
        &self,
        html_name: &str,
        reference_dir: &Path,
        must_load: bool,
        renderer: &mut dyn Renderer,
    ) -> Result<Settlement> {
        let render_dir = self.workspace.render_dir();
        let output_dir = self.workspace.output_dir();
        let tree = TreeCase {
            case: &self.case,
            html_name,
            output_dir: &output_dir,
            reference_dir,
            render_dir: &render_dir,
            must_load,
        };
        self.harness.oracle.settle_tree(&tree, renderer)
    }

    /// Release the workspace.
    pub fn finish(self) -> Result<()> {
        self.harness.workspaces.release(self.workspace)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OracleMode;
    use crate::error::HarnessError;
    use std::fs;

    fn config_with_data(root: &Path) -> HarnessConfig {
        let data = root.join("share");
        fs::create_dir_all(&data).unwrap();
        fs::write(data.join("manifest"), "@base.css\n#TEST_IGNORE_BEGIN\nsecret\n#TEST_IGNORE_END\n").unwrap();
        fs::write(data.join("base.css"), "b").unwrap();
        fs::write(data.join("fancy.css"), "f").unwrap();
        HarnessConfig {
            data_dir: data,
            converter: root.join("missing-converter"),
            ..HarnessConfig::default()
        }
    }

    #[test]
    fn test_begin_stages_manifest() {
        let temp_dir = tempfile::tempdir().unwrap();
        let harness = Harness::new(config_with_data(temp_dir.path())).unwrap();
        let run = harness.begin("case").unwrap();

        let data_dir = run.workspace().data_dir();
        assert_eq!(fs::read_to_string(data_dir.join("manifest")).unwrap(), "@base.css\n");
        assert!(data_dir.join("base.css").exists());
        assert!(data_dir.join("fancy.css").exists());
        assert!(run.workspace().output_dir().is_dir());

        let root = run.workspace().root().to_path_buf();
        run.finish().unwrap();
        assert!(!root.exists());
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let config = HarnessConfig {
            remote_enabled: true,
            ..HarnessConfig::default()
        };
        assert!(matches!(Harness::new(config), Err(HarnessError::Config(_))));
    }

    #[test]
    fn test_oracle_follows_mode() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut config = config_with_data(temp_dir.path());
        config.mode = OracleMode::Record;
        let harness = Harness::new(config).unwrap();
        assert!(harness.generating());
        assert_eq!(harness.oracle().mode(), OracleMode::Record);
    }

    #[test]
    fn test_missing_converter_fails_convert() {
        let temp_dir = tempfile::tempdir().unwrap();
        let harness = Harness::new(config_with_data(temp_dir.path())).unwrap();
        let run = harness.begin("case").unwrap();
        let error = run.convert(&ConverterArgs::new()).unwrap_err();
        assert!(error.is_environment(), "{error}");
    }
}
