//! # golden-harness
//!
//! Golden-file regression testing for a PDF-to-HTML converter.
//!
//! ## Features
//!
//! - **Isolated workspaces**: every case gets its own scratch tree, or one fixed
//!   inspectable tree when preserving
//! - **Manifest staging**: the shared manifest is copied in with its test-only
//!   regions stripped
//! - **Converter invocation**: exit status and output listing of one run
//! - **Filename templates**: the page-numbering rules of split-page output
//! - **Image oracles**: pixel comparison with a tolerance policy, or recording
//!   of new references
//! - **Renderers**: static rasterizer, local browser and remote browsers behind
//!   one trait
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use golden_harness::{Harness, HarnessConfig, OutputCase, Result};
//!
//! # fn main() -> Result<()> {
//! let harness = Harness::new(HarnessConfig::from_env())?;
//!
//! let case = OutputCase::new("split_padded", "3-pages.pdf")
//!     .args(["--split-pages", "1", "--page-filename", "foo%03d.xyz"])
//!     .expect(["3-pages.html", "foo001.xyz", "foo002.xyz", "foo003.xyz"]);
//! harness.check_outputs(&case)?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Templates
//!
//! ```rust
//! use golden_harness::template::expand;
//!
//! assert_eq!(expand("fo%03do.xyz", 7), "fo007o.xyz");
//! assert_eq!(expand("f%do%do.xyz", 1), "f1o%do.xyz");
//! assert_eq!(expand("f%soo.xyz", 4), "f%soo.xyz");
//! ```

pub mod compare;
pub mod config;
pub mod error;
pub mod fileset;
pub mod harness;
pub mod invoke;
pub mod manifest;
pub mod oracle;
pub mod render;
pub mod suite;
pub mod template;
pub mod workspace;

pub use compare::{compare, Comparison, OracleVerdict, Rect, Tolerance};
pub use config::{HarnessConfig, ManifestSpec, OracleMode, RemoteCredentials};
pub use error::{HarnessError, Result};
pub use fileset::assert_outputs;
pub use harness::{CaseRun, Harness};
pub use invoke::{require_tool, ConverterArgs, ConverterInvoker, InvocationResult};
pub use oracle::{oracle_for, GoldenOracle, RecordingOracle, Settlement, VerifyingOracle};
pub use render::{Renderer, StaticRenderer};
pub use suite::{BrowserCase, CaseOutcome, Catalog, ConversionCase, OutputCase};
pub use template::{expand, PageNaming, Template};
pub use workspace::{Workspace, WorkspaceManager};

/// Current version of golden-harness
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_info() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_default_config_builds_a_verifying_harness() {
        let harness = Harness::new(HarnessConfig::default()).unwrap();
        assert_eq!(harness.oracle().mode(), OracleMode::Verify);
        assert!(!harness.generating());
    }
}
