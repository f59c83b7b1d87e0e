//! Test Suite for golden-harness
//!
//! This crate provides the shipped case catalog, stand-in converter and
//! rasterizer binaries, and helpers that lay out a fixture tree so the
//! harness can be driven end to end.

pub mod catalog;
pub mod stub;

pub use catalog::{browser_cases, conversion_cases, full_catalog, output_cases};
pub use stub::{stub_document, StubDocument};

/// Common test utilities
pub mod utils {
    use std::fs;
    use std::path::{Path, PathBuf};

    use golden_harness::config::{DEFAULT_CONVERTER, ENV_CONVERTER};
    use golden_harness::suite::{BROWSER_SUITE, CONVERSION_SUITE, OUTPUT_SUITE};
    use golden_harness::{require_tool, HarnessConfig};

    use crate::stub::stub_document;

    /// Shared manifest with an ignore region around the fancy stylesheet
    pub const MANIFEST: &str = "\
@base.css
#TEST_IGNORE_BEGIN
@fancy.css
#TEST_IGNORE_END
$css
";

    /// Page counts of the stub inputs in the output suite
    pub const OUTPUT_INPUTS: &[(&str, u32)] = &[
        ("1-page.pdf", 1),
        ("2-pages.pdf", 2),
        ("3-pages.pdf", 3),
        ("issue501", 2),
    ];

    /// A throwaway fixture tree: shared data plus one directory per suite
    pub struct Fixtures {
        root: tempfile::TempDir,
    }

    impl Fixtures {
        pub fn new() -> anyhow::Result<Self> {
            let root = tempfile::tempdir()?;
            let fixtures = Self { root };

            let share = fixtures.data_dir();
            fs::create_dir_all(&share)?;
            fs::write(share.join("manifest"), MANIFEST)?;
            fs::write(share.join("base.css"), "body { margin: 0; }\n")?;
            fs::write(share.join("fancy.css"), ".fancy { color: red; }\n")?;

            for suite in [OUTPUT_SUITE, CONVERSION_SUITE, BROWSER_SUITE] {
                fs::create_dir_all(fixtures.suite_dir(suite))?;
            }
            for (name, pages) in OUTPUT_INPUTS {
                fixtures.write_input(OUTPUT_SUITE, name, &stub_document(*pages, ""))?;
            }
            Ok(fixtures)
        }

        pub fn root(&self) -> &Path {
            self.root.path()
        }

        pub fn data_dir(&self) -> PathBuf {
            self.root().join("share")
        }

        pub fn suite_dir(&self, suite: &str) -> PathBuf {
            self.root().join("fixtures").join(suite)
        }

        /// Where a preserving workspace keeps its files
        pub fn preserve_dir(&self) -> PathBuf {
            self.root().join("preserved")
        }

        /// Write a stub input into a suite directory.
        pub fn write_input(&self, suite: &str, name: &str, content: &str) -> anyhow::Result<PathBuf> {
            let path = self.suite_dir(suite).join(name);
            fs::write(&path, content)?;
            Ok(path)
        }

        /// Verifying configuration running `converter` against this tree.
        pub fn config<P: Into<PathBuf>>(&self, converter: P) -> HarnessConfig {
            HarnessConfig {
                converter: converter.into(),
                data_dir: self.data_dir(),
                fixtures_dir: self.root().join("fixtures"),
                preserve_dir: self.preserve_dir(),
                ..HarnessConfig::default()
            }
        }
    }

    /// The real converter named by `P2H_CONVERTER`, else `pdf2htmlEX` on
    /// `PATH`, if it runs.
    pub fn real_converter() -> Option<PathBuf> {
        let converter = std::env::var_os(ENV_CONVERTER)
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONVERTER));
        require_tool(&converter).ok()?;
        Some(converter)
    }
}
