//! The three regression suites
//!
//! - output: the converter must succeed and write exactly the expected files
//! - conversion: the output is rasterized by a static tool and compared with
//!   a reference PNG
//! - browser: the output tree and its reference tree are both rendered in a
//!   browser and the screenshots compared
//!
//! Case inputs are resolved under `<fixtures_dir>/<suite directory>`.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{HarnessError, Result};
use crate::harness::Harness;
use crate::invoke::{ConverterArgs, InvocationResult};
use crate::oracle::Settlement;
use crate::render::{Renderer, StaticRenderer};
use crate::template::PageNaming;

pub const OUTPUT_SUITE: &str = "test_output";
pub const CONVERSION_SUITE: &str = "test_conversion";
pub const BROWSER_SUITE: &str = "browser_tests";

/// Hinting tool the conversion suite passes to the converter
pub const HINT_TOOL: &str = "ttfautohint";

/// Converter arguments every conversion case starts with
pub fn conversion_default_args() -> ConverterArgs {
    ConverterArgs::new()
        .opt("--external-hint-tool", HINT_TOOL)
        .opt("--fit-width", 800)
        .opt("--last-page", 1)
        .opt("--correct-text-visibility", 1)
}

/// Converter arguments every browser case starts with
pub fn browser_default_args() -> ConverterArgs {
    ConverterArgs::new().opt("--fit-width", 800).opt("--last-page", 1)
}

/// Checks only which files the converter writes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputCase {
    pub name: String,
    pub input: String,
    /// Passed after the input file
    #[serde(default)]
    pub args: ConverterArgs,
    /// When absent only success is checked
    #[serde(default)]
    pub expected_files: Option<BTreeSet<String>>,
}

impl OutputCase {
    pub fn new(name: &str, input: &str) -> Self {
        Self {
            name: name.to_string(),
            input: input.to_string(),
            args: ConverterArgs::new(),
            expected_files: None,
        }
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = self.args.extend(args);
        self
    }

    pub fn expect<I, S>(mut self, files: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.expected_files = Some(files.into_iter().map(Into::into).collect());
        self
    }

    /// Expect the files a `pages`-page conversion should produce, as derived
    /// from the case's own arguments.
    pub fn expect_derived(self, pages: u32) -> Self {
        let expected = derive_expected_files(&self.input, &self.args, pages);
        Self {
            expected_files: Some(expected),
            ..self
        }
    }
}

/// Rasterized with a static tool and compared with `<input stem>.png`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionCase {
    pub name: String,
    pub input: String,
    #[serde(default)]
    pub converter_args: ConverterArgs,
    /// Extra rasterizer arguments such as crop or height
    #[serde(default)]
    pub render_args: Vec<String>,
}

/// Rendered in a browser next to the reference tree `<input stem>/`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrowserCase {
    pub name: String,
    pub input: String,
    #[serde(default)]
    pub args: ConverterArgs,
    /// Whether the reference tree must reach the ready state
    #[serde(default = "default_true")]
    pub must_load: bool,
    /// The comparison itself is expected to fail
    #[serde(default)]
    pub expect_failure: bool,
}

fn default_true() -> bool {
    true
}

/// A set of cases, loadable from JSON
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Catalog {
    pub output: Vec<OutputCase>,
    pub conversion: Vec<ConversionCase>,
    pub browser: Vec<BrowserCase>,
}

impl Catalog {
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn len(&self) -> usize {
        self.output.len() + self.conversion.len() + self.browser.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// How a case ended when it did not fail
#[derive(Debug, Clone, PartialEq)]
pub enum CaseOutcome {
    /// Output files were checked; no golden file involved
    Checked,
    Settled(Settlement),
    /// A self-check case failed the way it should
    FailedAsExpected(String),
    Skipped(&'static str),
}

/// Files a conversion of `input` with `args` should write for `pages` pages.
///
/// The first positional argument names the HTML output; `--split-pages 1`
/// adds one file per page named through `--page-filename`.
pub fn derive_expected_files(input: &str, args: &ConverterArgs, pages: u32) -> BTreeSet<String> {
    let output = positional_output(args.as_slice());
    let naming = PageNaming::resolve(input, output, args.value_of("--page-filename"));
    let split = args
        .value_of("--split-pages")
        .map(|v| v.parse::<i64>().map(|n| n != 0).unwrap_or(false))
        .unwrap_or(false);
    if split {
        naming.split_outputs(pages)
    } else {
        naming.single_output()
    }
}

/// First argument that is neither an option nor an option's value.
fn positional_output(args: &[String]) -> Option<&str> {
    let mut args = args.iter();
    while let Some(arg) = args.next() {
        if arg.starts_with('-') && arg.len() > 1 {
            args.next();
        } else {
            return Some(arg.as_str());
        }
    }
    None
}

/// Stem of a `.pdf` input, rejecting anything else.
fn pdf_stem(input: &str) -> Result<String> {
    let name = Path::new(input)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let is_pdf = name.len() > 4 && name[name.len() - 4..].eq_ignore_ascii_case(".pdf");
    if !is_pdf {
        return Err(HarnessError::Config(format!("input {} is not a PDF", input)));
    }
    Ok(name[..name.len() - 4].to_string())
}

fn require_html(result: &InvocationResult, html: &str) -> Result<()> {
    if result.output_files.contains(html) {
        Ok(())
    } else {
        Err(HarnessError::OutputMismatch {
            missing: vec![html.to_string()],
            unexpected: Vec::new(),
        })
    }
}

impl Harness {
    fn suite_dir(&self, suite: &str) -> PathBuf {
        self.config().fixtures_dir.join(suite)
    }

    /// Run an output case. Skipped while recording: it has no golden file.
    pub fn check_outputs(&self, case: &OutputCase) -> Result<CaseOutcome> {
        if self.generating() {
            return Ok(CaseOutcome::Skipped("output cases have no references to record"));
        }
        let input = self.suite_dir(OUTPUT_SUITE).join(&case.input);
        let args = ConverterArgs::new()
            .arg(input.display().to_string())
            .extend(case.args.as_slice().iter().cloned());

        let run = self.begin(&case.name)?;
        let result = run.convert(&args)?;
        if let Some(expected) = &case.expected_files {
            run.assert_outputs(&result, expected)?;
        }
        run.finish()?;
        info!(case = %case.name, "output case passed");
        Ok(CaseOutcome::Checked)
    }

    /// Convert, rasterize with `renderer` plus the case's arguments, and
    /// settle against the reference PNG.
    pub fn check_conversion(&self, case: &ConversionCase, renderer: &StaticRenderer) -> Result<CaseOutcome> {
        let stem = pdf_stem(&case.input)?;
        let html = format!("{}.html", stem);
        let suite_dir = self.suite_dir(CONVERSION_SUITE);
        let args = conversion_default_args()
            .extend(case.converter_args.as_slice().iter().cloned())
            .arg(suite_dir.join(&case.input).display().to_string())
            .arg(html.as_str());

        let run = self.begin(&case.name)?;
        let result = run.convert(&args)?;
        require_html(&result, &html)?;

        let render_dir = run.workspace().ensure_render_dir()?;
        let png = render_dir.join(format!("{}.png", stem));
        let mut renderer = renderer.with_extra_args(case.render_args.iter().cloned());
        renderer.render(&run.workspace().output_dir().join(&html), &png, true)?;

        let settlement = run.settle_image(&png, &suite_dir.join(format!("{}.png", stem)))?;
        run.finish()?;
        Ok(CaseOutcome::Settled(settlement))
    }

    /// Convert and settle the output tree through `renderer`, then report
    /// the outcome to the renderer.
    pub fn check_browser(&self, case: &BrowserCase, renderer: &mut dyn Renderer) -> Result<CaseOutcome> {
        if case.expect_failure && self.generating() {
            return Ok(CaseOutcome::Skipped("self-check references are written by hand"));
        }

        let outcome = self.settle_browser_case(case, renderer);
        let outcome = match (outcome, case.expect_failure) {
            (Ok(_), true) => Err(HarnessError::UnexpectedPass(case.name.clone())),
            (Err(e), true) if e.is_assertion() => {
                info!(case = %case.name, "failed as expected: {}", e);
                Ok(CaseOutcome::FailedAsExpected(e.to_string()))
            }
            (outcome, _) => outcome.map(CaseOutcome::Settled),
        };

        if let Err(e) = renderer.conclude(&case.name, outcome.is_ok()) {
            if outcome.is_ok() {
                return Err(e);
            }
            warn!(case = %case.name, "could not report outcome: {}", e);
        }
        outcome
    }

    fn settle_browser_case(&self, case: &BrowserCase, renderer: &mut dyn Renderer) -> Result<Settlement> {
        let stem = pdf_stem(&case.input)?;
        let html = format!("{}.html", stem);
        let suite_dir = self.suite_dir(BROWSER_SUITE);
        let args = browser_default_args()
            .extend(case.args.as_slice().iter().cloned())
            .arg(suite_dir.join(&case.input).display().to_string())
            .arg(html.as_str());

        let run = self.begin(&case.name)?;
        let result = run.convert(&args)?;
        require_html(&result, &html)?;
        let settlement = run.settle_tree(&html, &suite_dir.join(&stem), case.must_load, renderer)?;
        run.finish()?;
        Ok(settlement)
    }
}
