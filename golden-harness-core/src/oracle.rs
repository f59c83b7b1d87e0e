//! Golden-file oracles
//!
//! A run either verifies fresh output against recorded references or records
//! fresh output as the new references. The choice is made once, when the
//! harness is built, by picking one [`GoldenOracle`] implementation.

use std::fmt::Debug;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use crate::compare::{self, Comparison, OracleVerdict};
use crate::config::{HarnessConfig, OracleMode};
use crate::error::{HarnessError, Result};
use crate::render::Renderer;
use crate::workspace::copy_tree;

pub use crate::compare::Tolerance;

/// Suffix of the diff image written for a failed comparison
pub const DIFF_SUFFIX: &str = ".diff.png";
/// Suffix of the screenshot of the fresh output
pub const OUT_SUFFIX: &str = ".out.png";
/// Suffix of the screenshot of the reference tree
pub const REF_SUFFIX: &str = ".ref.png";

/// What an oracle did with a case
#[derive(Debug, Clone, PartialEq)]
pub enum Settlement {
    /// Fresh output became the reference at this path
    Recorded { reference: PathBuf },
    /// Fresh output matched the reference
    Verified(OracleVerdict),
}

/// An HTML output tree checked by rendering it next to its reference tree
#[derive(Debug, Clone, Copy)]
pub struct TreeCase<'a> {
    pub case: &'a str,
    /// Entry document inside both trees
    pub html_name: &'a str,
    pub output_dir: &'a Path,
    pub reference_dir: &'a Path,
    /// Where screenshots and diffs go
    pub render_dir: &'a Path,
    /// Whether the reference tree must reach the ready state
    pub must_load: bool,
}

/// Strategy for settling a case against its golden file.
pub trait GoldenOracle: Debug {
    fn mode(&self) -> OracleMode;

    /// Settle a rendered `candidate` image against the `reference` image.
    fn settle_image(
        &self,
        case: &str,
        candidate: &Path,
        reference: &Path,
        diagnostics_dir: &Path,
    ) -> Result<Settlement>;

    /// Settle an HTML output tree against a reference tree.
    fn settle_tree(&self, tree: &TreeCase<'_>, renderer: &mut dyn Renderer) -> Result<Settlement>;
}

/// Pick the oracle for the configured mode.
pub fn oracle_for(config: &HarnessConfig) -> Box<dyn GoldenOracle> {
    match config.mode {
        OracleMode::Verify => Box::new(VerifyingOracle::new(config.tolerance)),
        OracleMode::Record => Box::new(RecordingOracle),
    }
}

/// Compares against existing references and fails on mismatch
#[derive(Debug, Clone)]
pub struct VerifyingOracle {
    tolerance: Tolerance,
    persist_diff: bool,
}

impl VerifyingOracle {
    pub fn new(tolerance: Tolerance) -> Self {
        Self {
            tolerance,
            persist_diff: true,
        }
    }

    /// Skip writing diff images on failure.
    pub fn without_diff_images(mut self) -> Self {
        self.persist_diff = false;
        self
    }

    fn check(&self, case: &str, candidate: &Path, reference: &Path, diagnostics_dir: &Path) -> Result<OracleVerdict> {
        if !reference.exists() {
            return Err(HarnessError::MissingReference(reference.to_path_buf()));
        }
        let expected = compare::load_rgba(reference)?;
        let actual = compare::load_rgba(candidate)?;

        let verdict = match compare::compare(&expected, &actual, &self.tolerance) {
            Comparison::DimensionMismatch {
                reference,
                candidate,
            } => return Err(HarnessError::DimensionMismatch { reference, candidate }),
            Comparison::Compared(verdict) => verdict,
        };
        if verdict.pass {
            info!(case, "{}", verdict.summary());
            return Ok(verdict);
        }

        let diff_image = if self.persist_diff {
            match compare::difference_image(&expected, &actual) {
                Some(diff) => {
                    fs::create_dir_all(diagnostics_dir)?;
                    let path = diagnostics_dir.join(format!("{}{}", case, DIFF_SUFFIX));
                    diff.save(&path)?;
                    Some(path)
                }
                None => None,
            }
        } else {
            None
        };
        warn!(case, "{}", verdict.summary());

        Err(HarnessError::PixelMismatch {
            candidate: candidate.to_path_buf(),
            reference: reference.to_path_buf(),
            diff_pixels: verdict.diff_pixel_count,
            bbox_pixels: verdict.diff_region.map(|r| r.area()).unwrap_or(0),
            ratio: verdict.diff_ratio,
            total_pixels: verdict.total_pixels,
            diff_image,
        })
    }
}

impl GoldenOracle for VerifyingOracle {
    fn mode(&self) -> OracleMode {
        OracleMode::Verify
    }

    fn settle_image(
        &self,
        case: &str,
        candidate: &Path,
        reference: &Path,
        diagnostics_dir: &Path,
    ) -> Result<Settlement> {
        self.check(case, candidate, reference, diagnostics_dir)
            .map(Settlement::Verified)
    }

    /// Render the fresh tree, then the reference tree, and compare the shots.
    fn settle_tree(&self, tree: &TreeCase<'_>, renderer: &mut dyn Renderer) -> Result<Settlement> {
        let reference_html = tree.reference_dir.join(tree.html_name);
        if !reference_html.exists() {
            return Err(HarnessError::MissingReference(reference_html));
        }
        fs::create_dir_all(tree.render_dir)?;

        let out_png = tree.render_dir.join(format!("{}{}", tree.case, OUT_SUFFIX));
        renderer.render(&tree.output_dir.join(tree.html_name), &out_png, true)?;

        let ref_png = tree.render_dir.join(format!("{}{}", tree.case, REF_SUFFIX));
        renderer.render(&reference_html, &ref_png, tree.must_load)?;

        self.settle_image(tree.case, &out_png, &ref_png, tree.render_dir)
    }
}

/// Metadata written next to a recorded reference image
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceRecord {
    pub case: String,
    pub recorded_at: DateTime<Utc>,
    /// Hex SHA-256 of the reference file
    pub sha256: String,
}

impl ReferenceRecord {
    /// Sidecar path for `reference`: `<base>.ref.json`.
    pub fn path_for(reference: &Path) -> PathBuf {
        reference.with_extension("ref.json")
    }

    pub fn read(reference: &Path) -> Result<Self> {
        let content = fs::read_to_string(Self::path_for(reference))?;
        Ok(serde_json::from_str(&content)?)
    }
}

/// Rewrites references from fresh output
#[derive(Debug, Clone, Copy, Default)]
pub struct RecordingOracle;

impl GoldenOracle for RecordingOracle {
    fn mode(&self) -> OracleMode {
        OracleMode::Record
    }

    fn settle_image(
        &self,
        case: &str,
        candidate: &Path,
        reference: &Path,
        _diagnostics_dir: &Path,
    ) -> Result<Settlement> {
        if let Some(parent) = reference.parent() {
            fs::create_dir_all(parent)?;
        }
        let bytes = fs::read(candidate)?;
        fs::write(reference, &bytes)?;

        let record = ReferenceRecord {
            case: case.to_string(),
            recorded_at: Utc::now(),
            sha256: hex::encode(Sha256::digest(&bytes)),
        };
        fs::write(
            ReferenceRecord::path_for(reference),
            serde_json::to_string_pretty(&record)?,
        )?;

        info!(case, reference = %reference.display(), "recorded reference image");
        Ok(Settlement::Recorded {
            reference: reference.to_path_buf(),
        })
    }

    /// Replace the reference tree with the output tree; nothing is rendered.
    fn settle_tree(&self, tree: &TreeCase<'_>, _renderer: &mut dyn Renderer) -> Result<Settlement> {
        if tree.reference_dir.exists() {
            fs::remove_dir_all(tree.reference_dir)?;
        }
        copy_tree(tree.output_dir, tree.reference_dir)?;

        info!(case = tree.case, reference = %tree.reference_dir.display(), "recorded reference tree");
        Ok(Settlement::Recorded {
            reference: tree.reference_dir.to_path_buf(),
        })
    }
}
