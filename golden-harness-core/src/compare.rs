//! Pixel comparison of rendered output against reference images

use std::path::Path;

use image::{Rgb, RgbImage, RgbaImage};
use serde::{Deserialize, Serialize};

use crate::error::{HarnessError, Result};

/// How much difference a comparison accepts before failing.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tolerance {
    /// Any differing pixel fails
    #[default]
    Exact,
    /// Pass while at most this many pixels differ
    MaxPixels(u64),
    /// Pass while the differing fraction of the image is below this ratio (0.0-1.0)
    MaxRatio(f64),
}

impl Tolerance {
    pub fn accepts(&self, diff_pixels: u64, diff_ratio: f64) -> bool {
        if diff_pixels == 0 {
            return true;
        }
        match *self {
            Tolerance::Exact => false,
            Tolerance::MaxPixels(max) => diff_pixels <= max,
            Tolerance::MaxRatio(max) => diff_ratio < max,
        }
    }

    pub fn validate(&self) -> Result<()> {
        match *self {
            Tolerance::MaxRatio(max) if !max.is_finite() || max < 0.0 => Err(
                HarnessError::Config(format!("ratio tolerance must be a finite value >= 0, got {}", max)),
            ),
            _ => Ok(()),
        }
    }
}

/// Axis-aligned pixel rectangle; `right` and `bottom` are exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub left: u32,
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
}

impl Rect {
    pub fn width(&self) -> u32 {
        self.right - self.left
    }

    pub fn height(&self) -> u32 {
        self.bottom - self.top
    }

    pub fn area(&self) -> u64 {
        self.width() as u64 * self.height() as u64
    }

    fn include(region: &mut Option<Rect>, x: u32, y: u32) {
        match region {
            None => {
                *region = Some(Rect {
                    left: x,
                    top: y,
                    right: x + 1,
                    bottom: y + 1,
                })
            }
            Some(rect) => {
                rect.left = rect.left.min(x);
                rect.top = rect.top.min(y);
                rect.right = rect.right.max(x + 1);
                rect.bottom = rect.bottom.max(y + 1);
            }
        }
    }
}

/// Outcome of comparing two same-sized images
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OracleVerdict {
    pub pass: bool,
    /// Bounding box of all differing pixels; `None` when pixel-identical
    pub diff_region: Option<Rect>,
    pub diff_pixel_count: u64,
    /// `diff_pixel_count` over the image area
    pub diff_ratio: f64,
    pub total_pixels: u64,
}

impl OracleVerdict {
    /// Human-readable one-line summary
    pub fn summary(&self) -> String {
        match self.diff_region {
            None => format!("Images are identical ({} pixels)", self.total_pixels),
            Some(region) => format!(
                "{} {} of {} pixels differ ({:.6}%) within {}x{} at ({}, {})",
                if self.pass { "Accepted:" } else { "Mismatch:" },
                self.diff_pixel_count,
                self.total_pixels,
                self.diff_ratio * 100.0,
                region.width(),
                region.height(),
                region.left,
                region.top
            ),
        }
    }
}

/// Result of [`compare`]
#[derive(Debug, Clone, PartialEq)]
pub enum Comparison {
    /// Sizes differ; pixels were not compared
    DimensionMismatch {
        reference: (u32, u32),
        candidate: (u32, u32),
    },
    Compared(OracleVerdict),
}

impl Comparison {
    pub fn passed(&self) -> bool {
        matches!(self, Comparison::Compared(verdict) if verdict.pass)
    }

    pub fn verdict(&self) -> Option<&OracleVerdict> {
        match self {
            Comparison::Compared(verdict) => Some(verdict),
            Comparison::DimensionMismatch { .. } => None,
        }
    }
}

/// Compare `candidate` against `reference`.
///
/// A pixel differs when any of its four channels differ.
pub fn compare(reference: &RgbaImage, candidate: &RgbaImage, tolerance: &Tolerance) -> Comparison {
    let reference_dims = reference.dimensions();
    let candidate_dims = candidate.dimensions();
    if reference_dims != candidate_dims {
        return Comparison::DimensionMismatch {
            reference: reference_dims,
            candidate: candidate_dims,
        };
    }

    let total_pixels = reference_dims.0 as u64 * reference_dims.1 as u64;
    let mut diff_region = None;
    let mut diff_pixel_count = 0u64;

    for ((x, y, expected), actual) in reference.enumerate_pixels().zip(candidate.pixels()) {
        if expected != actual {
            diff_pixel_count += 1;
            Rect::include(&mut diff_region, x, y);
        }
    }

    let diff_ratio = if total_pixels > 0 {
        diff_pixel_count as f64 / total_pixels as f64
    } else {
        0.0
    };

    Comparison::Compared(OracleVerdict {
        pass: tolerance.accepts(diff_pixel_count, diff_ratio),
        diff_region,
        diff_pixel_count,
        diff_ratio,
        total_pixels,
    })
}

/// Per-channel absolute difference of two same-sized images, as RGB.
///
/// Alpha is not drawn, so a pixel that differs only in alpha is black here
/// even though [`compare`] counts it. Returns `None` when the dimensions differ.
pub fn difference_image(reference: &RgbaImage, candidate: &RgbaImage) -> Option<RgbImage> {
    if reference.dimensions() != candidate.dimensions() {
        return None;
    }
    let (width, height) = reference.dimensions();
    Some(RgbImage::from_fn(width, height, |x, y| {
        let a = reference.get_pixel(x, y);
        let b = candidate.get_pixel(x, y);
        Rgb([
            a[0].abs_diff(b[0]),
            a[1].abs_diff(b[1]),
            a[2].abs_diff(b[2]),
        ])
    }))
}

/// Load any supported raster file as RGBA.
pub fn load_rgba(path: &Path) -> Result<RgbaImage> {
    Ok(image::open(path)?.to_rgba8())
}
