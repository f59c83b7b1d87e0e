use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum HarnessError {
    #[error("Environment error: {tool} is not usable: {reason}")]
    Environment { tool: String, reason: String },

    #[error("cannot execute {}: {}", .binary.display(), describe_exit(.exit_code))]
    Invocation {
        binary: PathBuf,
        exit_code: Option<i32>,
    },

    #[error("Output files differ: missing {missing:?}, unexpected {unexpected:?}")]
    OutputMismatch {
        missing: Vec<String>,
        unexpected: Vec<String>,
    },

    #[error("Page {source_ref} did not show #{marker} within {timeout:?}")]
    RenderTimeout {
        source_ref: String,
        marker: String,
        timeout: Duration,
    },

    #[error("Render error for {source_ref}: {reason}")]
    Render { source_ref: String, reason: String },

    #[error(
        "Image dimensions differ: reference {}x{}, candidate {}x{}",
        .reference.0, .reference.1, .candidate.0, .candidate.1
    )]
    DimensionMismatch {
        reference: (u32, u32),
        candidate: (u32, u32),
    },

    #[error(
        "PNG files {} and {} differ by at most {bbox_pixels} pixels ({diff_pixels} changed, {:.6}% of {total_pixels} pixels in total), difference: {}",
        .candidate.display(),
        .reference.display(),
        percent(.ratio),
        describe_diff_image(.diff_image)
    )]
    PixelMismatch {
        candidate: PathBuf,
        reference: PathBuf,
        diff_pixels: u64,
        bbox_pixels: u64,
        ratio: f64,
        total_pixels: u64,
        diff_image: Option<PathBuf>,
    },

    #[error("Case {0} was expected to fail but passed")]
    UnexpectedPass(String),

    #[error("No reference at {}; record it with P2H_TEST_GEN=1", .0.display())]
    MissingReference(PathBuf),

    #[error("Remote service error: {0}")]
    RemoteService(String),

    #[error("Preserved workspace lock {} is held by a running process", .0.display())]
    WorkspaceBusy(PathBuf),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl HarnessError {
    /// Failures of the surroundings rather than of the converter under test.
    pub fn is_environment(&self) -> bool {
        matches!(
            self,
            HarnessError::Environment { .. }
                | HarnessError::RemoteService(_)
                | HarnessError::WorkspaceBusy(_)
        )
    }

    /// Failures produced by an oracle judging converter output.
    pub fn is_assertion(&self) -> bool {
        matches!(
            self,
            HarnessError::OutputMismatch { .. }
                | HarnessError::DimensionMismatch { .. }
                | HarnessError::PixelMismatch { .. }
                | HarnessError::UnexpectedPass(_)
        )
    }
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exited with status {}", code),
        None => "terminated by signal".to_string(),
    }
}

fn percent(ratio: &f64) -> f64 {
    ratio * 100.0
}

fn describe_diff_image(path: &Option<PathBuf>) -> String {
    path.as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "not saved".to_string())
}

pub type Result<T> = std::result::Result<T, HarnessError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Error as IoError, ErrorKind};

    #[test]
    fn test_invocation_error_display() {
        let error = HarnessError::Invocation {
            binary: PathBuf::from("pdf2htmlEX"),
            exit_code: Some(3),
        };
        assert_eq!(error.to_string(), "cannot execute pdf2htmlEX: exited with status 3");

        let error = HarnessError::Invocation {
            binary: PathBuf::from("pdf2htmlEX"),
            exit_code: None,
        };
        assert_eq!(error.to_string(), "cannot execute pdf2htmlEX: terminated by signal");
    }

    #[test]
    fn test_dimension_mismatch_display() {
        let error = HarnessError::DimensionMismatch {
            reference: (800, 600),
            candidate: (800, 1200),
        };
        insta::assert_snapshot!(
            error.to_string(),
            @"Image dimensions differ: reference 800x600, candidate 800x1200"
        );
    }

    #[test]
    fn test_output_mismatch_display() {
        let error = HarnessError::OutputMismatch {
            missing: vec!["foo3.xyz".to_string()],
            unexpected: vec!["foo03.xyz".to_string()],
        };
        insta::assert_snapshot!(
            error.to_string(),
            @r#"Output files differ: missing ["foo3.xyz"], unexpected ["foo03.xyz"]"#
        );
    }

    #[test]
    fn test_error_from_io_error() {
        let io_error = IoError::new(ErrorKind::NotFound, "file not found");
        let error = HarnessError::from(io_error);

        match error {
            HarnessError::Io(ref err) => {
                assert_eq!(err.kind(), ErrorKind::NotFound);
            }
            _ => panic!("Expected IO error variant"),
        }
    }

    #[test]
    fn test_error_classification() {
        let environment = vec![
            HarnessError::Environment {
                tool: "wkhtmltoimage".to_string(),
                reason: "not found".to_string(),
            },
            HarnessError::RemoteService("connection refused".to_string()),
            HarnessError::WorkspaceBusy(PathBuf::from("/tmp/preserved.lock")),
        ];
        for error in &environment {
            assert!(error.is_environment(), "{error}");
            assert!(!error.is_assertion(), "{error}");
        }

        let assertions = vec![
            HarnessError::OutputMismatch {
                missing: vec![],
                unexpected: vec!["extra.html".to_string()],
            },
            HarnessError::DimensionMismatch {
                reference: (1, 1),
                candidate: (2, 2),
            },
        ];
        for error in &assertions {
            assert!(error.is_assertion(), "{error}");
            assert!(!error.is_environment(), "{error}");
        }

        let invocation = HarnessError::Invocation {
            binary: PathBuf::from("conv"),
            exit_code: Some(1),
        };
        assert!(!invocation.is_environment());
        assert!(!invocation.is_assertion());
    }
}
