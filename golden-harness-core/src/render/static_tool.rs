use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tracing::{debug, warn};

use super::Renderer;
use crate::error::{HarnessError, Result};

/// Default HTML rasterizer binary
pub const DEFAULT_RASTERIZER: &str = "wkhtmltoimage";

/// Arguments for an 800x600 PNG page, in wkhtmltoimage syntax
pub const DEFAULT_RASTERIZER_ARGS: &[&str] = &[
    "-f", "png", "--height", "600", "--width", "800", "--quality", "0", "--quiet",
];

/// Renders by running an external HTML-to-image tool
/// as `<program> <base args> <extra args> <source> <dest>`.
#[derive(Debug, Clone)]
pub struct StaticRenderer {
    program: PathBuf,
    base_args: Vec<String>,
    extra_args: Vec<String>,
}

impl StaticRenderer {
    /// wkhtmltoimage with an 800x600 PNG page
    pub fn wkhtmltoimage() -> Self {
        Self::compatible(DEFAULT_RASTERIZER)
    }

    /// Any rasterizer taking wkhtmltoimage arguments, with the default page
    pub fn compatible<P: Into<PathBuf>>(program: P) -> Self {
        Self::new(program).with_base_args(DEFAULT_RASTERIZER_ARGS.iter().map(|s| s.to_string()).collect())
    }

    pub fn new<P: Into<PathBuf>>(program: P) -> Self {
        Self {
            program: program.into(),
            base_args: Vec::new(),
            extra_args: Vec::new(),
        }
    }

    pub fn with_base_args(mut self, args: Vec<String>) -> Self {
        self.base_args = args;
        self
    }

    /// Per-case arguments such as crop or height, placed after the base ones.
    pub fn with_extra_args<I, S>(&self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: self.program.clone(),
            base_args: self.base_args.clone(),
            extra_args: args.into_iter().map(Into::into).collect(),
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn command_line(&self, source: &Path, dest: &Path) -> Vec<String> {
        let mut argv = Vec::with_capacity(self.base_args.len() + self.extra_args.len() + 2);
        argv.extend(self.base_args.iter().cloned());
        argv.extend(self.extra_args.iter().cloned());
        argv.push(source.display().to_string());
        argv.push(dest.display().to_string());
        argv
    }
}

impl Renderer for StaticRenderer {
    fn name(&self) -> &str {
        "static"
    }

    fn render(&mut self, source: &Path, dest: &Path, must_load: bool) -> Result<()> {
        let argv = self.command_line(source, dest);
        debug!(program = %self.program.display(), ?argv, "rasterizing");

        let status = Command::new(&self.program)
            .args(&argv)
            .stdin(Stdio::null())
            .status()
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound | ErrorKind::PermissionDenied => HarnessError::Environment {
                    tool: self.program.display().to_string(),
                    reason: e.to_string(),
                },
                _ => HarnessError::Io(e),
            })?;

        if !status.success() {
            if must_load {
                return Err(HarnessError::Render {
                    source_ref: source.display().to_string(),
                    reason: format!("cannot execute {}: {}", self.program.display(), status),
                });
            }
            warn!(source = %source.display(), %status, "rasterizer failed; keeping partial output");
        }
        if !dest.exists() {
            return Err(HarnessError::Render {
                source_ref: source.display().to_string(),
                reason: format!("{} wrote no image", self.program.display()),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_line_order() {
        let renderer = StaticRenderer::wkhtmltoimage().with_extra_args(["--height", "1100"]);
        let argv = renderer.command_line(Path::new("/ws/output/a.html"), Path::new("/ws/png_out/a.png"));
        assert_eq!(
            argv,
            vec![
                "-f", "png", "--height", "600", "--width", "800", "--quality", "0", "--quiet",
                "--height", "1100", "/ws/output/a.html", "/ws/png_out/a.png"
            ]
        );
        assert_eq!(renderer.program(), Path::new(DEFAULT_RASTERIZER));
    }

    #[test]
    fn test_extra_args_replace_previous_extras() {
        let base = StaticRenderer::new("r").with_extra_args(["--crop-x", "180"]);
        let other = base.with_extra_args(Vec::<String>::new());
        assert_eq!(other.command_line(Path::new("a"), Path::new("b")), vec!["a", "b"]);
    }

    #[test]
    fn test_missing_rasterizer_is_environment_failure() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut renderer = StaticRenderer::new(temp_dir.path().join("no-rasterizer"));
        let error = renderer
            .render(&temp_dir.path().join("a.html"), &temp_dir.path().join("a.png"), true)
            .unwrap_err();
        assert!(error.is_environment(), "{error}");
    }
}
