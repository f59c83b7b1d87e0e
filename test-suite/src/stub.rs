//! Stand-ins for the converter and the rasterizer
//!
//! The stub converter reads a one-line "document" (`pages: N`, optionally
//! followed by body text) and writes the files the real converter would
//! name for it. The stub rasterizer turns HTML bytes into a PNG whose pixels
//! depend only on those bytes. Together they drive the harness end to end
//! without pdf2htmlEX or wkhtmltoimage.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use golden_harness::template::PageNaming;
use image::{imageops, Rgba, RgbaImage};
use sha2::{Digest, Sha256};

/// First line of an input that makes the stub converter crash after writing
pub const CRASH_MARKER: &str = "crash";

/// Prefix of manifest lines that must never reach the converter
const IGNORE_MARKER: &str = "#TEST_IGNORE_";

/// Exit status of a simulated crash
pub const CRASH_EXIT_CODE: i32 = 3;

/// Render a stub document.
pub fn stub_document(pages: u32, body: &str) -> String {
    format!("pages: {}\n{}", pages, body)
}

/// Contents of a stub input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StubDocument {
    pub pages: u32,
    pub body: String,
    pub crash: bool,
}

impl StubDocument {
    pub fn parse(text: &str) -> Result<Self> {
        let mut lines = text.lines().peekable();
        let crash = lines.peek().map(|l| l.trim() == CRASH_MARKER).unwrap_or(false);
        if crash {
            lines.next();
        }

        let header = lines.next().context("empty document")?;
        let pages = header
            .trim()
            .strip_prefix("pages:")
            .with_context(|| format!("expected `pages: N`, got {:?}", header))?
            .trim()
            .parse::<u32>()
            .context("page count is not a number")?;
        if pages == 0 {
            bail!("a document needs at least one page");
        }

        Ok(Self {
            pages,
            body: lines.collect::<Vec<_>>().join("\n"),
            crash,
        })
    }
}

/// Parsed stub converter command line
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConverterInvocation {
    pub data_dir: Option<PathBuf>,
    pub dest_dir: Option<PathBuf>,
    pub split_pages: bool,
    pub page_filename: Option<String>,
    pub last_page: Option<u32>,
    pub input: PathBuf,
    pub output: Option<String>,
}

impl ConverterInvocation {
    /// Parse arguments after the program name. Every option takes a value.
    pub fn parse<I, S>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut invocation = Self::default();
        let mut positional = Vec::new();
        let mut args = args.into_iter().map(Into::<String>::into);

        while let Some(arg) = args.next() {
            if !arg.starts_with('-') || arg == "-" {
                positional.push(arg);
                continue;
            }
            let value = args
                .next()
                .with_context(|| format!("option {} needs a value", arg))?;
            match arg.as_str() {
                "--data-dir" => invocation.data_dir = Some(PathBuf::from(value)),
                "--dest-dir" => invocation.dest_dir = Some(PathBuf::from(value)),
                "--split-pages" => invocation.split_pages = value.parse::<i32>().map(|v| v != 0)?,
                "--page-filename" => invocation.page_filename = Some(value),
                "-l" | "--last-page" => invocation.last_page = Some(value.parse()?),
                _ => {}
            }
        }

        let mut positional = positional.into_iter();
        invocation.input = PathBuf::from(positional.next().context("no input file")?);
        invocation.output = positional.next();
        if let Some(extra) = positional.next() {
            bail!("unexpected argument {}", extra);
        }
        Ok(invocation)
    }
}

/// Files written by one stub conversion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversion {
    pub files: Vec<String>,
    /// The input asked for a crash; files were still written
    pub crashed: bool,
}

/// Convert like the real converter would name things.
pub fn convert(invocation: &ConverterInvocation) -> Result<Conversion> {
    if let Some(data_dir) = &invocation.data_dir {
        let manifest = data_dir.join("manifest");
        let manifest = fs::read_to_string(&manifest)
            .with_context(|| format!("cannot read {}", manifest.display()))?;
        if manifest.lines().any(|line| line.starts_with(IGNORE_MARKER)) {
            bail!("manifest still holds an ignore region");
        }
    }

    let text = fs::read_to_string(&invocation.input)
        .with_context(|| format!("cannot read {}", invocation.input.display()))?;
    let document = StubDocument::parse(&text)?;
    let pages = invocation
        .last_page
        .map(|last| last.clamp(1, document.pages))
        .unwrap_or(document.pages);

    let input_name = invocation.input.to_string_lossy();
    let naming = PageNaming::resolve(
        &input_name,
        invocation.output.as_deref(),
        invocation.page_filename.as_deref(),
    );
    let dest_dir = invocation.dest_dir.clone().unwrap_or_else(|| PathBuf::from("."));
    fs::create_dir_all(&dest_dir)?;

    let mut files = Vec::new();
    let mut html = String::from(
        "<!DOCTYPE html>\n<html><head><meta charset=\"utf-8\"/></head><body>\n<div id=\"page-container\">\n",
    );
    for page in 1..=pages {
        let content = format!(
            "<div class=\"pf\" data-page-no=\"{}\">{}</div>\n",
            page, document.body
        );
        if invocation.split_pages {
            let name = naming.page_file(page);
            write(&dest_dir, &name, &content)?;
            files.push(name);
        } else {
            html.push_str(&content);
        }
    }
    html.push_str("</div>\n</body></html>\n");
    write(&dest_dir, &naming.html, &html)?;
    files.push(naming.html);

    Ok(Conversion {
        files,
        crashed: document.crash,
    })
}

fn write(dir: &Path, name: &str, content: &str) -> Result<()> {
    let path = dir.join(name);
    fs::write(&path, content).with_context(|| format!("cannot write {}", path.display()))
}

/// Parsed stub rasterizer command line (wkhtmltoimage syntax)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterInvocation {
    pub width: u32,
    pub height: u32,
    /// x, y, width, height
    pub crop: Option<(u32, u32, u32, u32)>,
    pub source: PathBuf,
    pub dest: PathBuf,
}

impl RasterInvocation {
    pub fn parse<I, S>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut width = 1024;
        let mut height = 768;
        let mut crop = [None; 4];
        let mut positional = Vec::new();
        let mut args = args.into_iter().map(Into::<String>::into);

        while let Some(arg) = args.next() {
            if arg == "--quiet" || arg == "-q" {
                continue;
            }
            if !arg.starts_with('-') {
                positional.push(arg);
                continue;
            }
            let value = args
                .next()
                .with_context(|| format!("option {} needs a value", arg))?;
            let number = || value.parse::<u32>().with_context(|| format!("{} needs a number", arg));
            match arg.as_str() {
                "-f" | "--format" if value != "png" => {
                    bail!("only png output is supported, got {}", value)
                }
                "-f" | "--format" => {}
                "--width" => width = number()?,
                "--height" => height = number()?,
                "--quality" => {
                    number()?;
                }
                "--crop-x" => crop[0] = Some(number()?),
                "--crop-y" => crop[1] = Some(number()?),
                "--crop-w" => crop[2] = Some(number()?),
                "--crop-h" => crop[3] = Some(number()?),
                other => bail!("unknown option {}", other),
            }
        }

        let crop = match crop {
            [None, None, None, None] => None,
            [x, y, w, h] => Some((
                x.unwrap_or(0),
                y.unwrap_or(0),
                w.unwrap_or(width),
                h.unwrap_or(height),
            )),
        };
        let [source, dest]: [String; 2] = positional
            .try_into()
            .map_err(|rest: Vec<String>| anyhow::anyhow!("expected <source> <dest>, got {:?}", rest))?;

        Ok(Self {
            width,
            height,
            crop,
            source: PathBuf::from(source),
            dest: PathBuf::from(dest),
        })
    }
}

/// Paint `html` into a `width` x `height` image.
///
/// The image is a grid of 16px tiles colored from the SHA-256 of the input,
/// so any change to the HTML changes most tiles.
pub fn rasterize(html: &[u8], width: u32, height: u32) -> RgbaImage {
    let digest = Sha256::digest(html);
    RgbaImage::from_fn(width, height, |x, y| {
        let i = ((x / 16) * 7 + (y / 16) * 13) as usize % (digest.len() - 2);
        Rgba([digest[i], digest[i + 1], digest[i + 2], 255])
    })
}

/// Rasterize the source of `invocation` into its destination.
pub fn rasterize_file(invocation: &RasterInvocation) -> Result<()> {
    let html = fs::read(&invocation.source)
        .with_context(|| format!("cannot read {}", invocation.source.display()))?;
    let page = rasterize(&html, invocation.width, invocation.height);
    let image = match invocation.crop {
        Some((x, y, w, h)) => imageops::crop_imm(&page, x, y, w, h).to_image(),
        None => page,
    };
    image
        .save(&invocation.dest)
        .with_context(|| format!("cannot write {}", invocation.dest.display()))
}
