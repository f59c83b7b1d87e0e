use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use golden_harness::compare::{self, Comparison};
use golden_harness::config::ManifestMarkers;
use golden_harness::render::{self, StaticRenderer, DEFAULT_RASTERIZER};
use golden_harness::suite::HINT_TOOL;
use golden_harness::{
    manifest, require_tool, CaseOutcome, Catalog, Harness, HarnessConfig, HarnessError, Tolerance,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(
    name = "golden-harness",
    about = "Golden-file regression harness for pdf2htmlEX",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the file names a page template expands to
    Expand {
        /// Page filename template (e.g. "foo%03d.xyz")
        template: String,

        /// Number of pages to expand
        #[arg(short, long, default_value_t = 1)]
        pages: u32,
    },

    /// Compare a candidate image against a reference image
    Compare {
        /// Reference image
        reference: PathBuf,

        /// Candidate image
        candidate: PathBuf,

        /// Write the difference image here on mismatch
        #[arg(short, long)]
        diff: Option<PathBuf>,

        /// Accept while the differing fraction stays below this ratio
        #[arg(long, conflicts_with = "max_pixels")]
        max_ratio: Option<f64>,

        /// Accept while at most this many pixels differ
        #[arg(long)]
        max_pixels: Option<u64>,

        /// Print the verdict as JSON
        #[arg(long)]
        json: bool,
    },

    /// Copy a manifest into a directory without its ignore regions
    FilterManifest {
        /// Source manifest
        source: PathBuf,

        /// Destination directory
        dest_dir: PathBuf,

        /// Extra files copied next to the manifest
        #[arg(short, long = "asset")]
        assets: Vec<PathBuf>,
    },

    /// Run every case of a JSON catalog
    Run {
        /// Catalog file
        catalog: PathBuf,

        /// Harness configuration file (defaults to the environment)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

fn main() -> Result<ExitCode> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "golden_harness=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Expand { template, pages } => {
            for page in 1..=pages {
                println!("{}", golden_harness::expand(&template, page));
            }
            Ok(ExitCode::SUCCESS)
        }

        Commands::Compare {
            reference,
            candidate,
            diff,
            max_ratio,
            max_pixels,
            json,
        } => {
            let tolerance = match (max_ratio, max_pixels) {
                (Some(ratio), _) => Tolerance::MaxRatio(ratio),
                (None, Some(pixels)) => Tolerance::MaxPixels(pixels),
                (None, None) => Tolerance::Exact,
            };
            tolerance.validate()?;
            compare_images(&reference, &candidate, diff.as_deref(), &tolerance, json)
        }

        Commands::FilterManifest {
            source,
            dest_dir,
            assets,
        } => {
            fs::create_dir_all(&dest_dir)
                .with_context(|| format!("cannot create {}", dest_dir.display()))?;
            let file_name = source
                .file_name()
                .with_context(|| format!("{} has no file name", source.display()))?;
            let stats = manifest::filter(
                &source,
                &dest_dir.join(file_name),
                &assets,
                &ManifestMarkers::default(),
            )?;

            println!(
                "Kept {} lines, dropped {}, copied {} assets",
                stats.kept,
                stats.dropped,
                assets.len()
            );
            if stats.unterminated {
                println!("Warning: ignore region never closed");
            }
            Ok(ExitCode::SUCCESS)
        }

        Commands::Run { catalog, config } => {
            let config = match config {
                Some(path) => HarnessConfig::from_json_file(&path)
                    .with_context(|| format!("cannot load config {}", path.display()))?,
                None => HarnessConfig::from_env(),
            };
            let catalog = Catalog::from_json_file(&catalog)
                .with_context(|| format!("cannot load catalog {}", catalog.display()))?;
            run_catalog(config, &catalog)
        }
    }
}

fn compare_images(
    reference: &Path,
    candidate: &Path,
    diff: Option<&Path>,
    tolerance: &Tolerance,
    json: bool,
) -> Result<ExitCode> {
    let expected = compare::load_rgba(reference)
        .with_context(|| format!("cannot read {}", reference.display()))?;
    let actual = compare::load_rgba(candidate)
        .with_context(|| format!("cannot read {}", candidate.display()))?;

    let verdict = match compare::compare(&expected, &actual, tolerance) {
        Comparison::DimensionMismatch {
            reference,
            candidate,
        } => {
            eprintln!("{}", HarnessError::DimensionMismatch { reference, candidate });
            return Ok(ExitCode::from(2));
        }
        Comparison::Compared(verdict) => verdict,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&verdict)?);
    } else {
        println!("{}", verdict.summary());
    }

    if verdict.pass {
        return Ok(ExitCode::SUCCESS);
    }
    if let Some(path) = diff {
        if let Some(image) = compare::difference_image(&expected, &actual) {
            image
                .save(path)
                .with_context(|| format!("cannot write {}", path.display()))?;
            println!("Difference image: {}", path.display());
        }
    }
    Ok(ExitCode::from(1))
}

fn report(name: &str, outcome: golden_harness::Result<CaseOutcome>, failures: &mut usize) {
    match outcome {
        Ok(CaseOutcome::Skipped(reason)) => println!("SKIP {}: {}", name, reason),
        Ok(CaseOutcome::FailedAsExpected(_)) => println!("PASS {} (failed as expected)", name),
        Ok(_) => println!("PASS {}", name),
        Err(e) => {
            *failures += 1;
            println!("FAIL {}: {}", name, e);
        }
    }
}

fn run_catalog(config: HarnessConfig, catalog: &Catalog) -> Result<ExitCode> {
    let harness = Harness::new(config)?;
    info!(cases = catalog.len(), "running catalog");
    let mut failures = 0;

    for case in &catalog.output {
        report(&case.name, harness.check_outputs(case), &mut failures);
    }

    if !catalog.conversion.is_empty() {
        require_tool(DEFAULT_RASTERIZER)?;
        require_tool(HINT_TOOL)?;
        let renderer = StaticRenderer::wkhtmltoimage();
        for case in &catalog.conversion {
            report(&case.name, harness.check_conversion(case, &renderer), &mut failures);
        }
    }

    if !catalog.browser.is_empty() {
        let mut renderers = render::browser_renderers(harness.config(), Path::new("/"))?;
        for renderer in renderers.iter_mut() {
            for case in &catalog.browser {
                let name = format!("{} [{}]", case.name, renderer.name());
                report(&name, harness.check_browser(case, renderer.as_mut()), &mut failures);
            }
            renderer.shutdown()?;
        }
    }

    println!("{} cases, {} failed", catalog.len(), failures);
    Ok(if failures == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    })
}
