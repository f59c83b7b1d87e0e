//! Stand-in rasterizer speaking the wkhtmltoimage command line
//!
//! Usage: stub-rasterizer [-f png] [--width N] [--height N] [--crop-x N ...] <source> <dest>

use anyhow::Result;
use golden_harness_test_suite::stub::{rasterize_file, RasterInvocation};

fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.first().map(String::as_str) == Some("--version") {
        println!("stub-rasterizer {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }
    rasterize_file(&RasterInvocation::parse(args)?)
}
