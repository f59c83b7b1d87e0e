//! Stand-in converter speaking the pdf2htmlEX command line
//!
//! Usage: stub-converter [--data-dir DIR] [--dest-dir DIR] [OPTIONS] <input> [output]

use std::process::ExitCode;

use anyhow::Result;
use golden_harness_test_suite::stub::{convert, ConverterInvocation, CRASH_EXIT_CODE};

fn main() -> Result<ExitCode> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.first().map(String::as_str) == Some("--version") {
        println!("stub-converter {}", env!("CARGO_PKG_VERSION"));
        return Ok(ExitCode::SUCCESS);
    }

    let invocation = ConverterInvocation::parse(args)?;
    let conversion = convert(&invocation)?;
    for file in &conversion.files {
        eprintln!("wrote {}", file);
    }
    if conversion.crashed {
        eprintln!("simulated crash after writing output");
        return Ok(ExitCode::from(CRASH_EXIT_CODE as u8));
    }
    Ok(ExitCode::SUCCESS)
}
