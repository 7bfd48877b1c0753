//! Thin CLI front end wiring `FsProvider` + `CompilerContext` together and
//! printing diagnostics per spec.md S7. Contains no compiler logic of its
//! own (SPEC_FULL.md "Driver binary").

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use cminor::driver::CompilerContext;
use cminor::preprocessor::source::FsProvider;

#[derive(Parser, Debug)]
#[clap(name = "cminorc", about = "Cminor front-end: preprocess, parse, and semantically analyse")]
struct Args {
    /// Source files to compile.
    #[clap(required = true)]
    sources: Vec<PathBuf>,

    /// Additional search root for `#include`, checked after the including file's own directory.
    #[clap(short = 'I', long = "include", value_name = "DIR")]
    include_dirs: Vec<PathBuf>,

    /// Predefine a macro, as `NAME` or `NAME=VALUE`.
    #[clap(short = 'D', long = "define", value_name = "NAME[=VALUE]")]
    defines: Vec<String>,
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();

    let mut ctx = CompilerContext::new(Box::new(FsProvider));
    for dir in &args.include_dirs {
        ctx.add_include_dir(dir.clone());
    }
    for define in &args.defines {
        match define.split_once('=') {
            Some((name, value)) => ctx.define_macro(name, value),
            None => ctx.define_macro(define.as_str(), "1"),
        }
    }

    let report = match ctx.compile_all(&args.sources) {
        Ok(report) => report,
        Err(err) => {
            eprintln!("cminorc: {}", err);
            return ExitCode::FAILURE;
        }
    };

    for diag in &report.diagnostics {
        eprintln!("{}", diag);
    }

    if report.has_errors() {
        eprintln!("cminorc: {} diagnostic(s), aborting before code generation", report.diagnostics.len());
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
