//! The `ir3c` driver binary (spec.md §6.1): reads an IR3 text file, runs
//! the pipeline in `ir3c`, and writes the resulting assembly. All of the
//! process-facing concerns — argument parsing, logging, exit codes, file
//! I/O — live here; the library crates stay pure.

use clap::Parser;
use ir3c::{compile_program, DumpRequests, Options};
use ir3c_diagnostics::Ir3cError;
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

/// Compile one IR3 textual file to ARM32 assembly.
#[derive(Parser, Debug)]
#[command(name = "ir3c", version, about)]
struct Cli {
    /// Path to a textual IR3 file (see `ir3c-reader`'s crate docs for the
    /// grammar); there is no front end here to parse source-language text.
    input: PathBuf,

    /// Run the fixed-point IR optimizer before lowering.
    #[arg(short = 'O', long = "opt")]
    opt: bool,

    /// Keep `@ caller-save`/`@ caller-restore` comments in the output
    /// (default).
    #[arg(short = 'a', long = "annotate", default_value_t = true)]
    annotate: bool,

    /// Strip the comments `--annotate` would keep. Overrides `--annotate`.
    #[arg(long = "no-annotate", alias = "na")]
    no_annotate: bool,

    /// Log pipeline progress at debug level (`RUST_LOG=ir3c=debug`).
    #[arg(short, long)]
    verbose: bool,

    /// Suppress the assembly echoed to stdout and the `--dump-ir3*` text.
    /// Has no effect on `-o -`, which is itself an explicit request for
    /// stdout output.
    #[arg(short, long)]
    quiet: bool,

    /// Run the pipeline but don't write an output file.
    #[arg(long = "no-output", alias = "no")]
    no_output: bool,

    /// Output path; `-` writes the assembly to stdout. Defaults to the
    /// input's file stem with a `.s` extension.
    #[arg(short, long)]
    output: Option<String>,

    /// Print the parsed IR3, before any optimization or lowering.
    #[arg(long = "dump-ir3")]
    dump_ir3: bool,

    /// Print the IR3 after lowering (constant materialization, field-store
    /// splitting, the entry dummy).
    #[arg(long = "dump-ir3-lowered")]
    dump_ir3_lowered: bool,

    /// Print the IR3 after the optimizer reaches its fixed point (only
    /// meaningful alongside `-O`).
    #[arg(long = "dump-ir3-opt")]
    dump_ir3_opt: bool,
}

fn default_output_path(input: &PathBuf) -> PathBuf {
    input.with_extension("s")
}

fn line_text(src: &str, line: u32) -> Option<&str> {
    src.lines().nth(line as usize)
}

fn report(err: &Ir3cError, src: &str) {
    let diag = err.to_diagnostic();
    let line = diag.span.as_ref().and_then(|s| line_text(src, s.line));
    eprint!("{}", diag.render(true, line));
}

fn run(cli: &Cli) -> Result<(), ()> {
    let src = fs::read_to_string(&cli.input).map_err(|e| {
        eprintln!("error: couldn't read {}: {e}", cli.input.display());
    })?;
    let file_name = cli.input.to_string_lossy().into_owned();

    let options = Options {
        optimize: cli.opt,
        annotate: cli.annotate && !cli.no_annotate,
    };
    let dumps = DumpRequests {
        ir3: cli.dump_ir3,
        ir3_lowered: cli.dump_ir3_lowered,
        ir3_opt: cli.dump_ir3_opt,
    };

    log::debug!("compiling {file_name}");
    let outcome = compile_program(&src, &file_name, &options, dumps).map_err(|e| report(&e, &src))?;

    for warning in &outcome.warnings {
        let line = warning.span.as_ref().and_then(|s| line_text(&src, s.line));
        eprint!("{}", warning.render(true, line));
    }

    if !cli.quiet {
        for (label, dump) in [
            ("ir3", &outcome.dump_ir3),
            ("ir3-lowered", &outcome.dump_ir3_lowered),
            ("ir3-opt", &outcome.dump_ir3_opt),
        ] {
            if let Some(text) = dump {
                println!("; --- dump-{label} ---\n{text}");
            }
        }
    }

    if cli.no_output {
        if !cli.quiet {
            print!("{}", outcome.asm);
        }
        return Ok(());
    }

    let out_path = cli.output.clone().unwrap_or_else(|| default_output_path(&cli.input).to_string_lossy().into_owned());
    if out_path == "-" {
        print!("{}", outcome.asm);
    } else {
        fs::write(&out_path, &outcome.asm).map_err(|e| {
            eprintln!("error: couldn't write {out_path}: {e}");
        })?;
        if !cli.quiet {
            println!("{}", outcome.asm);
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    if cli.verbose {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("ir3c=debug")).init();
    } else {
        env_logger::Builder::from_env(env_logger::Env::default()).init();
    }

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(()) => ExitCode::FAILURE,
    }
}
