//! cwrite - render the functions of a TIR file as structured C-like source.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use bumpalo::Bump;
use clap::Parser;
use cwrite::core::{Analyzer, EmissionSession, IrAdaptor};
use cwrite::test_ir::{TestIR, TestIRAdaptor, TirDeclarationPrinter, TirRenderer};
use cwrite::writer::{FunctionWriter, WriterConfig};

#[derive(Parser)]
#[command(name = "cwrite", version, about = "Structured source emitter for TIR functions")]
struct Cli {
    /// TIR file to read, `-` for stdin.
    file: PathBuf,
    /// Only emit the function with this name.
    #[arg(long)]
    func: Option<String>,
    /// Emit every function this many times within one session.
    #[arg(long, default_value_t = 1)]
    passes: u32,
    /// Print a comment before every basic block.
    #[arg(long)]
    verbose_blocks: bool,
    /// Spaces per nesting level.
    #[arg(long, default_value_t = 3)]
    indent: usize,
    /// Increase log verbosity (-v debug, -vv trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn read_input(file: &Path) -> std::io::Result<String> {
    if file.as_os_str() == "-" {
        let mut text = String::new();
        std::io::stdin().read_to_string(&mut text)?;
        Ok(text)
    } else {
        std::fs::read_to_string(file)
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    env_logger::Builder::from_default_env()
        .filter_level(level)
        .init();

    let text = match read_input(&cli.file) {
        Ok(text) => text,
        Err(err) => {
            eprintln!("cwrite: cannot read {}: {}", cli.file.display(), err);
            return ExitCode::FAILURE;
        }
    };
    let ir = match TestIR::parse(&text) {
        Ok(ir) => ir,
        Err(err) => {
            eprintln!("cwrite: {}: {}", cli.file.display(), err);
            return ExitCode::FAILURE;
        }
    };

    let arena = Bump::new();
    let session = EmissionSession::new(&arena);
    let config = WriterConfig {
        verbose: cli.verbose_blocks,
        indent_width: cli.indent,
    };
    let writer = FunctionWriter::with_config(&session, config);
    let mut adaptor = TestIRAdaptor::new(&ir);
    let mut failed = false;

    for func in 0..adaptor.func_count() {
        adaptor.switch_func(func);
        if cli.func.as_deref().is_some_and(|name| name != adaptor.func_name()) {
            continue;
        }
        let analyzer = Analyzer::for_function(&adaptor);

        for _ in 0..cli.passes {
            let body = writer
                .emit_function_body(&adaptor, &analyzer, &TirRenderer)
                .and_then(|body| {
                    let decls = body.declarations(&adaptor, &TirDeclarationPrinter)?;
                    Ok((decls, body.text))
                });
            match body {
                Ok((decls, text)) => {
                    let args: Vec<&str> =
                        adaptor.cur_args().map(|arg| adaptor.var_name(arg)).collect();
                    println!("{}({})", adaptor.func_name(), args.join(", "));
                    println!("{{");
                    let pad = " ".repeat(cli.indent);
                    for line in decls.lines().chain(text.lines()) {
                        if line.is_empty() {
                            println!();
                        } else {
                            println!("{}{}", pad, line);
                        }
                    }
                    println!("}}");
                }
                Err(err) => {
                    eprintln!("cwrite: {}: {}", adaptor.func_name(), err);
                    failed = true;
                }
            }
        }
    }

    let stats = session.stats();
    log::debug!("{}", stats);

    if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
