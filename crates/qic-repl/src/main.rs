//! qic CLI entry point.
//!
//! Usage:
//!   qic [CODE] < doc.json            # Run a query over stdin
//!   qic -f doc.yaml -t yaml [CODE]   # Read the document from a file
//!   qic -f doc.json -I               # Interactive REPL

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use qic_kernel::display::DisplayConfig;
use qic_kernel::filter::KeyFilter;
use qic_kernel::formats::{self, Format, LoadError};
use qic_kernel::function::wants_function;
use qic_kernel::kernel::prepare_query;
use qic_kernel::{Kernel, KernelConfig, Level};
use qic_repl::Repl;
use qic_repl::format::{self as output, Console, Terminal};

/// Query JSON, YAML and XML documents with shorthand expressions.
#[derive(Debug, Parser)]
#[command(name = "qic", version)]
struct Args {
    /// Code to run. May be a file holding it.
    #[arg(default_value = "_")]
    code: String,

    /// Input file (default: stdin).
    #[arg(short = 'f', long)]
    infile: Option<PathBuf>,

    /// JSON, YAML or XML.
    #[arg(short = 't', long, default_value = "JSON")]
    srctype: String,

    /// Spaces used to indent function bodies.
    #[arg(short = 'i', long, default_value_t = 4)]
    indent: usize,

    /// Cut every list to at most this many items.
    #[arg(short = 'l', long, default_value_t = 1 << 30)]
    rows: usize,

    /// Modules to import, comma separated.
    #[arg(short = 'm', long)]
    modules: Option<String>,

    /// Only keep these keys.
    #[arg(short = 'K', long = "keys")]
    keys_included: Option<String>,

    /// Drop these keys.
    #[arg(short = 'E', long = "nokeys")]
    keys_excluded: Option<String>,

    /// Wrap the code into a function.
    #[arg(short = 'F', long)]
    functionize: bool,

    /// Print `path=value` lines, easy to grep.
    #[arg(short = 's', long)]
    rawstr: bool,

    /// Interactive mode.
    #[arg(short = 'I', long)]
    interactive: bool,

    /// Never use colour.
    #[arg(short = 'p', long)]
    plain: bool,

    /// Compact JSON output.
    #[arg(short = 'c', long)]
    compact: bool,

    /// Keep ANSI colour codes in the input.
    #[arg(short = 'C', long)]
    keepcolor: bool,

    /// Narrate expansion and evaluation; repeat for more.
    #[arg(short = 'X', long, action = ArgAction::Count)]
    debug: u8,
}

fn main() -> ExitCode {
    // Initialize tracing (respects RUST_LOG env var)
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .init();

    match run(Args::parse()) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:?}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<ExitCode> {
    let plain = args.plain || !output::supports_color();
    let mut console = Terminal::new(plain);
    if args.debug >= 2 {
        console.diagnostic(Level::Notice, "# args = ");
        console.diagnostic(Level::Plain, &format!("{args:#?}"));
    }

    let Ok(format) = args.srctype.parse::<Format>() else {
        console.diagnostic(Level::Warning, "# unsupported file type.");
        return Ok(ExitCode::FAILURE);
    };

    let input = match &args.infile {
        Some(path) => {
            if !path.is_file() {
                console.diagnostic(Level::Warning, &format!("# {} not exists.", path.display()));
            }
            std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?
        }
        None => {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .context("Failed to read stdin")?;
            text
        }
    };
    if args.debug >= 3 {
        console.diagnostic(Level::Notice, "# INPUT :");
        console.diagnostic(Level::Plain, &input);
    }

    let text = if args.keepcolor {
        input.trim().to_string()
    } else {
        formats::strip_ansi(input.trim()).into_owned()
    };
    let document = match formats::decode(&text, format) {
        Ok(document) => document,
        Err(err @ LoadError::Malformed { .. }) => {
            console.diagnostic(Level::Warning, "# invalid JSON/YAML/XML.");
            console.diagnostic(Level::Plain, &err.to_string());
            return Ok(ExitCode::FAILURE);
        }
        Err(LoadError::UnsupportedFormat(_)) => {
            console.diagnostic(Level::Warning, "# unsupported file type.");
            return Ok(ExitCode::FAILURE);
        }
    };
    if args.debug >= 2 {
        console.diagnostic(Level::Notice, "# data loaded :");
        let dump = formats::json_string(&document, Some(2), false).unwrap_or_else(|_| document.repr());
        console.diagnostic(Level::Plain, &dump);
    }

    let mut config = KernelConfig::default()
        .with_indent(args.indent)
        .with_verbosity(args.debug);
    if let Some(modules) = &args.modules {
        config = config.with_imports(modules);
    }
    let mut kernel = match Kernel::new(document, config) {
        Ok(kernel) => kernel,
        Err(err) => {
            console.diagnostic(Level::Critical, &format!("# {err}"));
            return Ok(ExitCode::FAILURE);
        }
    };
    let display = DisplayConfig {
        rows: args.rows,
        keys: KeyFilter::new(args.keys_included.as_deref(), args.keys_excluded.as_deref()),
        plain,
        compact: args.compact,
        raw: args.rawstr,
    };
    output::emit(kernel.take_emissions(), &display, &mut console);

    let code = read_code(&args.code)?;
    let code = prepare_query(&code);
    let skip_batch = args.interactive && args.code == "_";
    if !skip_batch {
        if args.functionize || wants_function(&code) {
            kernel.run_function(&code, true);
        } else {
            kernel.run(&code, true);
        }
        output::emit(kernel.take_emissions(), &display, &mut console);
    }

    if args.interactive {
        qic_repl::run(Repl::new(kernel, display), &mut console)?;
    }
    Ok(ExitCode::SUCCESS)
}

/// The query itself, or the contents of the file it names.
fn read_code(code: &str) -> Result<String> {
    let path = Path::new(code);
    if path.is_file() {
        return std::fs::read_to_string(path).with_context(|| format!("Failed to read {code}"));
    }
    Ok(code.to_string())
}
