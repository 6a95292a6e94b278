//! # chwire CLI Entry Point
//!
//! Binary entry point for the chwire inspector.
//!
//! ## Usage
//!
//! ```bash
//! # Decode a RowBinaryWithNamesAndTypes body and explore it
//! chwire ./response.bin
//!
//! # Decode a Native body and print the node tree
//! chwire --native --dump ./response.native
//!
//! # Export the tree as JSON
//! chwire --native --json ./response.native > tree.json
//!
//! # Debug logging from the decoders
//! RUST_LOG=chwire=trace chwire --dump ./response.bin
//! ```

use std::env;
use std::path::PathBuf;

use chwire::cli::commands::summary;
use chwire::cli::dump::dump_result;
use chwire::cli::{Repl, Session};
use chwire::WireFormat;
use eyre::{bail, Result, WrapErr};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputMode {
    Interactive,
    Dump,
    Json,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run() {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let args: Vec<String> = env::args().collect();

    let mut format = WireFormat::RowBinaryWithNamesAndTypes;
    let mut mode = OutputMode::Interactive;
    let mut body_path: Option<PathBuf> = None;

    for arg in &args[1..] {
        match arg.as_str() {
            "--help" | "-h" => {
                print_usage();
                return Ok(());
            }
            "--version" | "-v" => {
                println!("chwire {}", env!("CARGO_PKG_VERSION"));
                return Ok(());
            }
            "--native" | "-n" => format = WireFormat::Native,
            "--rowbinary" | "-r" => format = WireFormat::RowBinaryWithNamesAndTypes,
            "--dump" | "-d" => mode = OutputMode::Dump,
            "--json" | "-j" => mode = OutputMode::Json,
            arg if arg.starts_with('-') => {
                bail!("Unknown option: {}", arg);
            }
            path => {
                if body_path.is_some() {
                    bail!("Multiple body files specified");
                }
                body_path = Some(PathBuf::from(path));
            }
        }
    }

    let mut session = Session::new(format);

    if let Some(path) = &body_path {
        session
            .load(path, format)
            .wrap_err_with(|| format!("cannot load {:?}", path))?;
    }

    if mode == OutputMode::Interactive {
        let mut repl = Repl::new(session)?;
        repl.run()?;
        return Ok(());
    }

    let Some(result) = session.result() else {
        bail!("--dump and --json need a body file");
    };
    if mode == OutputMode::Json {
        let text = serde_json::to_string_pretty(&result.to_json())
            .wrap_err("failed to serialize tree")?;
        println!("{}", text);
    } else {
        print!("{}", dump_result(result));
        println!("{}", summary(result));
    }

    Ok(())
}

fn print_usage() {
    println!("chwire - ClickHouse RowBinary/Native wire format inspector");
    println!();
    println!("USAGE:");
    println!("    chwire [OPTIONS] [BODY_FILE]");
    println!();
    println!("ARGS:");
    println!("    <BODY_FILE>        Captured HTTP response body to decode");
    println!();
    println!("OPTIONS:");
    println!("    -n, --native       Decode the body as Native");
    println!("    -r, --rowbinary    Decode as RowBinaryWithNamesAndTypes (default)");
    println!("    -d, --dump         Print the node tree and exit");
    println!("    -j, --json         Print the node tree as JSON and exit");
    println!("    -h, --help         Print help information");
    println!("    -v, --version      Print version information");
    println!();
    println!("ENVIRONMENT:");
    println!("    RUST_LOG           Log filter, e.g. chwire=debug");
    println!("    CHWIRE_HISTORY     REPL history file (empty disables history)");
    println!("    CHWIRE_CONFIG      Host settings file (default: chwire.json beside the binary)");
}
