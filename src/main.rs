//! `swagger-from-source` binary.
//!
//! Scans one or more Go search directories (`--dir a,b`). It reads the
//! general API info from the main file (`--generalInfo`, resolved against the
//! first directory) and the `@` annotations of every handler. It writes the
//! formats named by `--outputTypes` (`json`, `yaml` or both) into `--output`.
//!
//! `--strict` turns duplicate routes, duplicate operation ids and unsupported
//! field types into errors. `--parseDependency` also reads model types from
//! the packages `go list` reports for the module; `--parseInternal` and
//! `--parseVendor` widen what is read.
//!
//! ```bash
//! swagger-from-source --dir ./,../shared --generalInfo cmd/api/main.go --output ./docs
//! swagger-from-source --parseDependency --strict --outputTypes yaml
//! ```
//!
//! `RUST_LOG` refines logging; `-v` raises the default level to debug.

use anyhow::Result;
use clap::Parser;
use log::{info, LevelFilter};
use swagger_from_source::cli::{self, CliArgs};

fn init_logger(verbose: bool) {
    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    env_logger::Builder::from_default_env()
        .filter_level(level)
        .init();
}

fn main() -> Result<()> {
    let args = CliArgs::parse();
    init_logger(args.verbose);

    let args = cli::parse_args_from_parsed(args)?;
    if args.strict {
        info!("Strict mode: duplicates and unsupported types are errors");
    }
    if args.parse_dependency {
        info!("Reading models from dependency packages");
    }

    let output = args.output.clone();
    let output_types = args.output_types.clone();
    cli::run(args)?;

    info!("Wrote {} to {}", output_types, output.display());
    Ok(())
}
