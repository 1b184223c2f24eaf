//! schemadump CLI
//!
//! Dumps the structure of a PostgreSQL schema as DDL, or loads a dump back.

use anyhow::{bail, Context, Result};
use clap::Parser;
use colored::Colorize;
use schemadump::{MayPostgresExecutor, PostgresCatalog, StructureDumper};
use schemadump_cli::{load_config, resolve_database_url, run_command, Cli, Outcome};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::process;

fn main() {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let filter = if cli.quiet {
        "error"
    } else if cli.verbose {
        "debug"
    } else {
        "info"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter)).init();

    match run(&cli) {
        Ok(outcome) => {
            if !cli.quiet {
                let status = match outcome {
                    Outcome::Written { bytes } => format!("wrote {bytes} bytes"),
                    Outcome::Loaded { statements } => format!("executed {statements} statements"),
                };
                eprintln!("{} {}", "done:".green().bold(), status);
            }
        }
        Err(e) => {
            eprintln!("{} {:#}", "error:".red().bold(), e);
            process::exit(1);
        }
    }
}

fn run(cli: &Cli) -> Result<Outcome> {
    let config = load_config(cli)?;

    let Some(database_url) = resolve_database_url(cli.database_url.clone(), &config) else {
        bail!("database URL not provided; use --database-url or set SCHEMADUMP_DATABASE_URL or DATABASE_URL");
    };

    let conn = MayPostgresExecutor::connect(&database_url).context("connecting to database")?;
    log::debug!("Dumping schema {}", config.schema);

    let dumper = StructureDumper::with_options(PostgresCatalog::new(&config.schema), config.options);

    let mut out: Box<dyn Write> = match &cli.output {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("creating {}", path.display()))?,
        )),
        None => Box::new(io::stdout().lock()),
    };

    run_command(&cli.command, &dumper, &conn, out.as_mut())
}
