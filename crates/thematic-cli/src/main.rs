use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use thematic_cli::{build, fields_json, init_logging, load_config, Cli, Command};

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {:#}", err);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    match cli.command {
        Command::Fields(args) => {
            let config = load_config(&args.config)?;
            println!("{}", fields_json(&config)?);
            Ok(ExitCode::SUCCESS)
        }
        Command::Build(args) => {
            let config = load_config(&args.config.config)?;
            // Renders hold pool - 1 blocking threads; import reads use the rest.
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .max_blocking_threads(config.thread_pool_size)
                .enable_all()
                .build()
                .context("starting the runtime")?;
            let summary = runtime.block_on(build(config, &args))?;

            for warning in &summary.warnings {
                eprintln!("warning: {}\n", warning);
            }
            for error in &summary.errors {
                eprintln!("error: {}\n", error);
            }
            tracing::info!(
                assets = summary.written.len(),
                errors = summary.errors.len(),
                warnings = summary.warnings.len(),
                "build finished"
            );
            for path in &summary.written {
                println!("{}", path.display());
            }

            Ok(if summary.failed() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            })
        }
    }
}
