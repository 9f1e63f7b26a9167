//! shotslice - split long screenshots into slices and export them.

mod args;
mod commands;
mod interactive;
mod shell;

use std::io::{self, Write};
use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use shotslice_core::log::{LogConfig, init as init_logging};
use tracing::{info, warn};

use args::{Cli, Commands};
use commands::ExportArgs;
use interactive::Repl;
use shell::Shell;

fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut log_config = LogConfig::default().with_verbosity(cli.verbose);
    if let Some(dir) = &cli.log_dir {
        log_config = log_config.with_directory(dir);
    }
    // Logging is best-effort; the tool works without a writable log directory.
    if let Err(err) = init_logging(log_config) {
        eprintln!("logging disabled: {err:#}");
    }
    info!(version = shotslice_core::version(), "shotslice starting");

    let mut shell = match Shell::from_cli(&cli) {
        Ok(shell) => shell,
        Err(err) => {
            eprintln!("{err:#}");
            return ExitCode::FAILURE;
        }
    };

    let result = run(&cli, &mut shell);
    log_stats(&shell);

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            warn!("command failed: {err:#}");
            eprintln!("{}", shell.describe(&err));
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli, shell: &mut Shell) -> Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();

    match &cli.command {
        Commands::Info { image, height } => commands::info(shell, image, *height, &mut out),
        Commands::Export { image, format, height, select, name, out_dir } => commands::export(
            shell,
            ExportArgs {
                image,
                format: (*format).into(),
                height: *height,
                select,
                name: name.as_deref(),
                out_dir,
            },
            &mut out,
        ),
        Commands::Interactive { image, out_dir } => {
            let mut repl = Repl::new(shell, out_dir.clone());
            if let Some(image) = image {
                if let Err(err) = repl.open(image, &mut out) {
                    writeln!(out, "! {}", repl.describe(&err))?;
                }
            }
            repl.run(io::stdin().lock(), &mut out)?;
            out.flush()?;
            Ok(())
        }
    }
}

fn log_stats(shell: &Shell) {
    let snapshot = shell.stats.snapshot();
    match serde_json::to_string(&snapshot) {
        Ok(json) => info!(target: "stats", "{json}"),
        Err(err) => warn!(target: "stats", "could not serialise stats: {err}"),
    }
}
