// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// camkit — command-line front end.
//
// Entry point. Initialises logging, parses the command line and runs the
// finishing pipeline or the software rectangle detector on image files.

mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;

use cli::{Cli, Command};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    tracing::debug!(?cli, "camkit starting");

    match cli.command {
        Command::Finish(args) => {
            let written = commands::finish(&args)?;
            for path in written {
                println!("{}", path.display());
            }
        }
        Command::Detect(args) => {
            let report = commands::detect(&args)?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}
