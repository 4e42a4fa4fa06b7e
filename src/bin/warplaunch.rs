// Copyright 2019 Benjamin Fry <benjaminfry@me.com>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use std::sync::Arc;

use clap::{Arg, ArgAction, ArgMatches, Command};
use tokio::runtime;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use warplaunch::{ConsoleReporter, Error, LaunchPlan, Launcher};

const VERBOSE: &str = "verbose";

trait SetupClapApp {
    fn setup_clap_app(self) -> Self;
}

impl SetupClapApp for Command {
    fn setup_clap_app(self) -> Self {
        self.version(env!("CARGO_PKG_VERSION"))
            .author(env!("CARGO_PKG_AUTHORS"))
            .about(env!("CARGO_PKG_DESCRIPTION"))
    }
}

fn main() {
    let args = Command::new(env!("CARGO_PKG_NAME"))
        .setup_clap_app()
        .arg(
            Arg::new(VERBOSE)
                .short('v')
                .long(VERBOSE)
                .action(ArgAction::Count)
                .help("log launcher activity to stderr, repeat for more detail"),
        )
        .get_matches();

    if let Err(err) = init_tracing(&args) {
        eprintln!("failed to initialize logging: {}", err);
    }

    let code = match run() {
        Ok(()) => 0,
        Err(err) => {
            error!(error = %err, "launch failed");
            eprintln!("{}", err);
            err.exit_code()
        }
    };

    std::process::exit(code);
}

fn run() -> Result<(), Error> {
    let runtime = runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async move {
        let launcher = Launcher::new(Arc::new(ConsoleReporter));
        let report = launcher.execute(&LaunchPlan::standard()).await?;

        for handle in report.background {
            handle.detach();
        }

        // the start script succeeded; let the warp bootstrap print its output before exiting,
        //  a signal ends the wait, neither can change the exit status
        info!("start script exited, waiting for background output");
        launcher.drain_background_until_signal().await?;

        Ok::<(), Error>(())
    })
}

fn init_tracing(args: &ArgMatches) -> Result<(), Error> {
    let level = match args.get_count(VERBOSE) {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };

    let filter = match std::env::var("RUST_LOG") {
        Ok(v) if !v.trim().is_empty() => EnvFilter::from_default_env(),
        _ => EnvFilter::try_new(level).map_err(|e| e.to_string())?,
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| Error::from(e.to_string()))
}
