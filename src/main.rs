//! Service bootstrap entrypoint.
//!
//! Boots a service with a single `/ping` route under the configured prefix.

use std::path::PathBuf;
use std::process::ExitCode;

use axum::routing::get;
use clap::Parser;

use service_bootstrap::{Engine, Switch};

#[derive(Parser)]
#[command(name = "service-bootstrap")]
#[command(about = "Bootstrap and serve a service from a config directory", long_about = None)]
struct Cli {
    /// Directory holding config.toml and per-subsystem settings files
    #[arg(short, long, default_value = "conf")]
    config_dir: PathBuf,

    /// Resolve settings from the config center first
    #[arg(long)]
    remote: bool,

    /// Run the phases through the task queue
    #[arg(long)]
    queue: bool,

    /// Log every configurator's settings
    #[arg(long)]
    debug: bool,

    /// Take the listen port from the PORT environment variable
    #[arg(long)]
    env_port: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut builder = Engine::builder().config_dir(cli.config_dir);
    for (on, switch) in [
        (cli.remote, Switch::RemoteConfig),
        (cli.queue, Switch::Queue),
        (cli.debug, Switch::Debug),
        (cli.env_port, Switch::EnvPort),
    ] {
        if on {
            builder = builder.enable(switch);
        }
    }

    let mut engine = builder.build();
    let registered = engine.add_router(|router| router.route("/ping", get(|| async { "pong" })));

    let result = match registered {
        Ok(()) => engine.run().await,
        Err(err) => Err(err),
    };

    match result {
        Ok(()) => {
            tracing::info!("Shutdown complete");
            ExitCode::SUCCESS
        }
        Err(err) => {
            tracing::error!(error = %err, "Bootstrap failed");
            eprintln!("bootstrap failed: {err}");
            let mut source = std::error::Error::source(&err);
            while let Some(cause) = source {
                eprintln!("  caused by: {cause}");
                source = cause.source();
            }
            ExitCode::FAILURE
        }
    }
}
