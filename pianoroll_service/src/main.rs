// Service entry point.
//
// Builds the `ServiceConfig` (defaults, then `--config` JSON, then the
// individual flags), installs logging, loads the model bundle, and serves
// until the process is killed.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use pianoroll_service::logging::init_logging;
use pianoroll_service::{GENERATE_ROUTE, ServiceConfig, ServiceContext, start_server};
use tracing::{error, info};

/// HTTP service that extends a chord of primer pitches into a MIDI file
#[derive(Parser)]
#[command(name = "serve")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// JSON config file; unset keys keep their defaults
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to listen on
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// Model bundle to load
    #[arg(long)]
    bundle: Option<PathBuf>,

    /// Directory for generated MIDI files
    #[arg(long)]
    output_dir: Option<PathBuf>,
}

impl Cli {
    fn into_config(self) -> pianoroll_service::Result<ServiceConfig> {
        let mut config = match &self.config {
            Some(path) => ServiceConfig::load(path)?,
            None => ServiceConfig::default(),
        };
        if let Some(host) = self.host {
            config.host = host;
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(bundle) = self.bundle {
            config.bundle_file = bundle;
        }
        if let Some(output_dir) = self.output_dir {
            config.output_dir = output_dir;
        }
        Ok(config)
    }
}

fn main() -> ExitCode {
    let config = match Cli::parse().into_config() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Error: {err}");
            return ExitCode::FAILURE;
        }
    };
    init_logging(&config.log);

    let ctx = match ServiceContext::from_config(config) {
        Ok(ctx) => ctx,
        Err(err) => {
            error!(error = %err, "startup failed");
            return ExitCode::FAILURE;
        }
    };
    let (handle, addr) = match start_server(ctx) {
        Ok(started) => started,
        Err(err) => {
            error!(error = %err, "startup failed");
            return ExitCode::FAILURE;
        }
    };
    info!("serving http://{addr}{GENERATE_ROUTE}");
    handle.join();
    ExitCode::SUCCESS
}
