use std::env;
use std::sync::Arc;
use clap::Parser;

use crate::cli::{run_headless, run_scan_listing, Args};
use crate::config::io::load_config;
use crate::device::btle::BtleTransport;
use crate::error::AppRunError;
use crate::session::Session;

pub mod cli;
pub mod config;
pub mod device;
pub mod error;
pub mod session;

pub fn init_logging() {
    let level = env::var("LOG_LEVEL")
        .ok()
        .and_then(|level| level.parse::<log::LevelFilter>().ok())
        .unwrap_or(log::LevelFilter::Info);

    let mut dispatch = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{} {} {}] {}",
                humantime::format_rfc3339(std::time::SystemTime::now()),
                record.level(),
                record.target(),
                message
            ))
        })
        .level(level)
        .chain(std::io::stderr());

    if let Ok(log_file) = env::var("LOG_FILE") {
        dispatch = dispatch.chain(
            fern::log_file(log_file).expect("Failed to open LOG_FILE")
        );
    }

    dispatch.apply().expect("Failed to initialize logger");
}

pub fn run(args: env::Args) -> Result<(), AppRunError> {
    // prints usage and exits with an error status for anything but `-c <ADDRESS>`
    let args = Args::parse_from(args);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(run_session(args))
}

async fn run_session(args: Args) -> Result<(), AppRunError> {
    let config = load_config().await?;
    let transport = Arc::new(BtleTransport::new(config.connect_timeout()).await?);
    let session = Session::new(transport, config)?;

    match args.connect {
        Some(address) => run_headless(session, address).await,
        None => run_scan_listing(session).await,
    }
}
