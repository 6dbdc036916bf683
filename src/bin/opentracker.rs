use std::env;
use log::{error, info};
use opentracker_monitor::{init_logging, run};
use opentracker_monitor::error::AppRunError;

fn main() -> Result<(), AppRunError> {
    init_logging();
    info!(concat!("OpenTracker monitor ", env!("CARGO_PKG_VERSION")));

    let args = env::args();

    match run(args) {
        Err(err) => {
            error!("Unexpected error: {}", err);
            Err(err)
        },
        Ok(_) => Ok(()),
    }
}
