use std::io::{self, BufRead};
use clap::Parser;
use futures::StreamExt;
use log::{error, info, warn};
use tokio::signal;
use tokio::spawn;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};
use tokio_util::sync::CancellationToken;

use crate::device::transport::Transport;
use crate::device::types::{CommandCode, ConnectionState, DeviceDescriptor, DeviceEvent, ScanEvent};
use crate::error::{AppRunError, DeviceError};
use crate::session::Session;

/// Without arguments the nearby devices are listed, rescanning until interrupted.
#[derive(Parser, Debug)]
#[command(name = "opentracker", disable_help_flag = true, disable_version_flag = true)]
pub struct Args {
    /// Connect to the sensor hub with this address and print its telemetry
    #[arg(short = 'c', value_name = "ADDRESS")]
    pub connect: Option<String>,
}

// Lines are read on a dedicated OS thread, so that stdin never blocks the runtime.
fn stdin_lines() -> UnboundedReceiver<String> {
    let (line_sender, line_receiver) = unbounded_channel::<String>();

    std::thread::spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            match line {
                Ok(line) => {
                    if line_sender.send(line.trim().to_owned()).is_err() {
                        break;
                    }
                },
                Err(err) => {
                    warn!("Failed to read stdin: {}", err);
                    break;
                },
            }
        }
    });

    line_receiver
}

/// Connects straight to `address` and prints every decoded sample on stdout. Typing `reset` or
/// `calibration` sends that command. Returns an error when the link is lost.
pub async fn run_headless<T: Transport>(session: Session<T>, address: String) -> Result<(), AppRunError> {
    let device = DeviceDescriptor::new(None, address);
    session.connect(&device).await?;
    info!("{}, starting...", session.status());

    let mut events = session.subscribe();
    let mut state = session.subscribe_state();
    let mut commands = stdin_lines();

    let cancel = CancellationToken::new();
    let runner = {
        let session = session.clone();
        let cancel = cancel.clone();
        spawn(async move { session.run(cancel).await })
    };

    let ctrl_c = signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let result: Result<(), AppRunError> = 'mainloop: loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                info!("Interrupted");
                break 'mainloop Ok(());
            },
            changed = state.changed() => {
                if changed.is_err() || *state.borrow() == ConnectionState::Disconnected {
                    break 'mainloop Err(DeviceError::LinkLost.into());
                }
            },
            Some(event) = events.next() => match event {
                DeviceEvent::Telemetry(sample) => println!("{}", sample),
                DeviceEvent::Stats(stats) => println!("{}", stats),
                DeviceEvent::Notice(notice) => warn!("{}", notice),
            },
            Some(line) = commands.recv() => {
                if line.is_empty() {
                    continue 'mainloop;
                }
                match line.parse::<CommandCode>() {
                    Ok(code) => {
                        if let Err(err) = session.send_command(code).await {
                            error!("Failed to send {} command: {}", code, err);
                        }
                    },
                    Err(message) => warn!("{} (expected \"reset\" or \"calibration\")", message),
                }
            },
        }
    };

    cancel.cancel();
    if let Err(err) = runner.await {
        warn!("Session task failed: {}", err);
    }

    result
}

/// Prints every scan result as `name | address` lines until interrupted or the scan fails.
pub async fn run_scan_listing<T: Transport>(session: Session<T>) -> Result<(), AppRunError> {
    let mut scans = session.start_scan();

    let ctrl_c = signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                session.stop_scan();
                return Ok(());
            },
            event = scans.next() => match event {
                Some(ScanEvent::Results(devices)) => {
                    println!("Found {} device(s):", devices.len());
                    for device in devices {
                        println!("{}", device);
                    }
                },
                Some(ScanEvent::Failed(message)) => {
                    error!("Check if the bluetooth adapter is working");
                    return Err(AppRunError::ScanFailed { message });
                },
                None => return Ok(()),
            },
        }
    }
}
