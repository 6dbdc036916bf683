use std::sync::Arc;
use futures::channel::mpsc::{channel, Receiver};
use futures::SinkExt;
use log::{debug, info, warn};
use tokio::spawn;
use tokio::time::{interval, timeout, Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::device::constants::SCAN_GRACE;
use crate::device::transport::Transport;
use crate::device::types::{DeviceDescriptor, ScanEvent};
use crate::error::DeviceError;

pub struct Scanner<T: Transport> {
    transport: Arc<T>,
}

impl<T: Transport> Clone for Scanner<T> {
    fn clone(&self) -> Self {
        Scanner { transport: self.transport.clone() }
    }
}

impl<T: Transport> Scanner<T> {
    pub fn new(transport: Arc<T>) -> Self {
        Scanner { transport }
    }

    /// Scans for `duration`. A transport that does not come back within the duration plus
    /// `SCAN_GRACE` is abandoned and reported as having found nothing.
    pub async fn discover(&self, duration: Duration) -> Result<Vec<DeviceDescriptor>, DeviceError> {
        let deadline = duration + Duration::from_millis(SCAN_GRACE);

        match timeout(deadline, self.transport.scan(duration)).await {
            Err(_) => {
                warn!("Scanning took too long, treating as no devices found");
                Ok(Vec::new())
            },
            Ok(Err(err)) => Err(err),
            Ok(Ok(devices)) => {
                debug!("Scan found {} device(s)", devices.len());
                Ok(devices)
            },
        }
    }

    /// Starts the rescan loop: a discovery right away and then once every `rescan_interval`,
    /// counted from the start of the previous discovery. The returned stream ends when `cancel`
    /// fires, when the receiver is dropped, or after the first `ScanEvent::Failed`.
    pub fn watch(&self, cancel: CancellationToken, duration: Duration, rescan_interval: Duration) -> Receiver<ScanEvent> {
        let (mut sender, receiver) = channel::<ScanEvent>(4);
        let scanner = self.clone();

        spawn(async move {
            let mut ticker = interval(rescan_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            'mainloop: loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        break 'mainloop;
                    },
                    _ = ticker.tick() => {},
                }

                let result = tokio::select! {
                    _ = cancel.cancelled() => {
                        break 'mainloop;
                    },
                    result = scanner.discover(duration) => result,
                };

                let (event, failed) = match result {
                    Ok(devices) => (ScanEvent::Results(devices), false),
                    Err(err) => {
                        warn!("Scanning failed: {}", err);
                        (ScanEvent::Failed(err.to_string()), true)
                    },
                };

                if sender.send(event).await.is_err() {
                    debug!("Scan results receiver dropped");
                    break 'mainloop;
                }

                if failed {
                    break 'mainloop;
                }
            }

            info!("Rescanning stopped");
        });

        receiver
    }
}
