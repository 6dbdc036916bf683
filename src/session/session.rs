use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use futures::channel::mpsc::{channel, Receiver, Sender};
use futures::{SinkExt, StreamExt};
use log::{debug, info, warn};
use tokio::spawn;
use tokio::time::{interval, timeout, Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::config::types::MonitorConfig;
use crate::device::connection::ConnectionManager;
use crate::device::constants::{COMMAND_CHARACTERISTIC, WRITE_DEADLINE};
use crate::device::scanner::Scanner;
use crate::device::transport::Transport;
use crate::device::types::{
    CommandCode, ConnectionState, ConnectionStatus, DeviceDescriptor, DeviceEvent, ScanEvent, StatSample,
};
use crate::error::{ConfigError, DeviceError};
use crate::session::buffers::{ChannelBuffers, TelemetrySnapshot};
use crate::session::poller::{poll_once, PollOutcome, PollRole, Pollers};

#[derive(Default)]
struct ScanState {
    // cancels the running rescan loop
    cancel: Option<CancellationToken>,
    results: Vec<DeviceDescriptor>,
}

struct SessionInner<T: Transport> {
    config: MonitorConfig,
    transport: Arc<T>,
    connection: ConnectionManager<T>,
    scanner: Scanner<T>,
    buffers: Mutex<ChannelBuffers>,
    stats: Mutex<StatSample>,
    pollers: Pollers,
    liveness_in_flight: AtomicBool,
    scan: Mutex<ScanState>,
    subscribers: Mutex<Vec<Sender<DeviceEvent>>>,
}

/// Everything a monitor needs for one sensor hub: connection, channel buffers, latest vitals and
/// the periodic tasks that keep them filled.
///
/// Cloning is cheap, clones share the same state. The UI layer only reads snapshots and calls
/// [`connect`](Session::connect), [`disconnect`](Session::disconnect) and
/// [`send_command`](Session::send_command). Polling only happens while [`run`](Session::run) is
/// being awaited.
pub struct Session<T: Transport> {
    inner: Arc<SessionInner<T>>,
}

impl<T: Transport> Clone for Session<T> {
    fn clone(&self) -> Self {
        Session { inner: self.inner.clone() }
    }
}

impl<T: Transport> Session<T> {
    pub fn new(transport: Arc<T>, config: MonitorConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let inner = SessionInner {
            config,
            connection: ConnectionManager::new(transport.clone()),
            scanner: Scanner::new(transport.clone()),
            transport,
            buffers: Mutex::new(ChannelBuffers::new()),
            stats: Mutex::new(StatSample::default()),
            pollers: Pollers::new(),
            liveness_in_flight: AtomicBool::new(false),
            scan: Mutex::new(ScanState::default()),
            subscribers: Mutex::new(Vec::new()),
        };

        Ok(Session { inner: Arc::new(inner) })
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.inner.config
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.connection.state()
    }

    pub fn status(&self) -> ConnectionStatus {
        self.inner.connection.status()
    }

    pub fn subscribe_state(&self) -> tokio::sync::watch::Receiver<ConnectionState> {
        self.inner.connection.subscribe()
    }

    /// Commands (and disconnecting) are only possible while connected.
    pub fn can_send_command(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    pub fn buffers(&self) -> TelemetrySnapshot {
        self.inner.buffers.lock().expect("Failed to lock Session buffers").snapshot()
    }

    pub fn stats(&self) -> StatSample {
        *self.inner.stats.lock().expect("Failed to lock Session stats")
    }

    /// Devices found by the most recent scan.
    pub fn scan_results(&self) -> Vec<DeviceDescriptor> {
        self.lock_scan().results.clone()
    }

    /// Receives telemetry, stat updates and notices from now on.
    pub fn subscribe(&self) -> Receiver<DeviceEvent> {
        let (sender, receiver) = channel::<DeviceEvent>(self.inner.config.event_channel_capacity);
        self.inner.subscribers.lock().expect("Failed to lock Session subscribers").push(sender);
        receiver
    }

    fn lock_scan(&self) -> std::sync::MutexGuard<'_, ScanState> {
        self.inner.scan.lock().expect("Failed to lock Session scan state")
    }

    fn publish(&self, event: DeviceEvent) {
        let mut subscribers = self.inner.subscribers.lock().expect("Failed to lock Session subscribers");

        subscribers.retain_mut(|sender| match sender.try_send(event.clone()) {
            Ok(()) => true,
            Err(err) if err.is_full() => {
                debug!("Subscriber is not keeping up, dropping event");
                true
            },
            Err(_) => false,
        });
    }

    /// Starts rescanning until [`stop_scan`](Session::stop_scan) or [`connect`](Session::connect)
    /// is called. Replaces a rescan loop that is already running.
    pub fn start_scan(&self) -> Receiver<ScanEvent> {
        let cancel = CancellationToken::new();
        {
            let mut scan = self.lock_scan();
            if let Some(previous) = scan.cancel.replace(cancel.clone()) {
                previous.cancel();
            }
        }

        let config = &self.inner.config;
        let mut upstream = self.inner.scanner.watch(cancel.clone(), config.scan_timeout(), config.rescan_interval());
        let (mut sender, receiver) = channel::<ScanEvent>(4);
        let session = self.clone();

        spawn(async move {
            while let Some(event) = upstream.next().await {
                if let ScanEvent::Results(devices) = &event {
                    let mut scan = session.lock_scan();
                    // a replaced or stopped loop has its token cancelled under this lock
                    if cancel.is_cancelled() {
                        debug!("Dropping results of a replaced scan");
                    } else {
                        scan.results = devices.clone();
                    }
                }

                if sender.send(event).await.is_err() {
                    cancel.cancel();
                    break;
                }
            }
        });

        receiver
    }

    pub fn stop_scan(&self) {
        let mut scan = self.lock_scan();
        if let Some(cancel) = scan.cancel.take() {
            cancel.cancel();
        }
    }

    /// Returns `Ok(false)` if a connection already exists or is being established. Scanning stops
    /// once the attempt starts; an ignored request leaves it running.
    pub async fn connect(&self, device: &DeviceDescriptor) -> Result<bool, DeviceError> {
        let result = self.inner.connection.connect(device, || self.stop_scan()).await;
        if let Err(err) = &result {
            self.publish(DeviceEvent::Notice(format!("Failed to connect to {}: {}", device, err)));
        }
        result
    }

    pub async fn disconnect(&self) -> bool {
        self.inner.pollers.cancel_all();
        self.inner.connection.disconnect().await
    }

    /// See [`ConnectionManager::check_liveness`].
    /// Polls of a lost link are cancelled before the transport is told to disconnect.
    pub async fn check_liveness(&self) -> Result<(), DeviceError> {
        let pollers = &self.inner.pollers;
        self.inner.connection.check_liveness(|| pollers.cancel_all()).await
    }

    /// Interrupts all polling and writes `code` to the command characteristic.
    /// `CommandCode::None` is accepted and ignored.
    pub async fn send_command(&self, code: CommandCode) -> Result<(), DeviceError> {
        if code == CommandCode::None {
            debug!("No command selected, nothing to send");
            return Ok(());
        }

        let handle = match self.inner.connection.handle() {
            Some(handle) => handle,
            None => {
                warn!("Not sending {} command, not connected", code);
                return Err(DeviceError::NotConnected);
            },
        };

        self.inner.pollers.cancel_all();
        info!("Sending {} command", code);

        let opcode = [code.opcode()];
        let fut = self.inner.transport.write(&handle, COMMAND_CHARACTERISTIC, &opcode);
        match timeout(Duration::from_millis(WRITE_DEADLINE), fut).await {
            Err(_) => {
                warn!("Sending to command characteristic took too long");
                Err(DeviceError::Deadline { operation: "Sending a command" })
            },
            Ok(Err(err)) => {
                warn!("Failed to send to command characteristic: {:?}", err);
                Err(err)
            },
            Ok(Ok(())) => Ok(()),
        }
    }

    fn spawn_poll(&self, role: PollRole) {
        let handle = match self.inner.connection.handle() {
            Some(handle) => handle,
            None => return,
        };

        let claim = match self.inner.pollers.slot(role).try_claim() {
            Some(claim) => claim,
            None => {
                debug!("{} poll still in flight, skipping tick", role);
                return;
            },
        };

        let generation = self.inner.pollers.generation();
        let session = self.clone();

        spawn(async move {
            if let Some(outcome) = poll_once(session.inner.transport.as_ref(), &handle, &claim).await {
                session.store(outcome, generation);
            }
            drop(claim);
        });
    }

    fn store(&self, outcome: PollOutcome, generation: u64) {
        if generation != self.inner.pollers.generation() {
            debug!("Discarding poll result read before polling was interrupted");
            return;
        }

        match outcome {
            PollOutcome::Telemetry(sample) => {
                self.inner.buffers.lock().expect("Failed to lock Session buffers").push(&sample);
                self.publish(DeviceEvent::Telemetry(sample));
            },
            PollOutcome::Stat(sample) => {
                *self.inner.stats.lock().expect("Failed to lock Session stats") = sample;
                self.publish(DeviceEvent::Stats(sample));
            },
        }
    }

    fn spawn_liveness_check(&self) {
        if self.state() != ConnectionState::Connected {
            return;
        }

        if self.inner.liveness_in_flight.swap(true, Ordering::AcqRel) {
            debug!("Liveness check still in flight, skipping tick");
            return;
        }

        let session = self.clone();
        spawn(async move {
            // LinkLost is already logged by the connection manager
            let _ = session.check_liveness().await;
            session.inner.liveness_in_flight.store(false, Ordering::Release);
        });
    }

    /// Drives the periodic tasks until `cancel` fires, then disconnects.
    ///
    /// Every telemetry tick spawns a telemetry poll while connected, and every
    /// `stat_every_ticks`-th connected tick (starting with the first) a stat poll. The link is
    /// checked once per liveness tick.
    pub async fn run(&self, cancel: CancellationToken) {
        let config = &self.inner.config;

        let mut telemetry_ticker = interval(config.telemetry_interval());
        telemetry_ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut liveness_ticker = interval(config.liveness_interval());
        liveness_ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut connected_ticks: u64 = 0;

        'mainloop: loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    break 'mainloop;
                },
                _ = telemetry_ticker.tick() => {
                    if self.state() == ConnectionState::Connected {
                        if connected_ticks % config.stat_every_ticks == 0 {
                            self.spawn_poll(PollRole::Stat);
                        }
                        self.spawn_poll(PollRole::Telemetry);
                        connected_ticks += 1;
                    } else {
                        connected_ticks = 0;
                    }
                },
                _ = liveness_ticker.tick() => {
                    self.spawn_liveness_check();
                },
            }
        }

        self.shutdown().await;
    }

    /// Stops scanning and polling and makes a best-effort attempt to disconnect.
    pub async fn shutdown(&self) {
        info!("Shutting down session");
        self.stop_scan();
        self.inner.pollers.cancel_all();
        self.inner.connection.shutdown().await;
    }
}
