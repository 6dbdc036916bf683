#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::sleep;
use uuid::Uuid;

use opentracker_monitor::device::constants::{STAT_CHARACTERISTIC, TELEMETRY_CHARACTERISTIC};
use opentracker_monitor::device::transport::Transport;
use opentracker_monitor::device::types::DeviceDescriptor;
use opentracker_monitor::error::DeviceError;

/// Scripted behaviour and call counters of a [`MockTransport`].
#[derive(Debug, Default)]
pub struct MockState {
    pub devices: Vec<DeviceDescriptor>,
    pub scan_fails: bool,
    pub scan_hangs: bool,
    // once the scan duration has passed, scans wait for this before reporting
    pub scan_gate: Option<Arc<Notify>>,
    pub connect_delay: Duration,
    pub connect_fails: bool,
    pub disconnect_delay: Duration,
    pub alive: bool,
    pub is_connected_fails: bool,
    pub is_connected_hangs: bool,
    pub telemetry: Vec<u8>,
    pub stat: Vec<u8>,
    pub read_delay: Duration,
    pub read_fails: bool,
    // reads wait for this once their delay has passed
    pub read_gate: Option<Arc<Notify>>,

    pub scans: usize,
    pub connects: usize,
    pub disconnects: usize,
    pub telemetry_reads: usize,
    pub stat_reads: usize,
    pub telemetry_in_flight: usize,
    pub max_telemetry_in_flight: usize,
    // reads whose future was dropped before completing
    pub abandoned_reads: usize,
    pub writes: Vec<(Uuid, Vec<u8>)>,
}

pub struct MockTransport {
    state: Mutex<MockState>,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(MockTransport {
            state: Mutex::new(MockState {
                alive: true,
                telemetry: vec![0u8; 16],
                stat: vec![0u8; 4],
                ..MockState::default()
            }),
        })
    }

    pub fn with<R>(&self, f: impl FnOnce(&mut MockState) -> R) -> R {
        f(&mut self.state.lock().unwrap())
    }
}

struct ReadInFlight<'a> {
    transport: &'a MockTransport,
    telemetry: bool,
    completed: bool,
}

impl Drop for ReadInFlight<'_> {
    fn drop(&mut self) {
        self.transport.with(|state| {
            if self.telemetry {
                state.telemetry_in_flight -= 1;
            }
            if !self.completed {
                state.abandoned_reads += 1;
            }
        });
    }
}

impl Transport for MockTransport {
    type Handle = usize;

    async fn scan(&self, duration: Duration) -> Result<Vec<DeviceDescriptor>, DeviceError> {
        let (hangs, gate) = self.with(|state| {
            state.scans += 1;
            (state.scan_hangs, state.scan_gate.clone())
        });

        if hangs {
            std::future::pending::<()>().await;
        }

        sleep(duration).await;
        if let Some(gate) = gate {
            gate.notified().await;
        }

        self.with(|state| {
            if state.scan_fails {
                Err(DeviceError::NoAdapter)
            } else {
                Ok(state.devices.clone())
            }
        })
    }

    async fn connect(&self, _address: &str) -> Result<usize, DeviceError> {
        let (id, delay) = self.with(|state| {
            state.connects += 1;
            (state.connects, state.connect_delay)
        });

        sleep(delay).await;

        if self.with(|state| state.connect_fails) {
            Err(DeviceError::ConnectTimeout)
        } else {
            Ok(id)
        }
    }

    async fn disconnect(&self, _handle: &usize) -> Result<(), DeviceError> {
        let delay = self.with(|state| {
            state.disconnects += 1;
            state.disconnect_delay
        });
        sleep(delay).await;
        Ok(())
    }

    async fn is_connected(&self, _handle: &usize) -> Result<bool, DeviceError> {
        let (hangs, fails, alive) = self.with(|state| (state.is_connected_hangs, state.is_connected_fails, state.alive));

        if hangs {
            std::future::pending::<()>().await;
        }
        if fails {
            return Err(DeviceError::NoAdapter);
        }
        Ok(alive)
    }

    async fn read(&self, _handle: &usize, characteristic: Uuid) -> Result<Vec<u8>, DeviceError> {
        let telemetry = characteristic == TELEMETRY_CHARACTERISTIC;
        assert!(telemetry || characteristic == STAT_CHARACTERISTIC, "unexpected read of {}", characteristic);

        let (delay, gate, fails, value) = self.with(|state| {
            if telemetry {
                state.telemetry_reads += 1;
                state.telemetry_in_flight += 1;
                state.max_telemetry_in_flight = state.max_telemetry_in_flight.max(state.telemetry_in_flight);
            } else {
                state.stat_reads += 1;
            }
            let value = if telemetry { state.telemetry.clone() } else { state.stat.clone() };
            (state.read_delay, state.read_gate.clone(), state.read_fails, value)
        });

        let mut in_flight = ReadInFlight { transport: self, telemetry, completed: false };
        sleep(delay).await;
        if let Some(gate) = gate {
            gate.notified().await;
        }
        in_flight.completed = true;

        if fails {
            return Err(DeviceError::Deadline { operation: "Reading a characteristic" });
        }
        Ok(value)
    }

    async fn write(&self, _handle: &usize, characteristic: Uuid, value: &[u8]) -> Result<(), DeviceError> {
        self.with(|state| state.writes.push((characteristic, value.to_vec())));
        Ok(())
    }
}

pub fn sensor_hub() -> DeviceDescriptor {
    DeviceDescriptor::new(Some("OpenTracker".to_string()), "C8:2B:96:A1:00:12")
}
