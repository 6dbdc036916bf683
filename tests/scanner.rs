//! Discovery and the rescan loop.

mod common;

use std::sync::Arc;
use std::time::Duration;
use futures::StreamExt;
use tokio::sync::Notify;
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;

use common::{sensor_hub, MockTransport};
use opentracker_monitor::config::types::MonitorConfig;
use opentracker_monitor::device::scanner::Scanner;
use opentracker_monitor::device::types::{DeviceDescriptor, ScanEvent};
use opentracker_monitor::session::Session;

fn results(event: Option<ScanEvent>) -> Vec<DeviceDescriptor> {
    match event {
        Some(ScanEvent::Results(devices)) => devices,
        other => panic!("expected scan results, got {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn discover_returns_with_no_devices() {
    let transport = MockTransport::new();
    let scanner = Scanner::new(transport.clone());

    let devices = scanner.discover(Duration::from_millis(2000)).await.unwrap();
    assert!(devices.is_empty());
    assert_eq!(transport.with(|state| state.scans), 1);
}

#[tokio::test(start_paused = true)]
async fn discover_gives_up_on_a_hanging_transport() {
    let transport = MockTransport::new();
    transport.with(|state| state.scan_hangs = true);
    let scanner = Scanner::new(transport.clone());

    let started = Instant::now();
    let devices = scanner.discover(Duration::from_millis(2000)).await.unwrap();
    assert!(devices.is_empty());
    assert!(started.elapsed() <= Duration::from_millis(3100));
}

#[tokio::test(start_paused = true)]
async fn discover_reports_adapter_failure() {
    let transport = MockTransport::new();
    transport.with(|state| state.scan_fails = true);
    let scanner = Scanner::new(transport.clone());

    let err = scanner.discover(Duration::from_millis(2000)).await.unwrap_err();
    assert!(err.is_transport_error());
}

#[tokio::test(start_paused = true)]
async fn rescans_on_a_fixed_cadence() {
    let transport = MockTransport::new();
    transport.with(|state| state.devices = vec![sensor_hub()]);
    let scanner = Scanner::new(transport.clone());
    let cancel = CancellationToken::new();

    let started = Instant::now();
    let mut events = scanner.watch(cancel.clone(), Duration::from_millis(2000), Duration::from_millis(8000));

    assert_eq!(results(events.next().await), vec![sensor_hub()]);
    let first = started.elapsed();
    assert_eq!(results(events.next().await), vec![sensor_hub()]);
    let second = started.elapsed();

    // measured between scan starts, not from the end of the previous scan
    let between = second - first;
    assert!(between >= Duration::from_millis(7900) && between <= Duration::from_millis(8100), "{:?}", between);
    assert_eq!(transport.with(|state| state.scans), 2);

    cancel.cancel();
    assert!(events.next().await.is_none());
}

#[tokio::test(start_paused = true)]
async fn rescanning_stops_after_a_failure() {
    let transport = MockTransport::new();
    transport.with(|state| state.scan_fails = true);
    let session = Session::new(transport.clone(), MonitorConfig::default()).unwrap();

    let mut events = session.start_scan();
    assert!(matches!(events.next().await, Some(ScanEvent::Failed(_))));
    assert!(events.next().await.is_none());

    sleep(Duration::from_secs(60)).await;
    assert_eq!(transport.with(|state| state.scans), 1);
}

#[tokio::test(start_paused = true)]
async fn session_keeps_latest_results_and_stops_on_connect() {
    let transport = MockTransport::new();
    transport.with(|state| state.devices = vec![sensor_hub()]);
    let session = Session::new(transport.clone(), MonitorConfig::default()).unwrap();

    let mut events = session.start_scan();
    assert_eq!(results(events.next().await), vec![sensor_hub()]);
    assert_eq!(session.scan_results(), vec![sensor_hub()]);
    assert_eq!(session.scan_results()[0].to_string(), "OpenTracker | C8:2B:96:A1:00:12");

    let selected = session.scan_results().remove(0);
    assert!(session.connect(&selected).await.unwrap());
    assert!(events.next().await.is_none());

    sleep(Duration::from_secs(60)).await;
    assert_eq!(transport.with(|state| state.scans), 1);
}

#[tokio::test(start_paused = true)]
async fn ignored_connect_leaves_the_scan_running() {
    let transport = MockTransport::new();
    transport.with(|state| state.devices = vec![sensor_hub()]);
    let session = Session::new(transport.clone(), MonitorConfig::default()).unwrap();
    assert!(session.connect(&sensor_hub()).await.unwrap());

    let mut events = session.start_scan();
    assert_eq!(results(events.next().await), vec![sensor_hub()]);

    assert!(!session.connect(&sensor_hub()).await.unwrap());
    assert_eq!(results(events.next().await), vec![sensor_hub()]);
    assert_eq!(transport.with(|state| state.scans), 2);
    assert_eq!(transport.with(|state| state.connects), 1);
}

#[tokio::test(start_paused = true)]
async fn replaced_scan_does_not_overwrite_results() {
    let gate = Arc::new(Notify::new());
    let transport = MockTransport::new();
    transport.with(|state| {
        state.devices = vec![sensor_hub()];
        state.scan_gate = Some(gate.clone());
    });
    let session = Session::new(transport.clone(), MonitorConfig::default()).unwrap();

    let _first = session.start_scan();
    sleep(Duration::from_millis(2100)).await;

    // the first scan finishes in the same instant it is replaced
    gate.notify_waiters();
    let _second = session.start_scan();
    sleep(Duration::from_millis(10)).await;

    assert!(session.scan_results().is_empty());
    assert_eq!(transport.with(|state| state.scans), 2);
}
