use std::collections::HashSet;
use std::time::Duration;
use btleplug::api::{Central, Characteristic, Manager as _, Peripheral as _, ScanFilter, WriteType};
use btleplug::platform::{Adapter, Manager, Peripheral};
use log::{debug, info, warn};
use tokio::time::{sleep, timeout};
use uuid::Uuid;

use crate::device::constants::{
    COMMAND_CHARACTERISTIC, FIND_PERIPHERAL_DELAY, SERVICE_UUID, STAT_CHARACTERISTIC, TELEMETRY_CHARACTERISTIC,
};
use crate::device::transport::Transport;
use crate::device::types::DeviceDescriptor;
use crate::error::DeviceError;

/// A connected sensor hub together with the characteristics found during service discovery.
#[derive(Debug, Clone)]
pub struct BtleLink {
    peripheral: Peripheral,
    characteristics: Vec<Characteristic>,
}

impl BtleLink {
    fn characteristic(&self, uuid: Uuid) -> Result<&Characteristic, DeviceError> {
        self.characteristics
            .iter()
            .find(|characteristic| characteristic.uuid == uuid)
            .ok_or(DeviceError::MissingCharacteristic)
    }
}

pub struct BtleTransport {
    manager: Manager,
    connect_timeout: Duration,
}

impl BtleTransport {
    pub async fn new(connect_timeout: Duration) -> Result<Self, DeviceError> {
        let manager = Manager::new().await?;
        Ok(BtleTransport { manager, connect_timeout })
    }

    async fn adapters(&self) -> Result<Vec<Adapter>, DeviceError> {
        let adapters = self.manager.adapters().await?;
        if adapters.is_empty() {
            return Err(DeviceError::NoAdapter);
        }
        Ok(adapters)
    }
}

async fn start_scanning(adapters: &[Adapter]) -> Result<(), DeviceError> {
    for adapter in adapters {
        info!("Scanning using adapter {}...", adapter.adapter_info().await.unwrap_or("UNKNOWN".to_string()));
        adapter.start_scan(ScanFilter::default()).await?;
    }

    Ok(())
}

async fn stop_scanning(adapters: &[Adapter]) {
    for adapter in adapters {
        if let Err(err) = adapter.stop_scan().await {
            warn!("Failed to stop scanning: {:?}", err);
        }
    }
}

async fn list_peripherals(adapters: &[Adapter]) -> Vec<(Peripheral, DeviceDescriptor)> {
    let mut found = Vec::new();

    for adapter in adapters {
        let peripherals = match adapter.peripherals().await {
            Ok(v) => v,
            Err(err) => {
                warn!("Failed to query BLE adapter for peripherals: {}", err);
                continue;
            },
        };

        for peripheral in peripherals {
            match peripheral.properties().await {
                Err(err) => {
                    warn!("Could not query peripheral for properties: {:?}", err);
                },
                Ok(None) => {
                    debug!("Peripheral has no properties");
                },
                Ok(Some(properties)) => {
                    let descriptor = DeviceDescriptor::new(properties.local_name, properties.address.to_string());
                    found.push((peripheral, descriptor));
                },
            }
        }
    }

    found
}

async fn find_peripheral(adapters: &[Adapter], address: &str) -> Result<Peripheral, DeviceError> {
    let mut scanning = false;

    loop {
        let matched = list_peripherals(adapters)
            .await
            .into_iter()
            .find(|(_, descriptor)| descriptor.address.eq_ignore_ascii_case(address));

        if let Some((peripheral, descriptor)) = matched {
            info!("Using peripheral {}", descriptor);
            if scanning {
                stop_scanning(adapters).await;
            }
            return Ok(peripheral);
        }

        if !scanning {
            debug!("Peripheral {} not known yet, scanning for it", address);
            start_scanning(adapters).await?;
            scanning = true;
        }

        sleep(Duration::from_millis(FIND_PERIPHERAL_DELAY)).await;
    }
}

async fn connect_peripheral(peripheral: &Peripheral) -> Result<BtleLink, DeviceError> {
    info!("Connecting to peripheral...");
    peripheral.connect().await?;

    info!("Connected; Discovering services...");
    peripheral.discover_services().await?;

    let characteristics: Vec<Characteristic> = peripheral
        .characteristics()
        .into_iter()
        .filter(|characteristic| characteristic.service_uuid == SERVICE_UUID)
        .collect();

    for required in [COMMAND_CHARACTERISTIC, TELEMETRY_CHARACTERISTIC, STAT_CHARACTERISTIC] {
        if !characteristics.iter().any(|characteristic| characteristic.uuid == required) {
            warn!("Characteristic {} is missing from service {}", required, SERVICE_UUID);
            if let Err(err) = peripheral.disconnect().await {
                warn!("Failed to disconnect incomplete peripheral: {:?}", err);
            }
            return Err(DeviceError::MissingCharacteristic);
        }
    }

    Ok(BtleLink { peripheral: peripheral.clone(), characteristics })
}

impl Transport for BtleTransport {
    type Handle = BtleLink;

    async fn scan(&self, duration: Duration) -> Result<Vec<DeviceDescriptor>, DeviceError> {
        let adapters = self.adapters().await?;
        start_scanning(&adapters).await?;
        sleep(duration).await;

        let found = list_peripherals(&adapters).await;
        stop_scanning(&adapters).await;

        // the same peripheral may be reported by more than one adapter
        let mut seen = HashSet::new();
        Ok(found
            .into_iter()
            .map(|(_, descriptor)| descriptor)
            .filter(|descriptor| seen.insert(descriptor.address.clone()))
            .collect())
    }

    async fn connect(&self, address: &str) -> Result<BtleLink, DeviceError> {
        let adapters = self.adapters().await?;

        let result = timeout(self.connect_timeout, async {
            let peripheral = find_peripheral(&adapters, address).await?;
            connect_peripheral(&peripheral).await
        }).await;

        match result {
            Err(_) => {
                stop_scanning(&adapters).await;
                Err(DeviceError::ConnectTimeout)
            },
            Ok(Err(DeviceError::Btle { source: btleplug::Error::TimedOut(_) })) => Err(DeviceError::ConnectTimeout),
            Ok(result) => result,
        }
    }

    async fn disconnect(&self, handle: &BtleLink) -> Result<(), DeviceError> {
        handle.peripheral.disconnect().await?;
        Ok(())
    }

    async fn is_connected(&self, handle: &BtleLink) -> Result<bool, DeviceError> {
        Ok(handle.peripheral.is_connected().await?)
    }

    async fn read(&self, handle: &BtleLink, characteristic: Uuid) -> Result<Vec<u8>, DeviceError> {
        let characteristic = handle.characteristic(characteristic)?;
        Ok(handle.peripheral.read(characteristic).await?)
    }

    async fn write(&self, handle: &BtleLink, characteristic: Uuid, value: &[u8]) -> Result<(), DeviceError> {
        let characteristic = handle.characteristic(characteristic)?;
        handle.peripheral.write(characteristic, value, WriteType::WithResponse).await?;
        Ok(())
    }
}
