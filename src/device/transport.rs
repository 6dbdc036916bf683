use std::future::Future;
use std::time::Duration;
use uuid::Uuid;

use crate::device::types::DeviceDescriptor;
use crate::error::DeviceError;

/// The GATT-like operations the session needs from a wireless stack.
///
/// Implementations are expected to be non-blocking: every operation suspends only the
/// calling task. `connect` must give up by itself and report [`DeviceError::ConnectTimeout`],
/// the session does not put its own timeout around it.
pub trait Transport: Send + Sync + 'static {
    /// A live link to one peripheral.
    type Handle: Clone + Send + Sync + 'static;

    fn scan(&self, duration: Duration) -> impl Future<Output = Result<Vec<DeviceDescriptor>, DeviceError>> + Send;

    fn connect(&self, address: &str) -> impl Future<Output = Result<Self::Handle, DeviceError>> + Send;

    fn disconnect(&self, handle: &Self::Handle) -> impl Future<Output = Result<(), DeviceError>> + Send;

    fn is_connected(&self, handle: &Self::Handle) -> impl Future<Output = Result<bool, DeviceError>> + Send;

    fn read(&self, handle: &Self::Handle, characteristic: Uuid) -> impl Future<Output = Result<Vec<u8>, DeviceError>> + Send;

    fn write(&self, handle: &Self::Handle, characteristic: Uuid, value: &[u8]) -> impl Future<Output = Result<(), DeviceError>> + Send;
}
