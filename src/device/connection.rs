use std::sync::{Arc, Mutex};
use log::{debug, info, warn};
use tokio::sync::watch;
use tokio::time::{timeout, Duration};

use crate::device::constants::{DISCONNECT_DEADLINE, IS_CONNECTED_DEADLINE};
use crate::device::transport::Transport;
use crate::device::types::{ConnectionState, ConnectionStatus, DeviceDescriptor};
use crate::error::DeviceError;

#[derive(Debug)]
struct Link<H> {
    // distinguishes this link from a later one to the same device
    id: u64,
    device: DeviceDescriptor,
    handle: H,
}

#[derive(Debug)]
struct Inner<H> {
    state: ConnectionState,
    link: Option<Link<H>>,
    next_link_id: u64,
}

/// Owns the connection state machine and the single live device handle.
///
/// ```text
/// Disconnected -> Connecting -> Connected -> Disconnecting -> Disconnected
///                      \______________________/  (connect failure, link loss)
/// ```
///
/// No lock is held while waiting on the transport. A connect while not `Disconnected`
/// and a disconnect while not `Connected` are ignored.
pub struct ConnectionManager<T: Transport> {
    transport: Arc<T>,
    inner: Mutex<Inner<T::Handle>>,
    state_sender: watch::Sender<ConnectionState>,
}

impl<T: Transport> ConnectionManager<T> {
    pub fn new(transport: Arc<T>) -> Self {
        let (state_sender, _) = watch::channel(ConnectionState::Disconnected);

        ConnectionManager {
            transport,
            inner: Mutex::new(Inner {
                state: ConnectionState::Disconnected,
                link: None,
                next_link_id: 0,
            }),
            state_sender,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner<T::Handle>> {
        self.inner.lock().expect("Failed to lock ConnectionManager inner")
    }

    // must be called with the inner lock held, so that the watch channel sees transitions in order
    fn set_state(&self, inner: &mut Inner<T::Handle>, state: ConnectionState) {
        if inner.state != state {
            info!("Connection state {} -> {}", inner.state, state);
            inner.state = state;
            self.state_sender.send_replace(state);
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.lock().state
    }

    pub fn status(&self) -> ConnectionStatus {
        let inner = self.lock();
        ConnectionStatus {
            state: inner.state,
            address: inner.link.as_ref().map(|link| link.device.address.clone()),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state_sender.subscribe()
    }

    /// A clone of the live handle, only while `Connected`.
    pub fn handle(&self) -> Option<T::Handle> {
        let inner = self.lock();
        match (&inner.state, &inner.link) {
            (ConnectionState::Connected, Some(link)) => Some(link.handle.clone()),
            _ => None,
        }
    }

    /// Returns `Ok(false)` if the request was ignored because a connection already exists or is
    /// being established. `on_connecting` runs only when the request is accepted, right after the
    /// state moved to `Connecting`.
    pub async fn connect<F>(&self, device: &DeviceDescriptor, on_connecting: F) -> Result<bool, DeviceError>
    where
        F: FnOnce() + Send,
    {
        {
            let mut inner = self.lock();
            if inner.state != ConnectionState::Disconnected {
                debug!("Ignoring connect to {} while {}", device, inner.state);
                return Ok(false);
            }
            self.set_state(&mut inner, ConnectionState::Connecting);
        }
        on_connecting();

        info!("Connecting to {}", device);
        let result = self.transport.connect(&device.address).await;

        let late_handle = {
            let mut inner = self.lock();
            match result {
                Ok(handle) if inner.state == ConnectionState::Connecting => {
                    let id = inner.next_link_id;
                    inner.next_link_id += 1;
                    inner.link = Some(Link { id, device: device.clone(), handle });
                    self.set_state(&mut inner, ConnectionState::Connected);
                    info!("Peripheral ready");
                    return Ok(true);
                },
                Ok(handle) => handle,
                Err(err) => {
                    warn!("Connecting to {} failed: {}", device, err);
                    inner.link = None;
                    self.set_state(&mut inner, ConnectionState::Disconnected);
                    return Err(err);
                },
            }
        };

        // shutdown() ran while the transport was still connecting
        warn!("Connection to {} completed after shutdown, releasing it", device);
        self.release(&late_handle).await;
        Ok(false)
    }

    /// Returns `false` if there was no live connection to tear down.
    pub async fn disconnect(&self) -> bool {
        let link = {
            let mut inner = self.lock();
            if inner.state != ConnectionState::Connected {
                debug!("Ignoring disconnect while {}", inner.state);
                return false;
            }
            self.set_state(&mut inner, ConnectionState::Disconnecting);
            inner.link.take()
        };

        if let Some(link) = link {
            info!("Disconnecting from {}", link.device);
            self.release(&link.handle).await;
        }

        let mut inner = self.lock();
        self.set_state(&mut inner, ConnectionState::Disconnected);
        true
    }

    /// Queries the transport whether the live link is still up. When it is not, the link is torn
    /// down and `DeviceError::LinkLost` is returned; this happens only once per link.
    /// `on_lost` runs as soon as the link is taken, before the transport is told to disconnect.
    pub async fn check_liveness<F>(&self, on_lost: F) -> Result<(), DeviceError>
    where
        F: FnOnce() + Send,
    {
        let (id, handle) = {
            let inner = self.lock();
            match (&inner.state, &inner.link) {
                (ConnectionState::Connected, Some(link)) => (link.id, link.handle.clone()),
                _ => return Ok(()),
            }
        };

        let alive = match timeout(Duration::from_millis(IS_CONNECTED_DEADLINE), self.transport.is_connected(&handle)).await {
            Err(_) => {
                warn!("Checking for connection status took too long");
                false
            },
            Ok(Err(err)) => {
                warn!("Error checking for connection state: {:?}", err);
                false
            },
            Ok(Ok(connected)) => connected,
        };

        if alive {
            return Ok(());
        }

        let link = {
            let mut inner = self.lock();
            let same_link = matches!(&inner.link, Some(link) if link.id == id);
            if inner.state != ConnectionState::Connected || !same_link {
                // someone else already tore this link down
                return Ok(());
            }
            let link = inner.link.take();
            self.set_state(&mut inner, ConnectionState::Disconnected);
            link
        };
        on_lost();

        if let Some(link) = link {
            warn!("Connection to {} lost", link.device);
            self.release(&link.handle).await;
        }

        Err(DeviceError::LinkLost)
    }

    /// Best-effort disconnect used on process shutdown.
    pub async fn shutdown(&self) {
        let link = {
            let mut inner = self.lock();
            let link = inner.link.take();
            if link.is_some() {
                self.set_state(&mut inner, ConnectionState::Disconnecting);
            }
            link
        };

        if let Some(link) = link {
            info!("Disconnecting from {} before exit", link.device);
            self.release(&link.handle).await;
        }

        let mut inner = self.lock();
        self.set_state(&mut inner, ConnectionState::Disconnected);
    }

    async fn release(&self, handle: &T::Handle) {
        match timeout(Duration::from_millis(DISCONNECT_DEADLINE), self.transport.disconnect(handle)).await {
            Err(_) => warn!("Disconnecting took too long"),
            Ok(Err(err)) => warn!("Failed to disconnect: {:?}", err),
            Ok(Ok(())) => debug!("Disconnected"),
        }
    }
}
