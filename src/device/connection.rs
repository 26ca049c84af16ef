use std::mem;
use std::sync::{Arc, Mutex};
use futures::StreamExt;
use log::{debug, info, warn};
use tokio::spawn;
use tokio::sync::{Mutex as AsyncMutex, Notify};
use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration};
use tokio_util::sync::CancellationToken;

use crate::device::backend::{AdvertisementStream, BleBackend};
use crate::device::constants::{FALLBACK_DEVICE_NAME, SCAN_WINDOW};
use crate::device::types::{DeviceInfo, DiscoveredDevices, ManagerState};
use crate::error::DeviceError;
use crate::store::settings::SettingsStore;
use crate::store::types::ConnectionState;

#[derive(Debug)]
enum Link<H> {
    Disconnected,
    Connecting,
    Connected {
        device: DeviceInfo,
        handle: H,
    },
}

struct Shared<H> {
    devices: DiscoveredDevices,
    scanning: bool,
    link: Link<H>,
}

struct ScanTask {
    cancel: CancellationToken,
    handle: JoinHandle<Result<(), DeviceError>>,
}

/// Owns the scan and the single active connection, and mirrors the connection into the
/// settings store.
pub struct ConnectionManager<B: BleBackend> {
    backend: Arc<B>,
    store: SettingsStore,
    shared: Arc<Mutex<Shared<B::Handle>>>,
    scan_task: AsyncMutex<Option<ScanTask>>,
    discovered: Arc<Notify>,
}

async fn run_scan<B: BleBackend>(
    backend: Arc<B>,
    shared: Arc<Mutex<Shared<B::Handle>>>,
    discovered: Arc<Notify>,
    mut advertisements: AdvertisementStream,
    cancel: CancellationToken,
) -> Result<(), DeviceError> {
    let window = sleep(Duration::from_millis(SCAN_WINDOW));
    tokio::pin!(window);

    let result = 'mainloop: loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!("Scan stopped");
                break 'mainloop Ok(());
            },
            _ = &mut window => {
                info!("Scan window elapsed");
                break 'mainloop Ok(());
            },
            item = advertisements.next() => match item {
                Some(Ok(advertisement)) => {
                    let accepted = {
                        let mut shared = shared.lock().expect("Failed to lock connection manager state");
                        shared.devices.accept(&advertisement)
                    };

                    if accepted {
                        info!("Discovered {} ({})", advertisement.name.as_deref().unwrap_or_default(), advertisement.id);
                        discovered.notify_waiters();
                    }
                },
                Some(Err(err)) => {
                    warn!("Scanning failed {:?}", err);
                    break 'mainloop Err(DeviceError::ScanFailure { reason: err.to_string() });
                },
                None => {
                    debug!("Advertisement stream ended");
                    break 'mainloop Ok(());
                },
            },
        }
    };

    if let Err(err) = backend.stop_scan().await {
        warn!("Failed to stop scanning: {:?}", err);
    }

    shared.lock().expect("Failed to lock connection manager state").scanning = false;
    discovered.notify_waiters();
    result
}

impl<B: BleBackend> ConnectionManager<B> {
    pub fn new(backend: B, store: SettingsStore) -> Self {
        ConnectionManager {
            backend: Arc::new(backend),
            store,
            shared: Arc::new(Mutex::new(Shared {
                devices: DiscoveredDevices::default(),
                scanning: false,
                link: Link::Disconnected,
            })),
            scan_task: AsyncMutex::new(None),
            discovered: Arc::new(Notify::new()),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Shared<B::Handle>> {
        self.shared.lock().expect("Failed to lock connection manager state")
    }

    async fn persist(&self, state: &ConnectionState) {
        if let Err(err) = self.store.save_connection(state).await {
            warn!("Failed to save connection state: {}", err);
        }
    }

    /// A link never outlives the process that made it. A persisted connection is kept only if
    /// the platform still reports the peripheral as connected, otherwise it is cleared.
    pub async fn init(&self) {
        let state = self.store.connection_state().await;

        let id = match (&state.device_id, state.connected) {
            (None, false) => return,
            (None, true) => None,
            (Some(id), _) => Some(id.clone()),
        };

        if let Some(id) = id {
            match self.backend.connected_peripherals().await {
                Ok(peripherals) => {
                    if let Some(peripheral) = peripherals.into_iter().find(|p| p.id == id) {
                        let name = state.device_name.clone()
                            .or(peripheral.name)
                            .unwrap_or(FALLBACK_DEVICE_NAME.to_string());
                        info!("Still connected to {} ({})", name, id);

                        let mut shared = self.lock();
                        shared.link = Link::Connected {
                            device: DeviceInfo { id, name, connected: true },
                            handle: peripheral.handle,
                        };
                        return;
                    }
                },
                Err(err) => warn!("Failed to query connected peripherals: {:?}", err),
            }
        }

        info!("Clearing stale connection state");
        self.persist(&ConnectionState::default()).await;
    }

    pub fn state(&self) -> ManagerState {
        let shared = self.lock();
        if shared.scanning {
            return ManagerState::Scanning;
        }

        match shared.link {
            Link::Disconnected => ManagerState::Idle,
            Link::Connecting => ManagerState::Connecting,
            Link::Connected { .. } => ManagerState::Connected,
        }
    }

    pub fn devices(&self) -> Vec<DeviceInfo> {
        self.lock().devices.to_vec()
    }

    pub fn connected_device(&self) -> Option<DeviceInfo> {
        match &self.lock().link {
            Link::Connected { device, .. } => Some(device.clone()),
            _ => None,
        }
    }

    /// Clears the device list and starts a scan that ends by itself after `SCAN_WINDOW`.
    /// Refused while another scan or a connection attempt is running. A previous scan that
    /// failed without anyone waiting for it is reported instead of starting a new one, the
    /// next call starts the scan.
    pub async fn start_scan(&self) -> Result<(), DeviceError> {
        if let Some(err) = self.finished_scan_failure().await {
            return Err(err);
        }

        let mut scan_task = self.scan_task.lock().await;

        {
            let mut shared = self.lock();
            if shared.scanning {
                return Err(DeviceError::ScanInProgress);
            }
            if let Link::Connecting = shared.link {
                return Err(DeviceError::ConnectInProgress);
            }

            shared.devices.clear();
            shared.scanning = true;
        }

        let advertisements = match self.backend.start_scan().await {
            Ok(advertisements) => advertisements,
            Err(err) => {
                warn!("Scanning failed {:?}", err);
                self.lock().scanning = false;
                return Err(DeviceError::ScanFailure { reason: err.to_string() });
            },
        };

        info!("Scanning for {} ms...", SCAN_WINDOW);
        let cancel = CancellationToken::new();
        let handle = spawn(run_scan(
            self.backend.clone(),
            self.shared.clone(),
            self.discovered.clone(),
            advertisements,
            cancel.clone(),
        ));

        *scan_task = Some(ScanTask { cancel, handle });
        Ok(())
    }

    async fn join_scan(task: ScanTask) -> Result<(), DeviceError> {
        match task.handle.await {
            Ok(result) => result,
            Err(err) => Err(DeviceError::ScanFailure { reason: err.to_string() }),
        }
    }

    /// Joins a scan that has already ended and returns its error, if it failed. A running
    /// scan is left alone.
    pub async fn finished_scan_failure(&self) -> Option<DeviceError> {
        let task = {
            let mut scan_task = self.scan_task.lock().await;
            let finished = scan_task.as_ref().is_some_and(|task| task.handle.is_finished());
            if finished { scan_task.take() } else { None }
        }?;

        Self::join_scan(task).await.err()
    }

    /// Waits for the current scan to end and returns what it found.
    pub async fn wait_scan(&self) -> Result<Vec<DeviceInfo>, DeviceError> {
        let task = self.scan_task.lock().await.take();
        if let Some(task) = task {
            Self::join_scan(task).await?;
        }

        Ok(self.devices())
    }

    pub async fn stop_scan(&self) {
        let task = self.scan_task.lock().await.take();
        if let Some(task) = task {
            task.cancel.cancel();
            if let Err(err) = Self::join_scan(task).await {
                warn!("Scan ended with an error: {}", err);
            }
        }
    }

    async fn resolve(&self, device: &DeviceInfo) -> Result<B::Handle, DeviceError> {
        match self.backend.peripheral(&device.id).await {
            Ok(Some(handle)) => return Ok(handle),
            Ok(None) => {},
            Err(err) => warn!("Failed to look up peripheral {}: {:?}", device.id, err),
        }

        let connected = self.backend.connected_peripherals().await
            .map_err(|err| DeviceError::ConnectionFailure { name: device.name.clone(), reason: err.to_string() })?;

        connected.into_iter()
            .find(|peripheral| peripheral.name.as_deref() == Some(device.name.as_str()))
            .map(|peripheral| peripheral.handle)
            .ok_or_else(|| DeviceError::DeviceNotFound { id: device.id.clone() })
    }

    async fn establish(&self, device: &DeviceInfo) -> Result<B::Handle, DeviceError> {
        let handle = self.resolve(device).await?;

        let failure = |err: DeviceError| DeviceError::ConnectionFailure {
            name: device.name.clone(),
            reason: err.to_string(),
        };

        self.backend.connect(&handle).await.map_err(failure)?;

        if let Err(err) = self.backend.discover_services(&handle).await {
            if let Err(cancel_err) = self.backend.cancel_connection(&handle).await {
                warn!("Failed to disconnect after service discovery failed: {:?}", cancel_err);
            }
            return Err(failure(err));
        }

        Ok(handle)
    }

    /// Stops scanning and connects `device`. A device that is already connected is torn down
    /// first, so there is never more than one link.
    pub async fn connect(&self, device: &DeviceInfo) -> Result<DeviceInfo, DeviceError> {
        self.stop_scan().await;

        let previous = {
            let mut shared = self.lock();
            match &shared.link {
                Link::Connecting => return Err(DeviceError::ConnectInProgress),
                Link::Connected { device: current, .. } if current.id == device.id => {
                    let current = current.clone();
                    shared.devices.mark_connected(Some(current.id.as_str()));
                    return Ok(current);
                },
                _ => {},
            }

            shared.devices.mark_connected(Some(device.id.as_str()));
            mem::replace(&mut shared.link, Link::Connecting)
        };

        if let Link::Connected { device: old, handle } = previous {
            info!("Disconnecting {} before connecting {}", old.name, device.name);
            if let Err(err) = self.backend.cancel_connection(&handle).await {
                warn!("Failed to disconnect {}: {:?}", old.name, err);
            }
            self.persist(&ConnectionState::default()).await;
        }

        info!("Connecting to device: {}", device.name);
        match self.establish(device).await {
            Ok(handle) => {
                let connected = DeviceInfo { connected: true, ..device.clone() };
                {
                    let mut shared = self.lock();
                    shared.link = Link::Connected { device: connected.clone(), handle };
                }

                self.persist(&ConnectionState::connected(&connected.id, &connected.name)).await;
                info!("Connected to {}", connected.name);
                Ok(connected)
            },
            Err(err) => {
                warn!("Connection error: {}", err);
                let mut shared = self.lock();
                shared.link = Link::Disconnected;
                shared.devices.mark_connected(None);
                Err(err)
            },
        }
    }

    /// Tears the link down. The persisted connection state is cleared even when no live
    /// peripheral is found, or when the platform refuses to disconnect.
    pub async fn disconnect(&self) -> Result<(), DeviceError> {
        let state = self.store.connection_state().await;

        let previous = {
            let mut shared = self.lock();
            if let Link::Connecting = shared.link {
                return Err(DeviceError::ConnectInProgress);
            }

            shared.devices.mark_connected(None);
            mem::replace(&mut shared.link, Link::Disconnected)
        };

        let (own_id, own_handle) = match previous {
            Link::Connected { device, handle } => (Some(device.id), Some(handle)),
            _ => (None, None),
        };

        let mut result = Ok(());

        if let Some(id) = state.device_id.or(own_id) {
            let live = match self.backend.connected_peripherals().await {
                Ok(peripherals) => peripherals.into_iter()
                    .find(|peripheral| peripheral.id == id)
                    .map(|peripheral| peripheral.handle),
                Err(err) => {
                    warn!("Failed to query connected peripherals: {:?}", err);
                    None
                },
            };

            match live.or(own_handle) {
                Some(handle) => {
                    if let Err(err) = self.backend.cancel_connection(&handle).await {
                        warn!("Disconnection error: {:?}", err);
                        result = Err(DeviceError::ConnectionFailure { name: id.clone(), reason: err.to_string() });
                    } else {
                        info!("Disconnected {}", id);
                    }
                },
                None => debug!("Device {} is not connected, only clearing the stored state", id),
            }
        }

        self.persist(&ConnectionState::default()).await;
        result
    }

    /// Scans and connects the first device found. Returns `None` when the scan window ends
    /// without a match.
    pub async fn connect_first_discovered(&self) -> Result<Option<DeviceInfo>, DeviceError> {
        self.start_scan().await?;

        loop {
            let notified = self.discovered.notified();

            if let Some(first) = self.devices().into_iter().next() {
                return self.connect(&first).await.map(Some);
            }

            if self.state() != ManagerState::Scanning {
                self.wait_scan().await?;
                return Ok(None);
            }

            notified.await;
        }
    }

    /// Ends the scan and the link, leaving nothing behind in the store that claims a
    /// connection.
    pub async fn shutdown(&self) {
        self.stop_scan().await;

        if self.connected_device().is_some() || self.store.connection_state().await.connected {
            if let Err(err) = self.disconnect().await {
                warn!("Failed to disconnect on shutdown: {}", err);
            }
        }
    }
}
