use async_trait::async_trait;
use btleplug::api::{Central, CentralEvent, Manager as _, Peripheral as _, ScanFilter};
use btleplug::platform::{Adapter, Manager, Peripheral, PeripheralId};
use futures::StreamExt;
use log::{debug, info, warn};

use crate::device::backend::{AdvertisementStream, BleBackend};
use crate::device::types::{Advertisement, KnownPeripheral};
use crate::error::DeviceError;

/// `BleBackend` over the first bluetooth adapter of the system.
pub struct BtleBackend {
    adapter: Adapter,
}

impl BtleBackend {
    pub async fn new() -> Result<Self, DeviceError> {
        let manager = Manager::new().await?;
        let adapter = manager.adapters().await?
            .into_iter()
            .next()
            .ok_or(DeviceError::NoAdapter)?;

        info!("Using adapter {}", adapter.adapter_info().await.unwrap_or("UNKNOWN".to_string()));
        Ok(BtleBackend { adapter })
    }
}

async fn local_name(peripheral: &Peripheral) -> Option<String> {
    match peripheral.properties().await {
        Err(err) => {
            warn!("Could not query peripheral for properties: {:?}", err);
            None
        },
        Ok(None) => None,
        Ok(Some(properties)) => properties.local_name,
    }
}

async fn advertisement(adapter: &Adapter, id: PeripheralId) -> Option<Advertisement> {
    let peripheral = match adapter.peripheral(&id).await {
        Ok(peripheral) => peripheral,
        Err(err) => {
            // the peripheral may be gone again before we got to look at it
            debug!("Advertised peripheral {:?} vanished: {:?}", id, err);
            return None;
        },
    };

    Some(Advertisement {
        id: id.to_string(),
        name: local_name(&peripheral).await,
    })
}

#[async_trait]
impl BleBackend for BtleBackend {
    type Handle = Peripheral;

    async fn start_scan(&self) -> Result<AdvertisementStream, DeviceError> {
        // subscribe before scanning, so that no advertisement is missed
        let events = self.adapter.events().await?;
        self.adapter.start_scan(ScanFilter::default()).await?;

        let adapter = self.adapter.clone();
        let stream = events.filter_map(move |event| {
            let adapter = adapter.clone();
            async move {
                match event {
                    CentralEvent::DeviceDiscovered(id) | CentralEvent::DeviceUpdated(id) => {
                        advertisement(&adapter, id).await.map(Ok)
                    },
                    _ => None,
                }
            }
        });

        Ok(stream.boxed())
    }

    async fn stop_scan(&self) -> Result<(), DeviceError> {
        self.adapter.stop_scan().await?;
        Ok(())
    }

    async fn peripheral(&self, id: &str) -> Result<Option<Peripheral>, DeviceError> {
        for peripheral in self.adapter.peripherals().await? {
            if peripheral.id().to_string() == id {
                return Ok(Some(peripheral));
            }
        }

        Ok(None)
    }

    async fn connected_peripherals(&self) -> Result<Vec<KnownPeripheral<Peripheral>>, DeviceError> {
        let mut connected = vec![];

        for peripheral in self.adapter.peripherals().await? {
            match peripheral.is_connected().await {
                Ok(true) => {
                    connected.push(KnownPeripheral {
                        id: peripheral.id().to_string(),
                        name: local_name(&peripheral).await,
                        handle: peripheral,
                    });
                },
                Ok(false) => {},
                Err(err) => warn!("Error checking for connection state: {:?}", err),
            }
        }

        Ok(connected)
    }

    async fn connect(&self, handle: &Peripheral) -> Result<(), DeviceError> {
        info!("Connecting to peripheral {}...", handle.id());
        handle.connect().await?;
        Ok(())
    }

    async fn discover_services(&self, handle: &Peripheral) -> Result<(), DeviceError> {
        info!("Connected; Discovering services...");
        handle.discover_services().await?;

        for service in handle.services() {
            debug!("Service {} with {} characteristics", service.uuid, service.characteristics.len());
        }
        Ok(())
    }

    async fn cancel_connection(&self, handle: &Peripheral) -> Result<(), DeviceError> {
        info!("Disconnecting peripheral {}", handle.id());
        handle.disconnect().await?;
        Ok(())
    }
}
