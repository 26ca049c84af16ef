use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::device::types::{Advertisement, KnownPeripheral};
use crate::error::DeviceError;

pub type AdvertisementStream = BoxStream<'static, Result<Advertisement, DeviceError>>;

/// The radio operations the connection manager relies on.
#[async_trait]
pub trait BleBackend: Send + Sync + 'static {
    type Handle: Clone + Send + Sync + 'static;

    /// Starts discovery. Every advertisement received until `stop_scan` is yielded by the
    /// stream; an error item ends the scan.
    async fn start_scan(&self) -> Result<AdvertisementStream, DeviceError>;

    async fn stop_scan(&self) -> Result<(), DeviceError>;

    /// Looks a peripheral up by the identifier it was advertised with.
    async fn peripheral(&self, id: &str) -> Result<Option<Self::Handle>, DeviceError>;

    async fn connected_peripherals(&self) -> Result<Vec<KnownPeripheral<Self::Handle>>, DeviceError>;

    async fn connect(&self, handle: &Self::Handle) -> Result<(), DeviceError>;

    async fn discover_services(&self, handle: &Self::Handle) -> Result<(), DeviceError>;

    async fn cancel_connection(&self, handle: &Self::Handle) -> Result<(), DeviceError>;
}
