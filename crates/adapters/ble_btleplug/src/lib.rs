//! # beldum-adapter-btleplug
//!
//! Implements the [`BlePlatform`] port on top of [btleplug].
//!
//! ## How it works
//!
//! - `discover` runs an active scan on one host adapter, streams every
//!   advertisement that carries a local name, and returns the adapter's
//!   peripheral list when the scan window closes.
//! - Peripherals seen while scanning are cached by address so `connect` can
//!   open a link to a record produced by an earlier scan.
//! - Notifications are routed per characteristic by a dispatcher task owned
//!   by the session.
//!
//! btleplug has no pairing API; `pair` reports [`PairOutcome::Unsupported`]
//! and relies on the OS stack to bond on first encrypted access.
//!
//! ## Dependency rule
//!
//! Depends on `beldum-app` (for the port) and `beldum-domain`.

mod error;
mod gatt;
mod scanner;

pub use error::BleError;
pub use gatt::BtleplugSession;

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use btleplug::api::{Manager as _, Peripheral as _};
use btleplug::platform::{Adapter, Manager, Peripheral};
use tokio::sync::mpsc;

use beldum_app::error::{ConnectError, PairError, ScanError, SubscribeError};
use beldum_app::ports::{BlePlatform, PairOutcome};
use beldum_domain::device::{DeviceAddress, DeviceRecord};
use beldum_domain::gatt::{GattCharacteristic, GattService, NotificationHandler};

/// Peripherals seen by earlier scans, keyed by address.
#[derive(Default)]
pub(crate) struct PeripheralCache {
    inner: Mutex<HashMap<DeviceAddress, Peripheral>>,
}

impl PeripheralCache {
    pub(crate) fn insert(&self, address: DeviceAddress, peripheral: Peripheral) {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(address, peripheral);
    }

    pub(crate) fn get(&self, address: &DeviceAddress) -> Option<Peripheral> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(address)
            .cloned()
    }
}

/// btleplug-backed [`BlePlatform`] bound to one host adapter.
pub struct BtleplugPlatform {
    // Dropping the manager tears down the platform backend on some OSes.
    _manager: Manager,
    central: Adapter,
    peripherals: PeripheralCache,
}

impl BtleplugPlatform {
    /// Open host adapter number `index` (0 for the first one).
    ///
    /// # Errors
    ///
    /// Returns [`BleError::NotAvailable`] when the host has no adapter,
    /// [`BleError::AdapterIndex`] when `index` is out of range, or
    /// [`BleError::Btleplug`] when the BLE stack cannot be reached.
    pub async fn new(index: usize) -> Result<Self, BleError> {
        let manager = Manager::new().await?;
        let mut adapters = manager.adapters().await?;
        if adapters.is_empty() {
            return Err(BleError::NotAvailable);
        }
        let available = adapters.len();
        if index >= available {
            return Err(BleError::AdapterIndex { index, available });
        }
        let central = adapters.swap_remove(index);
        tracing::info!(index, available, "BLE adapter opened");
        Ok(Self {
            _manager: manager,
            central,
            peripherals: PeripheralCache::default(),
        })
    }
}

impl BlePlatform for BtleplugPlatform {
    type Session = BtleplugSession;

    async fn discover(
        &self,
        timeout: Duration,
        detections: mpsc::Sender<DeviceRecord>,
    ) -> Result<Vec<DeviceRecord>, ScanError> {
        tracing::debug!(timeout_secs = timeout.as_secs(), "starting BLE scan");
        let batch = scanner::run_scan(&self.central, &self.peripherals, timeout, &detections).await?;
        tracing::debug!(peripherals = batch.len(), "BLE scan finished");
        Ok(batch)
    }

    async fn connect(&self, device: &DeviceRecord) -> Result<BtleplugSession, ConnectError> {
        let peripheral =
            self.peripherals
                .get(&device.address)
                .ok_or_else(|| ConnectError::UnknownDevice {
                    address: device.address.clone(),
                })?;
        if !peripheral.is_connected().await.map_err(BleError::from)? {
            peripheral.connect().await.map_err(BleError::from)?;
        }
        tracing::debug!(name = %device.name, address = %device.address, "link established");
        Ok(BtleplugSession::new(peripheral, device.clone()))
    }

    async fn pair(&self, session: &BtleplugSession) -> Result<PairOutcome, PairError> {
        tracing::debug!(address = %session.device().address, "explicit pairing not available in btleplug");
        Ok(PairOutcome::Unsupported)
    }

    async fn services(&self, session: &BtleplugSession) -> Result<Vec<GattService>, SubscribeError> {
        let peripheral = session.peripheral();
        peripheral
            .discover_services()
            .await
            .map_err(|err| SubscribeError::ServiceDiscovery(Box::new(BleError::from(err))))?;
        Ok(peripheral.services().iter().map(gatt::map_service).collect())
    }

    async fn start_notify(
        &self,
        session: &BtleplugSession,
        characteristic: &GattCharacteristic,
        handler: NotificationHandler,
    ) -> Result<(), SubscribeError> {
        session
            .subscribe(characteristic, handler)
            .await
            .map_err(|err| err.into_subscribe(characteristic.uuid))
    }

    async fn disconnect(&self, session: &BtleplugSession) -> Result<(), ConnectError> {
        session.stop_dispatcher();
        session
            .peripheral()
            .disconnect()
            .await
            .map_err(BleError::from)?;
        Ok(())
    }
}
