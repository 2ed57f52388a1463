//! Discovery pass on a btleplug central.
//!
//! Advertisement events are turned into [`DeviceRecord`]s and streamed to the
//! caller as they arrive; after the deadline the adapter's own peripheral list
//! is returned as the final batch.

use std::time::Duration;

use btleplug::api::{Central, CentralEvent, Peripheral as _, PeripheralProperties, ScanFilter};
use btleplug::platform::{Adapter, Peripheral, PeripheralId};
use tokio::sync::mpsc;
use tokio_stream::StreamExt as _;

use beldum_domain::device::{DeviceAddress, DeviceRecord};

use crate::PeripheralCache;
use crate::error::BleError;

/// Runs `on_drop` unless disarmed.
///
/// Keeps the adapter from scanning forever when the discovery future is
/// dropped before its window closes.
struct ScanGuard<F: FnOnce()> {
    on_drop: Option<F>,
}

impl<F: FnOnce()> ScanGuard<F> {
    fn new(on_drop: F) -> Self {
        Self {
            on_drop: Some(on_drop),
        }
    }

    fn disarm(mut self) {
        self.on_drop = None;
    }
}

impl<F: FnOnce()> Drop for ScanGuard<F> {
    fn drop(&mut self) {
        if let Some(on_drop) = self.on_drop.take() {
            on_drop();
        }
    }
}

/// Stop the scan from a background task; `Drop` cannot await.
fn stop_in_background(central: Adapter) {
    let Ok(runtime) = tokio::runtime::Handle::try_current() else {
        return;
    };
    runtime.spawn(async move {
        match central.stop_scan().await {
            Ok(()) => tracing::debug!("BLE scan stopped after cancellation"),
            Err(err) => tracing::warn!(%err, "failed to stop abandoned BLE scan"),
        }
    });
}

/// Peripheral referenced by an advertisement-bearing event, if any.
fn advertised_id(event: &CentralEvent) -> Option<&PeripheralId> {
    match event {
        CentralEvent::DeviceDiscovered(id)
        | CentralEvent::DeviceUpdated(id)
        | CentralEvent::ManufacturerDataAdvertisement { id, .. }
        | CentralEvent::ServiceDataAdvertisement { id, .. }
        | CentralEvent::ServicesAdvertisement { id, .. } => Some(id),
        _ => None,
    }
}

/// Build a record from advertised properties.
///
/// A peripheral without a local name yields an empty name; the registry's
/// admission filter drops it.
pub(crate) fn record_from_properties(
    address: DeviceAddress,
    props: &PeripheralProperties,
) -> DeviceRecord {
    let record = DeviceRecord::new(props.local_name.clone().unwrap_or_default(), address);
    match props.rssi {
        Some(rssi) => record.with_rssi(rssi),
        None => record,
    }
}

/// Read a peripheral's properties, remember it for later connects, and
/// describe it as a record.
async fn remember(cache: &PeripheralCache, peripheral: Peripheral) -> Option<DeviceRecord> {
    let props = match peripheral.properties().await {
        Ok(Some(props)) => props,
        Ok(None) => return None,
        Err(err) => {
            tracing::debug!(%err, "failed to read peripheral properties");
            return None;
        }
    };
    let address = DeviceAddress::new(peripheral.id().to_string());
    let record = record_from_properties(address.clone(), &props);
    cache.insert(address, peripheral);
    Some(record)
}

/// Scan on `central` for `timeout`, streaming detections into `detections`.
///
/// # Errors
///
/// Returns [`BleError`] when the scan cannot be started, stopped, or the
/// peripheral list cannot be read.
pub(crate) async fn run_scan(
    central: &Adapter,
    cache: &PeripheralCache,
    timeout: Duration,
    detections: &mpsc::Sender<DeviceRecord>,
) -> Result<Vec<DeviceRecord>, BleError> {
    let mut events = central.events().await?;
    central.start_scan(ScanFilter::default()).await?;
    let guard = ScanGuard::new({
        let central = central.clone();
        move || stop_in_background(central)
    });

    let deadline = tokio::time::Instant::now() + timeout;

    while tokio::time::Instant::now() < deadline {
        let remaining = deadline - tokio::time::Instant::now();
        match tokio::time::timeout(remaining, events.next()).await {
            Ok(Some(event)) => {
                let Some(id) = advertised_id(&event) else {
                    continue;
                };
                let Ok(peripheral) = central.peripheral(id).await else {
                    continue;
                };
                if let Some(record) = remember(cache, peripheral).await {
                    tracing::trace!(name = %record.name, address = %record.address, "advertisement");
                    if detections.send(record).await.is_err() {
                        tracing::debug!("detection receiver dropped");
                    }
                }
            }
            Ok(None) | Err(_) => break,
        }
    }

    guard.disarm();
    central.stop_scan().await?;

    let mut batch = Vec::new();
    for peripheral in central.peripherals().await? {
        if let Some(record) = remember(cache, peripheral).await {
            batch.push(record);
        }
    }
    Ok(batch)
}
