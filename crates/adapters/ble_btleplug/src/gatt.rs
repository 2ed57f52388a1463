//! GATT helpers for an open btleplug session.
//!
//! btleplug delivers every notification of a peripheral on a single stream.
//! Each [`BtleplugSession`] owns one dispatcher task that reads that stream
//! and routes values to the handler registered for the characteristic.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use btleplug::api::{Characteristic, Peripheral as _, Service};
use btleplug::platform::Peripheral;
use tokio::task::JoinHandle;
use tokio_stream::StreamExt as _;
use uuid::Uuid;

use beldum_domain::device::DeviceRecord;
use beldum_domain::gatt::{
    CharProperties, GattCharacteristic, GattService, Notification, NotificationHandler,
};

use crate::error::BleError;

/// Characteristic UUID → handler table shared with the dispatcher task.
#[derive(Clone, Default)]
pub(crate) struct Routes {
    inner: Arc<Mutex<HashMap<Uuid, NotificationHandler>>>,
}

impl Routes {
    /// Await `enable`, then route `characteristic` to `handler`. A failed
    /// `enable` leaves the table untouched.
    pub(crate) async fn insert_after<E>(
        &self,
        characteristic: Uuid,
        handler: NotificationHandler,
        enable: impl Future<Output = Result<(), E>>,
    ) -> Result<(), E> {
        enable.await?;
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(characteristic, handler);
        Ok(())
    }

    /// Deliver a value to the handler registered for `characteristic`.
    /// Returns `false` when there is none.
    pub(crate) fn dispatch(&self, characteristic: Uuid, value: Vec<u8>) -> bool {
        let handler = self
            .inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&characteristic)
            .cloned();
        match handler {
            Some(handler) => {
                handler(Notification {
                    characteristic,
                    value,
                });
                true
            }
            None => false,
        }
    }
}

/// An open link to one peripheral.
pub struct BtleplugSession {
    peripheral: Peripheral,
    device: DeviceRecord,
    routes: Routes,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for BtleplugSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BtleplugSession")
            .field("device", &self.device)
            .finish_non_exhaustive()
    }
}

impl BtleplugSession {
    pub(crate) fn new(peripheral: Peripheral, device: DeviceRecord) -> Self {
        Self {
            peripheral,
            device,
            routes: Routes::default(),
            dispatcher: Mutex::new(None),
        }
    }

    pub(crate) fn peripheral(&self) -> &Peripheral {
        &self.peripheral
    }

    /// The record this session was opened from.
    #[must_use]
    pub fn device(&self) -> &DeviceRecord {
        &self.device
    }

    /// Register `handler` for `characteristic` and enable notifications.
    ///
    /// The dispatcher is spawned on the first subscription.
    pub(crate) async fn subscribe(
        &self,
        characteristic: &GattCharacteristic,
        handler: NotificationHandler,
    ) -> Result<(), BleError> {
        let target = find_characteristic(&self.peripheral, characteristic)?;
        self.ensure_dispatcher().await?;
        self.routes
            .insert_after(characteristic.uuid, handler, async {
                self.peripheral.subscribe(&target).await.map_err(BleError::from)
            })
            .await
    }

    async fn ensure_dispatcher(&self) -> Result<(), BleError> {
        if self.has_dispatcher() {
            return Ok(());
        }
        let mut stream = self.peripheral.notifications().await?;
        let routes = self.routes.clone();
        let address = self.device.address.clone();
        let task = tokio::spawn(async move {
            while let Some(event) = stream.next().await {
                let uuid = event.uuid;
                if !routes.dispatch(uuid, event.value) {
                    tracing::trace!(%uuid, "unrouted notification");
                }
            }
            tracing::debug!(%address, "notification stream ended");
        });

        let mut slot = self.dispatcher.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.is_some() {
            // Lost a race with a concurrent subscribe.
            task.abort();
        } else {
            *slot = Some(task);
        }
        Ok(())
    }

    fn has_dispatcher(&self) -> bool {
        self.dispatcher
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Stop routing notifications.
    pub(crate) fn stop_dispatcher(&self) {
        if let Some(task) = self
            .dispatcher
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            task.abort();
        }
    }
}

impl Drop for BtleplugSession {
    fn drop(&mut self) {
        self.stop_dispatcher();
    }
}

/// Find the btleplug characteristic behind a domain descriptor on a
/// peripheral that has already discovered its services.
fn find_characteristic(
    peripheral: &Peripheral,
    characteristic: &GattCharacteristic,
) -> Result<Characteristic, BleError> {
    peripheral
        .characteristics()
        .into_iter()
        .find(|c| c.uuid == characteristic.uuid && c.service_uuid == characteristic.service)
        .ok_or(BleError::CharacteristicNotFound {
            uuid: characteristic.uuid,
        })
}

pub(crate) fn map_characteristic(characteristic: &Characteristic) -> GattCharacteristic {
    GattCharacteristic {
        uuid: characteristic.uuid,
        service: characteristic.service_uuid,
        properties: CharProperties::from_bits(characteristic.properties.bits()),
    }
}

pub(crate) fn map_service(service: &Service) -> GattService {
    GattService {
        uuid: service.uuid,
        characteristics: service.characteristics.iter().map(map_characteristic).collect(),
    }
}
