//! Scriptable in-memory [`BlePlatform`] used by the service tests.

use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use tokio::sync::mpsc;
use uuid::Uuid;

use beldum_domain::device::{DeviceAddress, DeviceRecord};
use beldum_domain::gatt::{
    CharProperties, GattCharacteristic, GattService, Notification, NotificationHandler,
};

use crate::error::{ConnectError, PairError, ScanError, SubscribeError};
use crate::ports::{BlePlatform, PairOutcome};
use crate::shutdown::ShutdownTrigger;

pub(crate) fn record(name: &str, address: &str) -> DeviceRecord {
    DeviceRecord::new(name, DeviceAddress::new(address))
}

pub(crate) fn characteristic(service: u128, n: u128, properties: CharProperties) -> GattCharacteristic {
    GattCharacteristic {
        uuid: Uuid::from_u128(n),
        service: Uuid::from_u128(service),
        properties,
    }
}

/// How `pair` behaves.
#[derive(Debug, Clone, Copy)]
pub(crate) enum PairMode {
    Paired,
    Unsupported,
    Reject,
}

#[derive(Debug)]
pub(crate) struct FakeSession {
    pub(crate) address: DeviceAddress,
}

pub(crate) struct FakePlatform {
    detections: Vec<DeviceRecord>,
    batch: Vec<DeviceRecord>,
    /// Scans that report nothing before the scripted devices appear.
    empty_scans: u32,
    failing_scans: u32,
    failing_connects: u32,
    hanging_connects: bool,
    pair_mode: PairMode,
    services: Vec<GattService>,
    failing_notify: Option<Uuid>,
    /// Fired right after a successful connect.
    trigger_on_connect: Option<ShutdownTrigger>,

    pub(crate) scans: AtomicU32,
    pub(crate) connects: AtomicU32,
    pub(crate) pairs: AtomicU32,
    pub(crate) disconnects: AtomicU32,
    pub(crate) notified: Mutex<Vec<Uuid>>,
    pub(crate) handlers: Mutex<Vec<(Uuid, NotificationHandler)>>,
}

impl std::fmt::Debug for FakePlatform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FakePlatform")
            .field("scans", &self.scans)
            .field("connects", &self.connects)
            .field("pairs", &self.pairs)
            .field("disconnects", &self.disconnects)
            .finish_non_exhaustive()
    }
}

impl Default for FakePlatform {
    fn default() -> Self {
        Self {
            detections: Vec::new(),
            batch: Vec::new(),
            empty_scans: 0,
            failing_scans: 0,
            failing_connects: 0,
            hanging_connects: false,
            pair_mode: PairMode::Paired,
            services: Vec::new(),
            failing_notify: None,
            trigger_on_connect: None,
            scans: AtomicU32::new(0),
            connects: AtomicU32::new(0),
            pairs: AtomicU32::new(0),
            disconnects: AtomicU32::new(0),
            notified: Mutex::new(Vec::new()),
            handlers: Mutex::new(Vec::new()),
        }
    }
}

impl FakePlatform {
    pub(crate) fn with_detections(mut self, detections: Vec<DeviceRecord>) -> Self {
        self.detections = detections;
        self
    }

    pub(crate) fn with_batch(mut self, batch: Vec<DeviceRecord>) -> Self {
        self.batch = batch;
        self
    }

    pub(crate) fn empty_scans(mut self, n: u32) -> Self {
        self.empty_scans = n;
        self
    }

    pub(crate) fn failing_scans(mut self, n: u32) -> Self {
        self.failing_scans = n;
        self
    }

    pub(crate) fn failing_connects(mut self, n: u32) -> Self {
        self.failing_connects = n;
        self
    }

    pub(crate) fn hanging_connects(mut self) -> Self {
        self.hanging_connects = true;
        self
    }

    pub(crate) fn pair_mode(mut self, mode: PairMode) -> Self {
        self.pair_mode = mode;
        self
    }

    pub(crate) fn with_services(mut self, services: Vec<GattService>) -> Self {
        self.services = services;
        self
    }

    pub(crate) fn failing_notify_on(mut self, characteristic: Uuid) -> Self {
        self.failing_notify = Some(characteristic);
        self
    }

    pub(crate) fn shutdown_on_connect(mut self, trigger: ShutdownTrigger) -> Self {
        self.trigger_on_connect = Some(trigger);
        self
    }

    pub(crate) fn count(counter: &AtomicU32) -> u32 {
        counter.load(Ordering::SeqCst)
    }

    /// Push a value through every registered handler for `characteristic`.
    pub(crate) fn emit(&self, characteristic: Uuid, value: &[u8]) {
        let handlers = self.handlers.lock().unwrap();
        for (uuid, handler) in handlers.iter() {
            if *uuid == characteristic {
                handler(Notification {
                    characteristic,
                    value: value.to_vec(),
                });
            }
        }
    }
}

impl BlePlatform for FakePlatform {
    type Session = FakeSession;

    async fn discover(
        &self,
        timeout: Duration,
        detections: mpsc::Sender<DeviceRecord>,
    ) -> Result<Vec<DeviceRecord>, ScanError> {
        let n = self.scans.fetch_add(1, Ordering::SeqCst) + 1;
        if n <= self.failing_scans {
            return Err(ScanError::AdapterUnavailable);
        }
        tokio::time::sleep(timeout).await;
        if n <= self.failing_scans.saturating_add(self.empty_scans) {
            return Ok(Vec::new());
        }
        for record in &self.detections {
            if detections.send(record.clone()).await.is_err() {
                break;
            }
        }
        Ok(self.batch.clone())
    }

    async fn connect(&self, device: &DeviceRecord) -> Result<FakeSession, ConnectError> {
        let n = self.connects.fetch_add(1, Ordering::SeqCst) + 1;
        if self.hanging_connects {
            std::future::pending::<()>().await;
        }
        if n <= self.failing_connects {
            return Err(ConnectError::Platform(format!("connect #{n} refused").into()));
        }
        if let Some(trigger) = &self.trigger_on_connect {
            trigger.trigger();
        }
        Ok(FakeSession {
            address: device.address.clone(),
        })
    }

    async fn pair(&self, _session: &FakeSession) -> Result<PairOutcome, PairError> {
        self.pairs.fetch_add(1, Ordering::SeqCst);
        match self.pair_mode {
            PairMode::Paired => Ok(PairOutcome::Paired),
            PairMode::Unsupported => Ok(PairOutcome::Unsupported),
            PairMode::Reject => Err(PairError::Rejected),
        }
    }

    async fn services(&self, _session: &FakeSession) -> Result<Vec<GattService>, SubscribeError> {
        Ok(self.services.clone())
    }

    async fn start_notify(
        &self,
        _session: &FakeSession,
        characteristic: &GattCharacteristic,
        handler: NotificationHandler,
    ) -> Result<(), SubscribeError> {
        self.notified.lock().unwrap().push(characteristic.uuid);
        if self.failing_notify == Some(characteristic.uuid) {
            return Err(SubscribeError::StartNotify {
                characteristic: characteristic.uuid,
                source: "CCCD write rejected".into(),
            });
        }
        self.handlers
            .lock()
            .unwrap()
            .push((characteristic.uuid, handler));
        Ok(())
    }

    async fn disconnect(&self, _session: &FakeSession) -> Result<(), ConnectError> {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[test]
    fn should_format_counters_while_holding_handlers() {
        let platform = FakePlatform::default();
        let handler: NotificationHandler = Arc::new(|_| {});
        platform
            .handlers
            .lock()
            .unwrap()
            .push((Uuid::from_u128(0x73), handler));
        platform.connects.fetch_add(2, Ordering::SeqCst);

        let rendered = format!("{platform:?}");
        assert!(rendered.starts_with("FakePlatform {"));
        assert!(rendered.contains("connects: 2"));
    }
}
