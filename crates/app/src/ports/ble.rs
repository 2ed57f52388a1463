//! BLE platform port — discovery and GATT session primitives.
//!
//! The platform BLE stack (scanning, link layer, GATT) lives behind this
//! trait. The application core only relies on the operations below and on
//! the `name`/`address` fields of [`DeviceRecord`].

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use beldum_domain::device::DeviceRecord;
use beldum_domain::gatt::{GattCharacteristic, GattService, NotificationHandler};

use crate::error::{ConnectError, PairError, ScanError, SubscribeError};

/// Result of a pairing request that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairOutcome {
    /// The peripheral is paired (or was already).
    Paired,
    /// The platform does not support explicit pairing. Characteristic access
    /// is still possible, so this counts as success.
    Unsupported,
}

/// Platform BLE primitives.
///
/// Implementations live in adapter crates (e.g. `adapters/ble_btleplug`).
/// Tests provide in-memory fakes.
pub trait BlePlatform: Send + Sync {
    /// An open link to one peripheral.
    type Session: Send + Sync;

    /// Scan for `timeout`.
    ///
    /// Every advertisement observed while scanning, including non-connectable
    /// scan responses, is pushed into `detections` as it arrives. The returned
    /// list is the platform's own final view of the peripherals it saw.
    fn discover(
        &self,
        timeout: Duration,
        detections: mpsc::Sender<DeviceRecord>,
    ) -> impl Future<Output = Result<Vec<DeviceRecord>, ScanError>> + Send;

    /// Open a link to `device`. The caller bounds this with its own timeout.
    fn connect(
        &self,
        device: &DeviceRecord,
    ) -> impl Future<Output = Result<Self::Session, ConnectError>> + Send;

    /// Request pairing on an open session.
    fn pair(
        &self,
        session: &Self::Session,
    ) -> impl Future<Output = Result<PairOutcome, PairError>> + Send;

    /// Enumerate the remote services and their characteristics.
    fn services(
        &self,
        session: &Self::Session,
    ) -> impl Future<Output = Result<Vec<GattService>, SubscribeError>> + Send;

    /// Enable notifications on `characteristic`, delivering each value to
    /// `handler`.
    fn start_notify(
        &self,
        session: &Self::Session,
        characteristic: &GattCharacteristic,
        handler: NotificationHandler,
    ) -> impl Future<Output = Result<(), SubscribeError>> + Send;

    /// Close the link.
    fn disconnect(
        &self,
        session: &Self::Session,
    ) -> impl Future<Output = Result<(), ConnectError>> + Send;
}

impl<T: BlePlatform> BlePlatform for Arc<T> {
    type Session = T::Session;

    fn discover(
        &self,
        timeout: Duration,
        detections: mpsc::Sender<DeviceRecord>,
    ) -> impl Future<Output = Result<Vec<DeviceRecord>, ScanError>> + Send {
        (**self).discover(timeout, detections)
    }

    fn connect(
        &self,
        device: &DeviceRecord,
    ) -> impl Future<Output = Result<Self::Session, ConnectError>> + Send {
        (**self).connect(device)
    }

    fn pair(
        &self,
        session: &Self::Session,
    ) -> impl Future<Output = Result<PairOutcome, PairError>> + Send {
        (**self).pair(session)
    }

    fn services(
        &self,
        session: &Self::Session,
    ) -> impl Future<Output = Result<Vec<GattService>, SubscribeError>> + Send {
        (**self).services(session)
    }

    fn start_notify(
        &self,
        session: &Self::Session,
        characteristic: &GattCharacteristic,
        handler: NotificationHandler,
    ) -> impl Future<Output = Result<(), SubscribeError>> + Send {
        (**self).start_notify(session, characteristic, handler)
    }

    fn disconnect(
        &self,
        session: &Self::Session,
    ) -> impl Future<Output = Result<(), ConnectError>> + Send {
        (**self).disconnect(session)
    }
}
