//! BLE adapter error types.

use beldum_app::error::{ConnectError, ScanError, SubscribeError};

/// Errors specific to the btleplug adapter.
#[derive(Debug, thiserror::Error)]
pub enum BleError {
    /// No BLE adapter found on the host.
    #[error("no BLE adapter available")]
    NotAvailable,

    /// The configured adapter index is past the end of the host's adapters.
    #[error("BLE adapter #{index} not found ({available} available)")]
    AdapterIndex { index: usize, available: usize },

    /// A characteristic reported by service discovery is gone.
    #[error("characteristic {uuid} not found on peripheral")]
    CharacteristicNotFound { uuid: uuid::Uuid },

    /// BLE scan or adapter operation failed.
    #[error("BLE stack error")]
    Btleplug(#[from] btleplug::Error),
}

impl From<BleError> for ScanError {
    fn from(err: BleError) -> Self {
        match err {
            BleError::NotAvailable => Self::AdapterUnavailable,
            other => Self::Platform(Box::new(other)),
        }
    }
}

impl From<BleError> for ConnectError {
    fn from(err: BleError) -> Self {
        Self::Platform(Box::new(err))
    }
}

impl BleError {
    /// Convert into a [`SubscribeError`] for a failed subscription on
    /// `characteristic`.
    #[must_use]
    pub fn into_subscribe(self, characteristic: uuid::Uuid) -> SubscribeError {
        SubscribeError::StartNotify {
            characteristic,
            source: Box::new(self),
        }
    }
}
