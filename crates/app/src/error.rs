//! Error types for each acquisition phase.
//!
//! Every phase reports its own failure kinds. Per-attempt failures fold into
//! [`AttemptError`], which the connection manager retries; only
//! [`AcquireError`] leaves the manager.

use std::error::Error as StdError;
use std::fmt;
use std::time::Duration;

use beldum_domain::device::DeviceAddress;

/// Boxed platform error carried across the port boundary.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// The platform could not run a discovery pass.
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    /// No BLE adapter found on the host.
    #[error("no BLE adapter available")]
    AdapterUnavailable,

    #[error("BLE scan failed")]
    Platform(#[source] BoxError),
}

/// Establishing the link to a peripheral failed.
#[derive(Debug, thiserror::Error)]
pub enum ConnectError {
    #[error("connection to {address} timed out after {timeout:?}")]
    Timeout {
        address: DeviceAddress,
        timeout: Duration,
    },

    /// The address was never reported by a discovery pass on this platform.
    #[error("device {address} is unknown to the BLE platform")]
    UnknownDevice { address: DeviceAddress },

    #[error("BLE connection failed")]
    Platform(#[source] BoxError),
}

/// Pairing failed for a reason other than lack of platform support.
#[derive(Debug, thiserror::Error)]
pub enum PairError {
    #[error("peripheral rejected pairing")]
    Rejected,
}

/// Service enumeration or notification setup failed.
#[derive(Debug, thiserror::Error)]
pub enum SubscribeError {
    #[error("GATT service discovery failed")]
    ServiceDiscovery(#[source] BoxError),

    #[error("failed to enable notifications on characteristic {characteristic}")]
    StartNotify {
        characteristic: uuid::Uuid,
        #[source]
        source: BoxError,
    },
}

/// Why a single connection attempt did not reach the ready state.
#[derive(Debug, thiserror::Error)]
pub enum AttemptError {
    #[error("scan phase failed")]
    Scan(#[from] ScanError),

    #[error("connect phase failed")]
    Connect(#[from] ConnectError),

    #[error("pair phase failed")]
    Pair(#[from] PairError),

    #[error("subscribe phase failed")]
    Subscribe(#[from] SubscribeError),

    /// Shutdown was requested mid-attempt. Not retried.
    #[error("attempt cancelled")]
    Cancelled,
}

/// Terminal failure of [`connect_and_prepare`](crate::services::connection_manager::ConnectionManager::connect_and_prepare).
#[derive(Debug, thiserror::Error)]
pub enum AcquireError {
    #[error("no device became ready within {max_retries} attempts")]
    ExhaustedRetries {
        max_retries: u32,
        #[source]
        last: Option<AttemptError>,
    },

    #[error("device acquisition cancelled")]
    Cancelled,
}

/// Renders an error followed by its whole `source()` chain, separated by `: `.
pub struct Report<'a>(pub &'a (dyn StdError + 'static));

impl fmt::Display for Report<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)?;
        let mut source = self.0.source();
        while let Some(err) = source {
            write!(f, ": {err}")?;
            source = err.source();
        }
        Ok(())
    }
}
