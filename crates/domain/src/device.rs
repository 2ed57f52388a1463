//! Device record — one discovered BLE peripheral.

use std::fmt;

use crate::error::ValidationError;

/// Placeholder name some platforms report for peripherals that did not
/// advertise a local name.
pub const UNKNOWN_NAME: &str = "Unknown";

/// Opaque platform reference to a peripheral (e.g. a MAC address or an
/// OS-assigned identifier), sufficient to connect to it later.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeviceAddress(String);

impl DeviceAddress {
    #[must_use]
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A peripheral observed during one discovery session.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceRecord {
    /// Advertised local name; the registry's dedup key.
    pub name: String,
    pub address: DeviceAddress,
    /// Signal strength at detection time. Informational only.
    pub rssi: Option<i16>,
}

impl DeviceRecord {
    /// Create a record without signal strength.
    #[must_use]
    pub fn new(name: impl Into<String>, address: DeviceAddress) -> Self {
        Self {
            name: name.into(),
            address,
            rssi: None,
        }
    }

    #[must_use]
    pub fn with_rssi(mut self, rssi: i16) -> Self {
        self.rssi = Some(rssi);
        self
    }

    /// Check that the record may enter a registry.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::EmptyName`] for an empty name and
    /// [`ValidationError::SentinelName`] for the `"Unknown"` placeholder.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_name(&self.name)
    }
}

/// Admission filter shared by every discovery path.
///
/// # Errors
///
/// See [`DeviceRecord::validate`].
pub fn validate_name(name: &str) -> Result<(), ValidationError> {
    if name.is_empty() {
        return Err(ValidationError::EmptyName);
    }
    if name == UNKNOWN_NAME {
        return Err(ValidationError::SentinelName {
            name: name.to_owned(),
        });
    }
    Ok(())
}
