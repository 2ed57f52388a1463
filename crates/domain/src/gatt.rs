//! GATT descriptors — services, characteristics and notification payloads,
//! independent of any platform BLE library.

use std::fmt;
use std::ops::BitOr;
use std::sync::Arc;

use uuid::Uuid;

/// Property flags advertised by a characteristic.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct CharProperties(u8);

impl CharProperties {
    pub const BROADCAST: Self = Self(0x01);
    pub const READ: Self = Self(0x02);
    pub const WRITE_WITHOUT_RESPONSE: Self = Self(0x04);
    pub const WRITE: Self = Self(0x08);
    pub const NOTIFY: Self = Self(0x10);
    pub const INDICATE: Self = Self(0x20);
    pub const AUTHENTICATED_SIGNED_WRITES: Self = Self(0x40);
    pub const EXTENDED_PROPERTIES: Self = Self(0x80);

    #[must_use]
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Build from the raw GATT property byte.
    #[must_use]
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    #[must_use]
    pub const fn bits(self) -> u8 {
        self.0
    }

    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Whether the characteristic supports notifications.
    #[must_use]
    pub const fn can_notify(self) -> bool {
        self.contains(Self::NOTIFY)
    }
}

impl BitOr for CharProperties {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl fmt::Display for CharProperties {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const LABELS: [(CharProperties, &str); 8] = [
            (CharProperties::BROADCAST, "broadcast"),
            (CharProperties::READ, "read"),
            (CharProperties::WRITE_WITHOUT_RESPONSE, "write-without-response"),
            (CharProperties::WRITE, "write"),
            (CharProperties::NOTIFY, "notify"),
            (CharProperties::INDICATE, "indicate"),
            (CharProperties::AUTHENTICATED_SIGNED_WRITES, "authenticated-signed-writes"),
            (CharProperties::EXTENDED_PROPERTIES, "extended-properties"),
        ];
        let labels: Vec<&str> = LABELS
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, label)| *label)
            .collect();
        f.write_str(&labels.join(","))
    }
}

/// One characteristic of a remote GATT service.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GattCharacteristic {
    pub uuid: Uuid,
    /// UUID of the owning service.
    pub service: Uuid,
    pub properties: CharProperties,
}

/// A remote GATT service and its characteristics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GattService {
    pub uuid: Uuid,
    pub characteristics: Vec<GattCharacteristic>,
}

impl GattService {
    /// Characteristics of this service that support notifications.
    pub fn notifiable(&self) -> impl Iterator<Item = &GattCharacteristic> {
        self.characteristics
            .iter()
            .filter(|c| c.properties.can_notify())
    }
}

/// A value pushed by the peripheral on a subscribed characteristic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub characteristic: Uuid,
    pub value: Vec<u8>,
}

/// Caller-supplied sink for notifications. The payload is not interpreted.
pub type NotificationHandler = Arc<dyn Fn(Notification) + Send + Sync>;
