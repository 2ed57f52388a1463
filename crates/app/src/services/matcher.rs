//! Matcher — selects registry entries whose name fits an identifier pattern.

use beldum_domain::device::DeviceRecord;
use beldum_domain::pattern::IdentifierPattern;
use beldum_domain::registry::DeviceRegistry;

/// Every record in `registry` whose name starts with text accepted by
/// `pattern`, in registry iteration order.
///
/// An empty result is not an error; it means "scan again".
#[must_use]
pub fn match_devices(registry: &DeviceRegistry, pattern: &IdentifierPattern) -> Vec<DeviceRecord> {
    let matches: Vec<DeviceRecord> = registry
        .iter()
        .filter(|record| pattern.matches(&record.name))
        .cloned()
        .collect();
    tracing::debug!(
        pattern = %pattern,
        candidates = matches.len(),
        known = registry.len(),
        "matched registry against identifier pattern"
    );
    matches
}
