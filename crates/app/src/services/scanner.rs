//! Scanner — one bounded discovery pass into a [`DeviceRegistry`].
//!
//! The platform pushes detections through an `mpsc` channel while it scans;
//! the scanner task is the only writer of the registry. It drains the channel
//! concurrently with the discovery future, then reconciles the platform's
//! final result list through the same admission filter.

use std::collections::HashSet;
use std::time::Duration;

use tokio::sync::mpsc;

use beldum_domain::device::DeviceRecord;
use beldum_domain::registry::{Admission, DeviceRegistry};

use crate::error::ScanError;
use crate::ports::BlePlatform;

/// Default duration of one discovery pass.
pub const DEFAULT_SCAN_TIMEOUT: Duration = Duration::from_secs(5);

/// Capacity of the detection channel between the platform and the scanner.
const DETECTION_BUFFER: usize = 64;

/// Counters for one discovery pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanSummary {
    /// Distinct admissible names observed during this pass.
    pub seen: usize,
    /// Names that were not yet in the registry.
    pub inserted: usize,
    /// Advertisements dropped by the admission filter.
    pub rejected: usize,
}

/// Runs discovery passes against a [`BlePlatform`].
pub struct Scanner<P> {
    platform: P,
    timeout: Duration,
}

impl<P: BlePlatform> Scanner<P> {
    /// Create a scanner whose passes last `timeout`.
    pub fn new(platform: P, timeout: Duration) -> Self {
        Self { platform, timeout }
    }

    /// Run one pass into a fresh registry.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError`] when the platform cannot scan at all. Finding no
    /// devices is not an error.
    pub async fn scan(&self) -> Result<DeviceRegistry, ScanError> {
        let mut registry = DeviceRegistry::new();
        self.scan_into(&mut registry).await?;
        Ok(registry)
    }

    /// Run one pass, adding what it finds to `registry`.
    ///
    /// Each distinct name is logged once per pass.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError`] when the platform cannot scan at all.
    #[tracing::instrument(skip(self, registry), fields(timeout_secs = self.timeout.as_secs()))]
    pub async fn scan_into(&self, registry: &mut DeviceRegistry) -> Result<ScanSummary, ScanError> {
        tracing::info!("scanning for BLE devices");

        let (tx, mut rx) = mpsc::channel(DETECTION_BUFFER);
        let mut pass = ScanPass::new(registry);

        let discover = self.platform.discover(self.timeout, tx);
        tokio::pin!(discover);

        let batch = loop {
            tokio::select! {
                Some(record) = rx.recv() => pass.offer(record),
                result = &mut discover => break result?,
            }
        };

        while let Ok(record) = rx.try_recv() {
            pass.offer(record);
        }
        for record in batch {
            pass.offer(record);
        }

        let summary = pass.summary();
        tracing::info!(
            seen = summary.seen,
            inserted = summary.inserted,
            total = registry.len(),
            "BLE scan complete"
        );
        Ok(summary)
    }
}

/// Bookkeeping for a single pass over a borrowed registry.
struct ScanPass<'a> {
    registry: &'a mut DeviceRegistry,
    seen: HashSet<String>,
    inserted: usize,
    rejected: usize,
}

impl<'a> ScanPass<'a> {
    fn new(registry: &'a mut DeviceRegistry) -> Self {
        Self {
            registry,
            seen: HashSet::new(),
            inserted: 0,
            rejected: 0,
        }
    }

    fn offer(&mut self, record: DeviceRecord) {
        let name = record.name.clone();
        match self.registry.admit(record) {
            Admission::Rejected(reason) => {
                tracing::trace!(%reason, "ignoring advertisement");
                self.rejected += 1;
                return;
            }
            Admission::Inserted => self.inserted += 1,
            Admission::Updated => {}
        }
        if self.seen.insert(name.clone()) {
            tracing::info!(%name, "discovered");
        }
    }

    fn summary(&self) -> ScanSummary {
        ScanSummary {
            seen: self.seen.len(),
            inserted: self.inserted,
            rejected: self.rejected,
        }
    }
}
