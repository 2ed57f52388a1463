//! Connection manager — the acquisition state machine.
//!
//! ```text
//! Scanning ⇄ Matching → Connecting → Pairing → Subscribing → Ready
//!                            │           │           │
//!                            └───────────┴───────────┴──→ FailedAttempt ──→ (retry | Exhausted)
//! ```
//!
//! One attempt scans (with a fresh registry) until a device matches, then
//! connects to the first match, pairs and enables every notifiable
//! characteristic. Waiting for a device to appear does not consume the retry
//! budget; a device that exists but cannot be brought up does.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use beldum_domain::device::DeviceRecord;
use beldum_domain::gatt::{GattCharacteristic, NotificationHandler};
use beldum_domain::pattern::IdentifierPattern;
use beldum_domain::registry::DeviceRegistry;

use crate::error::{AcquireError, AttemptError, ConnectError, Report, SubscribeError};
use crate::ports::{BlePlatform, PairOutcome};
use crate::services::matcher::match_devices;
use crate::services::scanner::{DEFAULT_SCAN_TIMEOUT, Scanner};
use crate::shutdown::Shutdown;

/// Default bound on a single connect call.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

/// Default number of full attempts before giving up.
pub const DEFAULT_MAX_RETRIES: u32 = 10;

/// Tunables for [`ConnectionManager`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcquisitionConfig {
    /// Duration of each discovery pass. Also paces the scan/match sub-loop.
    pub scan_timeout: Duration,
    pub connect_timeout: Duration,
    /// Number of failed attempts tolerated before [`AcquireError::ExhaustedRetries`].
    pub max_retries: u32,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            scan_timeout: DEFAULT_SCAN_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

/// States of one acquisition attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Scanning,
    Matching,
    Connecting,
    Pairing,
    Subscribing,
    Ready,
    FailedAttempt,
    Exhausted,
}

impl Phase {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Scanning => "scanning",
            Self::Matching => "matching",
            Self::Connecting => "connecting",
            Self::Pairing => "pairing",
            Self::Subscribing => "subscribing",
            Self::Ready => "ready",
            Self::FailedAttempt => "failed_attempt",
            Self::Exhausted => "exhausted",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A connected, paired session with notifications enabled.
///
/// Owned by the caller; release it with [`ConnectionManager::disconnect`].
#[derive(Debug)]
pub struct ConnectionHandle<S> {
    session: S,
    device: DeviceRecord,
    pairing: PairOutcome,
    subscriptions: Vec<GattCharacteristic>,
    attempts: u32,
}

impl<S> ConnectionHandle<S> {
    #[must_use]
    pub fn session(&self) -> &S {
        &self.session
    }

    #[must_use]
    pub fn device(&self) -> &DeviceRecord {
        &self.device
    }

    #[must_use]
    pub fn pairing(&self) -> PairOutcome {
        self.pairing
    }

    /// Characteristics with notifications enabled.
    #[must_use]
    pub fn subscriptions(&self) -> &[GattCharacteristic] {
        &self.subscriptions
    }

    /// Attempts used to reach the ready state, including the successful one.
    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.attempts
    }
}

/// Drives a [`BlePlatform`] from discovery to a ready session.
pub struct ConnectionManager<P> {
    platform: P,
    scanner: Scanner<P>,
    config: AcquisitionConfig,
    shutdown: Shutdown,
}

impl<P: BlePlatform + Clone> ConnectionManager<P> {
    /// Create a manager. `platform` is cloned for the internal scanner, so it
    /// should be a cheap handle (e.g. an `Arc`).
    pub fn new(platform: P, config: AcquisitionConfig, shutdown: Shutdown) -> Self {
        let scanner = Scanner::new(platform.clone(), config.scan_timeout);
        Self {
            platform,
            scanner,
            config,
            shutdown,
        }
    }
}

impl<P: BlePlatform> ConnectionManager<P> {
    /// Find a device matching `pattern` and bring it to the ready state.
    ///
    /// Every per-attempt failure (scan, connect, pair, subscribe) is logged
    /// and retried from a fresh scan until `max_retries` attempts have failed.
    ///
    /// # Errors
    ///
    /// Returns [`AcquireError::ExhaustedRetries`] once the retry budget is
    /// spent, or [`AcquireError::Cancelled`] when shutdown is requested.
    #[tracing::instrument(skip(self, handler), fields(pattern = %pattern, max_retries = self.config.max_retries))]
    pub async fn connect_and_prepare(
        &self,
        pattern: &IdentifierPattern,
        handler: NotificationHandler,
    ) -> Result<ConnectionHandle<P::Session>, AcquireError> {
        let max_retries = self.config.max_retries;
        let mut last = None;

        for retry in 0..max_retries {
            match self.attempt(pattern, &handler).await {
                Ok(mut handle) => {
                    handle.attempts = retry + 1;
                    tracing::info!(
                        phase = %Phase::Ready,
                        name = %handle.device.name,
                        address = %handle.device.address,
                        subscriptions = handle.subscriptions.len(),
                        failures = retry,
                        "device ready"
                    );
                    return Ok(handle);
                }
                Err(AttemptError::Cancelled) => {
                    tracing::info!("device acquisition cancelled");
                    return Err(AcquireError::Cancelled);
                }
                Err(err) => {
                    tracing::warn!(
                        phase = %Phase::FailedAttempt,
                        error = %Report(&err),
                        retry,
                        max_retries,
                        "connection attempt failed"
                    );
                    last = Some(err);
                }
            }
        }

        tracing::error!(phase = %Phase::Exhausted, max_retries, "giving up on device acquisition");
        Err(AcquireError::ExhaustedRetries { max_retries, last })
    }

    /// Close a session returned by [`connect_and_prepare`](Self::connect_and_prepare).
    ///
    /// # Errors
    ///
    /// Propagates the platform's [`ConnectError`].
    pub async fn disconnect(&self, handle: ConnectionHandle<P::Session>) -> Result<(), ConnectError> {
        self.platform.disconnect(&handle.session).await?;
        tracing::info!(name = %handle.device.name, "disconnected");
        Ok(())
    }

    async fn attempt(
        &self,
        pattern: &IdentifierPattern,
        handler: &NotificationHandler,
    ) -> Result<ConnectionHandle<P::Session>, AttemptError> {
        let device = self.first_match(pattern).await?;

        self.enter(Phase::Connecting)?;
        let connect = tokio::time::timeout(self.config.connect_timeout, self.platform.connect(&device));
        let session = match self.shutdown.run_until(connect).await {
            None => return Err(AttemptError::Cancelled),
            Some(Err(_elapsed)) => {
                return Err(ConnectError::Timeout {
                    address: device.address.clone(),
                    timeout: self.config.connect_timeout,
                }
                .into());
            }
            Some(Ok(result)) => result?,
        };
        tracing::info!(name = %device.name, address = %device.address, "connected");

        match self.prepare(&session, handler).await {
            Ok((pairing, subscriptions)) => Ok(ConnectionHandle {
                session,
                device,
                pairing,
                subscriptions,
                attempts: 0,
            }),
            Err(err) => {
                if let Err(close_err) = self.platform.disconnect(&session).await {
                    tracing::debug!(error = %Report(&close_err), "failed to close half-open session");
                }
                Err(err)
            }
        }
    }

    /// Scanning/matching sub-loop. Repeats until a candidate appears.
    async fn first_match(&self, pattern: &IdentifierPattern) -> Result<DeviceRecord, AttemptError> {
        let mut registry = DeviceRegistry::new();
        loop {
            self.enter(Phase::Scanning)?;
            let pass_started = tokio::time::Instant::now();
            self.shutdown
                .run_until(self.scanner.scan_into(&mut registry))
                .await
                .ok_or(AttemptError::Cancelled)??;

            self.enter(Phase::Matching)?;
            if let Some(device) = match_devices(&registry, pattern).into_iter().next() {
                tracing::info!(name = %device.name, address = %device.address, "selected device");
                return Ok(device);
            }
            tracing::info!(known = registry.len(), "no matching device yet, scanning again");

            let next_pass = pass_started + self.config.scan_timeout;
            self.shutdown
                .run_until(tokio::time::sleep_until(next_pass))
                .await
                .ok_or(AttemptError::Cancelled)?;
        }
    }

    async fn prepare(
        &self,
        session: &P::Session,
        handler: &NotificationHandler,
    ) -> Result<(PairOutcome, Vec<GattCharacteristic>), AttemptError> {
        self.enter(Phase::Pairing)?;
        let pairing = self.platform.pair(session).await?;
        match pairing {
            PairOutcome::Paired => tracing::info!("paired"),
            PairOutcome::Unsupported => {
                tracing::info!("pairing not supported on this platform, continuing");
            }
        }

        self.enter(Phase::Subscribing)?;
        let subscriptions = self.subscribe_all(session, handler).await?;
        Ok((pairing, subscriptions))
    }

    /// One `start_notify` per characteristic that can notify, none for the rest.
    async fn subscribe_all(
        &self,
        session: &P::Session,
        handler: &NotificationHandler,
    ) -> Result<Vec<GattCharacteristic>, SubscribeError> {
        let services = self.platform.services(session).await?;
        let mut subscribed = Vec::new();
        for service in &services {
            for characteristic in service.notifiable() {
                self.platform
                    .start_notify(session, characteristic, Arc::clone(handler))
                    .await?;
                tracing::debug!(
                    service = %service.uuid,
                    characteristic = %characteristic.uuid,
                    "notifications enabled"
                );
                subscribed.push(characteristic.clone());
            }
        }
        tracing::info!(
            services = services.len(),
            subscriptions = subscribed.len(),
            "subscribed to notifications"
        );
        Ok(subscribed)
    }

    /// Honour shutdown at a phase boundary, then record the transition.
    fn enter(&self, phase: Phase) -> Result<(), AttemptError> {
        if self.shutdown.is_triggered() {
            return Err(AttemptError::Cancelled);
        }
        tracing::debug!(%phase, "entering phase");
        Ok(())
    }
}
