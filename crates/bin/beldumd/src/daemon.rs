//! Device session — acquire a camera, poll it until shutdown, release it.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use beldum_app::error::{AcquireError, Report};
use beldum_app::ports::BlePlatform;
use beldum_app::services::connection_manager::{AcquisitionConfig, ConnectionManager};
use beldum_app::services::poll_loop::PollLoop;
use beldum_app::shutdown::Shutdown;
use beldum_domain::gatt::{Notification, NotificationHandler};
use beldum_domain::pattern::IdentifierPattern;
use beldum_domain::time;

/// Everything a session needs, resolved from configuration.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub pattern: IdentifierPattern,
    pub acquisition: AcquisitionConfig,
    pub poll_interval: Duration,
}

/// How a session that reached the ready state ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    /// Name of the device that was acquired.
    pub device: String,
    /// Attempts used to acquire it.
    pub attempts: u32,
    /// Completed capture polls.
    pub captures: u64,
}

fn log_notification(notification: Notification) {
    tracing::debug!(
        characteristic = %notification.characteristic,
        len = notification.value.len(),
        "notification"
    );
}

/// Acquire a device matching `settings.pattern`, run the capture poll until
/// `shutdown` fires, then disconnect.
///
/// # Errors
///
/// Returns [`AcquireError::ExhaustedRetries`] when no device could be made
/// ready, or [`AcquireError::Cancelled`] when shutdown came first.
pub async fn run<P>(
    platform: P,
    settings: &SessionSettings,
    shutdown: Shutdown,
) -> Result<SessionSummary, AcquireError>
where
    P: BlePlatform + Clone,
{
    let manager = ConnectionManager::new(platform, settings.acquisition, shutdown.clone());
    let handler: NotificationHandler = Arc::new(log_notification);

    let handle = manager
        .connect_and_prepare(&settings.pattern, handler)
        .await?;
    let device = handle.device().name.clone();
    let attempts = handle.attempts();

    let poll = PollLoop::new(settings.poll_interval, shutdown);
    let captures = poll
        .run_forever(|| {
            let label = time::capture_label(time::now());
            tracing::info!(%label, device = %device, "capture");
            async { Ok::<(), Infallible>(()) }
        })
        .await
        .unwrap_or_else(|never| match never {});

    if let Err(err) = manager.disconnect(handle).await {
        tracing::warn!(error = %Report(&err), "failed to disconnect");
    }

    Ok(SessionSummary {
        device,
        attempts,
        captures,
    })
}
