//! # beldum-app
//!
//! Application layer — use-cases and **port definitions** (traits).
//!
//! ## Responsibilities
//! - Define the **port trait** the platform adapter must implement:
//!   - `BlePlatform` — discover, connect, pair, enumerate services, subscribe
//! - Define the **use-cases** that drive it:
//!   - `Scanner` — one bounded discovery pass into a `DeviceRegistry`
//!   - `match_devices` — filter a registry by `IdentifierPattern`
//!   - `ConnectionManager` — scan → match → connect → pair → subscribe, with
//!     a bounded retry budget
//!   - `PollLoop` — run an action on a fixed interval until cancelled
//! - Provide the in-process **cancellation signal** (`Shutdown`)
//!
//! ## Dependency rule
//! Depends on `beldum-domain` only (plus `tokio` for channels and timers).
//! Never imports adapter crates. Adapters depend on *this* crate, not the reverse.

pub mod error;
pub mod ports;
pub mod services;
pub mod shutdown;

#[cfg(test)]
pub(crate) mod fake;
