//! # beldum-domain
//!
//! Pure domain model for the beldum device-acquisition pipeline.
//!
//! ## Responsibilities
//! - Foundational types: error conventions, capture timestamps
//! - Define **Device Records** (one discovered BLE peripheral)
//! - Define the **Device Registry** (name-keyed, deduplicated discovery results)
//! - Define **Identifier Patterns** (which device names are of interest)
//! - Define **GATT descriptors** (services, characteristics, notifications)
//! - Contain all invariant enforcement (admission filter, pattern validation)
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or external IO crates.
//! All IO boundaries are expressed as traits in the `app` crate (ports).

pub mod error;
pub mod time;

pub mod device;
pub mod gatt;
pub mod pattern;
pub mod registry;
