//! # beldumd — beldum daemon
//!
//! Composition root that wires the btleplug adapter into the application
//! services and keeps a camera session alive.
//!
//! ## Responsibilities
//! - Parse configuration (CLI args, env vars, config file)
//! - Initialize logging
//! - Construct the BLE platform adapter
//! - Acquire a device and run the capture poll loop
//! - Handle graceful shutdown (Ctrl-C) and map the outcome to an exit status
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer — no domain logic belongs here.

pub mod config;
pub mod daemon;
