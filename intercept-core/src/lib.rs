//! Platform-independent core of the INTERCEPT signal-intelligence orchestrator.
//!
//! This crate holds everything that does not need an async runtime or a
//! subprocess: field validators, the domain model, the reference-data
//! tables (OUI vendors, TLE cache, Bluetooth device classification), the
//! line/JSON/CSV parsers that turn raw decoder output into typed events,
//! the generic TTL-evicting store, and satellite pass/position
//! computation. `intercept-server` wires these into tokio tasks, axum
//! routes and subprocess pipelines.

pub mod bluetooth;
pub mod devices;
pub mod models;
pub mod oui;
pub mod parsers;
pub mod satellite;
pub mod store;
pub mod tle;
pub mod validators;
