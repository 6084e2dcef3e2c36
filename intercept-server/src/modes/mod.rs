//! Mode controllers, C8 (spec.md §4.8): one per decoder pipeline, each
//! wrapping a [`crate::supervisor::Supervisor`], an [`crate::bus::EventBus`],
//! and whatever live-state store (C7) the mode owns.

pub mod adsb;
pub mod bluetooth;
pub mod iridium;
pub mod pager;
pub mod satellite;
pub mod sensor;
pub mod wifi;
