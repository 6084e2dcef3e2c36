//! # INTERCEPT server
//!
//! Multi-modal signal-intelligence orchestrator: one process supervisor,
//! parser pipeline and SSE fan-out per decoding mode (pager, 433 MHz
//! sensors, WiFi, Bluetooth, ADS-B, satellite tracking, Iridium), plus the
//! shared reference data (OUI vendors, TLE cache) and cleanup discipline
//! those modes draw on.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                         intercept-server                         │
//! │  ┌─────────────┐  ┌───────────────────┐  ┌──────────────────────┐│
//! │  │ REST + SSE  │  │  Mode controllers  │  │  Reference data      ││
//! │  │ (axum)      │  │  pager/sensor/wifi │  │  OUI table, TLE      ││
//! │  │             │  │  bluetooth/adsb/   │  │  cache               ││
//! │  │             │  │  satellite/iridium │  │                      ││
//! │  └──────┬──────┘  └─────────┬──────────┘  └──────────────────────┘│
//! │         │                   │                                     │
//! │         ▼                   ▼                                     │
//! │  ┌──────────────────────────────────────────────────────────────┐ │
//! │  │                    AppState (Arc-shared)                     │ │
//! │  │  - one Supervisor + EventBus + TtlStore per mode              │ │
//! │  │  - ProcessRegistry (global kill-all backstop)                 │ │
//! │  └──────────────────────────────────────────────────────────────┘ │
//! └───────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example: starting the server
//!
//! ```rust,no_run
//! use clap::Parser;
//! use intercept_server::{settings::Cli, AppState};
//! use tokio_graceful_shutdown::{SubsystemBuilder, Toplevel};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() {
//!     let cli = Cli::parse_from(["intercept-server"]);
//!     intercept_server::settings::init_logging(&cli);
//!     let port = cli.port;
//!
//!     Toplevel::new(move |s| async move {
//!         let state = AppState::new(&s, cli);
//!         s.start(SubsystemBuilder::new("web", move |s| async move {
//!             intercept_server::web::serve(state, port, &s).await
//!         }));
//!     })
//!     .catch_signals()
//!     .handle_shutdown_requests(Duration::from_secs(5))
//!     .await
//!     .unwrap();
//! }
//! ```

use std::sync::Arc;

use intercept_core::oui::OuiTable;
use tokio_graceful_shutdown::{SubsystemBuilder, SubsystemHandle};

pub mod bus;
pub mod cleanup;
pub mod devices;
pub mod error;
pub mod modes;
pub mod registry;
pub mod satellite_fetch;
pub mod settings;
pub mod supervisor;
pub mod tools;
pub mod web;

use modes::adsb::AdsbController;
use modes::bluetooth::BluetoothController;
use modes::iridium::IridiumController;
use modes::pager::PagerController;
use modes::satellite::SatelliteController;
use modes::sensor::SensorController;
use modes::wifi::WifiController;
use registry::ProcessRegistry;
use settings::Cli;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Shared application state handed to every axum handler via `State<AppState>`.
///
/// One controller per mode, each already holding its own `Supervisor` and
/// `EventBus`, plus the global process registry and OUI table every mode
/// touches. Mirrors the teacher's `Web`/`Session` pattern of a single
/// cheaply-`Clone`-able state struct threaded through the router, rather
/// than the original's module-level globals (spec.md §9).
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<ProcessRegistry>,
    pub oui: Arc<std::sync::Mutex<OuiTable>>,
    pub pager: Arc<PagerController>,
    pub sensor: Arc<SensorController>,
    pub wifi: Arc<WifiController>,
    pub bluetooth: Arc<BluetoothController>,
    pub adsb: Arc<AdsbController>,
    pub satellite: Arc<SatelliteController>,
    pub iridium: Arc<IridiumController>,
}

impl AppState {
    /// Builds every mode controller and spawns the background subsystems
    /// (cleanup sweeper, ADS-B JSON long-poller) under `subsystem`.
    pub fn new(subsystem: &SubsystemHandle, cli: Cli) -> Self {
        let registry = Arc::new(ProcessRegistry::new());
        let oui_path = cli.oui_database.as_deref();
        let oui = Arc::new(std::sync::Mutex::new(OuiTable::load_or_default(oui_path)));

        let pager = Arc::new(PagerController::new(registry.clone()));
        let sensor = Arc::new(SensorController::new(registry.clone()));
        let wifi = Arc::new(WifiController::new(registry.clone(), oui.clone()));
        let bluetooth = Arc::new(BluetoothController::new(registry.clone(), oui.clone()));
        let adsb = Arc::new(AdsbController::new(registry.clone()));
        let satellite = Arc::new(SatelliteController::new());
        let iridium = Arc::new(IridiumController::new(registry.clone()));

        let mut cleanup = cleanup::CleanupManager::new();
        cleanup.register(wifi.networks(), cleanup::WIFI_BT_TTL);
        cleanup.register(wifi.clients(), cleanup::WIFI_BT_TTL);
        cleanup.register(bluetooth.devices(), cleanup::WIFI_BT_TTL);
        cleanup.register(adsb.aircraft(), cleanup::AIRCRAFT_TTL);
        subsystem.start(SubsystemBuilder::new("cleanup", |s| cleanup.run(s)));

        let writer = adsb.writer();
        subsystem.start(SubsystemBuilder::new("adsb-writer", |s| writer.run(s)));

        let poller = adsb.json_poller();
        subsystem.start(SubsystemBuilder::new("adsb-json-poller", |s| poller.run(s)));

        Self {
            registry,
            oui,
            pager,
            sensor,
            wifi,
            bluetooth,
            adsb,
            satellite,
            iridium,
        }
    }
}
