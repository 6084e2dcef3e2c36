//! HTTP + SSE surface, spec.md §6.
//!
//! Grounded on the teacher's `web.rs` route-table-as-constants style
//! (path strings as named `const`s, `#[debug_handler]` handlers taking a
//! `State<AppState>` extractor) and its `Web::run` graceful-shutdown
//! `tokio::select!` against `SubsystemHandle::on_shutdown_requested()`.
//! Unlike the teacher (WebSocket spokes), every streaming endpoint here is
//! SSE, built from each mode's [`crate::bus::EventBus::sse_stream`].

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use axum::{
    extract::{Path, State},
    response::sse::Sse,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use axum_embed::ServeEmbed;
use rust_embed::RustEmbed;
use serde::Serialize;
use serde_json::json;
use tokio::net::TcpListener;
use tokio_graceful_shutdown::SubsystemHandle;

use crate::error::{ApiError, ApiResult};
use crate::modes::bluetooth::{BtEnumRequest, BtScanStartRequest};
use crate::modes::iridium::IridiumStartRequest;
use crate::modes::pager::{LoggingRequest, PagerStartRequest};
use crate::modes::satellite::{PositionRequest, PredictRequest, UpdateTleRequest};
use crate::modes::sensor::SensorStartRequest;
use crate::modes::wifi::{DeauthRequest, HandshakeCaptureRequest, HandshakeStatusRequest, MonitorRequest, PmkidCaptureRequest, PmkidStatusRequest, ScanStartRequest};
use crate::registry;
use crate::AppState;

#[cfg(not(feature = "dev"))]
#[derive(RustEmbed, Clone)]
#[folder = "assets/"]
struct Assets;

const DEVICES_URI: &str = "/devices";
const DEPENDENCIES_URI: &str = "/dependencies";

const PAGER_START_URI: &str = "/start";
const PAGER_STOP_URI: &str = "/stop";
const PAGER_STATUS_URI: &str = "/status";
const PAGER_LOGGING_URI: &str = "/logging";
const KILLALL_URI: &str = "/killall";
const PAGER_STREAM_URI: &str = "/stream";

const SENSOR_START_URI: &str = "/start_sensor";
const SENSOR_STOP_URI: &str = "/stop_sensor";
const SENSOR_STREAM_URI: &str = "/stream_sensor";

const WIFI_INTERFACES_URI: &str = "/wifi/interfaces";
const WIFI_MONITOR_URI: &str = "/wifi/monitor";
const WIFI_SCAN_START_URI: &str = "/wifi/scan/start";
const WIFI_SCAN_STOP_URI: &str = "/wifi/scan/stop";
const WIFI_STREAM_URI: &str = "/wifi/stream";
const WIFI_NETWORKS_URI: &str = "/wifi/networks";
const WIFI_DEAUTH_URI: &str = "/wifi/deauth";
const WIFI_HANDSHAKE_CAPTURE_URI: &str = "/wifi/handshake/capture";
const WIFI_HANDSHAKE_STATUS_URI: &str = "/wifi/handshake/status";
const WIFI_PMKID_CAPTURE_URI: &str = "/wifi/pmkid/capture";
const WIFI_PMKID_STATUS_URI: &str = "/wifi/pmkid/status";
const WIFI_PMKID_STOP_URI: &str = "/wifi/pmkid/stop";

const BT_INTERFACES_URI: &str = "/bt/interfaces";
const BT_SCAN_START_URI: &str = "/bt/scan/start";
const BT_SCAN_STOP_URI: &str = "/bt/scan/stop";
const BT_STREAM_URI: &str = "/bt/stream";
const BT_DEVICES_URI: &str = "/bt/devices";
const BT_RESET_URI: &str = "/bt/reset";
const BT_ENUM_URI: &str = "/bt/enum";
const BT_RELOAD_OUI_URI: &str = "/bt/reload-oui";

const ADSB_TOOLS_URI: &str = "/adsb/tools";
const ADSB_START_URI: &str = "/adsb/start";
const ADSB_STOP_URI: &str = "/adsb/stop";
const ADSB_STREAM_URI: &str = "/adsb/stream";

const SATELLITE_PREDICT_URI: &str = "/satellite/predict";
const SATELLITE_POSITION_URI: &str = "/satellite/position";
const SATELLITE_UPDATE_TLE_URI: &str = "/satellite/update-tle";
const SATELLITE_CELESTRAK_URI: &str = "/satellite/celestrak/{category}";

const IRIDIUM_TOOLS_URI: &str = "/iridium/tools";
const IRIDIUM_START_URI: &str = "/iridium/start";
const IRIDIUM_STOP_URI: &str = "/iridium/stop";
const IRIDIUM_STREAM_URI: &str = "/iridium/stream";

#[derive(Serialize)]
struct StatusOk {
    status: &'static str,
}

fn started() -> impl IntoResponse {
    Json(StatusOk { status: "started" })
}

fn stopped() -> impl IntoResponse {
    Json(StatusOk { status: "stopped" })
}

fn success() -> impl IntoResponse {
    Json(StatusOk { status: "success" })
}

/// Binds `0.0.0.0:{port}` and serves until `subsys` asks for shutdown,
/// mirroring the teacher's `Web::run` — `biased` select so a shutdown
/// request wins a simultaneous accept.
pub async fn serve(state: AppState, port: u16, subsys: &SubsystemHandle) -> anyhow::Result<()> {
    let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)), port);
    let listener = TcpListener::bind(addr).await?;
    log::info!("intercept-server listening on {addr}");

    let app = build_router(state);

    tokio::select! { biased;
        _ = subsys.on_shutdown_requested() => {
            log::info!("shutdown requested, closing HTTP listener");
        }
        result = axum::serve(listener, app.into_make_service()) => {
            result?;
        }
    }
    Ok(())
}

fn build_router(state: AppState) -> Router {
    #[cfg(feature = "dev")]
    let assets = tower_http::services::ServeDir::new(concat!(env!("CARGO_MANIFEST_DIR"), "/assets"));
    #[cfg(not(feature = "dev"))]
    let assets = ServeEmbed::<Assets>::new();

    Router::new()
        .route(DEVICES_URI, get(get_devices))
        .route(DEPENDENCIES_URI, get(get_dependencies))
        .route(PAGER_START_URI, post(pager_start))
        .route(PAGER_STOP_URI, post(pager_stop))
        .route(PAGER_STATUS_URI, get(pager_status))
        .route(PAGER_LOGGING_URI, post(pager_logging))
        .route(KILLALL_URI, post(killall))
        .route(PAGER_STREAM_URI, get(pager_stream))
        .route(SENSOR_START_URI, post(sensor_start))
        .route(SENSOR_STOP_URI, post(sensor_stop))
        .route(SENSOR_STREAM_URI, get(sensor_stream))
        .route(WIFI_INTERFACES_URI, get(wifi_interfaces))
        .route(WIFI_MONITOR_URI, post(wifi_monitor))
        .route(WIFI_SCAN_START_URI, post(wifi_scan_start))
        .route(WIFI_SCAN_STOP_URI, post(wifi_scan_stop))
        .route(WIFI_STREAM_URI, get(wifi_stream))
        .route(WIFI_NETWORKS_URI, get(wifi_networks))
        .route(WIFI_DEAUTH_URI, post(wifi_deauth))
        .route(WIFI_HANDSHAKE_CAPTURE_URI, post(wifi_handshake_capture))
        .route(WIFI_HANDSHAKE_STATUS_URI, post(wifi_handshake_status))
        .route(WIFI_PMKID_CAPTURE_URI, post(wifi_pmkid_capture))
        .route(WIFI_PMKID_STATUS_URI, post(wifi_pmkid_status))
        .route(WIFI_PMKID_STOP_URI, post(wifi_pmkid_stop))
        .route(BT_INTERFACES_URI, get(bt_interfaces))
        .route(BT_SCAN_START_URI, post(bt_scan_start))
        .route(BT_SCAN_STOP_URI, post(bt_scan_stop))
        .route(BT_STREAM_URI, get(bt_stream))
        .route(BT_DEVICES_URI, get(bt_devices))
        .route(BT_RESET_URI, post(bt_reset))
        .route(BT_ENUM_URI, post(bt_enum))
        .route(BT_RELOAD_OUI_URI, post(bt_reload_oui))
        .route(ADSB_TOOLS_URI, get(adsb_tools))
        .route(ADSB_START_URI, post(adsb_start))
        .route(ADSB_STOP_URI, post(adsb_stop))
        .route(ADSB_STREAM_URI, get(adsb_stream))
        .route(SATELLITE_PREDICT_URI, post(satellite_predict))
        .route(SATELLITE_POSITION_URI, post(satellite_position))
        .route(SATELLITE_UPDATE_TLE_URI, post(satellite_update_tle))
        .route(SATELLITE_CELESTRAK_URI, get(satellite_celestrak))
        .route(IRIDIUM_TOOLS_URI, get(iridium_tools))
        .route(IRIDIUM_START_URI, post(iridium_start))
        .route(IRIDIUM_STOP_URI, post(iridium_stop))
        .route(IRIDIUM_STREAM_URI, get(iridium_stream))
        // `GET /` and `GET /favicon.svg` (spec.md §6) are both served by
        // the fallback: the embedded/filesystem asset service resolves
        // "/" to `index.html` the same way the teacher's `serve_assets`
        // fallback does, with no dedicated handler needed.
        .fallback_service(assets)
        .with_state(state)
}

async fn get_devices() -> Json<Vec<intercept_core::models::RtlSdrDevice>> {
    Json(crate::devices::detect_devices().await)
}

async fn get_dependencies() -> Json<std::collections::HashMap<&'static str, intercept_core::models::DependencyReport>> {
    Json(crate::tools::probe_all())
}

async fn pager_start(State(state): State<AppState>, Json(req): Json<PagerStartRequest>) -> ApiResult<Response> {
    state.pager.start(req).await?;
    Ok(started().into_response())
}

async fn pager_stop(State(state): State<AppState>) -> ApiResult<Response> {
    state.pager.stop().await?;
    Ok(stopped().into_response())
}

async fn pager_status(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.pager.status().await)
}

async fn pager_logging(State(state): State<AppState>, Json(req): Json<LoggingRequest>) -> impl IntoResponse {
    state.pager.set_logging(req).await;
    success()
}

async fn killall(State(state): State<AppState>) -> impl IntoResponse {
    state.registry.cleanup_all();
    registry::kill_all_by_name();
    Json(json!({"status": "success", "message": "all decoder processes terminated"}))
}

async fn pager_stream(State(state): State<AppState>) -> Sse<impl futures_util::Stream<Item = Result<axum::response::sse::Event, std::convert::Infallible>>> {
    Sse::new(state.pager.bus().sse_stream())
}

async fn sensor_start(State(state): State<AppState>, Json(req): Json<SensorStartRequest>) -> ApiResult<Response> {
    state.sensor.start(req).await?;
    Ok(started().into_response())
}

async fn sensor_stop(State(state): State<AppState>) -> ApiResult<Response> {
    state.sensor.stop().await?;
    Ok(stopped().into_response())
}

async fn sensor_stream(State(state): State<AppState>) -> Sse<impl futures_util::Stream<Item = Result<axum::response::sse::Event, std::convert::Infallible>>> {
    Sse::new(state.sensor.bus().sse_stream())
}

async fn wifi_interfaces(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.wifi.interfaces().await)
}

async fn wifi_monitor(State(state): State<AppState>, Json(req): Json<MonitorRequest>) -> ApiResult<Response> {
    Ok(Json(state.wifi.set_monitor_mode(req).await?).into_response())
}

async fn wifi_scan_start(State(state): State<AppState>, Json(req): Json<ScanStartRequest>) -> ApiResult<Response> {
    Ok(Json(state.wifi.scan_start(req).await?).into_response())
}

async fn wifi_scan_stop(State(state): State<AppState>) -> ApiResult<Response> {
    state.wifi.scan_stop().await?;
    Ok(stopped().into_response())
}

async fn wifi_stream(State(state): State<AppState>) -> Sse<impl futures_util::Stream<Item = Result<axum::response::sse::Event, std::convert::Infallible>>> {
    Sse::new(state.wifi.bus().sse_stream())
}

async fn wifi_networks(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.wifi.networks_snapshot().await)
}

async fn wifi_deauth(State(state): State<AppState>, Json(req): Json<DeauthRequest>) -> ApiResult<Response> {
    Ok(Json(state.wifi.deauth(req).await?).into_response())
}

async fn wifi_handshake_capture(State(state): State<AppState>, Json(req): Json<HandshakeCaptureRequest>) -> ApiResult<Response> {
    Ok(Json(state.wifi.handshake_capture(req).await?).into_response())
}

async fn wifi_handshake_status(State(state): State<AppState>, Json(req): Json<HandshakeStatusRequest>) -> ApiResult<Response> {
    Ok(Json(state.wifi.handshake_status(req).await?).into_response())
}

async fn wifi_pmkid_capture(State(state): State<AppState>, Json(req): Json<PmkidCaptureRequest>) -> ApiResult<Response> {
    Ok(Json(state.wifi.pmkid_capture(req).await?).into_response())
}

async fn wifi_pmkid_status(State(state): State<AppState>, Json(req): Json<PmkidStatusRequest>) -> ApiResult<Response> {
    Ok(Json(state.wifi.pmkid_status(req).await?).into_response())
}

async fn wifi_pmkid_stop(State(state): State<AppState>) -> ApiResult<Response> {
    state.wifi.pmkid_stop().await?;
    Ok(stopped().into_response())
}

async fn bt_interfaces(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.bluetooth.interfaces().await)
}

async fn bt_scan_start(State(state): State<AppState>, Json(req): Json<BtScanStartRequest>) -> ApiResult<Response> {
    state.bluetooth.start(req).await?;
    Ok(started().into_response())
}

async fn bt_scan_stop(State(state): State<AppState>) -> ApiResult<Response> {
    state.bluetooth.stop().await?;
    Ok(stopped().into_response())
}

async fn bt_stream(State(state): State<AppState>) -> Sse<impl futures_util::Stream<Item = Result<axum::response::sse::Event, std::convert::Infallible>>> {
    Sse::new(state.bluetooth.bus().sse_stream())
}

async fn bt_devices(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.bluetooth.devices_snapshot())
}

async fn bt_reset(State(state): State<AppState>) -> ApiResult<Response> {
    let message = state.bluetooth.reset_adapter().await?;
    Ok(Json(json!({"status": "success", "message": message})).into_response())
}

async fn bt_enum(State(state): State<AppState>, Json(req): Json<BtEnumRequest>) -> ApiResult<Response> {
    Ok(Json(state.bluetooth.enumerate_services(req).await?).into_response())
}

async fn bt_reload_oui(State(state): State<AppState>) -> impl IntoResponse {
    let count = state.bluetooth.reload_oui();
    Json(json!({"status": "success", "vendors_loaded": count}))
}

async fn adsb_tools(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.adsb.tool_report())
}

async fn adsb_start(State(state): State<AppState>, Json(req): Json<crate::modes::adsb::AdsbStartRequest>) -> ApiResult<Response> {
    state.adsb.start(req).await?;
    Ok(started().into_response())
}

async fn adsb_stop(State(state): State<AppState>) -> ApiResult<Response> {
    state.adsb.stop().await?;
    Ok(stopped().into_response())
}

async fn adsb_stream(State(state): State<AppState>) -> Sse<impl futures_util::Stream<Item = Result<axum::response::sse::Event, std::convert::Infallible>>> {
    Sse::new(state.adsb.bus().sse_stream())
}

async fn satellite_predict(State(state): State<AppState>, Json(req): Json<PredictRequest>) -> ApiResult<Response> {
    Ok(Json(state.satellite.predict(req).await?).into_response())
}

async fn satellite_position(State(state): State<AppState>, Json(req): Json<PositionRequest>) -> ApiResult<Response> {
    Ok(Json(state.satellite.position(req).await?).into_response())
}

async fn satellite_update_tle(State(state): State<AppState>, Json(req): Json<UpdateTleRequest>) -> ApiResult<Response> {
    let updated = state.satellite.update_tle(req).await.map_err(ApiError::from)?;
    Ok(Json(json!({"status": "success", "updated": updated})).into_response())
}

async fn satellite_celestrak(State(state): State<AppState>, Path(category): Path<String>) -> ApiResult<Response> {
    if !crate::modes::satellite::VALID_CELESTRAK_CATEGORIES.contains(&category.as_str()) {
        return Err(ApiError::BadRequest(format!("unknown celestrak category '{category}'")));
    }
    let triplets = state.satellite.celestrak_category(&category).await.map_err(ApiError::from)?;
    Ok(Json(triplets).into_response())
}

async fn iridium_tools(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.iridium.tools_report())
}

async fn iridium_start(State(state): State<AppState>, Json(req): Json<IridiumStartRequest>) -> ApiResult<Response> {
    state.iridium.start(req).await?;
    Ok(started().into_response())
}

async fn iridium_stop(State(state): State<AppState>) -> ApiResult<Response> {
    state.iridium.stop().await?;
    Ok(stopped().into_response())
}

async fn iridium_stream(State(state): State<AppState>) -> Sse<impl futures_util::Stream<Item = Result<axum::response::sse::Event, std::convert::Infallible>>> {
    Sse::new(state.iridium.bus().sse_stream())
}
