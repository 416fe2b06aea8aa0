use std::{collections::HashMap, net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tokio::{net::TcpListener, sync::watch};
use tracing::{info, warn};

use greenhouse_common::{DashboardState, RelayId, RuntimeConfig};

use crate::{
    client::{DeviceApi, HttpDeviceClient},
    commands::{CommandError, Commands},
    guard::{ControlPanel, RelayGuard},
    notify::NotificationQueue,
    poll::PollLoop,
    store::AppStore,
};

struct AppState<A> {
    commands: Arc<Commands<A>>,
    view: watch::Receiver<Arc<DashboardState>>,
    panel: Arc<ControlPanel>,
    notifications: Arc<NotificationQueue>,
}

impl<A> Clone for AppState<A> {
    fn clone(&self) -> Self {
        Self {
            commands: Arc::clone(&self.commands),
            view: self.view.clone(),
            panel: Arc::clone(&self.panel),
            notifications: Arc::clone(&self.notifications),
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    #[serde(rename = "confirmRequired", skip_serializing_if = "std::ops::Not::not")]
    confirm_required: bool,
}

#[derive(Debug, Serialize)]
struct HistoryRangeView {
    days: u8,
}

pub async fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let store = AppStore::new();
    let mut runtime = store.load_runtime_config().await.unwrap_or_else(|err| {
        warn!("failed to load runtime config from store: {err:#}");
        RuntimeConfig::default()
    });
    if let Ok(url) = std::env::var("DEVICE_URL") {
        runtime.device.base_url = url;
    }
    if let Some(port) = std::env::var("DASHBOARD_HTTP_PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
    {
        runtime.http_port = port;
    }
    runtime.sanitize();

    let history_range = store.load_history_range().await.unwrap_or_else(|err| {
        warn!("failed to load preferences from store: {err:#}");
        Default::default()
    });

    let api = Arc::new(
        HttpDeviceClient::new(&runtime.device).context("failed to build device HTTP client")?,
    );
    let notifications = Arc::new(NotificationQueue::new(
        runtime.dashboard.notification_capacity,
    ));
    let panel = Arc::new(ControlPanel::with_relay_controls());

    let (poll, refresh, view) = PollLoop::new(
        Arc::clone(&api),
        runtime.dashboard.clone(),
        history_range,
        Arc::clone(&panel),
        notifications.clone(),
    );
    let guard = RelayGuard::new(Arc::clone(&panel), notifications.clone());
    let commands = Commands::new(api, guard, notifications.clone(), refresh, view.clone(), store);
    let poll_task = tokio::spawn(poll.run());

    let app = router(AppState {
        commands: Arc::new(commands),
        view,
        panel,
        notifications,
    });

    let addr = SocketAddr::from(([0, 0, 0, 0], runtime.http_port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind dashboard server at {addr}"))?;

    info!(
        "dashboard listening on http://{addr}, device at {}",
        runtime.device.base_url
    );
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    poll_task.abort();
    info!("dashboard stopped");
    Ok(())
}

fn router<A: DeviceApi>(state: AppState<A>) -> Router {
    Router::new()
        .route("/api/view", get(handle_get_view::<A>))
        .route("/api/controls", get(handle_get_controls::<A>))
        .route("/api/notifications", get(handle_get_notifications::<A>))
        .route("/api/relays/{id}/mode", post(handle_set_mode::<A>))
        .route("/api/relays/{id}/toggle", post(handle_toggle::<A>))
        .route("/api/history/range", post(handle_set_history_range::<A>))
        .route("/api/profiles/apply", post(handle_apply_profile::<A>))
        .route("/api/profiles/apply-all", post(handle_apply_profile_all::<A>))
        .route("/api/profiles/{id}/preview", get(handle_preview_profile::<A>))
        .route("/api/reboot", post(handle_reboot::<A>))
        .with_state(state)
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!("failed to listen for shutdown signal: {err}");
        std::future::pending::<()>().await;
    }
}

async fn handle_get_view<A: DeviceApi>(State(state): State<AppState<A>>) -> impl IntoResponse {
    let view = state.view.borrow().clone();
    Json(DashboardState::clone(&view))
}

async fn handle_get_controls<A: DeviceApi>(State(state): State<AppState<A>>) -> impl IntoResponse {
    Json(state.panel.snapshot())
}

async fn handle_get_notifications<A: DeviceApi>(
    State(state): State<AppState<A>>,
) -> impl IntoResponse {
    Json(state.notifications.recent())
}

async fn handle_set_mode<A: DeviceApi>(
    State(state): State<AppState<A>>,
    Path(id): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> axum::response::Response {
    let Ok(id) = id.parse::<RelayId>() else {
        return error_response(StatusCode::NOT_FOUND, "Unknown relay");
    };
    let Some(auto) = query_flag(&params, "auto") else {
        return error_response(StatusCode::BAD_REQUEST, "Missing or invalid 'auto' parameter");
    };

    match state.commands.set_mode(id, auto).await {
        Ok(response) => Json(response).into_response(),
        Err(err) => command_error_response(err),
    }
}

async fn handle_toggle<A: DeviceApi>(
    State(state): State<AppState<A>>,
    Path(id): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> axum::response::Response {
    let Ok(id) = id.parse::<RelayId>() else {
        return error_response(StatusCode::NOT_FOUND, "Unknown relay");
    };
    let confirmed = query_flag(&params, "confirm").unwrap_or(false);

    match state.commands.toggle(id, confirmed).await {
        Ok(outcome) => Json(outcome).into_response(),
        Err(err) => command_error_response(err),
    }
}

async fn handle_set_history_range<A: DeviceApi>(
    State(state): State<AppState<A>>,
    Query(params): Query<HashMap<String, String>>,
) -> axum::response::Response {
    let Some(days) = params.get("days").and_then(|value| value.trim().parse::<i64>().ok()) else {
        return error_response(StatusCode::BAD_REQUEST, "Missing or invalid 'days' parameter");
    };

    let range = state.commands.set_history_range(days).await;
    Json(HistoryRangeView { days: range.days() }).into_response()
}

async fn handle_apply_profile<A: DeviceApi>(
    State(state): State<AppState<A>>,
    Query(params): Query<HashMap<String, String>>,
) -> axum::response::Response {
    let (Some(chamber), Some(profile)) = (query_u8(&params, "chamber"), query_u8(&params, "profile"))
    else {
        return error_response(
            StatusCode::BAD_REQUEST,
            "Missing or invalid 'chamber' or 'profile' parameter",
        );
    };

    match state.commands.apply_profile(chamber, profile).await {
        Ok(response) => Json(response).into_response(),
        Err(err) => command_error_response(err),
    }
}

async fn handle_apply_profile_all<A: DeviceApi>(
    State(state): State<AppState<A>>,
    Query(params): Query<HashMap<String, String>>,
) -> axum::response::Response {
    let Some(profile) = query_u8(&params, "profile") else {
        return error_response(StatusCode::BAD_REQUEST, "Missing or invalid 'profile' parameter");
    };

    match state.commands.apply_profile_all(profile).await {
        Ok(response) => Json(response).into_response(),
        Err(err) => command_error_response(err),
    }
}

async fn handle_preview_profile<A: DeviceApi>(
    State(state): State<AppState<A>>,
    Path(profile): Path<u8>,
    Query(params): Query<HashMap<String, String>>,
) -> axum::response::Response {
    let Some(chamber) = query_u8(&params, "chamber") else {
        return error_response(StatusCode::BAD_REQUEST, "Missing or invalid 'chamber' parameter");
    };

    match state.commands.preview_profile(chamber, profile) {
        Ok(preview) => {
            let confirm = preview.confirm_message();
            Json(serde_json::json!({ "preview": preview, "confirm": confirm })).into_response()
        }
        Err(err) => command_error_response(err),
    }
}

async fn handle_reboot<A: DeviceApi>(
    State(state): State<AppState<A>>,
    Query(params): Query<HashMap<String, String>>,
) -> axum::response::Response {
    let confirmed = query_flag(&params, "confirm").unwrap_or(false);
    match state.commands.reboot(confirmed).await {
        Ok(response) => Json(response).into_response(),
        Err(err) => command_error_response(err),
    }
}

fn query_flag(params: &HashMap<String, String>, key: &str) -> Option<bool> {
    match params.get(key)?.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "on" | "yes" => Some(true),
        "0" | "false" | "off" | "no" => Some(false),
        _ => None,
    }
}

fn query_u8(params: &HashMap<String, String>, key: &str) -> Option<u8> {
    params.get(key)?.trim().parse().ok()
}

fn command_error_response(err: CommandError) -> axum::response::Response {
    match err {
        CommandError::ConfirmationRequired { prompt } => (
            StatusCode::CONFLICT,
            Json(ErrorBody {
                error: prompt.to_string(),
                confirm_required: true,
            }),
        )
            .into_response(),
        CommandError::Unavailable(_) => error_response(StatusCode::CONFLICT, &err.to_string()),
        CommandError::UnknownProfile(_) | CommandError::UnknownChamber(_) => {
            error_response(StatusCode::BAD_REQUEST, &err.to_string())
        }
        CommandError::Api(_) => error_response(StatusCode::BAD_GATEWAY, &err.to_string()),
    }
}

fn error_response(status: StatusCode, message: &str) -> axum::response::Response {
    (
        status,
        Json(ErrorBody {
            error: message.to_string(),
            confirm_required: false,
        }),
    )
        .into_response()
}
