use axum::debug_handler;
use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tower_http::timeout::TimeoutLayer;
use tracing::info;

use healthmate_core::aggregate::{Aggregator, Goals};
use healthmate_core::config::Config;
use healthmate_core::sqlite_store::SqliteHealthStore;
use healthmate_core::{HealthError, HealthStore, NewTip, ProfilePatch, User, bmi};
use healthmate_mcp::{CommandRequest, CommandRouter, HealthMcpHandler, McpError, tips};

struct AppState {
    store: Arc<dyn HealthStore>,
    aggregator: Aggregator,
    router: CommandRouter,
    metrics: PrometheusHandle,
    auth_token: SecretString,
}

type ApiError = (StatusCode, Json<serde_json::Value>);

#[derive(Deserialize)]
struct LoginRequest {
    phone_number: String,
}

#[derive(Deserialize)]
struct PhoneQuery {
    phone_number: String,
}

#[derive(Deserialize)]
struct ProfileUpdateRequest {
    phone_number: String,
    #[serde(flatten)]
    patch: ProfilePatch,
}

#[derive(Deserialize)]
struct BmiRequest {
    height: f64,
    weight: f64,
}

#[derive(Deserialize)]
struct WaterLogRequest {
    phone_number: String,
    amount: i64,
    note: Option<String>,
}

#[derive(Deserialize)]
struct StepsLogRequest {
    phone_number: String,
    steps: i64,
    distance_km: Option<f64>,
    calories: Option<f64>,
}

#[derive(Serialize)]
struct ProfileDto {
    phone_number: String,
    name: Option<String>,
    age: Option<i64>,
    gender: Option<String>,
    height_cm: Option<f64>,
    weight_kg: Option<f64>,
    activity_level: String,
    bmi: Option<f64>,
    bmi_category: Option<String>,
}

impl ProfileDto {
    fn from_user(user: &User) -> Self {
        let reading = match (user.height_cm, user.weight_kg) {
            (Some(h), Some(w)) => bmi::calculate_bmi(h, w).ok(),
            _ => None,
        };
        Self {
            phone_number: user.phone_number.clone(),
            name: user.name.clone(),
            age: user.age,
            gender: user.gender.clone(),
            height_cm: user.height_cm,
            weight_kg: user.weight_kg,
            activity_level: user.activity_level.clone(),
            bmi: reading.map(|r| r.bmi),
            bmi_category: reading.map(|r| r.category.label().to_string()),
        }
    }
}

#[debug_handler]
async fn health() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

#[debug_handler]
async fn metrics_endpoint(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let body = state.metrics.render();
    ([("content-type", "text/plain; version=0.0.4")], body)
}

#[debug_handler]
async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let user = state
        .store
        .get_or_create_user(&req.phone_number)
        .await
        .map_err(map_err)?;
    let has_profile = user.has_profile();
    Ok(Json(json!({
        "message": "Login successful",
        "user": {
            "phone_number": user.phone_number,
            "name": user.name,
            "has_profile": has_profile,
        }
    })))
}

#[debug_handler]
async fn get_profile(
    State(state): State<Arc<AppState>>,
    Query(q): Query<PhoneQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let user = find_user(&state, &q.phone_number).await?;
    Ok(Json(json!({ "user": ProfileDto::from_user(&user) })))
}

#[debug_handler]
async fn update_profile(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ProfileUpdateRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state
        .store
        .get_or_create_user(&req.phone_number)
        .await
        .map_err(map_err)?;
    let user = state
        .store
        .update_profile(&req.phone_number, req.patch)
        .await
        .map_err(map_err)?;
    Ok(Json(json!({
        "message": "Profile updated successfully",
        "user": ProfileDto::from_user(&user),
    })))
}

#[debug_handler]
async fn calculate_bmi(Json(req): Json<BmiRequest>) -> Result<Json<serde_json::Value>, ApiError> {
    let reading = bmi::calculate_bmi(req.height, req.weight).map_err(map_err)?;
    Ok(Json(json!({
        "bmi": reading.bmi,
        "category": reading.category,
        "healthy_range": bmi::HEALTHY_RANGE,
    })))
}

#[debug_handler]
async fn log_water(
    State(state): State<Arc<AppState>>,
    Json(req): Json<WaterLogRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let user = state
        .store
        .get_or_create_user(&req.phone_number)
        .await
        .map_err(map_err)?;
    state
        .store
        .append_water(user.id, req.amount, req.note)
        .await
        .map_err(map_err)?;
    let progress = state
        .aggregator
        .water_progress(user.id, Aggregator::today())
        .await
        .map_err(map_err)?;
    Ok(Json(json!({
        "message": "Water intake logged successfully",
        "daily_total": progress.total,
        "goal": progress.goal,
        "percentage": progress.percentage,
    })))
}

#[debug_handler]
async fn water_today(
    State(state): State<Arc<AppState>>,
    Query(q): Query<PhoneQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let user = find_user(&state, &q.phone_number).await?;
    let progress = state
        .aggregator
        .water_progress(user.id, Aggregator::today())
        .await
        .map_err(map_err)?;
    Ok(Json(json!({
        "daily_total": progress.total,
        "goal": progress.goal,
        "percentage": progress.percentage,
        "remaining": progress.remaining,
    })))
}

#[debug_handler]
async fn log_steps(
    State(state): State<Arc<AppState>>,
    Json(req): Json<StepsLogRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let user = state
        .store
        .get_or_create_user(&req.phone_number)
        .await
        .map_err(map_err)?;
    state
        .store
        .append_steps(user.id, req.steps, req.distance_km, req.calories)
        .await
        .map_err(map_err)?;
    let progress = state
        .aggregator
        .step_progress(user.id, Aggregator::today())
        .await
        .map_err(map_err)?;
    Ok(Json(json!({
        "message": "Steps logged successfully",
        "daily_total": progress.total,
        "goal": progress.goal,
        "percentage": progress.percentage,
    })))
}

#[debug_handler]
async fn steps_today(
    State(state): State<Arc<AppState>>,
    Query(q): Query<PhoneQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let user = find_user(&state, &q.phone_number).await?;
    let progress = state
        .aggregator
        .step_progress(user.id, Aggregator::today())
        .await
        .map_err(map_err)?;
    Ok(Json(json!({
        "daily_total": progress.total,
        "goal": progress.goal,
        "percentage": progress.percentage,
        "remaining": progress.remaining,
    })))
}

#[debug_handler]
async fn health_summary(
    State(state): State<Arc<AppState>>,
    Query(q): Query<PhoneQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let user = find_user(&state, &q.phone_number).await?;
    let summary = state
        .aggregator
        .health_summary(&user)
        .await
        .map_err(map_err)?;
    let value = serde_json::to_value(&summary).map_err(|e| {
        tracing::error!(error = %e, "summary serialization failed");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "internal error" })),
        )
    })?;
    Ok(Json(value))
}

#[debug_handler]
async fn generate_tip(
    State(state): State<Arc<AppState>>,
) -> Result<Json<serde_json::Value>, ApiError> {
    // Seed from the catalog the first time around, then serve stored tips.
    let tip = match state.store.random_tip().await.map_err(map_err)? {
        Some(tip) => tip,
        None => {
            let catalog = tips::random_catalog_tip();
            state
                .store
                .insert_tip(NewTip {
                    title: catalog.title.to_string(),
                    content: catalog.content.to_string(),
                    category: catalog.category.to_string(),
                })
                .await
                .map_err(map_err)?
        }
    };
    // Every served tip carries share text, so it counts as a share.
    state
        .store
        .bump_share_count(tip.id)
        .await
        .map_err(map_err)?;
    let share_text = tips::share_text(&tip.title, &tip.content);
    Ok(Json(json!({
        "tip": {
            "title": tip.title,
            "content": tip.content,
            "category": tip.category,
        },
        "share_text": share_text,
    })))
}

#[debug_handler]
async fn command(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CommandRequest>,
) -> Result<Json<healthmate_mcp::CommandReply>, ApiError> {
    state
        .router
        .dispatch(&req)
        .await
        .map(Json)
        .map_err(map_command_err)
}

/// Bearer check for the agent-facing MCP mount, as the conversational host
/// authenticates with a pre-shared token. The JSON API stays open.
async fn require_bearer(
    State(state): State<Arc<AppState>>,
    req: axum::extract::Request,
    next: axum::middleware::Next,
) -> Result<axum::response::Response, ApiError> {
    let authorized = req
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .is_some_and(|token| token == state.auth_token.expose_secret());
    if !authorized {
        return Err((
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "invalid bearer token" })),
        ));
    }
    Ok(next.run(req).await)
}

async fn find_user(state: &AppState, phone_number: &str) -> Result<User, ApiError> {
    state
        .store
        .find_user(phone_number)
        .await
        .map_err(map_err)?
        .ok_or_else(|| map_err(HealthError::NotFound(format!("user {phone_number}"))))
}

fn map_err(e: HealthError) -> ApiError {
    let status = match &e {
        HealthError::Validation(_) => StatusCode::BAD_REQUEST,
        HealthError::NotFound(_) => StatusCode::NOT_FOUND,
        HealthError::Upstream(_) => StatusCode::BAD_GATEWAY,
        HealthError::Storage(_) | HealthError::Migrate(_) | HealthError::Config(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    // Persistence details stay in the log, not the response body.
    let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
        tracing::error!(error = %e, "request failed");
        "internal error".to_string()
    } else {
        e.to_string()
    };
    (status, Json(json!({ "error": message })))
}

fn map_command_err(e: McpError) -> ApiError {
    match e {
        McpError::Core(inner) => map_err(inner),
        McpError::Validation(msg) => (StatusCode::BAD_REQUEST, Json(json!({ "error": msg }))),
        other => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": other.to_string() })),
        ),
    }
}

/// Parse the bind address from an optional env value, falling back to
/// localhost:3000.
fn parse_bind_addr(raw: Option<String>) -> SocketAddr {
    raw.and_then(|s| s.parse().ok())
        .unwrap_or_else(|| SocketAddr::from(([127, 0, 0, 1], 3000)))
}


#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    // Configure logging from env var `HEALTHMATE_LOG_LEVEL` (or fallback to `RUST_LOG`, default `info`).
    let log_env = std::env::var("HEALTHMATE_LOG_LEVEL")
        .or_else(|_| std::env::var("RUST_LOG"))
        .unwrap_or_else(|_| "info".to_string());
    let env_filter = tracing_subscriber::EnvFilter::try_new(log_env.clone())
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,rmcp=warn"));
    tracing_subscriber::fmt()
        .compact()
        .with_ansi(false)
        .with_target(false)
        .with_env_filter(env_filter)
        .init();
    tracing::info!(%log_env, "healthmate_mcp:http: log filter");

    let builder = PrometheusBuilder::new();
    let handle = builder.install_recorder()?;

    let config = Config::from_env()?;
    let store: Arc<dyn HealthStore> =
        Arc::new(SqliteHealthStore::connect(&config.database_url).await?);
    let goals = Goals {
        water_ml: config.water_goal_ml,
        steps: config.step_goal,
    };
    let aggregator = Aggregator::new(store.clone(), goals);
    let router = CommandRouter::new(store.clone(), aggregator.clone());
    let state = Arc::new(AppState {
        store: store.clone(),
        aggregator,
        router,
        metrics: handle.clone(),
        auth_token: config.auth_token.clone(),
    });

    let max_body_size = std::env::var("MAX_HTTP_BODY_SIZE")
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .unwrap_or(1024 * 1024);

    // Build rmcp StreamableHttpService mounted at /mcp
    let handler = HealthMcpHandler::new(store.clone(), &config);
    let factory = move || -> Result<_, std::io::Error> { Ok(handler.clone()) };
    let session = std::sync::Arc::new(
        rmcp::transport::streamable_http_server::session::local::LocalSessionManager::default(),
    );
    let mcp_service = rmcp::transport::streamable_http_server::tower::StreamableHttpService::new(
        factory,
        session,
        rmcp::transport::streamable_http_server::tower::StreamableHttpServerConfig::default(),
    );

    let app = Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics_endpoint))
        .route("/api/login", post(login))
        .route("/api/user/profile", get(get_profile).post(update_profile))
        .route("/api/bmi/calculate", post(calculate_bmi))
        .route("/api/water/log", post(log_water))
        .route("/api/water/today", get(water_today))
        .route("/api/steps/log", post(log_steps))
        .route("/api/steps/today", get(steps_today))
        .route("/api/health/summary", get(health_summary))
        .route("/api/tips/generate", get(generate_tip))
        .route("/api/command", post(command))
        .merge(
            Router::new()
                .nest_service("/mcp", mcp_service)
                .route_layer(axum::middleware::from_fn_with_state(
                    state.clone(),
                    require_bearer,
                )),
        )
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .layer(axum::extract::DefaultBodyLimit::max(max_body_size))
        .with_state(state.clone());

    let addr = parse_bind_addr(std::env::var("ADDRESS").ok());
    info!(%addr, max_body_bytes = max_body_size, "starting HTTP server");

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!("Failed to bind to address {addr}: {e}");
            std::process::exit(1);
        }
    };

    let server = axum::serve(listener, app.into_make_service());
    if let Err(e) = server
        .with_graceful_shutdown(async {
            signal::ctrl_c()
                .await
                .expect("failed to install ctrl+c handler");
        })
        .await
    {
        tracing::error!("Server error: {e}");
        std::process::exit(1);
    }

    Ok(())
}
