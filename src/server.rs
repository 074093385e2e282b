use crate::{
    config::Config,
    errors::{into_response, AppError},
    mcp::{
        registry::{CallContext, CallRequest, ToolRegistry},
        types::{Capabilities, ErrorObj, ToolInfo},
    },
    response::Channel,
    security,
};
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub cfg: Arc<Config>,
    pub registry: Arc<ToolRegistry>,
    pub rls: Arc<security::RateLimiters>,
}

pub async fn serve(cfg: Config, registry: ToolRegistry) -> anyhow::Result<()> {
    let shared = AppState {
        cfg: Arc::new(cfg),
        registry: Arc::new(registry),
        rls: Arc::new(security::RateLimiters::new(20, 40, 10, 20)),
    };

    let app = build_router(shared.clone());

    let addr: std::net::SocketAddr =
        format!("{}:{}", shared.cfg.server.bind_addr, shared.cfg.server.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

pub fn build_router(shared: AppState) -> Router {
    use tower_http::limit::RequestBodyLimitLayer;
    let base = shared.cfg.server.base_path.clone();
    let limit_bytes = shared.cfg.limits.max_request_kb * 1024;
    Router::new()
        .route("/healthz", get(health))
        .route(&format!("{base}/capabilities"), get(capabilities))
        .route(
            &format!("{base}/call"),
            post(call).layer(RequestBodyLimitLayer::new(limit_bytes)),
        )
        .with_state(shared)
}

async fn health(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    match authorize(&state, &headers) {
        Ok(()) => (StatusCode::OK, Json(json!({"status":"ok"}))).into_response(),
        Err(e) => into_response(e).into_response(),
    }
}

async fn capabilities(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Err(e) = authorize(&state, &headers) {
        return into_response(e).into_response();
    }
    let tools: Vec<ToolInfo> = state
        .registry
        .list_names()
        .into_iter()
        .map(|n| {
            let t = state.registry.get(&n).unwrap();
            ToolInfo {
                name: n,
                input_schema: t.capabilities()["input"].clone(),
                output_schema: t.capabilities()["output"].clone(),
            }
        })
        .collect();
    let caps = Capabilities {
        mcp_version: "1.0",
        tools,
        engine: state.registry.engine_name(),
    };
    (StatusCode::OK, Json(caps)).into_response()
}

async fn call(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<CallRequest>,
) -> Response {
    use std::time::Instant;
    let started = Instant::now();
    let request_id = uuid::Uuid::new_v4().to_string();
    let origin = headers
        .get("Origin")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();
    let channel_id = req.channel.clone().unwrap_or_default();

    let deny = |e: AppError| {
        audit(
            &request_id,
            &origin,
            &req.tool,
            &channel_id,
            "deny",
            e.code(),
            started.elapsed().as_millis() as u64,
        );
        into_response(e).into_response()
    };

    if let Err(e) = authorize(&state, &headers) {
        return deny(e);
    }
    if let Err(e) = security::content_length_ok(&headers, state.cfg.limits.max_request_kb) {
        return deny(e);
    }
    let token = security::extract_bearer(&headers);
    if let Err(e) = state.rls.check(token.as_deref()) {
        return deny(e);
    }
    let Some(tool) = state.registry.get(&req.tool) else {
        return deny(AppError::NotFound);
    };

    let ctx = CallContext {
        channel: Channel::from_id(&channel_id),
        request_id: request_id.clone(),
    };

    match tool.call(&ctx, req.params).await {
        Ok(result) => {
            audit(
                &request_id,
                &origin,
                &req.tool,
                &channel_id,
                "allow",
                "OK",
                started.elapsed().as_millis() as u64,
            );
            let payload = json!({"id": req.id, "result": result});
            (StatusCode::OK, Json(payload)).into_response()
        }
        Err(e) => {
            audit(
                &request_id,
                &origin,
                &req.tool,
                &channel_id,
                "error",
                e.code(),
                started.elapsed().as_millis() as u64,
            );
            let body = crate::mcp::registry::CallResponse {
                id: req.id,
                result: None,
                error: Some(ErrorObj {
                    code: e.code().to_string(),
                    message: e.to_string(),
                    hint: Some(e.user_hint().to_string()),
                }),
            };
            (e.status(), Json(body)).into_response()
        }
    }
}

fn audit(
    request_id: &str,
    origin: &str,
    tool: &str,
    channel: &str,
    decision: &str,
    code: &str,
    duration_ms: u64,
) {
    tracing::info!(
        request_id = request_id,
        origin = origin,
        tool = tool,
        channel = channel,
        decision = decision,
        code = code,
        duration_ms = duration_ms,
        "audit"
    );
}

fn authorize(state: &AppState, headers: &HeaderMap) -> Result<(), AppError> {
    security::require_bearer(headers, &state.cfg.auth.bearer_token)?;
    security::check_origin(headers, &state.cfg.auth.allowed_origins)?;
    Ok(())
}
