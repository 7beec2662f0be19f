use axum::{
    body::Bytes,
    extract::{ConnectInfo, State},
    http::{header::HeaderName, HeaderMap, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{SecondsFormat, Utc};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use card_optimizer_core::analyze::RecommendationService;
use card_optimizer_core::domain::error::AnalysisError;
use card_optimizer_core::rate_limit::{RateLimitDecision, SlidingWindowLimiter};

const RATE_LIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
const RATE_LIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
const RATE_LIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");
const REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

#[derive(Clone)]
pub struct AppState {
    pub service: RecommendationService,
    pub limiter: Arc<SlidingWindowLimiter>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route(
            "/api/analyze",
            post(analyze)
                .options(preflight)
                .fallback(method_not_allowed),
        )
        .with_state(state)
        .layer(cors_layer())
        .layer(TraceLayer::new_for_http())
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::OPTIONS,
            Method::PATCH,
            Method::DELETE,
            Method::POST,
            Method::PUT,
        ])
        .allow_headers([
            HeaderName::from_static("x-csrf-token"),
            HeaderName::from_static("x-requested-with"),
            HeaderName::from_static("accept"),
            HeaderName::from_static("accept-version"),
            HeaderName::from_static("content-length"),
            HeaderName::from_static("content-md5"),
            HeaderName::from_static("content-type"),
            HeaderName::from_static("date"),
            HeaderName::from_static("x-api-version"),
        ])
}

async fn healthz() -> &'static str {
    "ok"
}

async fn preflight() -> StatusCode {
    StatusCode::OK
}

async fn method_not_allowed() -> (StatusCode, Json<Value>) {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        Json(json!({"error": "Method not allowed"})),
    )
}

async fn analyze(
    State(state): State<AppState>,
    peer: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let request_id = Uuid::new_v4();
    let client_id = client_id(&headers, peer.map(|ConnectInfo(addr)| addr));

    let now = Utc::now();
    let decision = state.limiter.check(&client_id, now);
    let mut out_headers = rate_limit_headers(&decision);
    if let Ok(v) = HeaderValue::from_str(&request_id.to_string()) {
        out_headers.insert(REQUEST_ID, v);
    }

    if !decision.allowed {
        tracing::warn!(%request_id, %client_id, "rate limit exceeded");
        let body = json!({
            "error": "Rate limit exceeded",
            "message": "Too many requests. Please wait a moment before trying again.",
            "retryAfter": decision.retry_after_secs(now),
        });
        return (StatusCode::TOO_MANY_REQUESTS, out_headers, Json(body)).into_response();
    }

    let payload = serde_json::from_slice::<Value>(&body).unwrap_or(Value::Null);
    let Some(query) = non_empty_str(&payload, "query") else {
        return error_response(out_headers, AnalysisError::InvalidInput("query"));
    };
    let Some(card_info) = non_empty_str(&payload, "cardInfo") else {
        return error_response(out_headers, AnalysisError::InvalidInput("cardInfo"));
    };

    tracing::info!(%request_id, %client_id, %query, "analyze request");
    match state.service.analyze(query, card_info).await {
        Ok(result) => (StatusCode::OK, out_headers, Json(result)).into_response(),
        Err(err) => {
            tracing::error!(%request_id, %client_id, error = %err, "analysis failed");
            error_response(out_headers, err)
        }
    }
}

fn non_empty_str<'a>(payload: &'a Value, key: &str) -> Option<&'a str> {
    payload
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
}

/// First `x-forwarded-for` hop, then `x-real-ip`, then the socket peer.
fn client_id(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|s| !s.is_empty())
    };

    if let Some(first) = header("x-forwarded-for")
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|s| !s.is_empty())
    {
        return first.to_string();
    }
    if let Some(real_ip) = header("x-real-ip") {
        return real_ip.to_string();
    }
    peer.map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

fn rate_limit_headers(decision: &RateLimitDecision) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(RATE_LIMIT_LIMIT, HeaderValue::from(decision.limit));
    headers.insert(RATE_LIMIT_REMAINING, HeaderValue::from(decision.remaining));
    let reset = decision.reset_at.to_rfc3339_opts(SecondsFormat::Millis, true);
    if let Ok(v) = HeaderValue::from_str(&reset) {
        headers.insert(RATE_LIMIT_RESET, v);
    }
    headers
}

fn error_response(headers: HeaderMap, err: AnalysisError) -> Response {
    let (status, body) = match &err {
        AnalysisError::InvalidInput(_) => {
            (StatusCode::BAD_REQUEST, json!({"error": err.to_string()}))
        }
        AnalysisError::Configuration => (
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({
                "error": "Server configuration error",
                "message": "API key not configured. Please contact the administrator.",
            }),
        ),
        AnalysisError::UpstreamAuth => (
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({
                "error": "API authentication failed",
                "message": "Invalid API key configuration",
            }),
        ),
        AnalysisError::UpstreamRateLimited => (
            StatusCode::TOO_MANY_REQUESTS,
            json!({
                "error": "API rate limit",
                "message": "Anthropic API rate limit exceeded. Please try again later.",
            }),
        ),
        AnalysisError::UpstreamEmptyResponse
        | AnalysisError::MalformedResponse(_)
        | AnalysisError::UpstreamOther(_)
        | AnalysisError::Network(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({"error": "Analysis failed", "message": err.to_string()}),
        ),
    };

    if status == StatusCode::INTERNAL_SERVER_ERROR {
        sentry_anyhow::capture_anyhow(&anyhow::Error::new(err));
    }
    (status, headers, Json(body)).into_response()
}
