use axum::extract::State;
use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Map, Value};
use std::fmt::Write;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::warn;

use crate::api::error::ApiError;
use crate::config::ResponseTokenField;
use crate::state::AppContext;
use crate::types::DeviceToken;

/// Build the daemon's HTTP router.
///
/// `allowed_origins` restricts CORS; an empty list or a `"*"` entry allows
/// any origin.
pub fn router(ctx: AppContext, allowed_origins: &[String]) -> Router {
    Router::new()
        .route("/", get(token))
        .route("/token", get(token))
        .route("/token/refresh", post(refresh))
        .route("/diagnostics", get(diagnostics))
        .layer(cors_layer(allowed_origins))
        .with_state(ctx)
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origin = if allowed_origins.is_empty() || allowed_origins.iter().any(|o| o.trim() == "*") {
        AllowOrigin::from(Any)
    } else {
        let origins: Vec<HeaderValue> = allowed_origins
            .iter()
            .filter_map(|o| match HeaderValue::from_str(o) {
                Ok(v) => Some(v),
                Err(e) => {
                    warn!("Ignoring invalid CORS origin {:?}: {}", o, e);
                    None
                }
            })
            .collect();
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::ORIGIN, header::CONTENT_TYPE])
}

fn token_body(token: &DeviceToken, field: ResponseTokenField) -> Value {
    let mut body = Map::new();
    body.insert(field.as_str().to_string(), Value::String(token.token.clone()));
    body.insert(
        "expired_time".to_string(),
        Value::String(token.expires_at.to_rfc3339()),
    );
    Value::Object(body)
}

/// `GET /token`: current device token, refreshed when expired
async fn token(State(ctx): State<AppContext>) -> Result<Json<Value>, ApiError> {
    let identity = ctx.identity.resolve().await?;
    let token = ctx.tokens.get_token(&identity).await?;
    Ok(Json(token_body(&token, ctx.token_field)))
}

/// `POST /token/refresh`: replace the cached token with a fresh one
async fn refresh(State(ctx): State<AppContext>) -> Result<Json<Value>, ApiError> {
    let identity = ctx.identity.resolve().await?;
    let token = ctx.tokens.refresh(&identity).await?;
    Ok(Json(token_body(&token, ctx.token_field)))
}

/// `GET /diagnostics`: plain-text dump, never refreshes the token
async fn diagnostics(State(ctx): State<AppContext>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "platform: {}", ctx.platform());

    match ctx.identity.resolve().await {
        Ok(identity) => {
            let _ = writeln!(out, "mac_address: {}", identity.mac_address);
            let _ = writeln!(
                out,
                "serial_number: {}",
                identity.serial_number.as_deref().unwrap_or("-")
            );
        }
        Err(e) => {
            let _ = writeln!(out, "mac_address: - ({})", e);
            let _ = writeln!(out, "serial_number: -");
        }
    }

    match ctx.tokens.peek().await {
        Some(token) => {
            let _ = writeln!(out, "{}: {}", ctx.token_field.as_str(), token.token);
            let _ = writeln!(out, "expired_time: {}", token.expires_at.to_rfc3339());
        }
        None => {
            let _ = writeln!(out, "{}: -", ctx.token_field.as_str());
        }
    }

    out
}
