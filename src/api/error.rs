use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::device::ResolutionError;
use crate::token::TokenFetchError;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("machine identity unavailable: {0}")]
    Identity(#[from] ResolutionError),
    #[error("device token unavailable: {0}")]
    Token(#[from] TokenFetchError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            ApiError::Identity(_) => (StatusCode::SERVICE_UNAVAILABLE, "IDENTITY_UNAVAILABLE"),
            ApiError::Token(_) => (StatusCode::BAD_GATEWAY, "TOKEN_UNAVAILABLE"),
        };

        tracing::warn!(%status, "{}", self);

        let body = ErrorBody {
            error: ErrorDetail {
                code,
                message: self.to_string(),
            },
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[tokio::test]
    async fn identity_error_returns_503() {
        let response = ApiError::from(ResolutionError::NoUsableMac).into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body = to_bytes(response.into_body(), 1024).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"]["code"], "IDENTITY_UNAVAILABLE");
        assert_eq!(
            json["error"]["message"],
            "machine identity unavailable: no usable MAC address"
        );
    }

    #[tokio::test]
    async fn token_error_returns_502() {
        let err = TokenFetchError::Status {
            status: 500,
            body: "boom".to_string(),
        };
        let response = ApiError::from(err).into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let body = to_bytes(response.into_body(), 1024).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"]["code"], "TOKEN_UNAVAILABLE");
    }
}
