//! Bearer secret check for the refresh endpoint.

use axum::http::{header::AUTHORIZATION, HeaderMap};
use tracing::warn;

use crate::error::ApiError;

/// Require `Authorization: Bearer <secret>`.
///
/// Without a configured secret every request is refused.
pub fn require_bearer(headers: &HeaderMap, secret: Option<&str>) -> Result<(), ApiError> {
    let Some(secret) = secret else {
        warn!("Refresh requested but no cron secret is configured");
        return Err(ApiError::Unauthorized);
    };

    let presented = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));

    match presented {
        Some(token) if constant_time_eq(token.as_bytes(), secret.as_bytes()) => Ok(()),
        _ => {
            warn!("Rejected refresh request with missing or wrong bearer token");
            Err(ApiError::Unauthorized)
        }
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
