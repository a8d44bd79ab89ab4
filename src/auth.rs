use crate::routes::AppState;
use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::IntoResponse;
use sha3::{Digest, Sha3_256};

pub const API_KEY_HEADER: &str = "x-api-key";

/// Only the dispatcher may post invocations: caller identity and capability
/// arrive in the body and are trusted as given.
pub async fn auth(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let api_key_bytes = request
        .headers()
        .get(API_KEY_HEADER)
        .map(|value| value.to_str().unwrap_or_default())
        .ok_or_else(|| {
            tracing::debug!("Invocation without dispatcher key");
            (StatusCode::UNAUTHORIZED, "Unauthorized".into())
        })?
        .as_bytes();

    if hash_key(api_key_bytes) != state.dispatcher_key_hash.to_lowercase() {
        tracing::warn!("Invocation with invalid dispatcher key");
        return Err((StatusCode::UNAUTHORIZED, "Unauthorized".into()));
    }
    Ok(next.run(request).await)
}

pub fn hash_key(key: &[u8]) -> String {
    let mut hasher = Sha3_256::new();
    hasher.update(key);
    format!("{:x}", hasher.finalize())
}
