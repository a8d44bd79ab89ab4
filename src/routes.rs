use crate::dao::LinkStore;
use crate::handlers::dispatch;
use crate::interaction::{ChannelSink, Interaction};
use crate::model::{Invocation, NoticeReason, Reply, ReplyBody};
use crate::utils::{generate_id, internal_error, with_timeout};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;
use std::sync::Arc;

const ACK_TIMEOUT: u64 = 3000;
const RESPONSE_TIMEOUT: u64 = 10000;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn LinkStore>,
    pub dispatcher_key_hash: Arc<str>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractionResponse {
    pub interaction_id: String,
    #[serde(flatten)]
    pub reply: Reply,
}

pub async fn interact(
    State(state): State<AppState>,
    Json(invocation): Json<Invocation>,
) -> Result<(StatusCode, Json<InteractionResponse>), (StatusCode, String)> {
    let (sink, acknowledged, replied) = ChannelSink::new();
    let interaction = Interaction::new(generate_id(), Box::new(sink));
    let interaction_id = interaction.id().to_string();
    tracing::debug!(
        interaction_id = %interaction_id,
        command = invocation.command.name(),
        caller_id = invocation.caller.id,
        "Invocation received"
    );

    // A panicking handler drops its sink, which surfaces below as a closed channel.
    let store = state.store.clone();
    tokio::spawn(async move {
        let responded = dispatch(store, invocation, interaction).await;
        tracing::debug!(interaction_id = %responded.id, "Interaction responded");
    });

    with_timeout(ACK_TIMEOUT, acknowledged)
        .await
        .map_err(internal_error)?
        .map_err(internal_error)?;
    let reply = with_timeout(RESPONSE_TIMEOUT, replied)
        .await
        .map_err(internal_error)?
        .map_err(internal_error)?;

    Ok((
        status_for(&reply),
        Json(InteractionResponse {
            interaction_id,
            reply,
        }),
    ))
}

pub fn status_for(reply: &Reply) -> StatusCode {
    match &reply.body {
        ReplyBody::Saved { .. } => StatusCode::CREATED,
        ReplyBody::Listing { .. } | ReplyBody::Detail { .. } | ReplyBody::Removed { .. } => {
            StatusCode::OK
        }
        ReplyBody::Notice { reason, .. } => match reason {
            NoticeReason::InvalidUrl => StatusCode::BAD_REQUEST,
            NoticeReason::NoResults | NoticeReason::NotFound => StatusCode::NOT_FOUND,
            NoticeReason::PermissionDenied => StatusCode::FORBIDDEN,
            NoticeReason::Failure => StatusCode::INTERNAL_SERVER_ERROR,
        },
    }
}

pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
