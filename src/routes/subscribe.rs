use std::convert::Infallible;

use axum::{
    Router,
    extract::{Path, State},
    response::sse::Sse,
    routing::get,
};
use futures::Stream;
use tracing::info;

use crate::{error::AppError, services::sse_service, state::SharedState};

#[utoipa::path(
    get,
    path = "/subscribe/{collection}/{row_id}",
    params(
        ("collection" = String, Path, description = "Row collection, `players` or `races`"),
        ("row_id" = String, Path, description = "Identifier of the row to watch"),
    ),
    responses(
        (status = 200, description = "Row-change SSE stream", content_type = "text/event-stream", body = String),
        (status = 400, description = "Unknown collection"),
    )
)]
/// Stream change notifications for a single row as server-sent events.
pub async fn subscribe_row(
    State(state): State<SharedState>,
    Path((collection, row_id)): Path<(String, String)>,
) -> Result<Sse<impl Stream<Item = Result<axum::response::sse::Event, Infallible>>>, AppError> {
    let (receiver, handshake) = sse_service::subscribe_row(&state, &collection, &row_id).await?;
    info!(collection, row_id, "new row subscription");
    Ok(sse_service::to_sse_stream(receiver, handshake))
}

/// Configure the row subscription route.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/subscribe/{collection}/{row_id}", get(subscribe_row))
}
