use std::{convert::Infallible, time::Duration};

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::info;

use crate::{
    dto::sse::{Handshake, ServerEvent},
    error::ServiceError,
    services::row_events::{COLLECTION_PLAYERS, COLLECTION_RACES},
    state::SharedState,
};

const EVENT_HANDSHAKE: &str = "handshake";

/// Subscribe to the change channel of a single row.
pub async fn subscribe_row(
    state: &SharedState,
    collection: &str,
    row_id: &str,
) -> Result<(broadcast::Receiver<ServerEvent>, Handshake), ServiceError> {
    if collection != COLLECTION_PLAYERS && collection != COLLECTION_RACES {
        return Err(ServiceError::InvalidInput(format!(
            "unknown collection '{collection}'; expected '{COLLECTION_PLAYERS}' or '{COLLECTION_RACES}'"
        )));
    }

    let receiver = state.hub().subscribe(collection, row_id);
    let handshake = Handshake {
        collection: collection.to_string(),
        row_id: row_id.to_string(),
        degraded: state.is_degraded(),
    };
    Ok((receiver, handshake))
}

/// Convert a broadcast receiver into an SSE response, forwarding events and
/// cleaning up once the client disconnects.
pub fn to_sse_stream(
    mut receiver: broadcast::Receiver<ServerEvent>,
    handshake: Handshake,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    // small bounded channel between forwarder and response
    let (tx, rx) = mpsc::channel::<Result<Event, Infallible>>(8);

    // forwarder task: reads from broadcast and pushes into mpsc
    tokio::spawn(async move {
        let opening = serde_json::to_string(&handshake).unwrap_or_else(|_| "{}".into());
        if tx
            .send(Ok(Event::default().event(EVENT_HANDSHAKE).data(opening)))
            .await
            .is_err()
        {
            return;
        }

        loop {
            tokio::select! {
                _ = tx.closed() => break,
                recv_result = receiver.recv() => {
                    match recv_result {
                        Ok(payload) => {
                            let event = Event::default().event(payload.event).data(payload.data);
                            if tx.send(Ok(event)).await.is_err() {
                                break;
                            }
                        }
                        Err(RecvError::Closed) => break,
                        Err(RecvError::Lagged(_)) => {
                            // Skip lagged messages but keep the stream alive.
                            continue;
                        }
                    }
                }
            }
        }

        info!("row subscription disconnected");
    });

    // response stream reads from mpsc; when client disconnects axum drops this stream
    let stream = ReceiverStream::new(rx);
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}
