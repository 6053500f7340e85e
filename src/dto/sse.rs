use serde::Serialize;
use utoipa::ToSchema;

#[derive(Clone, Debug)]
/// Dispatched payload carried across row-change channels.
pub struct ServerEvent {
    pub event: String,
    pub data: String,
}

impl ServerEvent {
    /// Convenience wrapper that serialises `payload` into the SSE data field.
    pub fn json<T>(event: &str, payload: &T) -> serde_json::Result<Self>
    where
        T: Serialize,
    {
        Ok(Self {
            event: event.to_string(),
            data: serde_json::to_string(payload)?,
        })
    }
}

#[derive(Debug, Serialize, ToSchema)]
/// Initial metadata sent to a subscriber when it connects.
#[serde(rename_all = "camelCase")]
pub struct Handshake {
    /// Collection of the row being watched (`players` or `races`).
    pub collection: String,
    /// Identifier of the row being watched.
    pub row_id: String,
    /// Whether the backend is running without a storage backend connection.
    pub degraded: bool,
}

#[derive(Debug, Serialize, ToSchema)]
/// Per-second countdown notification published on a race channel.
#[serde(rename_all = "camelCase")]
pub struct CountdownTick {
    pub race_id: String,
    pub seconds_remaining: u64,
}

#[derive(Debug, Serialize, ToSchema)]
/// Published on a row channel when the row has been deleted.
#[serde(rename_all = "camelCase")]
pub struct RowDeleted {
    pub row_id: String,
}
