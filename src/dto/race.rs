//! Wire projections of player, race and text rows.

use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    dao::models::{PlayerEntity, RaceEntity, RaceStatus, TextEntity},
    dto::{epoch_millis, format_system_time},
};

/// Projection of a player row sent to clients.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSnapshot {
    pub id: String,
    /// RFC 3339 creation timestamp.
    pub created_at: String,
    /// RFC 3339 timestamp of the last heartbeat.
    pub last_seen: String,
    pub race_id: Option<String>,
    pub wpm: u32,
    pub progress: f64,
    pub place: Option<u32>,
}

impl From<PlayerEntity> for PlayerSnapshot {
    fn from(value: PlayerEntity) -> Self {
        Self {
            id: value.id,
            created_at: format_system_time(value.created_at),
            last_seen: format_system_time(value.last_seen),
            race_id: value.race_id,
            wpm: value.wpm,
            progress: value.progress,
            place: value.place,
        }
    }
}

/// Projection of a race row sent to clients.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RaceSnapshot {
    pub id: String,
    pub text_id: String,
    pub players: Vec<String>,
    pub host: Option<String>,
    pub status: RaceStatus,
    /// Scheduled start, in milliseconds since the Unix epoch.
    pub start_time: Option<i64>,
    /// RFC 3339 creation timestamp.
    pub created_at: String,
}

impl From<RaceEntity> for RaceSnapshot {
    fn from(value: RaceEntity) -> Self {
        Self {
            id: value.id,
            text_id: value.text_id,
            players: value.players,
            host: value.host,
            status: value.status,
            start_time: value.start_time.map(epoch_millis),
            created_at: format_system_time(value.created_at),
        }
    }
}

/// Full text passage record.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TextRecord {
    pub id: String,
    pub content: String,
    pub origin: String,
    pub author: String,
    pub uploader: String,
    #[serde(rename = "type")]
    pub kind: String,
}

impl From<TextEntity> for TextRecord {
    fn from(value: TextEntity) -> Self {
        Self {
            id: value.id,
            content: value.content,
            origin: value.origin,
            author: value.author,
            uploader: value.uploader,
            kind: value.kind,
        }
    }
}
