use mongodb::bson::DateTime;
use serde::{Deserialize, Serialize};

use crate::dao::models::{PlayerEntity, RaceEntity, RaceStatus, TextEntity};

/// Stringified status used in query filters.
pub fn status_str(status: RaceStatus) -> &'static str {
    match status {
        RaceStatus::Waiting => "waiting",
        RaceStatus::Starting => "starting",
        RaceStatus::Active => "active",
        RaceStatus::Finished => "finished",
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoPlayerDocument {
    #[serde(rename = "_id")]
    id: String,
    created_at: DateTime,
    last_seen: DateTime,
    race_id: Option<String>,
    wpm: u32,
    progress: f64,
    place: Option<u32>,
}

impl From<PlayerEntity> for MongoPlayerDocument {
    fn from(value: PlayerEntity) -> Self {
        Self {
            id: value.id,
            created_at: DateTime::from_system_time(value.created_at),
            last_seen: DateTime::from_system_time(value.last_seen),
            race_id: value.race_id,
            wpm: value.wpm,
            progress: value.progress,
            place: value.place,
        }
    }
}

impl From<MongoPlayerDocument> for PlayerEntity {
    fn from(value: MongoPlayerDocument) -> Self {
        Self {
            id: value.id,
            created_at: value.created_at.to_system_time(),
            last_seen: value.last_seen.to_system_time(),
            race_id: value.race_id,
            wpm: value.wpm,
            progress: value.progress,
            place: value.place,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoRaceDocument {
    #[serde(rename = "_id")]
    id: String,
    text_id: String,
    players: Vec<String>,
    host: Option<String>,
    status: RaceStatus,
    start_time: Option<DateTime>,
    created_at: DateTime,
    #[serde(default)]
    place_counter: u32,
}

impl From<RaceEntity> for MongoRaceDocument {
    fn from(value: RaceEntity) -> Self {
        Self {
            id: value.id,
            text_id: value.text_id,
            players: value.players,
            host: value.host,
            status: value.status,
            start_time: value.start_time.map(DateTime::from_system_time),
            created_at: DateTime::from_system_time(value.created_at),
            place_counter: value.place_counter,
        }
    }
}

impl From<MongoRaceDocument> for RaceEntity {
    fn from(value: MongoRaceDocument) -> Self {
        Self {
            id: value.id,
            text_id: value.text_id,
            players: value.players,
            host: value.host,
            status: value.status,
            start_time: value.start_time.map(|time| time.to_system_time()),
            created_at: value.created_at.to_system_time(),
            place_counter: value.place_counter,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoTextDocument {
    #[serde(rename = "_id")]
    id: String,
    content: String,
    origin: String,
    author: String,
    uploader: String,
    #[serde(rename = "type")]
    kind: String,
}

impl From<TextEntity> for MongoTextDocument {
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

impl From<MongoTextDocument> for TextEntity {
    fn from(value: MongoTextDocument) -> Self {
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
