use serde::{Deserialize, Serialize};
use serde_with::{TimestampMilliSeconds, serde_as};
use std::time::SystemTime;
use utoipa::ToSchema;

/// Lifecycle state of a race row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum RaceStatus {
    /// Roster is filling up; the race is matchable by the public queue.
    Waiting,
    /// Enough players joined; a start time is scheduled and counting down.
    Starting,
    /// Typing is (or is about to be) permitted; governed by `start_time`.
    Active,
    /// The race is over; only a host reset can revive the row.
    Finished,
}

/// Ephemeral player row persisted for the duration of a session.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlayerEntity {
    /// Stable identifier generated on registration.
    pub id: String,
    /// Creation timestamp, used by the janitor retention sweep.
    #[serde_as(as = "TimestampMilliSeconds<i64>")]
    pub created_at: SystemTime,
    /// Last heartbeat from the owning client.
    #[serde_as(as = "TimestampMilliSeconds<i64>")]
    pub last_seen: SystemTime,
    /// Race the player currently belongs to, if any.
    pub race_id: Option<String>,
    /// Latest reported words-per-minute.
    pub wpm: u32,
    /// Latest reported completion fraction in `[0, 1]`.
    pub progress: f64,
    /// Finishing rank, assigned once progress first reaches 1.0.
    pub place: Option<u32>,
}

impl PlayerEntity {
    /// Build a fresh player row with zeroed stats and no race membership.
    pub fn new(id: String, now: SystemTime) -> Self {
        Self {
            id,
            created_at: now,
            last_seen: now,
            race_id: None,
            wpm: 0,
            progress: 0.0,
            place: None,
        }
    }
}

/// Shared race row: roster, lifecycle state, and start schedule.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RaceEntity {
    /// Stable identifier for the race.
    pub id: String,
    /// Passage assigned at creation (redrawn on reset).
    pub text_id: String,
    /// Ordered roster of player ids, append-only while waiting/starting.
    pub players: Vec<String>,
    /// Owning player for private rooms; `None` for the public pool.
    pub host: Option<String>,
    /// Current lifecycle state.
    pub status: RaceStatus,
    /// Absolute time at which typing is permitted to begin.
    #[serde_as(as = "Option<TimestampMilliSeconds<i64>>")]
    #[serde(default)]
    pub start_time: Option<SystemTime>,
    /// Creation timestamp, used by the janitor retention sweep.
    #[serde_as(as = "TimestampMilliSeconds<i64>")]
    pub created_at: SystemTime,
    /// Race-scoped finishing-place counter; cleared on reset.
    pub place_counter: u32,
}

impl RaceEntity {
    /// Build a waiting race around its first player.
    pub fn new(
        id: String,
        text_id: String,
        first_player: String,
        host: Option<String>,
        now: SystemTime,
    ) -> Self {
        Self {
            id,
            text_id,
            players: vec![first_player],
            host,
            status: RaceStatus::Waiting,
            start_time: None,
            created_at: now,
            place_counter: 0,
        }
    }
}

/// Immutable passage row selected at race creation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TextEntity {
    /// Stable identifier for the passage.
    pub id: String,
    /// The passage itself.
    pub content: String,
    /// Work the passage is taken from.
    pub origin: String,
    /// Author of the original work.
    pub author: String,
    /// Who contributed the passage.
    pub uploader: String,
    /// Category label, e.g. "quote" or "story".
    #[serde(rename = "type")]
    pub kind: String,
}
