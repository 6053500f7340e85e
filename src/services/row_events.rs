use serde::Serialize;
use tracing::warn;

use crate::{
    dao::models::{PlayerEntity, RaceEntity},
    dto::{
        race::{PlayerSnapshot, RaceSnapshot},
        sse::{CountdownTick, RowDeleted, ServerEvent},
    },
    state::SharedState,
};

/// Collection name carried in player row-change channel keys.
pub const COLLECTION_PLAYERS: &str = "players";
/// Collection name carried in race row-change channel keys.
pub const COLLECTION_RACES: &str = "races";

const EVENT_UPDATE: &str = "update";
const EVENT_DELETE: &str = "delete";
const EVENT_TICK: &str = "tick";

/// Publish the full row snapshot after a player row changed.
pub fn publish_player_update(state: &SharedState, player: &PlayerEntity) {
    let snapshot = PlayerSnapshot::from(player.clone());
    send_row_event(state, COLLECTION_PLAYERS, &player.id, EVENT_UPDATE, &snapshot);
}

/// Publish the full row snapshot after a race row changed.
pub fn publish_race_update(state: &SharedState, race: &RaceEntity) {
    let snapshot = RaceSnapshot::from(race.clone());
    send_row_event(state, COLLECTION_RACES, &race.id, EVENT_UPDATE, &snapshot);
}

/// Publish a tombstone after a player row was deleted.
pub fn publish_player_deleted(state: &SharedState, player_id: &str) {
    let payload = RowDeleted {
        row_id: player_id.to_string(),
    };
    send_row_event(state, COLLECTION_PLAYERS, player_id, EVENT_DELETE, &payload);
}

/// Publish a per-second countdown tick on the race channel.
pub fn publish_countdown_tick(state: &SharedState, race_id: &str, seconds_remaining: u64) {
    let payload = CountdownTick {
        race_id: race_id.to_string(),
        seconds_remaining,
    };
    send_row_event(state, COLLECTION_RACES, race_id, EVENT_TICK, &payload);
}

fn send_row_event(
    state: &SharedState,
    collection: &str,
    row_id: &str,
    event: &str,
    payload: &impl Serialize,
) {
    match ServerEvent::json(event, payload) {
        Ok(event) => state.hub().publish(collection, row_id, event),
        Err(err) => warn!(collection, row_id, event, error = %err, "failed to serialize row event"),
    }
}
