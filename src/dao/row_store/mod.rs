pub mod memory;
#[cfg(feature = "mongo-store")]
pub mod mongodb;

use std::time::{Duration, SystemTime};

use futures::future::BoxFuture;

use crate::dao::models::{PlayerEntity, RaceEntity, RaceStatus, TextEntity};
use crate::dao::storage::StorageResult;

/// How a race transition manipulates the scheduled start time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartTimeUpdate {
    /// Leave the stored start time untouched.
    Keep,
    /// Overwrite the start time.
    Set(SystemTime),
    /// Remove the start time (reset only).
    Clear,
}

/// Guarded race transition applied as a single conditional row update.
#[derive(Debug, Clone)]
pub struct RaceTransition {
    /// Statuses the row must currently be in for the update to apply.
    pub allowed_from: &'static [RaceStatus],
    /// Status written when the guard holds.
    pub to: RaceStatus,
    /// Start-time manipulation performed alongside the status write.
    pub start_time: StartTimeUpdate,
    /// Replacement passage id (reset draws a fresh one).
    pub new_text_id: Option<String>,
    /// Clear the race-scoped place counter (reset only).
    pub reset_places: bool,
}

/// Result of a guarded race transition.
#[derive(Debug, Clone)]
pub enum TransitionOutcome {
    /// The guard held and the row was updated.
    Applied(RaceEntity),
    /// The row exists but its status was outside `allowed_from`.
    Conflict(RaceStatus),
    /// No race row with the given id.
    Missing,
}

/// Persistence operations on ephemeral player rows.
pub trait PlayerRepository: Send + Sync {
    fn insert_player(&self, player: PlayerEntity) -> BoxFuture<'static, StorageResult<()>>;
    fn find_player(&self, id: String) -> BoxFuture<'static, StorageResult<Option<PlayerEntity>>>;
    /// Refresh `last_seen`, returning the updated row (`None` when missing).
    fn touch_player(
        &self,
        id: String,
        seen_at: SystemTime,
    ) -> BoxFuture<'static, StorageResult<Option<PlayerEntity>>>;
    /// Point the player at a race (or detach it), returning the updated row.
    fn set_player_race(
        &self,
        id: String,
        race_id: Option<String>,
    ) -> BoxFuture<'static, StorageResult<Option<PlayerEntity>>>;
    /// Overwrite live stats last-write-wins, returning the updated row.
    fn update_player_stats(
        &self,
        id: String,
        wpm: u32,
        progress: f64,
        place: Option<u32>,
    ) -> BoxFuture<'static, StorageResult<Option<PlayerEntity>>>;
    /// Delete a player row; `false` when it did not exist.
    fn delete_player(&self, id: String) -> BoxFuture<'static, StorageResult<bool>>;
    /// Janitor sweep: remove players created strictly before the cutoff.
    fn delete_players_created_before(
        &self,
        cutoff: SystemTime,
    ) -> BoxFuture<'static, StorageResult<u64>>;
}

/// Persistence operations on shared race rows.
pub trait RaceRepository: Send + Sync {
    fn insert_race(&self, race: RaceEntity) -> BoxFuture<'static, StorageResult<()>>;
    fn find_race(&self, id: String) -> BoxFuture<'static, StorageResult<Option<RaceEntity>>>;
    /// Pick one public race the matchmaker may still add players to: a
    /// waiting race, or a starting race whose start is further out than the
    /// `starting_soon` window.
    fn find_open_public_race(
        &self,
        now: SystemTime,
        starting_soon: Duration,
    ) -> BoxFuture<'static, StorageResult<Option<RaceEntity>>>;
    /// Atomically append a player to the roster, returning the updated row.
    /// The append itself is never lost, even under concurrent joins.
    fn append_player(
        &self,
        race_id: String,
        player_id: String,
    ) -> BoxFuture<'static, StorageResult<Option<RaceEntity>>>;
    /// Schedule (or shorten) the start of a waiting/starting race. The write
    /// applies only when no start time is stored yet or the proposal is
    /// earlier than the stored one; a later join can never push the start
    /// back. Returns the row after the operation.
    fn schedule_start(
        &self,
        race_id: String,
        to: RaceStatus,
        start_time: SystemTime,
    ) -> BoxFuture<'static, StorageResult<Option<RaceEntity>>>;
    /// Apply a guarded lifecycle transition as one conditional update.
    fn transition_race(
        &self,
        race_id: String,
        transition: RaceTransition,
    ) -> BoxFuture<'static, StorageResult<TransitionOutcome>>;
    /// Claim the next finishing place for a race (1, 2, 3, ...). The counter
    /// is an atomic increment scoped to the race row.
    fn claim_place(&self, race_id: String) -> BoxFuture<'static, StorageResult<Option<u32>>>;
    /// Janitor sweep: remove races created strictly before the cutoff.
    fn delete_races_created_before(
        &self,
        cutoff: SystemTime,
    ) -> BoxFuture<'static, StorageResult<u64>>;
}

/// Persistence operations on the immutable passage collection.
pub trait TextRepository: Send + Sync {
    fn insert_text(&self, text: TextEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// Total number of passages at call time (re-read on every random draw).
    fn count_texts(&self) -> BoxFuture<'static, StorageResult<u64>>;
    /// Fetch the single passage at the given collection offset.
    fn text_at_offset(
        &self,
        offset: u64,
    ) -> BoxFuture<'static, StorageResult<Option<TextEntity>>>;
    fn find_text(&self, id: String) -> BoxFuture<'static, StorageResult<Option<TextEntity>>>;
}

/// Abstraction over the persistence layer for all coordinator rows.
pub trait RowStore: PlayerRepository + RaceRepository + TextRepository {
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}
