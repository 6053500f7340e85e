//! Request and response payloads for the single `/command` dispatch endpoint.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;
use validator::Validate;

use crate::dto::race::{RaceSnapshot, TextRecord};

/// Envelope accepted by `POST /command`: an action name plus an
/// action-specific data object.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CommandRequest {
    /// Name of the operation to dispatch.
    pub action: String,
    /// Action-specific payload, decoded per action.
    #[serde(default)]
    pub data: Value,
}

/// Payload for `addPlayerToRows`.
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegisterPlayerRequest {
    /// Client-chosen identifier; one is generated when absent.
    #[validate(length(min = 1, max = 64))]
    pub player_id: Option<String>,
}

/// Payload for actions addressing a single player row.
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PlayerRequest {
    #[validate(length(min = 1, max = 64))]
    pub player_id: String,
}

/// Payload for `getRandomText`.
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RandomTextRequest {
    /// When set, only the text id is returned instead of the full record.
    #[serde(default)]
    pub id_only: bool,
}

/// Payload for `getTextById`.
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TextByIdRequest {
    #[validate(length(min = 1, max = 64))]
    pub text_id: String,
}

/// Payload for `addText`.
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AddTextRequest {
    #[validate(length(min = 20, max = 5000))]
    pub content: String,
    #[validate(length(min = 1, max = 200))]
    pub origin: String,
    #[validate(length(min = 1, max = 200))]
    pub author: String,
    #[validate(length(min = 1, max = 64))]
    pub uploader: String,
    #[serde(rename = "type", default = "default_text_kind")]
    #[validate(length(min = 1, max = 32))]
    pub kind: String,
}

fn default_text_kind() -> String {
    "type".to_string()
}

/// Payload for `joinRaceById`.
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct JoinRaceByIdRequest {
    #[validate(length(min = 1, max = 64))]
    pub player_id: String,
    #[validate(length(min = 1, max = 64))]
    pub race_id: String,
}

/// Payload for actions addressing a single race row.
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RaceRequest {
    #[validate(length(min = 1, max = 64))]
    pub race_id: String,
}

/// Payload for `updateStats`.
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStatsRequest {
    #[validate(length(min = 1, max = 64))]
    pub player_id: String,
    #[validate(range(min = 0, max = 500))]
    pub wpm: u32,
    #[validate(range(min = 0.0, max = 1.0))]
    pub progress: f64,
    /// Race the stats belong to; defaults to the player's current race.
    #[validate(length(min = 1, max = 64))]
    pub race_id: Option<String>,
}

/// Response to `addPlayerToRows`.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PlayerRegisteredResponse {
    pub player_id: String,
}

/// Response to the join and create-race actions.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RaceJoinedResponse {
    pub race: RaceSnapshot,
}

/// Response to `getRandomText` and `getTextById`.
#[derive(Debug, Serialize, ToSchema)]
#[serde(untagged, rename_all_fields = "camelCase")]
pub enum TextResponse {
    /// Just the identifier, for clients that fetch content separately.
    IdOnly { text_id: String },
    /// The full passage record.
    Full { text: TextRecord },
}

/// Response to `addText`.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TextAddedResponse {
    pub text_id: String,
}

/// Response to `updateStats`.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StatsUpdatedResponse {
    /// Finishing place, present once the player has completed the passage.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub place: Option<u32>,
}

/// Generic acknowledgement for actions with no meaningful payload.
#[derive(Debug, Serialize, ToSchema)]
pub struct ActionResponse {
    pub message: String,
}
