use axum::{Json, Router, extract::State, routing::post};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use validator::Validate;

use crate::{
    dto::{
        command::{
            ActionResponse, AddTextRequest, CommandRequest, JoinRaceByIdRequest, PlayerRequest,
            RaceJoinedResponse, RaceRequest, RandomTextRequest, RegisterPlayerRequest,
            TextByIdRequest, UpdateStatsRequest,
        },
        race::RaceSnapshot,
    },
    error::AppError,
    services::{
        matchmaking_service, player_service, progress_service, race_service, text_service,
    },
    state::SharedState,
};

#[utoipa::path(
    post,
    path = "/command",
    request_body = CommandRequest,
    responses(
        (status = 200, description = "Action executed", body = Value),
        (status = 400, description = "Unknown action, invalid payload, or invalid transition"),
        (status = 404, description = "Referenced row does not exist"),
        (status = 503, description = "Storage unavailable (degraded mode)"),
    )
)]
/// Dispatch a `{action, data}` command to the matching service operation.
pub async fn dispatch(
    State(state): State<SharedState>,
    Json(request): Json<CommandRequest>,
) -> Result<Json<Value>, AppError> {
    match request.action.as_str() {
        "addPlayerToRows" => {
            let payload: RegisterPlayerRequest = decode(request.data)?;
            payload.validate()?;
            respond(player_service::register(&state, payload).await?)
        }
        "removePlayerFromRows" => {
            let payload: PlayerRequest = decode(request.data)?;
            payload.validate()?;
            player_service::deregister(&state, &payload.player_id).await?;
            respond(ActionResponse {
                message: "player removed".into(),
            })
        }
        "updatePlayerLastSeen" => {
            let payload: PlayerRequest = decode(request.data)?;
            payload.validate()?;
            player_service::heartbeat(&state, &payload.player_id).await?;
            respond(ActionResponse {
                message: "last seen updated".into(),
            })
        }
        "getRandomText" => {
            let payload: RandomTextRequest = decode(request.data)?;
            respond(text_service::random_text(&state, payload.id_only).await?)
        }
        "getTextById" => {
            let payload: TextByIdRequest = decode(request.data)?;
            payload.validate()?;
            respond(text_service::text_by_id(&state, &payload.text_id).await?)
        }
        "addText" => {
            let payload: AddTextRequest = decode(request.data)?;
            payload.validate()?;
            respond(text_service::add_text(&state, payload).await?)
        }
        "joinRace" => {
            let payload: PlayerRequest = decode(request.data)?;
            payload.validate()?;
            let race = matchmaking_service::join_public_race(&state, &payload.player_id).await?;
            respond(RaceJoinedResponse {
                race: RaceSnapshot::from(race),
            })
        }
        "joinRaceById" => {
            let payload: JoinRaceByIdRequest = decode(request.data)?;
            payload.validate()?;
            let race =
                matchmaking_service::join_race_by_id(&state, &payload.player_id, &payload.race_id)
                    .await?;
            respond(RaceJoinedResponse {
                race: RaceSnapshot::from(race),
            })
        }
        "createPrivateRace" => {
            let payload: PlayerRequest = decode(request.data)?;
            payload.validate()?;
            let race = matchmaking_service::create_private_race(&state, &payload.player_id).await?;
            respond(RaceJoinedResponse {
                race: RaceSnapshot::from(race),
            })
        }
        "startRace" => {
            let payload: RaceRequest = decode(request.data)?;
            payload.validate()?;
            let race = race_service::start_race(&state, &payload.race_id).await?;
            respond(RaceJoinedResponse {
                race: RaceSnapshot::from(race),
            })
        }
        "endRace" => {
            let payload: RaceRequest = decode(request.data)?;
            payload.validate()?;
            let race = race_service::end_race(&state, &payload.race_id).await?;
            respond(RaceJoinedResponse {
                race: RaceSnapshot::from(race),
            })
        }
        "resetRace" => {
            let payload: RaceRequest = decode(request.data)?;
            payload.validate()?;
            let race = race_service::reset_race(&state, &payload.race_id).await?;
            respond(RaceJoinedResponse {
                race: RaceSnapshot::from(race),
            })
        }
        "updateStats" => {
            let payload: UpdateStatsRequest = decode(request.data)?;
            payload.validate()?;
            respond(progress_service::update_stats(&state, payload).await?)
        }
        unknown => Err(AppError::BadRequest(format!("unknown action '{unknown}'"))),
    }
}

fn decode<T: DeserializeOwned>(data: Value) -> Result<T, AppError> {
    // An omitted `data` key means "no arguments", not an invalid payload.
    let data = match data {
        Value::Null => Value::Object(serde_json::Map::new()),
        other => other,
    };
    serde_json::from_value(data)
        .map_err(|err| AppError::BadRequest(format!("invalid payload: {err}")))
}

fn respond<T: Serialize>(payload: T) -> Result<Json<Value>, AppError> {
    serde_json::to_value(payload)
        .map(Json)
        .map_err(|err| AppError::Internal(err.to_string()))
}

/// Configure the command dispatch route.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/command", post(dispatch))
}
