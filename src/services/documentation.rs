use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for TypeRush Back.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::command::dispatch,
        crate::routes::subscribe::subscribe_row,
        crate::routes::janitor::run_janitor,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::health::HealthStatus,
            crate::dto::command::CommandRequest,
            crate::dto::command::RegisterPlayerRequest,
            crate::dto::command::PlayerRequest,
            crate::dto::command::RandomTextRequest,
            crate::dto::command::TextByIdRequest,
            crate::dto::command::AddTextRequest,
            crate::dto::command::JoinRaceByIdRequest,
            crate::dto::command::RaceRequest,
            crate::dto::command::UpdateStatsRequest,
            crate::dto::command::PlayerRegisteredResponse,
            crate::dto::command::RaceJoinedResponse,
            crate::dto::command::TextResponse,
            crate::dto::command::TextAddedResponse,
            crate::dto::command::StatsUpdatedResponse,
            crate::dto::command::ActionResponse,
            crate::dto::race::PlayerSnapshot,
            crate::dto::race::RaceSnapshot,
            crate::dto::race::TextRecord,
            crate::dto::sse::Handshake,
            crate::dto::sse::CountdownTick,
            crate::dto::sse::RowDeleted,
            crate::dao::models::RaceStatus,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "command", description = "Single-endpoint action dispatch"),
        (name = "subscribe", description = "Row-change SSE streams"),
        (name = "janitor", description = "Retention sweep trigger"),
    )
)]
pub struct ApiDoc;
