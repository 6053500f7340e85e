/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Retention sweep over stale player and race rows.
pub mod janitor_service;
/// Public-queue matchmaking and race membership.
pub mod matchmaking_service;
/// Player registration, heartbeat and removal.
pub mod player_service;
/// Live stats reporting and finishing-place assignment.
pub mod progress_service;
/// Host-driven race lifecycle operations and the start countdown.
pub mod race_service;
/// Row-change event generation.
pub mod row_events;
/// Server-Sent Events forwarding service.
pub mod sse_service;
/// Storage connection supervisor.
pub mod storage_supervisor;
/// Passage selection and contribution.
pub mod text_service;
