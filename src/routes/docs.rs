use axum::Router;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{services::documentation::ApiDoc, state::SharedState};

/// Path under which the interactive Swagger UI is mounted.
const UI_PATH: &str = "/docs";
/// Path serving the raw OpenAPI JSON document the UI renders.
const OPENAPI_PATH: &str = "/api-doc/openapi.json";

/// Mount the Swagger UI together with the generated OpenAPI document.
pub fn router(state: SharedState) -> Router<SharedState> {
    Router::from(SwaggerUi::new(UI_PATH).url(OPENAPI_PATH, ApiDoc::openapi())).with_state(state)
}
