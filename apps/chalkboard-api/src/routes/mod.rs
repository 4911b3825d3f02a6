pub mod board;
pub mod health;

use axum::Router;
use tower_http::services::ServeDir;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::config::Config;
use crate::AppState;

pub fn router(config: &Config) -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .merge(board::router())
        .merge(crate::hub::server::router())
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .nest_service("/js", ServeDir::new(config.static_dir.join("js")))
}

#[derive(OpenApi)]
#[openapi(
    paths(
        // Health
        health::health,
        // Board
        board::index,
        board::mutate,
        board::board_index,
        board::board_mutate,
        // Events
        crate::hub::server::events,
        crate::hub::server::board_events,
    ),
    components(
        schemas(
            // Error types
            crate::error::ApiErrorBody,
            crate::error::ApiErrorDetail,
            crate::error::FieldError,
            // Models
            crate::models::note::Note,
            // Route request/response types
            health::HealthResponse,
            board::MutationForm,
        )
    ),
    tags(
        (name = "Health", description = "Health check"),
        (name = "Board", description = "Chalkboard pages and note mutations, per board"),
        (name = "Events", description = "Server-sent event stream of note changes"),
    )
)]
pub struct ApiDoc;
