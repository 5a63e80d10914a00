mod dto;
pub mod file_repo;
pub mod handlers;
pub mod repo;
pub mod repo_types;
mod services;

pub(crate) use dto::OkResponse;

use crate::state::AppState;
use axum::Router;

pub fn router() -> Router<AppState> {
    handlers::data_routes()
}
