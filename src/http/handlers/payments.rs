use crate::error::AppError;
use crate::AppState;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;

pub async fn catalogue(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    Ok(Json(state.catalogue_cache.get().await?))
}
