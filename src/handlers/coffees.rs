use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::{StatusCode, header},
    response::IntoResponse,
};

use crate::coffee::{Coffee, CoffeeDraft};
use crate::AppError;

pub const COFFEES_PATH: &str = "/api/coffees";

fn draft_from(payload: Result<Json<CoffeeDraft>, JsonRejection>) -> crate::AppResult<CoffeeDraft> {
    payload
        .map(|Json(draft)| draft)
        .map_err(|rejection| AppError::BadRequest(rejection.body_text()))
}

pub async fn list_coffees(State(state): State<crate::SharedAppState>) -> Json<Vec<Coffee>> {
    Json(state.store.list())
}

pub async fn get_coffee(
    State(state): State<crate::SharedAppState>,
    Path(id): Path<u64>,
) -> crate::AppResult<Json<Coffee>> {
    let coffee = state.store.get(id)?;
    Ok(Json(coffee))
}

/// Responds `201 Created` with the stored coffee and a `Location` header.
pub async fn create_coffee(
    State(state): State<crate::SharedAppState>,
    payload: Result<Json<CoffeeDraft>, JsonRejection>,
) -> crate::AppResult<impl IntoResponse> {
    let draft = draft_from(payload)?;
    let coffee = state.store.create(draft)?;
    tracing::debug!(id = coffee.id, title = %coffee.title, "coffee created");

    let location = format!("{}/{}", COFFEES_PATH, coffee.id);
    Ok((StatusCode::CREATED, [(header::LOCATION, location)], Json(coffee)))
}

pub async fn update_coffee(
    State(state): State<crate::SharedAppState>,
    Path(id): Path<u64>,
    payload: Result<Json<CoffeeDraft>, JsonRejection>,
) -> crate::AppResult<StatusCode> {
    let draft = draft_from(payload)?;
    state.store.update(id, draft)?;
    tracing::debug!(id, "coffee updated");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_coffee(
    State(state): State<crate::SharedAppState>,
    Path(id): Path<u64>,
) -> crate::AppResult<StatusCode> {
    state.store.delete(id)?;
    tracing::debug!(id, "coffee deleted");
    Ok(StatusCode::NO_CONTENT)
}
