//! User retrieval endpoints.

use axum::extract::{Path, State};
use axum::{Extension, Json};

use crate::AppState;
use crate::error::Result;
use crate::token::Claims;
use crate::user::UserView;

pub async fn handler(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(user_id): Path<String>,
) -> Result<Json<UserView>> {
    let user_id = super::resolve(user_id, &claims);
    let user = state.users.get_by_id(&user_id).await?;
    Ok(Json(UserView::new(user, &state.config)))
}

pub async fn by_handle(
    State(state): State<AppState>,
    Path(handle): Path<String>,
) -> Result<Json<UserView>> {
    let user = state.users.get_by_handle(&handle).await?;
    Ok(Json(UserView::new(user, &state.config)))
}

pub async fn by_email(
    State(state): State<AppState>,
    Path(email): Path<String>,
) -> Result<Json<UserView>> {
    let user = state.users.get_by_email(&email).await?;
    Ok(Json(UserView::new(user, &state.config)))
}

pub async fn by_name(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<UserView>> {
    let user = state.users.get_by_name(&name).await?;
    Ok(Json(UserView::new(user, &state.config)))
}
