//! Remove a user from the identity directory and the record store.

use axum::Extension;
use axum::extract::{Path, State};

use crate::AppState;
use crate::error::Result;
use crate::token::Claims;

pub async fn handler(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(user_id): Path<String>,
) -> Result<()> {
    let user_id = super::resolve(user_id, &claims);
    state.users.delete(&user_id).await
}
