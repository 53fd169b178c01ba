//! Account status administration endpoint.

use axum::Extension;
use axum::extract::{Path, State};

use crate::AppState;
use crate::error::Result;
use crate::token::Claims;

pub async fn handler(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path((user_id, status)): Path<(String, String)>,
) -> Result<()> {
    let user_id = super::resolve(user_id, &claims);
    state.users.update_status(&user_id, &status).await
}
