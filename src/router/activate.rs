//! Account activation endpoint.

use axum::extract::{Path, State};

use crate::AppState;
use crate::error::Result;
use crate::mail::Template::Welcome;

/// Handler to consume an activation code.
pub async fn handler(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<()> {
    let user = state.users.activate(&code).await?;

    if let Err(err) = state.mail.publish_event(Welcome, &user).await {
        tracing::error!(
            user_id = user.id,
            error = %err,
            "welcome mail not published"
        );
    }

    Ok(())
}
