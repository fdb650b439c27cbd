//! User handlers

use crate::error::{found, ApiResult, StoreResultExt};
use crate::extractors::CurrentUser;
use crate::AppState;
use axum::{extract::State, Json};
use linkshelf_core::ports::UserStore;
use linkshelf_core::User;

pub async fn me(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
) -> ApiResult<Json<User>> {
    let user = state
        .store
        .get_user(user_id)
        .await
        .or_fail("Failed to fetch user")?;
    Ok(Json(found(user, "User")?))
}
