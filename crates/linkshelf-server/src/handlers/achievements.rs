//! Achievement handlers

use crate::error::{ApiResult, StoreResultExt};
use crate::extractors::CurrentUser;
use crate::AppState;
use axum::{extract::State, Json};
use linkshelf_core::ports::AchievementStore;
use linkshelf_core::UserAchievementDetail;

/// Progress records the user already has, joined with their definitions
pub async fn list(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
) -> ApiResult<Json<Vec<UserAchievementDetail>>> {
    let achievements = state
        .store
        .get_user_achievements(user_id)
        .await
        .or_fail("Failed to fetch achievements")?;
    Ok(Json(achievements))
}

/// Recompute progress from current counts, then return the full list
pub async fn check(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
) -> ApiResult<Json<Vec<UserAchievementDetail>>> {
    let achievements = state
        .store
        .check_user_achievements(user_id)
        .await
        .or_fail("Failed to check achievements")?;
    Ok(Json(achievements))
}
