//! Category handlers

use super::owned_category;
use crate::error::{found, parse_id, ApiResult, StoreResultExt};
use crate::extractors::{CurrentUser, ValidJson};
use crate::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use linkshelf_core::ports::CategoryStore;
use linkshelf_core::{BookmarkCategory, CategoryPatch, NewCategory};
use serde::Serialize;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteCategoryResponse {
    message: String,
    deleted_bookmarks_count: u64,
}

pub async fn list(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
) -> ApiResult<Json<Vec<BookmarkCategory>>> {
    let categories = state
        .store
        .get_categories(user_id)
        .await
        .or_fail("Failed to fetch categories")?;
    Ok(Json(categories))
}

pub async fn create(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    ValidJson(body): ValidJson<NewCategory>,
) -> ApiResult<(StatusCode, Json<BookmarkCategory>)> {
    let category = state
        .store
        .create_category(user_id, &body)
        .await
        .or_fail("Failed to create category")?;
    Ok((StatusCode::CREATED, Json(category)))
}

pub async fn update(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<String>,
    ValidJson(patch): ValidJson<CategoryPatch>,
) -> ApiResult<Json<BookmarkCategory>> {
    let id = parse_id(&id, "category")?;
    owned_category(&state, user_id, id).await?;

    let category = state
        .store
        .update_category(id, &patch)
        .await
        .or_fail("Failed to update category")?;
    Ok(Json(found(category, "Category")?))
}

pub async fn delete(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<Json<DeleteCategoryResponse>> {
    let id = parse_id(&id, "category")?;
    owned_category(&state, user_id, id).await?;

    let deleted_bookmarks_count = state
        .store
        .delete_category(id)
        .await
        .or_fail("Failed to delete category")?;
    Ok(Json(DeleteCategoryResponse {
        message: "Category deleted successfully".to_string(),
        deleted_bookmarks_count,
    }))
}
