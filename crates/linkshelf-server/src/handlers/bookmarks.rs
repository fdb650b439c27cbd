//! Bookmark handlers

use crate::error::{found, parse_id, ApiError, ApiResult, StoreResultExt};
use crate::extractors::{CurrentUser, ValidJson};
use crate::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use linkshelf_core::ports::{BookmarkStore, Storage};
use linkshelf_core::{Bookmark, BookmarkPatch, Id, NewBookmark};
use serde::Serialize;
use tracing::debug;

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    message: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VisitResponse {
    message: String,
    visit_count: i64,
}

/// Fetch a bookmark the user owns, or 404
async fn owned_bookmark(state: &AppState, user_id: Id, id: Id) -> ApiResult<Bookmark> {
    state
        .store
        .get_bookmark(id)
        .await
        .or_fail("Failed to fetch bookmark")?
        .filter(|bookmark| bookmark.user_id == user_id)
        .ok_or_else(|| ApiError::NotFound("Bookmark not found".to_string()))
}

pub async fn list(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
) -> ApiResult<Json<Vec<Bookmark>>> {
    let bookmarks = state
        .store
        .get_bookmarks(user_id)
        .await
        .or_fail("Failed to fetch bookmarks")?;
    Ok(Json(bookmarks))
}

pub async fn list_by_category(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(category_id): Path<String>,
) -> ApiResult<Json<Vec<Bookmark>>> {
    let category_id = parse_id(&category_id, "category")?;
    let bookmarks = state
        .store
        .get_bookmarks_by_category(category_id)
        .await
        .or_fail("Failed to fetch bookmarks")?;
    debug!("{} bookmarks in category {}", bookmarks.len(), category_id);
    Ok(Json(
        bookmarks.into_iter().filter(|b| b.user_id == user_id).collect(),
    ))
}

pub async fn list_by_section(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(section_id): Path<String>,
) -> ApiResult<Json<Vec<Bookmark>>> {
    let section_id = parse_id(&section_id, "section")?;
    let bookmarks = state
        .store
        .get_bookmarks_by_section(section_id)
        .await
        .or_fail("Failed to fetch bookmarks")?;
    Ok(Json(
        bookmarks.into_iter().filter(|b| b.user_id == user_id).collect(),
    ))
}

pub async fn create(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    ValidJson(body): ValidJson<NewBookmark>,
) -> ApiResult<(StatusCode, Json<Bookmark>)> {
    let bookmark = state
        .store
        .create_bookmark(user_id, &body)
        .await
        .or_fail("Failed to create bookmark")?;
    Ok((StatusCode::CREATED, Json(bookmark)))
}

pub async fn update(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<String>,
    ValidJson(patch): ValidJson<BookmarkPatch>,
) -> ApiResult<Json<Bookmark>> {
    let id = parse_id(&id, "bookmark")?;
    owned_bookmark(&state, user_id, id).await?;

    let bookmark = state
        .store
        .update_bookmark(id, &patch)
        .await
        .or_fail("Failed to update bookmark")?;
    Ok(Json(found(bookmark, "Bookmark")?))
}

pub async fn delete(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<Json<MessageResponse>> {
    let id = parse_id(&id, "bookmark")?;
    owned_bookmark(&state, user_id, id).await?;

    let removed = state
        .store
        .delete_bookmark(id)
        .await
        .or_fail("Failed to delete bookmark")?;
    if !removed {
        return Err(ApiError::NotFound("Bookmark not found".to_string()));
    }
    Ok(Json(MessageResponse {
        message: "Bookmark deleted successfully".to_string(),
    }))
}

/// Count a visit and refresh the user's achievements
pub async fn visit(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<Json<VisitResponse>> {
    let id = parse_id(&id, "bookmark")?;
    owned_bookmark(&state, user_id, id).await?;

    let bookmark = state
        .store
        .record_visit(id)
        .await
        .or_fail("Failed to record visit")?;
    let bookmark = found(bookmark, "Bookmark")?;
    Ok(Json(VisitResponse {
        message: "Visit recorded".to_string(),
        visit_count: bookmark.visit_count,
    }))
}
