//! Section handlers

use super::owned_section;
use crate::error::{found, parse_id, ApiResult, StoreResultExt};
use crate::extractors::{CurrentUser, ValidJson};
use crate::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use linkshelf_core::ports::SectionStore;
use linkshelf_core::{NewSection, Section, SectionPatch};
use serde::Serialize;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteSectionResponse {
    message: String,
    detached_bookmarks_count: u64,
}

pub async fn list(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
) -> ApiResult<Json<Vec<Section>>> {
    let sections = state
        .store
        .get_sections(user_id)
        .await
        .or_fail("Failed to fetch sections")?;
    Ok(Json(sections))
}

pub async fn create(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    ValidJson(body): ValidJson<NewSection>,
) -> ApiResult<(StatusCode, Json<Section>)> {
    let section = state
        .store
        .create_section(user_id, &body)
        .await
        .or_fail("Failed to create section")?;
    Ok((StatusCode::CREATED, Json(section)))
}

pub async fn update(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<String>,
    ValidJson(patch): ValidJson<SectionPatch>,
) -> ApiResult<Json<Section>> {
    let id = parse_id(&id, "section")?;
    owned_section(&state, user_id, id).await?;

    let section = state
        .store
        .update_section(id, &patch)
        .await
        .or_fail("Failed to update section")?;
    Ok(Json(found(section, "Section")?))
}

/// Bookmarks in the section survive; they just lose their section
pub async fn delete(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<Json<DeleteSectionResponse>> {
    let id = parse_id(&id, "section")?;
    owned_section(&state, user_id, id).await?;

    let detached_bookmarks_count = state
        .store
        .delete_section(id)
        .await
        .or_fail("Failed to delete section")?;
    Ok(Json(DeleteSectionResponse {
        message: "Section deleted successfully".to_string(),
        detached_bookmarks_count,
    }))
}
