//! HTTP handlers

pub mod achievements;
pub mod bookmarks;
pub mod categories;
pub mod embed;
pub mod health;
pub mod proxy;
pub mod sections;
pub mod users;

pub use health::health;

use crate::error::{ApiError, ApiResult, StoreResultExt};
use crate::AppState;
use linkshelf_core::ports::{CategoryStore, SectionStore};
use linkshelf_core::{BookmarkCategory, Id, Section};

/// Fetch a category the user owns, or 404
async fn owned_category(state: &AppState, user_id: Id, id: Id) -> ApiResult<BookmarkCategory> {
    state
        .store
        .get_category(id)
        .await
        .or_fail("Failed to fetch category")?
        .filter(|category| category.user_id == user_id)
        .ok_or_else(|| ApiError::NotFound("Category not found".to_string()))
}

/// Fetch a section the user owns, or 404
async fn owned_section(state: &AppState, user_id: Id, id: Id) -> ApiResult<Section> {
    state
        .store
        .get_section(id)
        .await
        .or_fail("Failed to fetch section")?
        .filter(|section| section.user_id == user_id)
        .ok_or_else(|| ApiError::NotFound("Section not found".to_string()))
}
