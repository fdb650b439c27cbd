//! Storage traits for persistence
//!
//! Lookups that find nothing return `None` or an empty list, never an error.
//! Translating absence into a 404 is the caller's job.

use crate::Result;
use async_trait::async_trait;
use linkshelf_types::{
    Achievement, Bookmark, BookmarkCategory, BookmarkPatch, CategoryPatch, Id, NewBookmark,
    NewCategory, NewSection, Section, SectionPatch, User, UserAchievementDetail,
};

/// User store
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn get_user(&self, id: Id) -> Result<Option<User>>;
}

/// Category store
#[async_trait]
pub trait CategoryStore: Send + Sync {
    async fn get_categories(&self, user_id: Id) -> Result<Vec<BookmarkCategory>>;
    async fn get_category(&self, id: Id) -> Result<Option<BookmarkCategory>>;
    async fn create_category(&self, user_id: Id, category: &NewCategory)
        -> Result<BookmarkCategory>;
    async fn update_category(
        &self,
        id: Id,
        patch: &CategoryPatch,
    ) -> Result<Option<BookmarkCategory>>;
    /// Delete the category and every bookmark filed under it, returning how
    /// many bookmarks went with it.
    async fn delete_category(&self, id: Id) -> Result<u64>;
}

/// Bookmark store
#[async_trait]
pub trait BookmarkStore: Send + Sync {
    async fn get_bookmarks(&self, user_id: Id) -> Result<Vec<Bookmark>>;
    async fn get_bookmarks_by_category(&self, category_id: Id) -> Result<Vec<Bookmark>>;
    async fn get_bookmarks_by_section(&self, section_id: Id) -> Result<Vec<Bookmark>>;
    async fn get_bookmark(&self, id: Id) -> Result<Option<Bookmark>>;
    /// Fails with [`ShelfError::Validation`](crate::ShelfError::Validation)
    /// when `category_id` or `section_id` does not name one of the user's rows.
    /// The check and the insert are atomic with respect to deletes.
    async fn create_bookmark(&self, user_id: Id, bookmark: &NewBookmark) -> Result<Bookmark>;
    /// Same reference checks as `create_bookmark`, against the bookmark's owner
    async fn update_bookmark(&self, id: Id, patch: &BookmarkPatch) -> Result<Option<Bookmark>>;
    /// Returns whether a row was removed
    async fn delete_bookmark(&self, id: Id) -> Result<bool>;
    /// Bump `visit_count` by one and move `last_visited` forward
    async fn increment_bookmark_visit(&self, id: Id) -> Result<Option<Bookmark>>;
}

/// Section store
#[async_trait]
pub trait SectionStore: Send + Sync {
    async fn get_sections(&self, user_id: Id) -> Result<Vec<Section>>;
    async fn get_section(&self, id: Id) -> Result<Option<Section>>;
    async fn create_section(&self, user_id: Id, section: &NewSection) -> Result<Section>;
    async fn update_section(&self, id: Id, patch: &SectionPatch) -> Result<Option<Section>>;
    /// Delete the section, clearing `section_id` on its bookmarks instead of
    /// deleting them. Returns how many bookmarks were detached.
    async fn delete_section(&self, id: Id) -> Result<u64>;
}

/// Achievement store
#[async_trait]
pub trait AchievementStore: Send + Sync {
    async fn get_achievements(&self) -> Result<Vec<Achievement>>;
    async fn get_user_achievements(&self, user_id: Id) -> Result<Vec<UserAchievementDetail>>;
    /// Recompute progress for every achievement from the user's current
    /// counts and persist it. See [`crate::achievements::evaluate`].
    async fn check_user_achievements(&self, user_id: Id) -> Result<Vec<UserAchievementDetail>>;
}

/// Everything the HTTP layer needs from a backend
#[async_trait]
pub trait Storage:
    UserStore + CategoryStore + BookmarkStore + SectionStore + AchievementStore
{
    /// Count a visit and refresh the owner's achievements as one unit.
    ///
    /// Either both take effect or neither does, so a failed call can be
    /// retried without counting the visit twice.
    async fn record_visit(&self, id: Id) -> Result<Option<Bookmark>>;
}
