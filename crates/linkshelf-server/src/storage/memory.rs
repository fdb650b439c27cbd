//! In-memory store using DashMap (stand-in for the database in development and tests)

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use linkshelf_core::achievements::{self, AchievementMetrics, ProgressUpdate};
use linkshelf_core::ports::{
    AchievementStore, BookmarkStore, CategoryStore, SectionStore, Storage, UserStore,
};
use linkshelf_core::{
    empty_settings, Achievement, Bookmark, BookmarkCategory, BookmarkPatch, CategoryPatch, Id,
    NewBookmark, NewCategory, NewSection, Result, Section, SectionPatch, ShelfError, User,
    UserAchievement,
    UserAchievementDetail, DEFAULT_CATEGORY_COLOR, DEFAULT_CATEGORY_ICON, DEFAULT_SECTION_COLOR,
    DEFAULT_SECTION_ICON,
};
use std::sync::atomic::{AtomicI64, Ordering};
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Auto-increment sequence, starting at 1 like a SQL primary key
struct Sequence(AtomicI64);

impl Sequence {
    fn new() -> Self {
        Self(AtomicI64::new(1))
    }

    fn next(&self) -> Id {
        self.0.fetch_add(1, Ordering::SeqCst)
    }
}

/// Map-backed store with the same semantics as [`super::Database`]
pub struct MemoryStore {
    users: DashMap<Id, User>,
    categories: DashMap<Id, BookmarkCategory>,
    bookmarks: DashMap<Id, Bookmark>,
    sections: DashMap<Id, Section>,
    achievements: DashMap<Id, Achievement>,
    /// Keyed by (user_id, achievement_id), which makes the pair unique
    user_achievements: DashMap<(Id, Id), UserAchievement>,
    category_ids: Sequence,
    bookmark_ids: Sequence,
    section_ids: Sequence,
    user_achievement_ids: Sequence,
    /// Serializes multi-step mutations (cascades, achievement upserts)
    write_lock: Mutex<()>,
}

impl MemoryStore {
    pub fn new() -> Self {
        let store = Self {
            users: DashMap::new(),
            categories: DashMap::new(),
            bookmarks: DashMap::new(),
            sections: DashMap::new(),
            achievements: DashMap::new(),
            user_achievements: DashMap::new(),
            category_ids: Sequence::new(),
            bookmark_ids: Sequence::new(),
            section_ids: Sequence::new(),
            user_achievement_ids: Sequence::new(),
            write_lock: Mutex::new(()),
        };

        let demo = User::demo();
        store.users.insert(demo.id, demo);
        for (index, definition) in achievements::catalog().into_iter().enumerate() {
            let achievement = definition.into_achievement(index as Id + 1);
            store.achievements.insert(achievement.id, achievement);
        }
        info!(
            "In-memory store seeded with demo user and {} achievements",
            store.achievements.len()
        );

        store
    }

    fn bookmarks_where(&self, predicate: impl Fn(&Bookmark) -> bool) -> Vec<Bookmark> {
        let mut rows: Vec<Bookmark> = self
            .bookmarks
            .iter()
            .filter(|entry| predicate(entry.value()))
            .map(|entry| entry.value().clone())
            .collect();
        rows.sort_by_key(|b| (b.position, b.id));
        rows
    }

    /// Referenced category and section must exist and belong to `user_id`.
    /// Call with `write_lock` held so a concurrent delete cannot slip in.
    fn check_references(
        &self,
        user_id: Id,
        category_id: Option<Id>,
        section_id: Option<Id>,
    ) -> Result<()> {
        if let Some(id) = category_id {
            if !self.categories.get(&id).is_some_and(|c| c.user_id == user_id) {
                return Err(ShelfError::validation(format!("Category {id} does not exist")));
            }
        }
        if let Some(id) = section_id {
            if !self.sections.get(&id).is_some_and(|s| s.user_id == user_id) {
                return Err(ShelfError::validation(format!("Section {id} does not exist")));
            }
        }
        Ok(())
    }

    /// Recompute and store achievement progress. Caller holds `write_lock`.
    fn refresh_achievements(&self, user_id: Id) {
        let owned = self.bookmarks_where(|b| b.user_id == user_id);
        let category_count = self
            .categories
            .iter()
            .filter(|entry| entry.user_id == user_id)
            .count();
        let metrics = AchievementMetrics::from_rows(&owned, category_count);
        debug!("Achievement metrics for user {}: {:?}", user_id, metrics);

        let mut definitions: Vec<Achievement> =
            self.achievements.iter().map(|a| a.value().clone()).collect();
        definitions.sort_by_key(|a| a.id);

        let now = Utc::now();
        for achievement in definitions {
            let key = (user_id, achievement.id);
            let existing = self.user_achievements.get(&key).map(|r| r.clone());
            let measured = metrics.measure(achievement.kind);

            match achievements::evaluate(&achievement, existing.as_ref(), measured, now) {
                ProgressUpdate::Insert {
                    progress,
                    unlocked_at,
                } => {
                    self.user_achievements.insert(
                        key,
                        UserAchievement {
                            id: self.user_achievement_ids.next(),
                            user_id,
                            achievement_id: achievement.id,
                            unlocked_at,
                            progress,
                        },
                    );
                }
                ProgressUpdate::Update {
                    progress,
                    unlocked_at,
                } => {
                    if let Some(mut record) = self.user_achievements.get_mut(&key) {
                        record.progress = progress;
                        record.unlocked_at = unlocked_at;
                    }
                }
                ProgressUpdate::Unchanged => {}
            }
        }
    }

    fn details_for(&self, user_id: Id) -> Vec<UserAchievementDetail> {
        let mut details: Vec<UserAchievementDetail> = self
            .user_achievements
            .iter()
            .filter(|entry| entry.key().0 == user_id)
            .filter_map(|entry| {
                let record = entry.value().clone();
                self.achievements
                    .get(&record.achievement_id)
                    .map(|achievement| UserAchievementDetail {
                        record,
                        achievement: achievement.clone(),
                    })
            })
            .collect();
        details.sort_by_key(|d| d.achievement.id);
        details
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn get_user(&self, id: Id) -> Result<Option<User>> {
        Ok(self.users.get(&id).map(|u| u.clone()))
    }
}

#[async_trait]
impl CategoryStore for MemoryStore {
    async fn get_categories(&self, user_id: Id) -> Result<Vec<BookmarkCategory>> {
        let mut rows: Vec<BookmarkCategory> = self
            .categories
            .iter()
            .filter(|entry| entry.user_id == user_id)
            .map(|entry| entry.value().clone())
            .collect();
        rows.sort_by_key(|c| (c.position, c.id));
        Ok(rows)
    }

    async fn get_category(&self, id: Id) -> Result<Option<BookmarkCategory>> {
        Ok(self.categories.get(&id).map(|c| c.clone()))
    }

    async fn create_category(
        &self,
        user_id: Id,
        category: &NewCategory,
    ) -> Result<BookmarkCategory> {
        let _guard = self.write_lock.lock().await;

        let position = match category.position {
            Some(position) => position,
            None => self
                .categories
                .iter()
                .filter(|entry| entry.user_id == user_id)
                .count() as i64,
        };
        let row = BookmarkCategory {
            id: self.category_ids.next(),
            name: category.name.trim().to_string(),
            user_id,
            color: category
                .color
                .clone()
                .unwrap_or_else(|| DEFAULT_CATEGORY_COLOR.to_string()),
            icon: category
                .icon
                .clone()
                .unwrap_or_else(|| DEFAULT_CATEGORY_ICON.to_string()),
            position,
        };
        self.categories.insert(row.id, row.clone());

        info!("Created category {} ({}) for user {}", row.id, row.name, user_id);
        Ok(row)
    }

    async fn update_category(
        &self,
        id: Id,
        patch: &CategoryPatch,
    ) -> Result<Option<BookmarkCategory>> {
        let _guard = self.write_lock.lock().await;
        Ok(self.categories.get_mut(&id).map(|mut category| {
            patch.apply(&mut category);
            category.clone()
        }))
    }

    async fn delete_category(&self, id: Id) -> Result<u64> {
        let _guard = self.write_lock.lock().await;

        let doomed: Vec<Id> = self
            .bookmarks
            .iter()
            .filter(|entry| entry.category_id == id)
            .map(|entry| *entry.key())
            .collect();
        for bookmark_id in &doomed {
            self.bookmarks.remove(bookmark_id);
        }
        self.categories.remove(&id);

        info!("Deleted category {} and {} bookmarks", id, doomed.len());
        Ok(doomed.len() as u64)
    }
}

#[async_trait]
impl BookmarkStore for MemoryStore {
    async fn get_bookmarks(&self, user_id: Id) -> Result<Vec<Bookmark>> {
        Ok(self.bookmarks_where(|b| b.user_id == user_id))
    }

    async fn get_bookmarks_by_category(&self, category_id: Id) -> Result<Vec<Bookmark>> {
        Ok(self.bookmarks_where(|b| b.category_id == category_id))
    }

    async fn get_bookmarks_by_section(&self, section_id: Id) -> Result<Vec<Bookmark>> {
        Ok(self.bookmarks_where(|b| b.section_id == Some(section_id)))
    }

    async fn get_bookmark(&self, id: Id) -> Result<Option<Bookmark>> {
        Ok(self.bookmarks.get(&id).map(|b| b.clone()))
    }

    async fn create_bookmark(&self, user_id: Id, bookmark: &NewBookmark) -> Result<Bookmark> {
        let _guard = self.write_lock.lock().await;
        self.check_references(user_id, Some(bookmark.category_id), bookmark.section_id)?;

        let position = match bookmark.position {
            Some(position) => position,
            None => self
                .bookmarks
                .iter()
                .filter(|entry| entry.user_id == user_id && entry.category_id == bookmark.category_id)
                .count() as i64,
        };
        let now = Utc::now();
        let row = Bookmark {
            id: self.bookmark_ids.next(),
            title: bookmark.title.trim().to_string(),
            url: bookmark.url.trim().to_string(),
            description: bookmark.description.clone(),
            category_id: bookmark.category_id,
            user_id,
            section_id: bookmark.section_id,
            position,
            custom_settings: bookmark
                .custom_settings
                .clone()
                .unwrap_or_else(empty_settings),
            created_at: now,
            last_visited: now,
            visit_count: 0,
        };
        self.bookmarks.insert(row.id, row.clone());

        info!("Created bookmark {} ({}) in category {}", row.id, row.url, row.category_id);
        Ok(row)
    }

    async fn update_bookmark(&self, id: Id, patch: &BookmarkPatch) -> Result<Option<Bookmark>> {
        let _guard = self.write_lock.lock().await;
        let Some(owner) = self.bookmarks.get(&id).map(|b| b.user_id) else {
            return Ok(None);
        };
        self.check_references(owner, patch.category_id, patch.section_id.flatten())?;

        Ok(self.bookmarks.get_mut(&id).map(|mut bookmark| {
            patch.apply(&mut bookmark);
            bookmark.clone()
        }))
    }

    async fn delete_bookmark(&self, id: Id) -> Result<bool> {
        Ok(self.bookmarks.remove(&id).is_some())
    }

    async fn increment_bookmark_visit(&self, id: Id) -> Result<Option<Bookmark>> {
        let updated = self.bookmarks.get_mut(&id).map(|mut bookmark| {
            bookmark.record_visit(Utc::now());
            bookmark.clone()
        });
        if let Some(bookmark) = &updated {
            debug!("Bookmark {} visit count now {}", id, bookmark.visit_count);
        }
        Ok(updated)
    }
}

#[async_trait]
impl SectionStore for MemoryStore {
    async fn get_sections(&self, user_id: Id) -> Result<Vec<Section>> {
        let mut rows: Vec<Section> = self
            .sections
            .iter()
            .filter(|entry| entry.user_id == user_id)
            .map(|entry| entry.value().clone())
            .collect();
        rows.sort_by_key(|s| (s.position, s.id));
        Ok(rows)
    }

    async fn get_section(&self, id: Id) -> Result<Option<Section>> {
        Ok(self.sections.get(&id).map(|s| s.clone()))
    }

    async fn create_section(&self, user_id: Id, section: &NewSection) -> Result<Section> {
        let _guard = self.write_lock.lock().await;

        let position = match section.position {
            Some(position) => position,
            None => self
                .sections
                .iter()
                .filter(|entry| entry.user_id == user_id)
                .count() as i64,
        };
        let row = Section {
            id: self.section_ids.next(),
            name: section.name.trim().to_string(),
            user_id,
            position,
            icon: section
                .icon
                .clone()
                .unwrap_or_else(|| DEFAULT_SECTION_ICON.to_string()),
            color: section
                .color
                .clone()
                .unwrap_or_else(|| DEFAULT_SECTION_COLOR.to_string()),
            is_default: section.is_default.unwrap_or(false),
            settings: section.settings.clone().unwrap_or_else(empty_settings),
        };
        self.sections.insert(row.id, row.clone());

        info!("Created section {} ({}) for user {}", row.id, row.name, user_id);
        Ok(row)
    }

    async fn update_section(&self, id: Id, patch: &SectionPatch) -> Result<Option<Section>> {
        let _guard = self.write_lock.lock().await;
        Ok(self.sections.get_mut(&id).map(|mut section| {
            patch.apply(&mut section);
            section.clone()
        }))
    }

    async fn delete_section(&self, id: Id) -> Result<u64> {
        let _guard = self.write_lock.lock().await;

        let mut detached = 0;
        for mut entry in self.bookmarks.iter_mut() {
            if entry.section_id == Some(id) {
                entry.section_id = None;
                detached += 1;
            }
        }
        self.sections.remove(&id);

        info!("Deleted section {}, detached {} bookmarks", id, detached);
        Ok(detached)
    }
}

#[async_trait]
impl AchievementStore for MemoryStore {
    async fn get_achievements(&self) -> Result<Vec<Achievement>> {
        let mut rows: Vec<Achievement> =
            self.achievements.iter().map(|a| a.value().clone()).collect();
        rows.sort_by_key(|a| a.id);
        Ok(rows)
    }

    async fn get_user_achievements(&self, user_id: Id) -> Result<Vec<UserAchievementDetail>> {
        Ok(self.details_for(user_id))
    }

    async fn check_user_achievements(&self, user_id: Id) -> Result<Vec<UserAchievementDetail>> {
        let _guard = self.write_lock.lock().await;
        self.refresh_achievements(user_id);
        Ok(self.details_for(user_id))
    }
}

#[async_trait]
impl Storage for MemoryStore {
    async fn record_visit(&self, id: Id) -> Result<Option<Bookmark>> {
        let _guard = self.write_lock.lock().await;
        let Some(bookmark) = self.bookmarks.get_mut(&id).map(|mut bookmark| {
            bookmark.record_visit(Utc::now());
            bookmark.clone()
        }) else {
            return Ok(None);
        };
        self.refresh_achievements(bookmark.user_id);
        Ok(Some(bookmark))
    }
}
