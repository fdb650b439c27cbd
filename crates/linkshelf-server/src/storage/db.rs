//! SQLite database layer (embedded, no external dependencies)

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use linkshelf_core::achievements::{self, AchievementMetrics, ProgressUpdate};
use linkshelf_core::ports::{
    AchievementStore, BookmarkStore, CategoryStore, SectionStore, Storage, UserStore,
};
use linkshelf_core::{
    empty_settings, Achievement, AchievementType, Bookmark, BookmarkCategory, BookmarkPatch,
    CategoryPatch, Id, NewBookmark, NewCategory, NewSection, Result, Section, SectionPatch,
    ShelfError, User, UserAchievement, UserAchievementDetail, DEFAULT_CATEGORY_COLOR,
    DEFAULT_CATEGORY_ICON, DEFAULT_SECTION_COLOR, DEFAULT_SECTION_ICON,
};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{SqliteConnection, SqlitePool};
use std::collections::HashMap;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// How long a connection waits on another process's write lock
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Map sqlx failures into the domain error
trait DbResultExt<T> {
    fn db(self) -> Result<T>;
}

impl<T> DbResultExt<T> for std::result::Result<T, sqlx::Error> {
    fn db(self) -> Result<T> {
        self.map_err(|e| ShelfError::Database(e.to_string()))
    }
}

pub struct Database {
    pool: SqlitePool,
    /// Held for the whole of every write transaction. SQLite allows one
    /// writer at a time, and a deferred transaction that reads before it
    /// writes fails with SQLITE_BUSY_SNAPSHOT if another writer commits in
    /// between. Queueing writers here keeps that from happening.
    write_lock: Mutex<()>,
}

impl Database {
    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        info!("Opening SQLite database at: {}", database_url);

        let in_memory = is_in_memory(database_url);
        if let Some(parent) = database_file(database_url).and_then(|p| p.parent().map(PathBuf::from))
        {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(&parent).await.with_context(|| {
                    format!("Failed to create database directory: {}", parent.display())
                })?;
            }
        }

        let mut options = SqliteConnectOptions::from_str(database_url)
            .with_context(|| format!("Invalid SQLite URL: {}", database_url))?
            .create_if_missing(true)
            .busy_timeout(BUSY_TIMEOUT);
        if !in_memory {
            options = options
                .journal_mode(SqliteJournalMode::Wal)
                .synchronous(SqliteSynchronous::Normal);
        }

        // Every connection to `:memory:` is its own database, so keep exactly one alive
        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(5)
        };

        let pool = pool_options
            .connect_with(options)
            .await
            .with_context(|| format!("Failed to connect to SQLite database at: {}", database_url))?;

        info!("SQLite connection established, running migrations...");

        Self::run_migrations(&pool)
            .await
            .context("Failed to run database migrations")?;
        Self::seed(&pool)
            .await
            .context("Failed to seed demo user and achievements")?;

        info!("Database initialization complete");

        Ok(Self {
            pool,
            write_lock: Mutex::new(()),
        })
    }

    async fn run_migrations(pool: &SqlitePool) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                username TEXT NOT NULL UNIQUE,
                password TEXT NOT NULL,
                email TEXT,
                theme TEXT NOT NULL DEFAULT 'light',
                created_at TEXT NOT NULL,
                last_login TEXT,
                settings TEXT NOT NULL DEFAULT '{}'
            )
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS bookmark_categories (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                user_id INTEGER NOT NULL,
                color TEXT NOT NULL,
                icon TEXT NOT NULL,
                position INTEGER NOT NULL DEFAULT 0
            )
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS bookmarks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title TEXT NOT NULL,
                url TEXT NOT NULL,
                description TEXT,
                category_id INTEGER NOT NULL,
                user_id INTEGER NOT NULL,
                section_id INTEGER,
                position INTEGER NOT NULL DEFAULT 0,
                custom_settings TEXT NOT NULL DEFAULT '{}',
                created_at TEXT NOT NULL,
                last_visited TEXT NOT NULL,
                visit_count INTEGER NOT NULL DEFAULT 0
            )
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS bookmarks_user_idx ON bookmarks (user_id)")
            .execute(pool)
            .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS bookmarks_category_idx ON bookmarks (category_id)")
            .execute(pool)
            .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS bookmarks_section_idx ON bookmarks (section_id)")
            .execute(pool)
            .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS sections (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                user_id INTEGER NOT NULL,
                position INTEGER NOT NULL DEFAULT 0,
                icon TEXT NOT NULL,
                color TEXT NOT NULL,
                is_default INTEGER NOT NULL DEFAULT 0,
                settings TEXT NOT NULL DEFAULT '{}'
            )
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS achievements (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE,
                description TEXT NOT NULL,
                icon TEXT NOT NULL,
                type TEXT NOT NULL,
                threshold INTEGER NOT NULL,
                reward TEXT,
                color TEXT NOT NULL
            )
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS user_achievements (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                achievement_id INTEGER NOT NULL,
                unlocked_at TEXT,
                progress INTEGER NOT NULL DEFAULT 0
            )
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE UNIQUE INDEX IF NOT EXISTS user_achievements_user_achievement_idx
            ON user_achievements (user_id, achievement_id)
            "#,
        )
        .execute(pool)
        .await?;

        Ok(())
    }

    async fn seed(pool: &SqlitePool) -> anyhow::Result<()> {
        let demo = User::demo();
        sqlx::query(
            r#"
            INSERT OR IGNORE INTO users (id, username, password, theme, created_at, settings)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(demo.id)
        .bind(&demo.username)
        .bind(&demo.password)
        .bind(&demo.theme)
        .bind(demo.created_at)
        .bind(demo.settings.to_string())
        .execute(pool)
        .await?;

        for definition in achievements::catalog() {
            sqlx::query(
                r#"
                INSERT OR IGNORE INTO achievements (name, description, icon, type, threshold, reward, color)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
            )
            .bind(definition.name)
            .bind(definition.description)
            .bind(definition.icon)
            .bind(definition.kind.as_str())
            .bind(definition.threshold)
            .bind(definition.reward)
            .bind(definition.color)
            .execute(pool)
            .await?;
        }

        Ok(())
    }
}

fn is_in_memory(database_url: &str) -> bool {
    database_url.contains(":memory:") || database_url.contains("mode=memory")
}

/// Filesystem path behind a `sqlite:` URL, if it names one
fn database_file(database_url: &str) -> Option<PathBuf> {
    if is_in_memory(database_url) {
        return None;
    }
    let path = database_url
        .strip_prefix("sqlite://")
        .or_else(|| database_url.strip_prefix("sqlite:"))?;
    let path = path.split('?').next().unwrap_or(path);
    (!path.is_empty()).then(|| PathBuf::from(path))
}

#[async_trait]
impl UserStore for Database {
    async fn get_user(&self, id: Id) -> Result<Option<User>> {
        let row: Option<UserRow> = sqlx::query_as(
            r#"
            SELECT id, username, password, email, theme, created_at, last_login, settings
            FROM users WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .db()?;

        Ok(row.map(Into::into))
    }
}

#[async_trait]
impl CategoryStore for Database {
    async fn get_categories(&self, user_id: Id) -> Result<Vec<BookmarkCategory>> {
        let rows: Vec<CategoryRow> = sqlx::query_as(
            r#"
            SELECT id, name, user_id, color, icon, position
            FROM bookmark_categories WHERE user_id = ?1
            ORDER BY position, id
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .db()?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn get_category(&self, id: Id) -> Result<Option<BookmarkCategory>> {
        let row: Option<CategoryRow> = sqlx::query_as(
            r#"
            SELECT id, name, user_id, color, icon, position
            FROM bookmark_categories WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .db()?;

        Ok(row.map(Into::into))
    }

    async fn create_category(
        &self,
        user_id: Id,
        category: &NewCategory,
    ) -> Result<BookmarkCategory> {
        let _guard = self.write_lock.lock().await;
        let mut tx = self.pool.begin().await.db()?;

        let position = match category.position {
            Some(position) => position,
            None => sqlx::query_scalar::<_, i64>(
                "SELECT COUNT(*) FROM bookmark_categories WHERE user_id = ?1",
            )
            .bind(user_id)
            .fetch_one(&mut *tx)
            .await
            .db()?,
        };

        let row: CategoryRow = sqlx::query_as(
            r#"
            INSERT INTO bookmark_categories (name, user_id, color, icon, position)
            VALUES (?1, ?2, ?3, ?4, ?5)
            RETURNING id, name, user_id, color, icon, position
            "#,
        )
        .bind(category.name.trim())
        .bind(user_id)
        .bind(category.color.as_deref().unwrap_or(DEFAULT_CATEGORY_COLOR))
        .bind(category.icon.as_deref().unwrap_or(DEFAULT_CATEGORY_ICON))
        .bind(position)
        .fetch_one(&mut *tx)
        .await
        .db()?;

        tx.commit().await.db()?;

        info!("Created category {} ({}) for user {}", row.id, row.name, user_id);
        Ok(row.into())
    }

    async fn update_category(
        &self,
        id: Id,
        patch: &CategoryPatch,
    ) -> Result<Option<BookmarkCategory>> {
        let _guard = self.write_lock.lock().await;
        let mut tx = self.pool.begin().await.db()?;

        let existing: Option<CategoryRow> = sqlx::query_as(
            r#"
            SELECT id, name, user_id, color, icon, position
            FROM bookmark_categories WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await
        .db()?;
        let Some(existing) = existing else {
            return Ok(None);
        };

        let mut category: BookmarkCategory = existing.into();
        patch.apply(&mut category);

        sqlx::query(
            r#"
            UPDATE bookmark_categories SET name = ?1, color = ?2, icon = ?3, position = ?4
            WHERE id = ?5
            "#,
        )
        .bind(&category.name)
        .bind(&category.color)
        .bind(&category.icon)
        .bind(category.position)
        .bind(id)
        .execute(&mut *tx)
        .await
        .db()?;

        tx.commit().await.db()?;
        Ok(Some(category))
    }

    async fn delete_category(&self, id: Id) -> Result<u64> {
        let _guard = self.write_lock.lock().await;
        let mut tx = self.pool.begin().await.db()?;

        let removed = sqlx::query("DELETE FROM bookmarks WHERE category_id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .db()?
            .rows_affected();

        sqlx::query("DELETE FROM bookmark_categories WHERE id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .db()?;

        tx.commit().await.db()?;

        info!("Deleted category {} and {} bookmarks", id, removed);
        Ok(removed)
    }
}

#[async_trait]
impl BookmarkStore for Database {
    async fn get_bookmarks(&self, user_id: Id) -> Result<Vec<Bookmark>> {
        let rows: Vec<BookmarkRow> = sqlx::query_as(
            r#"
            SELECT id, title, url, description, category_id, user_id, section_id,
                   position, custom_settings, created_at, last_visited, visit_count
            FROM bookmarks WHERE user_id = ?1
            ORDER BY position, id
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .db()?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn get_bookmarks_by_category(&self, category_id: Id) -> Result<Vec<Bookmark>> {
        let rows: Vec<BookmarkRow> = sqlx::query_as(
            r#"
            SELECT id, title, url, description, category_id, user_id, section_id,
                   position, custom_settings, created_at, last_visited, visit_count
            FROM bookmarks WHERE category_id = ?1
            ORDER BY position, id
            "#,
        )
        .bind(category_id)
        .fetch_all(&self.pool)
        .await
        .db()?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn get_bookmarks_by_section(&self, section_id: Id) -> Result<Vec<Bookmark>> {
        let rows: Vec<BookmarkRow> = sqlx::query_as(
            r#"
            SELECT id, title, url, description, category_id, user_id, section_id,
                   position, custom_settings, created_at, last_visited, visit_count
            FROM bookmarks WHERE section_id = ?1
            ORDER BY position, id
            "#,
        )
        .bind(section_id)
        .fetch_all(&self.pool)
        .await
        .db()?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn get_bookmark(&self, id: Id) -> Result<Option<Bookmark>> {
        let row: Option<BookmarkRow> = sqlx::query_as(
            r#"
            SELECT id, title, url, description, category_id, user_id, section_id,
                   position, custom_settings, created_at, last_visited, visit_count
            FROM bookmarks WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .db()?;

        Ok(row.map(Into::into))
    }

    async fn create_bookmark(&self, user_id: Id, bookmark: &NewBookmark) -> Result<Bookmark> {
        let _guard = self.write_lock.lock().await;
        let mut tx = self.pool.begin().await.db()?;
        check_references(&mut tx, user_id, Some(bookmark.category_id), bookmark.section_id).await?;

        let position = match bookmark.position {
            Some(position) => position,
            None => sqlx::query_scalar::<_, i64>(
                "SELECT COUNT(*) FROM bookmarks WHERE user_id = ?1 AND category_id = ?2",
            )
            .bind(user_id)
            .bind(bookmark.category_id)
            .fetch_one(&mut *tx)
            .await
            .db()?,
        };
        let settings = bookmark
            .custom_settings
            .clone()
            .unwrap_or_else(empty_settings);
        let now = Utc::now();

        let row: BookmarkRow = sqlx::query_as(
            r#"
            INSERT INTO bookmarks (title, url, description, category_id, user_id, section_id,
                                   position, custom_settings, created_at, last_visited, visit_count)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9, 0)
            RETURNING id, title, url, description, category_id, user_id, section_id,
                      position, custom_settings, created_at, last_visited, visit_count
            "#,
        )
        .bind(bookmark.title.trim())
        .bind(bookmark.url.trim())
        .bind(&bookmark.description)
        .bind(bookmark.category_id)
        .bind(user_id)
        .bind(bookmark.section_id)
        .bind(position)
        .bind(serde_json::to_string(&settings)?)
        .bind(now)
        .fetch_one(&mut *tx)
        .await
        .db()?;

        tx.commit().await.db()?;

        info!("Created bookmark {} ({}) in category {}", row.id, row.url, row.category_id);
        Ok(row.into())
    }

    async fn update_bookmark(&self, id: Id, patch: &BookmarkPatch) -> Result<Option<Bookmark>> {
        let _guard = self.write_lock.lock().await;
        let mut tx = self.pool.begin().await.db()?;

        let existing: Option<BookmarkRow> = sqlx::query_as(
            r#"
            SELECT id, title, url, description, category_id, user_id, section_id,
                   position, custom_settings, created_at, last_visited, visit_count
            FROM bookmarks WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await
        .db()?;
        let Some(existing) = existing else {
            return Ok(None);
        };

        check_references(&mut tx, existing.user_id, patch.category_id, patch.section_id.flatten())
            .await?;

        let mut bookmark: Bookmark = existing.into();
        patch.apply(&mut bookmark);

        sqlx::query(
            r#"
            UPDATE bookmarks
            SET title = ?1, url = ?2, description = ?3, category_id = ?4,
                section_id = ?5, position = ?6, custom_settings = ?7
            WHERE id = ?8
            "#,
        )
        .bind(&bookmark.title)
        .bind(&bookmark.url)
        .bind(&bookmark.description)
        .bind(bookmark.category_id)
        .bind(bookmark.section_id)
        .bind(bookmark.position)
        .bind(serde_json::to_string(&bookmark.custom_settings)?)
        .bind(id)
        .execute(&mut *tx)
        .await
        .db()?;

        tx.commit().await.db()?;
        Ok(Some(bookmark))
    }

    async fn delete_bookmark(&self, id: Id) -> Result<bool> {
        let _guard = self.write_lock.lock().await;
        let result = sqlx::query("DELETE FROM bookmarks WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await
            .db()?;

        Ok(result.rows_affected() > 0)
    }

    async fn increment_bookmark_visit(&self, id: Id) -> Result<Option<Bookmark>> {
        let _guard = self.write_lock.lock().await;
        let mut conn = self.pool.acquire().await.db()?;
        let row = increment_visit(&mut conn, id).await?;
        Ok(row.map(Into::into))
    }
}

#[async_trait]
impl SectionStore for Database {
    async fn get_sections(&self, user_id: Id) -> Result<Vec<Section>> {
        let rows: Vec<SectionRow> = sqlx::query_as(
            r#"
            SELECT id, name, user_id, position, icon, color, is_default, settings
            FROM sections WHERE user_id = ?1
            ORDER BY position, id
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .db()?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn get_section(&self, id: Id) -> Result<Option<Section>> {
        let row: Option<SectionRow> = sqlx::query_as(
            r#"
            SELECT id, name, user_id, position, icon, color, is_default, settings
            FROM sections WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .db()?;

        Ok(row.map(Into::into))
    }

    async fn create_section(&self, user_id: Id, section: &NewSection) -> Result<Section> {
        let _guard = self.write_lock.lock().await;
        let mut tx = self.pool.begin().await.db()?;

        let position = match section.position {
            Some(position) => position,
            None => sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM sections WHERE user_id = ?1")
                .bind(user_id)
                .fetch_one(&mut *tx)
                .await
                .db()?,
        };
        let settings = section.settings.clone().unwrap_or_else(empty_settings);

        let row: SectionRow = sqlx::query_as(
            r#"
            INSERT INTO sections (name, user_id, position, icon, color, is_default, settings)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            RETURNING id, name, user_id, position, icon, color, is_default, settings
            "#,
        )
        .bind(section.name.trim())
        .bind(user_id)
        .bind(position)
        .bind(section.icon.as_deref().unwrap_or(DEFAULT_SECTION_ICON))
        .bind(section.color.as_deref().unwrap_or(DEFAULT_SECTION_COLOR))
        .bind(section.is_default.unwrap_or(false))
        .bind(serde_json::to_string(&settings)?)
        .fetch_one(&mut *tx)
        .await
        .db()?;

        tx.commit().await.db()?;

        info!("Created section {} ({}) for user {}", row.id, row.name, user_id);
        Ok(row.into())
    }

    async fn update_section(&self, id: Id, patch: &SectionPatch) -> Result<Option<Section>> {
        let _guard = self.write_lock.lock().await;
        let mut tx = self.pool.begin().await.db()?;

        let existing: Option<SectionRow> = sqlx::query_as(
            r#"
            SELECT id, name, user_id, position, icon, color, is_default, settings
            FROM sections WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await
        .db()?;
        let Some(existing) = existing else {
            return Ok(None);
        };

        let mut section: Section = existing.into();
        patch.apply(&mut section);

        sqlx::query(
            r#"
            UPDATE sections
            SET name = ?1, position = ?2, icon = ?3, color = ?4, is_default = ?5, settings = ?6
            WHERE id = ?7
            "#,
        )
        .bind(&section.name)
        .bind(section.position)
        .bind(&section.icon)
        .bind(&section.color)
        .bind(section.is_default)
        .bind(serde_json::to_string(&section.settings)?)
        .bind(id)
        .execute(&mut *tx)
        .await
        .db()?;

        tx.commit().await.db()?;
        Ok(Some(section))
    }

    async fn delete_section(&self, id: Id) -> Result<u64> {
        let _guard = self.write_lock.lock().await;
        let mut tx = self.pool.begin().await.db()?;

        let detached = sqlx::query("UPDATE bookmarks SET section_id = NULL WHERE section_id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .db()?
            .rows_affected();

        sqlx::query("DELETE FROM sections WHERE id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .db()?;

        tx.commit().await.db()?;

        info!("Deleted section {}, detached {} bookmarks", id, detached);
        Ok(detached)
    }
}

#[async_trait]
impl AchievementStore for Database {
    async fn get_achievements(&self) -> Result<Vec<Achievement>> {
        let rows: Vec<AchievementRow> = sqlx::query_as(
            r#"
            SELECT id, name, description, icon, type AS kind, threshold, reward, color
            FROM achievements ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .db()?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn get_user_achievements(&self, user_id: Id) -> Result<Vec<UserAchievementDetail>> {
        let rows: Vec<UserAchievementDetailRow> = sqlx::query_as(
            r#"
            SELECT ua.id, ua.user_id, ua.achievement_id, ua.unlocked_at, ua.progress,
                   a.name, a.description, a.icon, a.type AS kind, a.threshold, a.reward, a.color
            FROM user_achievements ua
            JOIN achievements a ON a.id = ua.achievement_id
            WHERE ua.user_id = ?1
            ORDER BY a.id
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .db()?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn check_user_achievements(&self, user_id: Id) -> Result<Vec<UserAchievementDetail>> {
        let _guard = self.write_lock.lock().await;
        let mut tx = self.pool.begin().await.db()?;
        refresh_achievements(&mut tx, user_id).await?;
        tx.commit().await.db()?;

        self.get_user_achievements(user_id).await
    }
}

#[async_trait]
impl Storage for Database {
    async fn record_visit(&self, id: Id) -> Result<Option<Bookmark>> {
        let _guard = self.write_lock.lock().await;
        let mut tx = self.pool.begin().await.db()?;

        let Some(row) = increment_visit(&mut tx, id).await? else {
            return Ok(None);
        };
        refresh_achievements(&mut tx, row.user_id).await?;

        tx.commit().await.db()?;
        Ok(Some(row.into()))
    }
}

/// Bump the visit counter in one statement.
///
/// Timestamps are stored as fixed-offset RFC 3339 text, which sorts
/// chronologically, so MAX keeps last_visited from moving backwards.
async fn increment_visit(conn: &mut SqliteConnection, id: Id) -> Result<Option<BookmarkRow>> {
    let row: Option<BookmarkRow> = sqlx::query_as(
        r#"
        UPDATE bookmarks
        SET visit_count = visit_count + 1, last_visited = MAX(last_visited, ?1)
        WHERE id = ?2
        RETURNING id, title, url, description, category_id, user_id, section_id,
                  position, custom_settings, created_at, last_visited, visit_count
        "#,
    )
    .bind(Utc::now())
    .bind(id)
    .fetch_optional(&mut *conn)
    .await
    .db()?;

    if let Some(row) = &row {
        debug!("Bookmark {} visit count now {}", id, row.visit_count);
    }
    Ok(row)
}

/// Category and section named by a bookmark must be rows `user_id` owns
async fn check_references(
    conn: &mut SqliteConnection,
    user_id: Id,
    category_id: Option<Id>,
    section_id: Option<Id>,
) -> Result<()> {
    if let Some(id) = category_id {
        let found: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM bookmark_categories WHERE id = ?1 AND user_id = ?2",
        )
        .bind(id)
        .bind(user_id)
        .fetch_one(&mut *conn)
        .await
        .db()?;
        if found == 0 {
            return Err(ShelfError::validation(format!("Category {id} does not exist")));
        }
    }
    if let Some(id) = section_id {
        let found: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM sections WHERE id = ?1 AND user_id = ?2")
                .bind(id)
                .bind(user_id)
                .fetch_one(&mut *conn)
                .await
                .db()?;
        if found == 0 {
            return Err(ShelfError::validation(format!("Section {id} does not exist")));
        }
    }
    Ok(())
}

/// Recompute and upsert every achievement's progress for `user_id`
async fn refresh_achievements(conn: &mut SqliteConnection, user_id: Id) -> Result<()> {
    let bookmark_count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM bookmarks WHERE user_id = ?1")
            .bind(user_id)
            .fetch_one(&mut *conn)
            .await
            .db()?;
    let category_count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM bookmark_categories WHERE user_id = ?1")
            .bind(user_id)
            .fetch_one(&mut *conn)
            .await
            .db()?;
    let visit_count: i64 = sqlx::query_scalar(
        "SELECT COALESCE(SUM(visit_count), 0) FROM bookmarks WHERE user_id = ?1",
    )
    .bind(user_id)
    .fetch_one(&mut *conn)
    .await
    .db()?;
    let metrics = AchievementMetrics {
        bookmark_count,
        category_count,
        visit_count,
    };
    debug!("Achievement metrics for user {}: {:?}", user_id, metrics);

    let definitions: Vec<AchievementRow> = sqlx::query_as(
        r#"
        SELECT id, name, description, icon, type AS kind, threshold, reward, color
        FROM achievements ORDER BY id
        "#,
    )
    .fetch_all(&mut *conn)
    .await
    .db()?;

    let existing: HashMap<Id, UserAchievement> = sqlx::query_as::<_, UserAchievementRow>(
        r#"
        SELECT id, user_id, achievement_id, unlocked_at, progress
        FROM user_achievements WHERE user_id = ?1
        "#,
    )
    .bind(user_id)
    .fetch_all(&mut *conn)
    .await
    .db()?
    .into_iter()
    .map(|row| (row.achievement_id, row.into()))
    .collect();

    let now = Utc::now();
    for definition in definitions {
        let achievement: Achievement = definition.try_into()?;
        let measured = metrics.measure(achievement.kind);

        match achievements::evaluate(&achievement, existing.get(&achievement.id), measured, now)
        {
            ProgressUpdate::Insert {
                progress,
                unlocked_at,
            } => {
                sqlx::query(
                    r#"
                    INSERT INTO user_achievements (user_id, achievement_id, unlocked_at, progress)
                    VALUES (?1, ?2, ?3, ?4)
                    "#,
                )
                .bind(user_id)
                .bind(achievement.id)
                .bind(unlocked_at)
                .bind(progress)
                .execute(&mut *conn)
                .await
                .db()?;
            }
            ProgressUpdate::Update {
                progress,
                unlocked_at,
            } => {
                sqlx::query(
                    r#"
                    UPDATE user_achievements SET progress = ?1, unlocked_at = ?2
                    WHERE user_id = ?3 AND achievement_id = ?4
                    "#,
                )
                .bind(progress)
                .bind(unlocked_at)
                .bind(user_id)
                .bind(achievement.id)
                .execute(&mut *conn)
                .await
                .db()?;
            }
            ProgressUpdate::Unchanged => {}
        }
    }

    Ok(())
}

// Helper structs for sqlx query_as
#[derive(sqlx::FromRow)]
struct UserRow {
    id: i64,
    username: String,
    password: String,
    email: Option<String>,
    theme: String,
    created_at: DateTime<Utc>,
    last_login: Option<DateTime<Utc>>,
    settings: String,
}

impl From<UserRow> for User {
    fn from(r: UserRow) -> Self {
        User {
            id: r.id,
            username: r.username,
            password: r.password,
            email: r.email,
            theme: r.theme,
            created_at: r.created_at,
            last_login: r.last_login,
            settings: parse_settings(&r.settings, "users", r.id),
        }
    }
}

#[derive(sqlx::FromRow)]
struct CategoryRow {
    id: i64,
    name: String,
    user_id: i64,
    color: String,
    icon: String,
    position: i64,
}

impl From<CategoryRow> for BookmarkCategory {
    fn from(r: CategoryRow) -> Self {
        BookmarkCategory {
            id: r.id,
            name: r.name,
            user_id: r.user_id,
            color: r.color,
            icon: r.icon,
            position: r.position,
        }
    }
}

#[derive(sqlx::FromRow)]
struct BookmarkRow {
    id: i64,
    title: String,
    url: String,
    description: Option<String>,
    category_id: i64,
    user_id: i64,
    section_id: Option<i64>,
    position: i64,
    custom_settings: String,
    created_at: DateTime<Utc>,
    last_visited: DateTime<Utc>,
    visit_count: i64,
}

impl From<BookmarkRow> for Bookmark {
    fn from(r: BookmarkRow) -> Self {
        Bookmark {
            id: r.id,
            title: r.title,
            url: r.url,
            description: r.description,
            category_id: r.category_id,
            user_id: r.user_id,
            section_id: r.section_id,
            position: r.position,
            custom_settings: parse_settings(&r.custom_settings, "bookmarks", r.id),
            created_at: r.created_at,
            last_visited: r.last_visited,
            visit_count: r.visit_count,
        }
    }
}

#[derive(sqlx::FromRow)]
struct SectionRow {
    id: i64,
    name: String,
    user_id: i64,
    position: i64,
    icon: String,
    color: String,
    is_default: bool,
    settings: String,
}

impl From<SectionRow> for Section {
    fn from(r: SectionRow) -> Self {
        Section {
            id: r.id,
            name: r.name,
            user_id: r.user_id,
            position: r.position,
            icon: r.icon,
            color: r.color,
            is_default: r.is_default,
            settings: parse_settings(&r.settings, "sections", r.id),
        }
    }
}

#[derive(sqlx::FromRow)]
struct AchievementRow {
    id: i64,
    name: String,
    description: String,
    icon: String,
    kind: String,
    threshold: i64,
    reward: Option<String>,
    color: String,
}

impl TryFrom<AchievementRow> for Achievement {
    type Error = ShelfError;

    fn try_from(r: AchievementRow) -> Result<Self> {
        Ok(Achievement {
            id: r.id,
            name: r.name,
            description: r.description,
            icon: r.icon,
            kind: parse_kind(&r.kind)?,
            threshold: r.threshold,
            reward: r.reward,
            color: r.color,
        })
    }
}

#[derive(sqlx::FromRow)]
struct UserAchievementRow {
    id: i64,
    user_id: i64,
    achievement_id: i64,
    unlocked_at: Option<DateTime<Utc>>,
    progress: i64,
}

impl From<UserAchievementRow> for UserAchievement {
    fn from(r: UserAchievementRow) -> Self {
        UserAchievement {
            id: r.id,
            user_id: r.user_id,
            achievement_id: r.achievement_id,
            unlocked_at: r.unlocked_at,
            progress: r.progress,
        }
    }
}

#[derive(sqlx::FromRow)]
struct UserAchievementDetailRow {
    id: i64,
    user_id: i64,
    achievement_id: i64,
    unlocked_at: Option<DateTime<Utc>>,
    progress: i64,
    name: String,
    description: String,
    icon: String,
    kind: String,
    threshold: i64,
    reward: Option<String>,
    color: String,
}

impl TryFrom<UserAchievementDetailRow> for UserAchievementDetail {
    type Error = ShelfError;

    fn try_from(r: UserAchievementDetailRow) -> Result<Self> {
        Ok(UserAchievementDetail {
            record: UserAchievement {
                id: r.id,
                user_id: r.user_id,
                achievement_id: r.achievement_id,
                unlocked_at: r.unlocked_at,
                progress: r.progress,
            },
            achievement: Achievement {
                id: r.achievement_id,
                name: r.name,
                description: r.description,
                icon: r.icon,
                kind: parse_kind(&r.kind)?,
                threshold: r.threshold,
                reward: r.reward,
                color: r.color,
            },
        })
    }
}

fn parse_kind(s: &str) -> Result<AchievementType> {
    s.parse().map_err(ShelfError::Database)
}

/// JSON column text, or `{}` with a warning if the stored text is corrupt
fn parse_settings(raw: &str, table: &str, id: Id) -> serde_json::Value {
    serde_json::from_str(raw).unwrap_or_else(|e| {
        warn!("Corrupt JSON settings in {} row {}, using {{}}: {}", table, id, e);
        empty_settings()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio_test::assert_ok;

    async fn open() -> Database {
        Database::connect("sqlite::memory:").await.unwrap()
    }

    async fn open_file(dir: &tempfile::TempDir) -> Arc<Database> {
        let path = dir.path().join("linkshelf.db");
        let url = format!("sqlite://{}", path.display());
        Arc::new(Database::connect(&url).await.unwrap())
    }

    #[test]
    fn test_database_file() {
        assert_eq!(
            database_file("sqlite://data/linkshelf.db?mode=rwc"),
            Some(PathBuf::from("data/linkshelf.db"))
        );
        assert_eq!(
            database_file("sqlite:linkshelf.db"),
            Some(PathBuf::from("linkshelf.db"))
        );
        assert_eq!(database_file("sqlite::memory:"), None);
    }

    #[tokio::test]
    async fn test_seeds_demo_user_and_catalog() {
        let db = open().await;
        let user = db.get_user(User::DEMO_ID).await.unwrap().unwrap();
        assert_eq!(user.username, User::DEMO_USERNAME);
        assert_eq!(
            db.get_achievements().await.unwrap().len(),
            achievements::catalog().len()
        );
    }

    #[tokio::test]
    async fn test_category_crud_and_cascade() {
        let db = open().await;
        let tools = db
            .create_category(1, &NewCategory::named("Tools"))
            .await
            .unwrap();
        assert_eq!(tools.id, 1);
        assert_eq!(tools.position, 0);
        let reading = db
            .create_category(1, &NewCategory::named("Reading"))
            .await
            .unwrap();
        assert_eq!(reading.position, 1);

        let renamed = db
            .update_category(
                tools.id,
                &CategoryPatch {
                    name: Some("Dev Tools".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(renamed.name, "Dev Tools");
        assert!(db
            .update_category(404, &CategoryPatch::default())
            .await
            .unwrap()
            .is_none());

        for title in ["a", "b"] {
            db.create_bookmark(1, &NewBookmark::new(title, "https://example.com", tools.id))
                .await
                .unwrap();
        }
        db.create_bookmark(1, &NewBookmark::new("keep", "https://example.org", reading.id))
            .await
            .unwrap();

        assert_eq!(db.delete_category(tools.id).await.unwrap(), 2);
        assert!(db.get_category(tools.id).await.unwrap().is_none());
        assert!(db
            .get_bookmarks_by_category(tools.id)
            .await
            .unwrap()
            .is_empty());
        assert_eq!(db.get_bookmarks(1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_bookmark_patch_and_section_delete() {
        let db = open().await;
        let category = db
            .create_category(1, &NewCategory::named("Tools"))
            .await
            .unwrap();
        let section = db.create_section(1, &NewSection::named("Work")).await.unwrap();
        assert_eq!(section.icon, DEFAULT_SECTION_ICON);
        assert!(!section.is_default);

        let bookmark = db
            .create_bookmark(1, &NewBookmark::new("Ex", "https://example.com", category.id))
            .await
            .unwrap();
        assert_eq!(bookmark.section_id, None);
        assert_eq!(bookmark.custom_settings, empty_settings());

        let patch: BookmarkPatch = serde_json::from_value(serde_json::json!({
            "sectionId": section.id,
            "description": "example site",
            "customSettings": { "zoom": 1.5 }
        }))
        .unwrap();
        let patched = db.update_bookmark(bookmark.id, &patch).await.unwrap().unwrap();
        assert_eq!(patched.section_id, Some(section.id));
        assert_eq!(patched.description.as_deref(), Some("example site"));
        assert_eq!(patched.custom_settings["zoom"], 1.5);

        let stored = db.get_bookmark(bookmark.id).await.unwrap().unwrap();
        assert_eq!(stored, patched);
        assert_eq!(db.get_bookmarks_by_section(section.id).await.unwrap().len(), 1);

        assert_eq!(db.delete_section(section.id).await.unwrap(), 1);
        let detached = db.get_bookmark(bookmark.id).await.unwrap().unwrap();
        assert_eq!(detached.section_id, None);
        assert!(db.get_section(section.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_increment_visit_and_delete() {
        let db = open().await;
        let category = db
            .create_category(1, &NewCategory::named("Tools"))
            .await
            .unwrap();
        let bookmark = db
            .create_bookmark(1, &NewBookmark::new("Ex", "https://example.com", category.id))
            .await
            .unwrap();

        let once = db.increment_bookmark_visit(bookmark.id).await.unwrap().unwrap();
        let twice = db.increment_bookmark_visit(bookmark.id).await.unwrap().unwrap();
        assert_eq!(once.visit_count, 1);
        assert_eq!(twice.visit_count, 2);
        assert!(once.last_visited >= bookmark.last_visited);
        assert!(twice.last_visited >= once.last_visited);

        assert!(db.increment_bookmark_visit(9999).await.unwrap().is_none());
        assert!(db.delete_bookmark(bookmark.id).await.unwrap());
        assert!(!db.delete_bookmark(bookmark.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_achievements_unlock_once_and_never_regress() {
        let db = open().await;
        assert!(db.get_user_achievements(1).await.unwrap().is_empty());

        let category = db
            .create_category(1, &NewCategory::named("Tools"))
            .await
            .unwrap();
        let bookmark = db
            .create_bookmark(1, &NewBookmark::new("Ex", "https://example.com", category.id))
            .await
            .unwrap();
        db.record_visit(bookmark.id).await.unwrap();

        let first = db.check_user_achievements(1).await.unwrap();
        assert_eq!(first.len(), achievements::catalog().len());
        let unlocked = first
            .iter()
            .find(|d| d.achievement.kind == AchievementType::BookmarkCount && d.achievement.threshold == 1)
            .unwrap();
        assert_eq!(unlocked.record.progress, 1);
        assert!(unlocked.record.unlocked_at.is_some());

        let second = db.check_user_achievements(1).await.unwrap();
        assert_eq!(first, second);

        db.delete_category(category.id).await.unwrap();
        let third = db.check_user_achievements(1).await.unwrap();
        for (before, after) in first.iter().zip(&third) {
            assert!(after.record.progress >= before.record.progress);
            assert_eq!(after.record.unlocked_at, before.record.unlocked_at);
        }
    }

    #[tokio::test]
    async fn test_update_section() {
        let db = open().await;
        let section = db.create_section(1, &NewSection::named("Work")).await.unwrap();

        let patch: SectionPatch = serde_json::from_value(serde_json::json!({
            "name": "Reading",
            "icon": "book",
            "isDefault": true,
            "settings": { "columns": 3 }
        }))
        .unwrap();
        let updated = db.update_section(section.id, &patch).await.unwrap().unwrap();
        assert_eq!(updated.name, "Reading");
        assert_eq!(updated.icon, "book");
        assert!(updated.is_default);
        assert_eq!(updated.color, section.color);
        assert_eq!(updated.settings["columns"], 3);
        assert_eq!(db.get_section(section.id).await.unwrap().unwrap(), updated);

        assert!(db.update_section(9999, &patch).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_bookmark_references_must_exist() {
        let db = open().await;
        let mine = db
            .create_category(1, &NewCategory::named("Tools"))
            .await
            .unwrap();
        let theirs = db
            .create_category(2, &NewCategory::named("Other"))
            .await
            .unwrap();

        let missing = db
            .create_bookmark(1, &NewBookmark::new("Ex", "https://example.com", 9999))
            .await;
        assert!(matches!(missing, Err(ShelfError::Validation(_))));

        let foreign = db
            .create_bookmark(1, &NewBookmark::new("Ex", "https://example.com", theirs.id))
            .await;
        assert!(matches!(foreign, Err(ShelfError::Validation(_))));

        let bookmark = db
            .create_bookmark(1, &NewBookmark::new("Ex", "https://example.com", mine.id))
            .await
            .unwrap();
        let patch: BookmarkPatch =
            serde_json::from_value(serde_json::json!({ "sectionId": 9999 })).unwrap();
        let result = db.update_bookmark(bookmark.id, &patch).await;
        assert!(matches!(result, Err(ShelfError::Validation(_))));

        let unchanged = db.get_bookmark(bookmark.id).await.unwrap().unwrap();
        assert_eq!(unchanged, bookmark);
    }

    #[tokio::test]
    async fn test_corrupt_settings_fall_back_to_empty() {
        let db = open().await;
        let section = db.create_section(1, &NewSection::named("Work")).await.unwrap();
        sqlx::query("UPDATE sections SET settings = 'not json' WHERE id = ?1")
            .bind(section.id)
            .execute(&db.pool)
            .await
            .unwrap();

        let loaded = db.get_section(section.id).await.unwrap().unwrap();
        assert_eq!(loaded.settings, empty_settings());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_writers_on_file_database() {
        let dir = tempfile::tempdir().unwrap();
        let db = open_file(&dir).await;
        let before = db.get_categories(1).await.unwrap().len();

        let creates: Vec<_> = (0..40)
            .map(|i| {
                let db = db.clone();
                tokio::spawn(async move {
                    db.create_category(1, &NewCategory::named(format!("Category {i}")))
                        .await
                })
            })
            .collect();
        for create in creates {
            assert_ok!(create.await.unwrap());
        }

        let categories = db.get_categories(1).await.unwrap();
        assert_eq!(categories.len(), before + 40);
        let mut positions: Vec<i64> = categories.iter().map(|c| c.position).collect();
        positions.sort_unstable();
        positions.dedup();
        assert_eq!(positions.len(), categories.len());

        let bookmark = db
            .create_bookmark(1, &NewBookmark::new("Ex", "https://example.com", categories[0].id))
            .await
            .unwrap();
        let visits: Vec<_> = (0..40)
            .map(|_| {
                let db = db.clone();
                tokio::spawn(async move { db.record_visit(bookmark.id).await })
            })
            .collect();
        for visit in visits {
            let visited = assert_ok!(visit.await.unwrap());
            assert!(visited.is_some());
        }

        let stored = db.get_bookmark(bookmark.id).await.unwrap().unwrap();
        assert_eq!(stored.visit_count, 40);

        let details = db.get_user_achievements(1).await.unwrap();
        let explorer = details
            .iter()
            .find(|d| d.achievement.kind == AchievementType::VisitCount && d.achievement.threshold == 10)
            .unwrap();
        assert_eq!(explorer.record.progress, 40);
        assert!(explorer.record.unlocked_at.is_some());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_category_delete_leaves_no_orphans() {
        let dir = tempfile::tempdir().unwrap();
        let db = open_file(&dir).await;

        for round in 0..20 {
            let category = db
                .create_category(1, &NewCategory::named(format!("Round {round}")))
                .await
                .unwrap();

            let creates: Vec<_> = (0..4)
                .map(|i| {
                    let db = db.clone();
                    let new = NewBookmark::new(format!("B{i}"), "https://example.com", category.id);
                    tokio::spawn(async move { db.create_bookmark(1, &new).await })
                })
                .collect();
            let deleter = {
                let db = db.clone();
                tokio::spawn(async move { db.delete_category(category.id).await })
            };

            for create in creates {
                match create.await.unwrap() {
                    Ok(_) | Err(ShelfError::Validation(_)) => {}
                    Err(err) => panic!("unexpected error: {err}"),
                }
            }
            assert_ok!(deleter.await.unwrap());
            assert!(db
                .get_bookmarks_by_category(category.id)
                .await
                .unwrap()
                .is_empty());
        }
    }
}
