//! Achievement progress rules and the seeded catalog
//!
//! Both storage backends aggregate the same three metrics and feed them
//! through [`evaluate`], so unlock and monotonicity rules live in one place.

use chrono::{DateTime, Utc};
use linkshelf_types::{Achievement, AchievementType, Bookmark, NewAchievement, UserAchievement};

/// Aggregates a user's progress is measured against
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AchievementMetrics {
    pub bookmark_count: i64,
    pub category_count: i64,
    pub visit_count: i64,
}

impl AchievementMetrics {
    /// Measure from in-memory rows already filtered to one user
    pub fn from_rows<'a>(
        bookmarks: impl IntoIterator<Item = &'a Bookmark>,
        category_count: usize,
    ) -> Self {
        let (bookmark_count, visit_count) = bookmarks
            .into_iter()
            .fold((0, 0), |(count, visits), b| (count + 1, visits + b.visit_count));
        Self {
            bookmark_count,
            category_count: category_count as i64,
            visit_count,
        }
    }

    pub fn measure(&self, kind: AchievementType) -> i64 {
        match kind {
            AchievementType::BookmarkCount => self.bookmark_count,
            AchievementType::CategoryCount => self.category_count,
            AchievementType::VisitCount => self.visit_count,
        }
    }
}

/// What a store must write after re-measuring one achievement
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressUpdate {
    /// No record exists yet
    Insert {
        progress: i64,
        unlocked_at: Option<DateTime<Utc>>,
    },
    /// The existing record moves forward
    Update {
        progress: i64,
        unlocked_at: Option<DateTime<Utc>>,
    },
    Unchanged,
}

/// Decide how a stored record changes given a freshly measured value.
///
/// Stored progress only ever grows, and `unlocked_at` is stamped once, the
/// first time progress reaches the threshold.
pub fn evaluate(
    achievement: &Achievement,
    existing: Option<&UserAchievement>,
    measured: i64,
    now: DateTime<Utc>,
) -> ProgressUpdate {
    let unlock = |progress: i64| (progress >= achievement.threshold).then_some(now);

    let Some(existing) = existing else {
        return ProgressUpdate::Insert {
            progress: measured,
            unlocked_at: unlock(measured),
        };
    };

    let progress = existing.progress.max(measured);
    let unlocked_at = existing.unlocked_at.or_else(|| unlock(progress));

    if progress == existing.progress && unlocked_at == existing.unlocked_at {
        ProgressUpdate::Unchanged
    } else {
        ProgressUpdate::Update {
            progress,
            unlocked_at,
        }
    }
}

/// Static definitions every store seeds, keyed by name
pub fn catalog() -> Vec<NewAchievement> {
    vec![
        NewAchievement {
            name: "First Bookmark",
            description: "Save your first bookmark",
            icon: "bookmark",
            kind: AchievementType::BookmarkCount,
            threshold: 1,
            reward: Some("Unlocks the ocean theme"),
            color: "#3b82f6",
        },
        NewAchievement {
            name: "Collector",
            description: "Save 10 bookmarks",
            icon: "book-open",
            kind: AchievementType::BookmarkCount,
            threshold: 10,
            reward: None,
            color: "#8b5cf6",
        },
        NewAchievement {
            name: "Curator",
            description: "Save 50 bookmarks",
            icon: "trophy",
            kind: AchievementType::BookmarkCount,
            threshold: 50,
            reward: Some("Unlocks custom theme colors"),
            color: "#f59e0b",
        },
        NewAchievement {
            name: "Organizer",
            description: "Create 3 categories",
            icon: "folder",
            kind: AchievementType::CategoryCount,
            threshold: 3,
            reward: None,
            color: "#10b981",
        },
        NewAchievement {
            name: "Architect",
            description: "Create 10 categories",
            icon: "award",
            kind: AchievementType::CategoryCount,
            threshold: 10,
            reward: None,
            color: "#14b8a6",
        },
        NewAchievement {
            name: "Explorer",
            description: "Open bookmarks 10 times",
            icon: "zap",
            kind: AchievementType::VisitCount,
            threshold: 10,
            reward: None,
            color: "#ec4899",
        },
        NewAchievement {
            name: "Frequent Flyer",
            description: "Open bookmarks 100 times",
            icon: "sparkles",
            kind: AchievementType::VisitCount,
            threshold: 100,
            reward: Some("Unlocks the particle background"),
            color: "#ef4444",
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn achievement(threshold: i64) -> Achievement {
        let mut achievement = catalog().remove(0).into_achievement(1);
        achievement.threshold = threshold;
        achievement
    }

    fn record(progress: i64, unlocked_at: Option<DateTime<Utc>>) -> UserAchievement {
        UserAchievement {
            id: 1,
            user_id: 1,
            achievement_id: 1,
            unlocked_at,
            progress,
        }
    }

    #[test]
    fn test_first_measurement_inserts() {
        let now = Utc::now();
        assert_eq!(
            evaluate(&achievement(1), None, 1, now),
            ProgressUpdate::Insert {
                progress: 1,
                unlocked_at: Some(now)
            }
        );
        assert_eq!(
            evaluate(&achievement(5), None, 2, now),
            ProgressUpdate::Insert {
                progress: 2,
                unlocked_at: None
            }
        );
    }

    #[test]
    fn test_progress_never_regresses() {
        let now = Utc::now();
        let existing = record(4, None);
        assert_eq!(
            evaluate(&achievement(10), Some(&existing), 2, now),
            ProgressUpdate::Unchanged
        );
    }

    #[test]
    fn test_unlock_is_stamped_once() {
        let first = Utc::now();
        let existing = record(2, None);
        let update = evaluate(&achievement(3), Some(&existing), 3, first);
        assert_eq!(
            update,
            ProgressUpdate::Update {
                progress: 3,
                unlocked_at: Some(first)
            }
        );

        let later = first + Duration::minutes(5);
        let unlocked = record(3, Some(first));
        assert_eq!(
            evaluate(&achievement(3), Some(&unlocked), 7, later),
            ProgressUpdate::Update {
                progress: 7,
                unlocked_at: Some(first)
            }
        );
        assert_eq!(
            evaluate(&achievement(3), Some(&unlocked), 0, later),
            ProgressUpdate::Unchanged
        );
    }

    #[test]
    fn test_same_measurement_is_idempotent() {
        let now = Utc::now();
        let existing = record(1, Some(now));
        assert_eq!(
            evaluate(&achievement(1), Some(&existing), 1, now + Duration::seconds(1)),
            ProgressUpdate::Unchanged
        );
    }

    #[test]
    fn test_metrics_from_rows() {
        let now = Utc::now();
        let bookmark = |visits| Bookmark {
            id: 1,
            title: "t".to_string(),
            url: "https://example.com".to_string(),
            description: None,
            category_id: 1,
            user_id: 1,
            section_id: None,
            position: 0,
            custom_settings: linkshelf_types::empty_settings(),
            created_at: now,
            last_visited: now,
            visit_count: visits,
        };
        let rows = [bookmark(2), bookmark(5)];
        let metrics = AchievementMetrics::from_rows(&rows, 3);

        assert_eq!(metrics.measure(AchievementType::BookmarkCount), 2);
        assert_eq!(metrics.measure(AchievementType::CategoryCount), 3);
        assert_eq!(metrics.measure(AchievementType::VisitCount), 7);
    }

    #[test]
    fn test_catalog_names_are_unique() {
        let catalog = catalog();
        let mut names: Vec<_> = catalog.iter().map(|a| a.name).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), catalog.len());
        assert!(catalog
            .iter()
            .any(|a| a.kind == AchievementType::BookmarkCount && a.threshold == 1));
    }
}
