//! Bookmark types

use crate::{double_option, Id};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A saved URL
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bookmark {
    pub id: Id,
    pub title: String,
    pub url: String,
    pub description: Option<String>,
    pub category_id: Id,
    pub user_id: Id,
    pub section_id: Option<Id>,
    pub position: i64,
    pub custom_settings: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub last_visited: DateTime<Utc>,
    pub visit_count: i64,
}

impl Bookmark {
    /// Count one more visit. `last_visited` never moves backwards, even if
    /// the wall clock does.
    pub fn record_visit(&mut self, now: DateTime<Utc>) {
        self.visit_count += 1;
        if now > self.last_visited {
            self.last_visited = now;
        }
    }
}

/// Bookmark creation request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewBookmark {
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub description: Option<String>,
    pub category_id: Id,
    #[serde(default)]
    pub section_id: Option<Id>,
    #[serde(default)]
    pub position: Option<i64>,
    #[serde(default)]
    pub custom_settings: Option<serde_json::Value>,
}

impl NewBookmark {
    pub fn new(title: impl Into<String>, url: impl Into<String>, category_id: Id) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            category_id,
            ..Default::default()
        }
    }
}

/// Partial bookmark update.
///
/// Nullable columns use a nested option so `"sectionId": null` clears the
/// section while an absent key keeps it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookmarkPatch {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    #[serde(default)]
    pub category_id: Option<Id>,
    #[serde(default, deserialize_with = "double_option")]
    pub section_id: Option<Option<Id>>,
    #[serde(default)]
    pub position: Option<i64>,
    #[serde(default)]
    pub custom_settings: Option<serde_json::Value>,
}

impl BookmarkPatch {
    pub fn apply(&self, bookmark: &mut Bookmark) {
        if let Some(title) = &self.title {
            bookmark.title = title.clone();
        }
        if let Some(url) = &self.url {
            bookmark.url = url.clone();
        }
        if let Some(description) = &self.description {
            bookmark.description = description.clone();
        }
        if let Some(category_id) = self.category_id {
            bookmark.category_id = category_id;
        }
        if let Some(section_id) = self.section_id {
            bookmark.section_id = section_id;
        }
        if let Some(position) = self.position {
            bookmark.position = position;
        }
        if let Some(settings) = &self.custom_settings {
            bookmark.custom_settings = settings.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn sample() -> Bookmark {
        let now = Utc::now();
        Bookmark {
            id: 1,
            title: "Ex".to_string(),
            url: "https://example.com".to_string(),
            description: Some("desc".to_string()),
            category_id: 1,
            user_id: 1,
            section_id: Some(3),
            position: 0,
            custom_settings: crate::empty_settings(),
            created_at: now,
            last_visited: now,
            visit_count: 0,
        }
    }

    #[test]
    fn test_patch_distinguishes_null_from_absent() {
        let patch: BookmarkPatch = serde_json::from_str(r#"{"sectionId": null}"#).unwrap();
        assert_eq!(patch.section_id, Some(None));
        assert_eq!(patch.description, None);

        let mut bookmark = sample();
        patch.apply(&mut bookmark);
        assert_eq!(bookmark.section_id, None);
        assert_eq!(bookmark.description.as_deref(), Some("desc"));
    }

    #[test]
    fn test_patch_sets_values() {
        let patch: BookmarkPatch =
            serde_json::from_str(r#"{"title": "New", "sectionId": 7, "position": 4}"#).unwrap();
        let mut bookmark = sample();
        patch.apply(&mut bookmark);
        assert_eq!(bookmark.title, "New");
        assert_eq!(bookmark.section_id, Some(7));
        assert_eq!(bookmark.position, 4);
    }

    #[test]
    fn test_record_visit_keeps_last_visited_monotonic() {
        let mut bookmark = sample();
        let before = bookmark.last_visited;

        bookmark.record_visit(before - Duration::seconds(30));
        assert_eq!(bookmark.visit_count, 1);
        assert_eq!(bookmark.last_visited, before);

        bookmark.record_visit(before + Duration::seconds(30));
        assert_eq!(bookmark.visit_count, 2);
        assert!(bookmark.last_visited > before);
    }

    #[test]
    fn test_serializes_camel_case() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["categoryId"], 1);
        assert_eq!(json["visitCount"], 0);
        assert!(json.get("lastVisited").is_some());
    }
}
