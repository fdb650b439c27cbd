//! Achievement types

use crate::Id;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which aggregate feeds an achievement's progress
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AchievementType {
    BookmarkCount,
    CategoryCount,
    VisitCount,
}

impl AchievementType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AchievementType::BookmarkCount => "bookmark_count",
            AchievementType::CategoryCount => "category_count",
            AchievementType::VisitCount => "visit_count",
        }
    }
}

impl std::fmt::Display for AchievementType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AchievementType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bookmark_count" => Ok(AchievementType::BookmarkCount),
            "category_count" => Ok(AchievementType::CategoryCount),
            "visit_count" => Ok(AchievementType::VisitCount),
            other => Err(format!("unknown achievement type: {other}")),
        }
    }
}

/// Static milestone definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Achievement {
    pub id: Id,
    pub name: String,
    pub description: String,
    pub icon: String,
    #[serde(rename = "type")]
    pub kind: AchievementType,
    pub threshold: i64,
    pub reward: Option<String>,
    pub color: String,
}

/// Definition as seeded, before the store assigns an id
#[derive(Debug, Clone, PartialEq)]
pub struct NewAchievement {
    pub name: &'static str,
    pub description: &'static str,
    pub icon: &'static str,
    pub kind: AchievementType,
    pub threshold: i64,
    pub reward: Option<&'static str>,
    pub color: &'static str,
}

impl NewAchievement {
    pub fn into_achievement(self, id: Id) -> Achievement {
        Achievement {
            id,
            name: self.name.to_string(),
            description: self.description.to_string(),
            icon: self.icon.to_string(),
            kind: self.kind,
            threshold: self.threshold,
            reward: self.reward.map(str::to_string),
            color: self.color.to_string(),
        }
    }
}

/// Per-user progress towards one achievement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserAchievement {
    pub id: Id,
    pub user_id: Id,
    pub achievement_id: Id,
    pub unlocked_at: Option<DateTime<Utc>>,
    pub progress: i64,
}

impl UserAchievement {
    pub fn is_unlocked(&self) -> bool {
        self.unlocked_at.is_some()
    }
}

/// Progress record merged with its definition, as the client renders it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserAchievementDetail {
    #[serde(flatten)]
    pub record: UserAchievement,
    pub achievement: Achievement,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_round_trips_through_str() {
        for kind in [
            AchievementType::BookmarkCount,
            AchievementType::CategoryCount,
            AchievementType::VisitCount,
        ] {
            assert_eq!(kind.to_string().parse::<AchievementType>(), Ok(kind));
        }
        assert!("streak".parse::<AchievementType>().is_err());
    }

    #[test]
    fn test_detail_flattens_record() {
        let detail = UserAchievementDetail {
            record: UserAchievement {
                id: 3,
                user_id: 1,
                achievement_id: 2,
                unlocked_at: None,
                progress: 5,
            },
            achievement: Achievement {
                id: 2,
                name: "Collector".to_string(),
                description: "Save 10 bookmarks".to_string(),
                icon: "bookmark".to_string(),
                kind: AchievementType::BookmarkCount,
                threshold: 10,
                reward: None,
                color: "#f59e0b".to_string(),
            },
        };

        let json = serde_json::to_value(&detail).unwrap();
        assert_eq!(json["progress"], 5);
        assert_eq!(json["achievementId"], 2);
        assert_eq!(json["achievement"]["type"], "bookmark_count");
        assert!(json["unlockedAt"].is_null());
    }
}
