//! User types

use crate::Id;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// User account
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Id,
    pub username: String,
    #[serde(skip_serializing, default)]
    pub password: String,
    pub email: Option<String>,
    pub theme: String,
    pub created_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
    pub settings: serde_json::Value,
}

impl User {
    pub const DEMO_ID: Id = 1;
    pub const DEMO_USERNAME: &'static str = "demo";

    /// The fixed row every store seeds on startup
    pub fn demo() -> Self {
        Self {
            id: Self::DEMO_ID,
            username: Self::DEMO_USERNAME.to_string(),
            password: "password".to_string(),
            email: None,
            theme: "light".to_string(),
            created_at: Utc::now(),
            last_login: None,
            settings: crate::empty_settings(),
        }
    }
}
