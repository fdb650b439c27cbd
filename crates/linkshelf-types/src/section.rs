//! Section types

use crate::Id;
use serde::{Deserialize, Serialize};

pub const DEFAULT_SECTION_COLOR: &str = "#6366f1";
pub const DEFAULT_SECTION_ICON: &str = "layout";

/// An alternative grouping axis to categories
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Section {
    pub id: Id,
    pub name: String,
    pub user_id: Id,
    pub position: i64,
    pub icon: String,
    pub color: String,
    pub is_default: bool,
    pub settings: serde_json::Value,
}

/// Section creation request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSection {
    pub name: String,
    #[serde(default)]
    pub position: Option<i64>,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub is_default: Option<bool>,
    #[serde(default)]
    pub settings: Option<serde_json::Value>,
}

impl NewSection {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

/// Partial section update
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub position: Option<i64>,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub is_default: Option<bool>,
    #[serde(default)]
    pub settings: Option<serde_json::Value>,
}

impl SectionPatch {
    pub fn apply(&self, section: &mut Section) {
        if let Some(name) = &self.name {
            section.name = name.clone();
        }
        if let Some(position) = self.position {
            section.position = position;
        }
        if let Some(icon) = &self.icon {
            section.icon = icon.clone();
        }
        if let Some(color) = &self.color {
            section.color = color.clone();
        }
        if let Some(is_default) = self.is_default {
            section.is_default = is_default;
        }
        if let Some(settings) = &self.settings {
            section.settings = settings.clone();
        }
    }
}
