//! Semantic checks on request schemas
//!
//! Shape errors (missing fields, wrong types) are caught when the body is
//! deserialized. These checks run afterwards, on well-formed values.

use crate::{Result, ShelfError};
use linkshelf_types::{
    BookmarkPatch, CategoryPatch, NewBookmark, NewCategory, NewSection, SectionPatch,
};
use url::Url;

const MAX_NAME_LEN: usize = 255;

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

fn require_text(field: &str, value: &str) -> Result<()> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ShelfError::validation(format!(
            "Validation error: {field} must not be empty"
        )));
    }
    if trimmed.chars().count() > MAX_NAME_LEN {
        return Err(ShelfError::validation(format!(
            "Validation error: {field} must be at most {MAX_NAME_LEN} characters"
        )));
    }
    Ok(())
}

/// Absolute `http`/`https` URL, the only kind the viewer can open
pub fn require_web_url(field: &str, value: &str) -> Result<Url> {
    let url = Url::parse(value.trim()).map_err(|e| {
        ShelfError::validation(format!("Validation error: {field} is not a valid URL ({e})"))
    })?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ShelfError::validation(format!(
            "Validation error: {field} must use http or https, got {other}"
        ))),
    }
}

impl Validate for NewCategory {
    fn validate(&self) -> Result<()> {
        require_text("name", &self.name)
    }
}

impl Validate for CategoryPatch {
    fn validate(&self) -> Result<()> {
        if let Some(name) = &self.name {
            require_text("name", name)?;
        }
        Ok(())
    }
}

impl Validate for NewBookmark {
    fn validate(&self) -> Result<()> {
        require_text("title", &self.title)?;
        require_web_url("url", &self.url)?;
        Ok(())
    }
}

impl Validate for BookmarkPatch {
    fn validate(&self) -> Result<()> {
        if let Some(title) = &self.title {
            require_text("title", title)?;
        }
        if let Some(url) = &self.url {
            require_web_url("url", url)?;
        }
        Ok(())
    }
}

impl Validate for NewSection {
    fn validate(&self) -> Result<()> {
        require_text("name", &self.name)
    }
}

impl Validate for SectionPatch {
    fn validate(&self) -> Result<()> {
        if let Some(name) = &self.name {
            require_text("name", name)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_names_rejected() {
        assert!(NewCategory::named("   ").validate().is_err());
        assert!(NewSection::named("").validate().is_err());
        assert!(NewCategory::named("Tools").validate().is_ok());
        assert!(NewCategory::named("x".repeat(300)).validate().is_err());
    }

    #[test]
    fn test_bookmark_url_must_be_web() {
        assert!(NewBookmark::new("Ex", "https://example.com", 1)
            .validate()
            .is_ok());
        assert!(NewBookmark::new("Ex", "example.com", 1).validate().is_err());
        assert!(NewBookmark::new("Ex", "javascript:alert(1)", 1)
            .validate()
            .is_err());
        assert!(NewBookmark::new("", "https://example.com", 1)
            .validate()
            .is_err());
    }

    #[test]
    fn test_patch_only_checks_present_fields() {
        assert!(BookmarkPatch::default().validate().is_ok());

        let patch = BookmarkPatch {
            url: Some("ftp://files.example.com".to_string()),
            ..Default::default()
        };
        let err = patch.validate().unwrap_err();
        assert!(err.to_string().contains("http or https"));

        let patch = CategoryPatch {
            name: Some(" ".to_string()),
            ..Default::default()
        };
        assert!(patch.validate().is_err());
    }
}
