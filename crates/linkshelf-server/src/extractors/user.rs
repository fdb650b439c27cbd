//! Current-user extractor
//!
//! There is no login yet, so every request acts as the configured demo user.
//! Handlers take `CurrentUser` instead of reading config so that real
//! authentication only has to change this file.

use crate::AppState;
use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use linkshelf_core::Id;
use std::convert::Infallible;

/// Id of the user the request acts on behalf of
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CurrentUser(pub Id);

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = Infallible;

    async fn from_request_parts(
        _parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        Ok(CurrentUser(state.config.demo_user_id))
    }
}
