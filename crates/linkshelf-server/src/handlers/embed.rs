//! Embeddability check

use crate::error::{ApiError, ApiResult};
use axum::{extract::Query, Json};
use linkshelf_core::embed::can_embed;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct EmbedQuery {
    url: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmbedResponse {
    url: String,
    can_embed: bool,
}

pub async fn check(Query(query): Query<EmbedQuery>) -> ApiResult<Json<EmbedResponse>> {
    let url = query
        .url
        .filter(|u| !u.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("URL parameter is required".to_string()))?;
    let can_embed = can_embed(&url);
    Ok(Json(EmbedResponse { url, can_embed }))
}
