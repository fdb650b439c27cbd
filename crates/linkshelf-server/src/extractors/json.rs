//! JSON body extractor that validates after deserializing

use crate::error::ApiError;
use axum::{
    async_trait,
    extract::{FromRequest, Request},
    Json,
};
use linkshelf_core::Validate;
use serde::de::DeserializeOwned;

/// Like [`Json`], but rejections and failed checks become `400 {message}`
#[derive(Debug, Clone)]
pub struct ValidJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ValidJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| {
                ApiError::BadRequest(format!("Validation error: {}", rejection.body_text()))
            })?;
        value.validate()?;
        Ok(ValidJson(value))
    }
}
