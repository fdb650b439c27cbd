//! Request extractors

pub mod json;
pub mod user;

pub use json::ValidJson;
pub use user::CurrentUser;
