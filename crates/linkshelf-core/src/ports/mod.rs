//! Port traits (interfaces) for dependency injection

pub mod storage;

pub use storage::{
    AchievementStore, BookmarkStore, CategoryStore, SectionStore, Storage, UserStore,
};
