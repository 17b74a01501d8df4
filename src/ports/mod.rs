pub mod image_store;
pub mod like;
pub mod member;
pub mod party;
pub mod user;
