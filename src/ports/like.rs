use crate::domain::{Like, UserId};

#[mockall::automock]
#[async_trait::async_trait]
pub trait LikePort: Send + Sync {
    async fn exists(&self, like: Like) -> Result<bool, Error>;
    async fn save(&self, like: Like) -> Result<(), Error>;
    async fn delete(&self, like: Like) -> Result<(), Error>;
    /// Likes received by `liked_id`
    async fn find_by_liked_id(&self, liked_id: UserId) -> Result<Vec<Like>, Error>;
    /// Likes given by `liker_id`
    async fn find_by_liker_id(&self, liker_id: UserId) -> Result<Vec<Like>, Error>;
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Concrete adapter errors
    #[error("adapter error: {0:?}")]
    Adapter(Box<dyn std::error::Error + Send + Sync>),
}
