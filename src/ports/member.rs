use crate::domain::{Member, PartyId, UserId};

#[mockall::automock]
#[async_trait::async_trait]
pub trait MemberPort: Send + Sync {
    async fn exists(&self, member: Member) -> Result<bool, Error>;
    async fn save(&self, member: Member) -> Result<(), Error>;
    async fn delete(&self, member: Member) -> Result<(), Error>;
    async fn find_by_party_id(&self, party_id: PartyId) -> Result<Vec<Member>, Error>;
    async fn find_by_user_id(&self, user_id: UserId) -> Result<Vec<Member>, Error>;
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Concrete adapter errors
    #[error("adapter error: {0:?}")]
    Adapter(Box<dyn std::error::Error + Send + Sync>),
}
