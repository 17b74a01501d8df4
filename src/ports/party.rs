use crate::domain::{NewParty, Page, Parties, Party, PartyFilter, PartyId};

#[mockall::automock]
#[async_trait::async_trait]
pub trait PartyRepositoryPort: Send + Sync {
    async fn find_by_id(&self, party_id: PartyId) -> Result<Party, Error>;
    /// Fetch one page of parties, newest first
    ///
    /// The page is normalized by the caller.
    async fn find_page(&self, filter: PartyFilter, page: Page) -> Result<Parties, Error>;
    /// Persist a new party and return it with its assigned identifier
    async fn save(&self, party: NewParty) -> Result<Party, Error>;
    /// Write the mutable fields of a party and return the stored row
    ///
    /// Only the title, description, image and start date are written.
    async fn update(&self, party: &Party) -> Result<Party, Error>;
    async fn delete(&self, party_id: PartyId) -> Result<(), Error>;
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Domain-level error when a party does not exist
    #[error("party {0} does not exist")]
    PartyDoesNotExist(PartyId),

    /// Concrete adapter errors
    ///
    /// This could represent any errors from a concrete adapter that is not part of the domain
    /// model, such as connectivity, configuration, or permission errors.
    #[error("adapter error: {0:?}")]
    Adapter(Box<dyn std::error::Error + Send + Sync>),
}
