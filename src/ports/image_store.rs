//! Durable storage for party images
//!
//! Blobs are addressed by name when saved. The reference returned by [`ImageStorePort::save`]
//! is what gets stored on a party and what is later passed to [`ImageStorePort::exists`] and
//! [`ImageStorePort::delete`]. For the local store the reference is the name itself; a remote
//! host returns its own URL.

#[mockall::automock]
#[async_trait::async_trait]
pub trait ImageStorePort: Send + Sync {
    /// Whether a blob with this reference is currently stored
    async fn exists(&self, reference: &str) -> Result<bool, Error>;
    /// Store `content` under `name`, replacing any existing blob, and return its reference
    async fn save(&self, name: &str, content: &[u8]) -> Result<String, Error>;
    /// Remove the blob behind `reference`
    async fn delete(&self, reference: &str) -> Result<(), Error>;
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The name does not stay within the storage root
    #[error("invalid image name: {0:?}")]
    InvalidName(String),

    /// The image host answered with an error status
    #[error("image host rejected the request with status {status}: {message}")]
    Rejected { status: u16, message: String },

    /// Concrete adapter errors
    ///
    /// This could represent any errors from a concrete adapter that is not part of the domain
    /// model, such as connectivity, configuration, or permission errors.
    #[error("adapter error: {0:?}")]
    Adapter(Box<dyn std::error::Error + Send + Sync>),
}
