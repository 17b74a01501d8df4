use std::{borrow::Cow, future::Future, pin::Pin, sync::Arc};

use base64::{engine::general_purpose::STANDARD, Engine};

use crate::domain::{Owned, UserId};

pub mod create_party;
pub mod delete_party;
pub mod find_party;
pub mod likes;
pub mod membership;
pub mod update_party;

/// Party lifecycle and economy commands
///
/// Each request type is handled through its own [`tower::Service`] implementation. The
/// commands only sequence calls across the ports and never hold data of their own.
pub struct DomainLogic<P: ?Sized, U: ?Sized, I: ?Sized, M: ?Sized, L: ?Sized> {
    parties: Arc<P>,
    users: Arc<U>,
    images: Arc<I>,
    members: Arc<M>,
    likes: Arc<L>,
}

impl<P: ?Sized, U: ?Sized, I: ?Sized, M: ?Sized, L: ?Sized> DomainLogic<P, U, I, M, L> {
    pub fn new(
        parties: Arc<P>,
        users: Arc<U>,
        images: Arc<I>,
        members: Arc<M>,
        likes: Arc<L>,
    ) -> Self {
        Self {
            parties,
            users,
            images,
            members,
            likes,
        }
    }
}

impl<P: ?Sized, U: ?Sized, I: ?Sized, M: ?Sized, L: ?Sized> Clone for DomainLogic<P, U, I, M, L> {
    fn clone(&self) -> Self {
        Self {
            parties: self.parties.clone(),
            users: self.users.clone(),
            images: self.images.clone(),
            members: self.members.clone(),
            likes: self.likes.clone(),
        }
    }
}

pub type CommandFuture<T> = Pin<Box<dyn Future<Output = Result<T, Error>> + Send>>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("party repository error: {0}")]
    Party(#[from] crate::ports::party::Error),
    #[error("user port error: {0}")]
    User(#[from] crate::ports::user::Error),
    #[error("image store error: {0}")]
    ImageStore(#[from] crate::ports::image_store::Error),
    #[error("member port error: {0}")]
    Member(#[from] crate::ports::member::Error),
    #[error("like port error: {0}")]
    Like(#[from] crate::ports::like::Error),

    /// The image payload is not valid base64
    #[error("invalid image payload: {0}")]
    InvalidImagePayload(#[from] base64::DecodeError),

    /// The caller does not own the entity it tries to change
    #[error("user {0} is not allowed to modify this resource")]
    Forbidden(UserId),

    #[error("invalid request: {0}")]
    Validation(Cow<'static, str>),

    /// The pair already exists, or does not exist when it should
    #[error("conflict: {0}")]
    Conflict(Cow<'static, str>),
}

impl Error {
    /// Whether the error comes from a party or user that does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Error::Party(crate::ports::party::Error::PartyDoesNotExist(_))
                | Error::User(crate::ports::user::Error::UserDoesNotExist(_))
        )
    }
}

/// Decode a base64 image payload into the bytes handed to the image store
fn decode_image(payload: &str) -> Result<Vec<u8>, Error> {
    Ok(STANDARD.decode(payload.trim())?)
}

/// Fail with [`Error::Forbidden`] unless `caller_id` owns `entity`
pub fn ensure_owner<E: Owned>(entity: &E, caller_id: UserId) -> Result<(), Error> {
    if entity.is_owned_by(caller_id) {
        Ok(())
    } else {
        Err(Error::Forbidden(caller_id))
    }
}
