use std::task::{Context, Poll};

use tower::Service;
use tracing::{info, info_span, warn, Instrument};

use crate::{
    domain::{Party, PartyId, UserId},
    ports::{
        image_store::ImageStorePort, like::LikePort, member::MemberPort,
        party::PartyRepositoryPort, user::UserPort,
    },
};

use super::{ensure_owner, CommandFuture, DomainLogic, Error};

/// Delete a party together with its image
///
/// Deleting never refunds the creator.
pub struct DeletePartyRequest {
    pub party_id: PartyId,
    /// When set, the deletion is rejected unless this user created the party
    pub caller_id: Option<UserId>,
}

#[derive(Debug, PartialEq, Eq)]
pub struct DeletePartyResponse {
    /// The party as it was before deletion
    pub party: Party,
    /// Set when the party row was removed but its image could not be
    ///
    /// The image may still exist in the image store and needs to be reconciled.
    pub image_warning: Option<String>,
}

impl<P, U, I, M, L> Service<DeletePartyRequest> for DomainLogic<P, U, I, M, L>
where
    P: PartyRepositoryPort + ?Sized + 'static,
    U: UserPort + ?Sized + 'static,
    I: ImageStorePort + ?Sized + 'static,
    M: MemberPort + ?Sized + 'static,
    L: LikePort + ?Sized + 'static,
{
    type Response = DeletePartyResponse;
    type Error = Error;
    type Future = CommandFuture<Self::Response>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: DeletePartyRequest) -> Self::Future {
        let parties = self.parties.clone();
        let images = self.images.clone();
        let span = info_span!("delete_party", party_id = %req.party_id);
        Box::pin(
            async move {
                let party = parties.find_by_id(req.party_id).await?;
                if let Some(caller_id) = req.caller_id {
                    ensure_owner(&party, caller_id)?;
                }

                let image_warning = if party.image.is_empty() {
                    None
                } else {
                    remove_image(images.as_ref(), &party.image).await
                };

                parties.delete(party.party_id).await?;
                info!(image_removed = image_warning.is_none(), "deleted party");

                Ok(DeletePartyResponse {
                    party,
                    image_warning,
                })
            }
            .instrument(span),
        )
    }
}

/// Remove an image, turning any failure into a warning message
async fn remove_image<I: ImageStorePort + ?Sized>(images: &I, reference: &str) -> Option<String> {
    let warning = match images.exists(reference).await {
        Ok(true) => match images.delete(reference).await {
            Ok(()) => return None,
            Err(err) => format!("failed to delete image {reference}: {err}"),
        },
        Ok(false) => format!("image {reference} was not found in the image store"),
        Err(err) => format!("failed to look up image {reference}: {err}"),
    };
    warn!(image = %reference, "{warning}");

    Some(warning)
}
