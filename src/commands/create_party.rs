use std::task::{Context, Poll};

use tower::Service;
use tracing::{error, info, info_span, warn, Instrument};

use crate::{
    domain::{amount_to_spend, image_file_name, NewParty, Party},
    ports::{
        image_store::ImageStorePort, like::LikePort, member::MemberPort,
        party::PartyRepositoryPort, user::UserPort,
    },
};

use super::{decode_image, CommandFuture, DomainLogic, Error};

/// Create a party and charge its creator
///
/// The creator must already be verified and the price validated as at least 1. Whether the
/// creator can afford the party is checked by the caller; the debit here is unconditional.
pub struct CreatePartyRequest {
    /// The party to create
    ///
    /// A non-empty `image` is a base64 payload that is uploaded before the party is stored.
    pub party: NewParty,
}

#[derive(Debug, PartialEq, Eq)]
pub struct CreatePartyResponse {
    pub party: Party,
    /// Points taken from the creator
    pub spent_points: i32,
    /// Creator balance after the debit
    pub remaining_points: i32,
}

impl<P, U, I, M, L> Service<CreatePartyRequest> for DomainLogic<P, U, I, M, L>
where
    P: PartyRepositoryPort + ?Sized + 'static,
    U: UserPort + ?Sized + 'static,
    I: ImageStorePort + ?Sized + 'static,
    M: MemberPort + ?Sized + 'static,
    L: LikePort + ?Sized + 'static,
{
    type Response = CreatePartyResponse;
    type Error = Error;
    type Future = CommandFuture<Self::Response>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: CreatePartyRequest) -> Self::Future {
        let parties = self.parties.clone();
        let users = self.users.clone();
        let images = self.images.clone();
        let span = info_span!("create_party", creator_id = %req.party.creator_id);
        Box::pin(
            async move {
                let mut party = req.party;

                // The creator may have vanished since the caller validated the request
                let creator = users.find_by_id(party.creator_id).await?;
                let amount = amount_to_spend(party.price);

                // Upload the image first so the stored party only ever holds a reference
                if !party.image.is_empty() {
                    let content = decode_image(&party.image)?;
                    party.image = images
                        .save(&image_file_name(creator.user_id), &content)
                        .await?;
                }

                let uploaded = party.image.clone();
                let party = match parties.save(party).await {
                    Ok(party) => party,
                    Err(err) => {
                        if !uploaded.is_empty() {
                            warn!(
                                image = %uploaded,
                                error = %err,
                                "party was not stored, image is orphaned"
                            );
                        }
                        return Err(err.into());
                    }
                };

                // The party row stays even if charging the creator fails
                let creator = match users.debit(&creator, amount).await {
                    Ok(creator) => creator,
                    Err(err) => {
                        error!(
                            party_id = %party.party_id,
                            amount,
                            error = %err,
                            "party was stored but the creator was not charged"
                        );
                        return Err(err.into());
                    }
                };

                info!(
                    party_id = %party.party_id,
                    amount,
                    remaining_points = creator.points,
                    "created party"
                );
                Ok(CreatePartyResponse {
                    party,
                    spent_points: amount,
                    remaining_points: creator.points,
                })
            }
            .instrument(span),
        )
    }
}
