use std::task::{Context, Poll};

use tower::Service;
use tracing::{debug, info_span, Instrument};

use crate::{
    domain::{Page, Parties, Party, PartyFilter, PartyId, User},
    ports::{
        image_store::ImageStorePort, like::LikePort, member::MemberPort,
        party::PartyRepositoryPort, user::UserPort,
    },
};

use super::{CommandFuture, DomainLogic, Error};

pub struct FindPartyRequest {
    pub party_id: PartyId,
}

/// A party with everything needed to render it
#[derive(Debug, PartialEq, Eq)]
pub struct PartyDetails {
    pub party: Party,
    pub creator: User,
    /// Users that joined the party, ordered by identifier
    pub members: Vec<User>,
}

pub struct ListPartiesRequest {
    pub filter: PartyFilter,
    /// Requested page, normalized before querying
    pub page: Page,
}

#[derive(Debug, PartialEq, Eq)]
pub struct PartyListing {
    pub parties: Parties,
    /// Creator of each party, in the same order as `parties.parties`
    pub creators: Vec<User>,
}

impl<P, U, I, M, L> Service<FindPartyRequest> for DomainLogic<P, U, I, M, L>
where
    P: PartyRepositoryPort + ?Sized + 'static,
    U: UserPort + ?Sized + 'static,
    I: ImageStorePort + ?Sized + 'static,
    M: MemberPort + ?Sized + 'static,
    L: LikePort + ?Sized + 'static,
{
    type Response = PartyDetails;
    type Error = Error;
    type Future = CommandFuture<Self::Response>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: FindPartyRequest) -> Self::Future {
        let parties = self.parties.clone();
        let users = self.users.clone();
        let members = self.members.clone();
        let span = info_span!("find_party", party_id = %req.party_id);
        Box::pin(
            async move {
                let party = parties.find_by_id(req.party_id).await?;
                let creator = users.find_by_id(party.creator_id).await?;

                let mut member_users = Vec::new();
                for member in members.find_by_party_id(party.party_id).await? {
                    member_users.push(users.find_by_id(member.user_id).await?);
                }
                debug!(members = member_users.len(), "found party");

                Ok(PartyDetails {
                    party,
                    creator,
                    members: member_users,
                })
            }
            .instrument(span),
        )
    }
}

impl<P, U, I, M, L> Service<ListPartiesRequest> for DomainLogic<P, U, I, M, L>
where
    P: PartyRepositoryPort + ?Sized + 'static,
    U: UserPort + ?Sized + 'static,
    I: ImageStorePort + ?Sized + 'static,
    M: MemberPort + ?Sized + 'static,
    L: LikePort + ?Sized + 'static,
{
    type Response = PartyListing;
    type Error = Error;
    type Future = CommandFuture<Self::Response>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: ListPartiesRequest) -> Self::Future {
        let parties = self.parties.clone();
        let users = self.users.clone();
        let span = info_span!("list_parties", filter = ?req.filter);
        Box::pin(
            async move {
                let page = parties.find_page(req.filter, req.page.normalized()).await?;

                let mut creators = Vec::with_capacity(page.parties.len());
                for party in &page.parties {
                    creators.push(users.find_by_id(party.creator_id).await?);
                }
                debug!(total = page.total, returned = page.parties.len(), "listed parties");

                Ok(PartyListing {
                    parties: page,
                    creators,
                })
            }
            .instrument(span),
        )
    }
}
