use std::task::{Context, Poll};

use tower::Service;
use tracing::{debug, info, info_span, Instrument};

use crate::{
    domain::{Member, Owned, Party, PartyId, UserId},
    ports::{
        image_store::ImageStorePort, like::LikePort, member::MemberPort,
        party::PartyRepositoryPort, user::UserPort,
    },
};

use super::{CommandFuture, DomainLogic, Error};

/// Add a user to the members of a party
pub struct JoinPartyRequest {
    pub party_id: PartyId,
    pub user_id: UserId,
}

pub struct LeavePartyRequest {
    pub party_id: PartyId,
    pub user_id: UserId,
}

/// Parties joined by a user
pub struct ListMembershipsRequest {
    pub user_id: UserId,
}

impl<P, U, I, M, L> Service<JoinPartyRequest> for DomainLogic<P, U, I, M, L>
where
    P: PartyRepositoryPort + ?Sized + 'static,
    U: UserPort + ?Sized + 'static,
    I: ImageStorePort + ?Sized + 'static,
    M: MemberPort + ?Sized + 'static,
    L: LikePort + ?Sized + 'static,
{
    type Response = Member;
    type Error = Error;
    type Future = CommandFuture<Self::Response>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: JoinPartyRequest) -> Self::Future {
        let parties = self.parties.clone();
        let members = self.members.clone();
        let span = info_span!("join_party", party_id = %req.party_id, user_id = %req.user_id);
        Box::pin(
            async move {
                let party = parties.find_by_id(req.party_id).await?;
                if party.is_owned_by(req.user_id) {
                    return Err(Error::Validation("cannot join your own party".into()));
                }

                let member = Member {
                    party_id: party.party_id,
                    user_id: req.user_id,
                };
                if members.exists(member).await? {
                    return Err(Error::Conflict("already joined".into()));
                }
                members.save(member).await?;
                info!("joined party");

                Ok(member)
            }
            .instrument(span),
        )
    }
}

impl<P, U, I, M, L> Service<LeavePartyRequest> for DomainLogic<P, U, I, M, L>
where
    P: PartyRepositoryPort + ?Sized + 'static,
    U: UserPort + ?Sized + 'static,
    I: ImageStorePort + ?Sized + 'static,
    M: MemberPort + ?Sized + 'static,
    L: LikePort + ?Sized + 'static,
{
    type Response = ();
    type Error = Error;
    type Future = CommandFuture<Self::Response>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: LeavePartyRequest) -> Self::Future {
        let members = self.members.clone();
        let span = info_span!("leave_party", party_id = %req.party_id, user_id = %req.user_id);
        Box::pin(
            async move {
                let member = Member {
                    party_id: req.party_id,
                    user_id: req.user_id,
                };
                if !members.exists(member).await? {
                    return Err(Error::Conflict("not a member".into()));
                }
                members.delete(member).await?;
                info!("left party");

                Ok(())
            }
            .instrument(span),
        )
    }
}

impl<P, U, I, M, L> Service<ListMembershipsRequest> for DomainLogic<P, U, I, M, L>
where
    P: PartyRepositoryPort + ?Sized + 'static,
    U: UserPort + ?Sized + 'static,
    I: ImageStorePort + ?Sized + 'static,
    M: MemberPort + ?Sized + 'static,
    L: LikePort + ?Sized + 'static,
{
    type Response = Vec<Party>;
    type Error = Error;
    type Future = CommandFuture<Self::Response>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: ListMembershipsRequest) -> Self::Future {
        let parties = self.parties.clone();
        let members = self.members.clone();
        let span = info_span!("list_memberships", user_id = %req.user_id);
        Box::pin(
            async move {
                let mut joined = Vec::new();
                for member in members.find_by_user_id(req.user_id).await? {
                    joined.push(parties.find_by_id(member.party_id).await?);
                }
                debug!(parties = joined.len(), "listed memberships");

                Ok(joined)
            }
            .instrument(span),
        )
    }
}
