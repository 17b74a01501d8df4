use std::task::{Context, Poll};

use tower::Service;
use tracing::{debug, info, info_span, Instrument};

use crate::{
    domain::{Like, User, UserId},
    ports::{
        image_store::ImageStorePort, like::LikePort, member::MemberPort,
        party::PartyRepositoryPort, user::UserPort,
    },
};

use super::{CommandFuture, DomainLogic, Error};

/// Favorite the parties of another user
pub struct LikeUserRequest {
    pub liker_id: UserId,
    pub liked_id: UserId,
}

pub struct UnlikeUserRequest {
    pub liker_id: UserId,
    pub liked_id: UserId,
}

/// Which side of the like relation to list
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LikeDirection {
    /// Users liked by the user
    Given,
    /// Users that liked the user
    Received,
}

pub struct ListLikesRequest {
    pub user_id: UserId,
    pub direction: LikeDirection,
}

impl<P, U, I, M, L> Service<LikeUserRequest> for DomainLogic<P, U, I, M, L>
where
    P: PartyRepositoryPort + ?Sized + 'static,
    U: UserPort + ?Sized + 'static,
    I: ImageStorePort + ?Sized + 'static,
    M: MemberPort + ?Sized + 'static,
    L: LikePort + ?Sized + 'static,
{
    type Response = Like;
    type Error = Error;
    type Future = CommandFuture<Self::Response>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: LikeUserRequest) -> Self::Future {
        let users = self.users.clone();
        let likes = self.likes.clone();
        let span = info_span!("like_user", liker_id = %req.liker_id, liked_id = %req.liked_id);
        Box::pin(
            async move {
                let liked = users.find_by_id(req.liked_id).await?;
                if liked.user_id == req.liker_id {
                    return Err(Error::Validation("cannot like yourself".into()));
                }

                let like = Like {
                    liker_id: req.liker_id,
                    liked_id: liked.user_id,
                };
                if likes.exists(like).await? {
                    return Err(Error::Conflict("already liked".into()));
                }
                likes.save(like).await?;
                info!("liked user");

                Ok(like)
            }
            .instrument(span),
        )
    }
}

impl<P, U, I, M, L> Service<UnlikeUserRequest> for DomainLogic<P, U, I, M, L>
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

    fn call(&mut self, req: UnlikeUserRequest) -> Self::Future {
        let likes = self.likes.clone();
        let span = info_span!("unlike_user", liker_id = %req.liker_id, liked_id = %req.liked_id);
        Box::pin(
            async move {
                let like = Like {
                    liker_id: req.liker_id,
                    liked_id: req.liked_id,
                };
                if !likes.exists(like).await? {
                    return Err(Error::Conflict("not liked".into()));
                }
                likes.delete(like).await?;
                info!("unliked user");

                Ok(())
            }
            .instrument(span),
        )
    }
}

impl<P, U, I, M, L> Service<ListLikesRequest> for DomainLogic<P, U, I, M, L>
where
    P: PartyRepositoryPort + ?Sized + 'static,
    U: UserPort + ?Sized + 'static,
    I: ImageStorePort + ?Sized + 'static,
    M: MemberPort + ?Sized + 'static,
    L: LikePort + ?Sized + 'static,
{
    type Response = Vec<User>;
    type Error = Error;
    type Future = CommandFuture<Self::Response>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: ListLikesRequest) -> Self::Future {
        let users = self.users.clone();
        let likes = self.likes.clone();
        let span = info_span!("list_likes", user_id = %req.user_id, direction = ?req.direction);
        Box::pin(
            async move {
                let other_ids: Vec<UserId> = match req.direction {
                    LikeDirection::Given => likes
                        .find_by_liker_id(req.user_id)
                        .await?
                        .into_iter()
                        .map(|like| like.liked_id)
                        .collect(),
                    LikeDirection::Received => likes
                        .find_by_liked_id(req.user_id)
                        .await?
                        .into_iter()
                        .map(|like| like.liker_id)
                        .collect(),
                };

                let mut found = Vec::with_capacity(other_ids.len());
                for user_id in other_ids {
                    found.push(users.find_by_id(user_id).await?);
                }
                debug!(users = found.len(), "listed likes");

                Ok(found)
            }
            .instrument(span),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        adapters::database::memory::MemoryDatabase,
        commands::test_support::{dispatch, memory_logic, user},
        ports::image_store::MockImageStorePort,
    };
    use rstest::*;
    use speculoos::prelude::*;
    use tower::BoxError;

    #[fixture]
    fn database() -> MemoryDatabase {
        let database = MemoryDatabase::default();
        for user_id in 1..=3 {
            database.insert_user(user(user_id, 100)).unwrap();
        }
        database
    }

    fn like(liker_id: i64, liked_id: i64) -> Like {
        Like {
            liker_id: UserId(liker_id),
            liked_id: UserId(liked_id),
        }
    }

    #[rstest]
    #[tokio::test]
    async fn test_like_user(database: MemoryDatabase) -> Result<(), BoxError> {
        let mut domain = memory_logic(&database, MockImageStorePort::new());

        let req = LikeUserRequest {
            liker_id: UserId(1),
            liked_id: UserId(2),
        };
        let res = dispatch(&mut domain, req).await?;

        assert_that!(res).is_equal_to(like(1, 2));
        assert_that!(LikePort::exists(&database, like(1, 2)).await?).is_true();
        // Likes are directional
        assert_that!(LikePort::exists(&database, like(2, 1)).await?).is_false();

        Ok(())
    }

    #[rstest]
    #[case(1, 1, "validation")]
    #[case(1, 9, "not found")]
    #[case(3, 2, "conflict")]
    #[tokio::test]
    async fn test_like_user_rejected(
        database: MemoryDatabase,
        #[case] liker_id: i64,
        #[case] liked_id: i64,
        #[case] kind: &str,
    ) -> Result<(), BoxError> {
        // GIVEN user 3 already liked user 2
        LikePort::save(&database, like(3, 2)).await?;
        let mut domain = memory_logic(&database, MockImageStorePort::new());

        // WHEN sending an invalid like
        let req = LikeUserRequest {
            liker_id: UserId(liker_id),
            liked_id: UserId(liked_id),
        };
        let res = dispatch(&mut domain, req).await;

        // THEN it is rejected with the expected error
        assert_that!(res).is_err().matches(|err| match kind {
            "validation" => matches!(err, Error::Validation(_)),
            "not found" => err.is_not_found(),
            _ => matches!(err, Error::Conflict(msg) if msg == "already liked"),
        });

        Ok(())
    }

    #[rstest]
    #[tokio::test]
    async fn test_unlike_user(database: MemoryDatabase) -> Result<(), BoxError> {
        // GIVEN user 1 liked user 2
        LikePort::save(&database, like(1, 2)).await?;
        let mut domain = memory_logic(&database, MockImageStorePort::new());

        // WHEN unliking twice
        let first = dispatch(
            &mut domain,
            UnlikeUserRequest {
                liker_id: UserId(1),
                liked_id: UserId(2),
            },
        )
        .await;
        let second = dispatch(
            &mut domain,
            UnlikeUserRequest {
                liker_id: UserId(1),
                liked_id: UserId(2),
            },
        )
        .await;

        // THEN the second call is a conflict
        assert_that!(first).is_ok();
        assert_that!(second)
            .is_err()
            .matches(|err| matches!(err, Error::Conflict(msg) if msg == "not liked"));
        assert_that!(LikePort::exists(&database, like(1, 2)).await?).is_false();

        Ok(())
    }

    #[rstest]
    #[case(LikeDirection::Given, vec![2, 3])]
    #[case(LikeDirection::Received, vec![3])]
    #[tokio::test]
    async fn test_list_likes(
        database: MemoryDatabase,
        #[case] direction: LikeDirection,
        #[case] expected: Vec<i64>,
    ) -> Result<(), BoxError> {
        // GIVEN user 1 liked users 3 and 2, and user 3 liked user 1
        for (liker_id, liked_id) in [(1, 3), (1, 2), (3, 1)] {
            LikePort::save(&database, like(liker_id, liked_id)).await?;
        }
        let mut domain = memory_logic(&database, MockImageStorePort::new());

        // WHEN listing the likes of user 1
        let req = ListLikesRequest {
            user_id: UserId(1),
            direction,
        };
        let res = dispatch(&mut domain, req).await?;

        // THEN the users on the other side are returned
        let ids: Vec<_> = res.iter().map(|user| user.user_id.0).collect();
        assert_that!(ids).is_equal_to(expected);

        Ok(())
    }
}
