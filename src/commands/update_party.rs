use std::task::{Context, Poll};

use tower::Service;
use tracing::{error, info, info_span, Instrument};

use crate::{
    domain::{image_file_name, Party, UserId},
    ports::{
        image_store::ImageStorePort, like::LikePort, member::MemberPort,
        party::PartyRepositoryPort, user::UserPort,
    },
};

use super::{decode_image, ensure_owner, CommandFuture, DomainLogic, Error};

pub struct UpdatePartyRequest {
    /// New values for the party identified by `party.party_id`
    ///
    /// An empty `image` keeps the current image. Any other value different from the stored
    /// reference is a base64 payload replacing it. `price` and `creator_id` are ignored.
    pub party: Party,
    /// When set, the update is rejected unless this user created the party
    pub caller_id: Option<UserId>,
}

impl<P, U, I, M, L> Service<UpdatePartyRequest> for DomainLogic<P, U, I, M, L>
where
    P: PartyRepositoryPort + ?Sized + 'static,
    U: UserPort + ?Sized + 'static,
    I: ImageStorePort + ?Sized + 'static,
    M: MemberPort + ?Sized + 'static,
    L: LikePort + ?Sized + 'static,
{
    type Response = Party;
    type Error = Error;
    type Future = CommandFuture<Self::Response>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: UpdatePartyRequest) -> Self::Future {
        let parties = self.parties.clone();
        let images = self.images.clone();
        let span = info_span!("update_party", party_id = %req.party.party_id);
        Box::pin(
            async move {
                let mut party = req.party;
                let current = parties.find_by_id(party.party_id).await?;
                if let Some(caller_id) = req.caller_id {
                    ensure_owner(&current, caller_id)?;
                }

                if party.image.is_empty() {
                    party.image = current.image.clone();
                }

                if party.image != current.image {
                    // Validate the payload before touching the store
                    let content = decode_image(&party.image)?;

                    if !current.image.is_empty() {
                        images.delete(&current.image).await?;
                    }
                    party.image = match images
                        .save(&image_file_name(current.creator_id), &content)
                        .await
                    {
                        Ok(reference) => reference,
                        Err(err) => {
                            if !current.image.is_empty() {
                                error!(
                                    image = %current.image,
                                    error = %err,
                                    "old image was removed but the new one was not stored"
                                );
                            }
                            return Err(err.into());
                        }
                    };
                }

                // Price and creator are fixed at creation
                party.price = current.price;
                party.creator_id = current.creator_id;

                let party = parties.update(&party).await?;
                info!("updated party");
                Ok(party)
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
        commands::test_support::{dispatch, memory_logic, new_party, user},
        domain::PartyId,
        ports::image_store::{self, MockImageStorePort},
    };
    use chrono::{TimeZone, Utc};
    use mockall::{predicate::*, Sequence};
    use rstest::*;
    use speculoos::prelude::*;
    use std::sync::Arc;
    use tower::BoxError;

    /// Database holding party 1, created by user 1 with price 30 and the given image
    async fn database_with_party(image: &str) -> MemoryDatabase {
        let database = MemoryDatabase::default();
        database.insert_user(user(1, 100)).unwrap();
        PartyRepositoryPort::save(&database, new_party(UserId(1), 30, image))
            .await
            .unwrap();
        database
    }

    fn changes(image: &str) -> Party {
        Party {
            party_id: PartyId(1),
            title: "Rooftop party".to_string(),
            description: "Moved upstairs".to_string(),
            image: image.to_string(),
            price: 1,
            start_date: Utc.with_ymd_and_hms(2024, 7, 1, 20, 0, 0).unwrap(),
            creator_id: UserId(99),
        }
    }

    #[tokio::test]
    async fn test_call_keeps_image_when_empty() -> Result<(), BoxError> {
        // GIVEN a stored party with an image and an image store that must not be called
        let database = database_with_party("old.jpg").await;
        let mut images = MockImageStorePort::new();
        images.expect_exists().never();
        images.expect_save().never();
        images.expect_delete().never();
        let mut domain = memory_logic(&database, images);

        // WHEN updating with an empty image
        let req = UpdatePartyRequest {
            party: changes(""),
            caller_id: None,
        };
        let res = dispatch(&mut domain, req).await;

        // THEN the image is unchanged while the other fields are updated
        assert_that!(res).is_ok().matches(|party| {
            party.image == "old.jpg" && party.title == "Rooftop party"
        });
        Arc::into_inner(domain.images).unwrap().checkpoint();

        Ok(())
    }

    #[tokio::test]
    async fn test_call_replaces_image() -> Result<(), BoxError> {
        // GIVEN an image store expecting one delete followed by one upload
        let database = database_with_party("old.jpg").await;
        let mut seq = Sequence::new();
        let mut images = MockImageStorePort::new();
        images
            .expect_delete()
            .times(1)
            .with(eq("old.jpg"))
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        images
            .expect_save()
            .times(1)
            .withf(|_, content| content == b"hello")
            .in_sequence(&mut seq)
            .returning(|_, _| Ok("new.jpg".to_string()));
        let mut domain = memory_logic(&database, images);

        // WHEN updating with a new payload
        let req = UpdatePartyRequest {
            party: changes("aGVsbG8="),
            caller_id: Some(UserId(1)),
        };
        let res = dispatch(&mut domain, req).await;

        // THEN the party references the new image
        assert_that!(res).is_ok().matches(|party| party.image == "new.jpg");
        Arc::into_inner(domain.images).unwrap().checkpoint();

        Ok(())
    }

    #[tokio::test]
    async fn test_call_uploads_without_previous_image() -> Result<(), BoxError> {
        // GIVEN a stored party without image
        let database = database_with_party("").await;
        let mut images = MockImageStorePort::new();
        images.expect_delete().never();
        images
            .expect_save()
            .times(1)
            .returning(|_, _| Ok("https://store/abc123.jpg".to_string()));
        let mut domain = memory_logic(&database, images);

        // WHEN adding an image
        let req = UpdatePartyRequest {
            party: changes("aGVsbG8="),
            caller_id: None,
        };
        let res = dispatch(&mut domain, req).await;

        // THEN it is uploaded without deleting anything
        assert_that!(res)
            .is_ok()
            .matches(|party| party.image == "https://store/abc123.jpg");
        Arc::into_inner(domain.images).unwrap().checkpoint();

        Ok(())
    }

    #[tokio::test]
    async fn test_call_preserves_price_and_creator() -> Result<(), BoxError> {
        let database = database_with_party("").await;
        let mut domain = memory_logic(&database, MockImageStorePort::new());

        let req = UpdatePartyRequest {
            party: changes(""),
            caller_id: None,
        };
        let res = dispatch(&mut domain, req).await;

        assert_that!(res)
            .is_ok()
            .matches(|party| party.price == 30 && party.creator_id == UserId(1));

        Ok(())
    }

    #[tokio::test]
    async fn test_call_delete_failure_aborts() -> Result<(), BoxError> {
        // GIVEN an image store failing to delete the old image
        let database = database_with_party("old.jpg").await;
        let mut images = MockImageStorePort::new();
        images.expect_delete().times(1).returning(|_| {
            Err(image_store::Error::Rejected {
                status: 500,
                message: "unavailable".to_string(),
            })
        });
        images.expect_save().never();
        let mut domain = memory_logic(&database, images);

        // WHEN replacing the image
        let req = UpdatePartyRequest {
            party: changes("aGVsbG8="),
            caller_id: None,
        };
        let res = dispatch(&mut domain, req).await;

        // THEN nothing is written to the repository
        assert_that!(res)
            .is_err()
            .matches(|err| matches!(err, Error::ImageStore(_)));
        let stored = PartyRepositoryPort::find_by_id(&database, PartyId(1)).await?;
        assert_that!(stored.title.as_str()).is_equal_to("Garden party");
        assert_that!(stored.image.as_str()).is_equal_to("old.jpg");

        Ok(())
    }

    #[tokio::test]
    async fn test_call_invalid_payload_keeps_old_image() -> Result<(), BoxError> {
        let database = database_with_party("old.jpg").await;
        let mut images = MockImageStorePort::new();
        images.expect_delete().never();
        images.expect_save().never();
        let mut domain = memory_logic(&database, images);

        let req = UpdatePartyRequest {
            party: changes("%%% not base64 %%%"),
            caller_id: None,
        };
        let res = dispatch(&mut domain, req).await;

        assert_that!(res)
            .is_err()
            .matches(|err| matches!(err, Error::InvalidImagePayload(_)));
        Arc::into_inner(domain.images).unwrap().checkpoint();

        Ok(())
    }

    #[rstest]
    #[case(None, true)]
    #[case(Some(UserId(1)), true)]
    #[case(Some(UserId(2)), false)]
    #[tokio::test]
    async fn test_call_ownership(
        #[case] caller_id: Option<UserId>,
        #[case] allowed: bool,
    ) -> Result<(), BoxError> {
        let database = database_with_party("").await;
        let mut domain = memory_logic(&database, MockImageStorePort::new());

        let req = UpdatePartyRequest {
            party: changes(""),
            caller_id,
        };
        let res = dispatch(&mut domain, req).await;

        assert_that!(res.is_ok()).is_equal_to(allowed);
        if !allowed {
            assert_that!(res)
                .is_err()
                .matches(|err| matches!(err, Error::Forbidden(_)));
        }

        Ok(())
    }

    #[tokio::test]
    async fn test_call_missing_party() -> Result<(), BoxError> {
        let database = MemoryDatabase::default();
        let mut domain = memory_logic(&database, MockImageStorePort::new());

        let req = UpdatePartyRequest {
            party: changes("aGVsbG8="),
            caller_id: None,
        };
        let res = dispatch(&mut domain, req).await;

        assert_that!(res).is_err().matches(|err| err.is_not_found());

        Ok(())
    }
}
