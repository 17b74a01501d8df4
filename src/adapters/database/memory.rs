use crate::{
    domain::{
        Like, Member, NewParty, Page, Parties, Party, PartyFilter, PartyId, User, UserId,
    },
    ports::{
        like::{self, LikePort},
        member::{self, MemberPort},
        party::{self, PartyRepositoryPort},
        user::{self, UserPort},
    },
};
use std::{
    collections::{BTreeMap, HashMap, HashSet},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

/// In-memory implementation of every persistence port
///
/// Parties are kept ordered by identifier. Identifiers are assigned in insertion order, so
/// iterating in reverse yields the newest parties first.
#[derive(Clone, Debug, Default)]
pub struct MemoryDatabase {
    state: Arc<Mutex<State>>,
}

#[derive(Debug, Default)]
struct State {
    last_party_id: i64,
    parties: BTreeMap<PartyId, Party>,
    users: HashMap<UserId, User>,
    members: HashSet<Member>,
    likes: HashSet<Like>,
}

impl MemoryDatabase {
    /// Insert or replace a user
    pub fn insert_user(&self, user: User) -> Result<(), user::Error> {
        self.lock()?.users.insert(user.user_id, user);
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>, ErasedPoisonError> {
        self.state.lock().map_err(ErasedPoisonError::from)
    }
}

#[async_trait::async_trait]
impl PartyRepositoryPort for MemoryDatabase {
    async fn find_by_id(&self, party_id: PartyId) -> Result<Party, party::Error> {
        self.lock()?
            .parties
            .get(&party_id)
            .cloned()
            .ok_or(party::Error::PartyDoesNotExist(party_id))
    }

    async fn find_page(&self, filter: PartyFilter, page: Page) -> Result<Parties, party::Error> {
        let state = self.lock()?;
        let liked: HashSet<UserId> = match filter {
            PartyFilter::FavoritedBy(liker_id) => state
                .likes
                .iter()
                .filter(|like| like.liker_id == liker_id)
                .map(|like| like.liked_id)
                .collect(),
            _ => HashSet::new(),
        };
        let matching: Vec<&Party> = state
            .parties
            .values()
            .rev()
            .filter(|party| match filter {
                PartyFilter::All => true,
                PartyFilter::ByCreator(creator_id) => party.creator_id == creator_id,
                PartyFilter::FavoritedBy(_) => liked.contains(&party.creator_id),
            })
            .collect();

        let total = matching.len() as u64;
        let offset = usize::try_from(page.offset()).unwrap_or(usize::MAX);
        let limit = usize::try_from(page.limit).unwrap_or(0);
        let parties = matching
            .into_iter()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect();

        Ok(Parties::new(parties, total, page))
    }

    async fn save(&self, new_party: NewParty) -> Result<Party, party::Error> {
        let mut state = self.lock()?;
        state.last_party_id += 1;
        let party = new_party.into_party(PartyId(state.last_party_id));
        state.parties.insert(party.party_id, party.clone());

        Ok(party)
    }

    async fn update(&self, party: &Party) -> Result<Party, party::Error> {
        let mut state = self.lock()?;
        let stored = state
            .parties
            .get_mut(&party.party_id)
            .ok_or(party::Error::PartyDoesNotExist(party.party_id))?;
        stored.title = party.title.clone();
        stored.description = party.description.clone();
        stored.image = party.image.clone();
        stored.start_date = party.start_date;

        Ok(stored.clone())
    }

    async fn delete(&self, party_id: PartyId) -> Result<(), party::Error> {
        let mut state = self.lock()?;
        state.parties.remove(&party_id);
        // Memberships go with their party
        state.members.retain(|member| member.party_id != party_id);
        Ok(())
    }
}

#[async_trait::async_trait]
impl UserPort for MemoryDatabase {
    async fn find_by_id(&self, user_id: UserId) -> Result<User, user::Error> {
        self.lock()?
            .users
            .get(&user_id)
            .cloned()
            .ok_or(user::Error::UserDoesNotExist(user_id))
    }

    async fn debit(&self, user: &User, amount: i32) -> Result<User, user::Error> {
        let mut state = self.lock()?;
        let stored = state
            .users
            .get_mut(&user.user_id)
            .ok_or(user::Error::UserDoesNotExist(user.user_id))?;
        stored.points -= amount;

        Ok(stored.clone())
    }
}

#[async_trait::async_trait]
impl MemberPort for MemoryDatabase {
    async fn exists(&self, member: Member) -> Result<bool, member::Error> {
        Ok(self.lock()?.members.contains(&member))
    }

    async fn save(&self, member: Member) -> Result<(), member::Error> {
        self.lock()?.members.insert(member);
        Ok(())
    }

    async fn delete(&self, member: Member) -> Result<(), member::Error> {
        self.lock()?.members.remove(&member);
        Ok(())
    }

    async fn find_by_party_id(&self, party_id: PartyId) -> Result<Vec<Member>, member::Error> {
        let mut members: Vec<Member> = self
            .lock()?
            .members
            .iter()
            .filter(|member| member.party_id == party_id)
            .copied()
            .collect();
        members.sort_by_key(|member| member.user_id);
        Ok(members)
    }

    async fn find_by_user_id(&self, user_id: UserId) -> Result<Vec<Member>, member::Error> {
        let mut members: Vec<Member> = self
            .lock()?
            .members
            .iter()
            .filter(|member| member.user_id == user_id)
            .copied()
            .collect();
        members.sort_by_key(|member| member.party_id);
        Ok(members)
    }
}

#[async_trait::async_trait]
impl LikePort for MemoryDatabase {
    async fn exists(&self, like: Like) -> Result<bool, like::Error> {
        Ok(self.lock()?.likes.contains(&like))
    }

    async fn save(&self, like: Like) -> Result<(), like::Error> {
        self.lock()?.likes.insert(like);
        Ok(())
    }

    async fn delete(&self, like: Like) -> Result<(), like::Error> {
        self.lock()?.likes.remove(&like);
        Ok(())
    }

    async fn find_by_liked_id(&self, liked_id: UserId) -> Result<Vec<Like>, like::Error> {
        let mut likes: Vec<Like> = self
            .lock()?
            .likes
            .iter()
            .filter(|like| like.liked_id == liked_id)
            .copied()
            .collect();
        likes.sort_by_key(|like| like.liker_id);
        Ok(likes)
    }

    async fn find_by_liker_id(&self, liker_id: UserId) -> Result<Vec<Like>, like::Error> {
        let mut likes: Vec<Like> = self
            .lock()?
            .likes
            .iter()
            .filter(|like| like.liker_id == liker_id)
            .copied()
            .collect();
        likes.sort_by_key(|like| like.liked_id);
        Ok(likes)
    }
}

/// Erased [`PoisonError`]
///
/// `PoisonError` holds the `MutexGuard`, which is not `Send`, so only its message is kept.
#[derive(Debug, thiserror::Error)]
#[error("poison error: {0}")]
pub struct ErasedPoisonError(String);

impl<T> From<PoisonError<T>> for ErasedPoisonError {
    fn from(err: PoisonError<T>) -> Self {
        Self(err.to_string())
    }
}

macro_rules! impl_from_poison {
    ($($error:path),+ $(,)?) => {
        $(
            impl From<ErasedPoisonError> for $error {
                fn from(err: ErasedPoisonError) -> Self {
                    Self::Adapter(Box::new(err))
                }
            }
        )+
    };
}

impl_from_poison!(party::Error, user::Error, member::Error, like::Error);

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rstest::*;
    use speculoos::prelude::*;

    fn new_party(creator_id: UserId, title: &str) -> NewParty {
        NewParty {
            title: title.to_string(),
            description: "".to_string(),
            image: "".to_string(),
            price: 15,
            start_date: Utc::now(),
            creator_id,
        }
    }

    fn user(user_id: i64, points: i32) -> User {
        User {
            user_id: UserId(user_id),
            name: format!("user {user_id}"),
            email: format!("user{user_id}@example.com"),
            points,
        }
    }

    #[fixture]
    fn database() -> MemoryDatabase {
        MemoryDatabase::default()
    }

    #[rstest]
    #[tokio::test]
    async fn test_save_retrieve(database: MemoryDatabase) {
        // Create the party in the database
        let res = PartyRepositoryPort::save(&database, new_party(UserId(1), "first")).await;
        assert_that!(res)
            .is_ok()
            .matches(|party| party.party_id == PartyId(1) && party.title == "first");

        // Retrieving the party should return the stored row
        let res = PartyRepositoryPort::find_by_id(&database, PartyId(1)).await;
        assert_that!(res)
            .is_ok()
            .matches(|party| party.creator_id == UserId(1));
    }

    #[rstest]
    #[tokio::test]
    async fn test_find_missing_party(database: MemoryDatabase) {
        let res = PartyRepositoryPort::find_by_id(&database, PartyId(42)).await;
        assert_that!(res)
            .is_err()
            .matches(|err| matches!(err, party::Error::PartyDoesNotExist(PartyId(42))));
    }

    #[rstest]
    #[tokio::test]
    async fn test_update_keeps_price_and_creator(database: MemoryDatabase) {
        let stored = PartyRepositoryPort::save(&database, new_party(UserId(1), "before"))
            .await
            .unwrap();
        let mut changed = stored.clone();
        changed.title = "after".to_string();
        changed.image = "new.jpg".to_string();
        changed.price = 999;
        changed.creator_id = UserId(2);

        let res = database.update(&changed).await;

        assert_that!(res).is_ok().matches(|party| {
            party.title == "after"
                && party.image == "new.jpg"
                && party.price == stored.price
                && party.creator_id == stored.creator_id
        });
    }

    #[rstest]
    #[tokio::test]
    async fn test_find_page_newest_first(database: MemoryDatabase) {
        for i in 0..5 {
            let creator_id = UserId(if i % 2 == 0 { 1 } else { 2 });
            PartyRepositoryPort::save(&database, new_party(creator_id, &format!("party {i}")))
                .await
                .unwrap();
        }

        let res = database
            .find_page(PartyFilter::All, Page::new(1, 2))
            .await
            .unwrap();
        let titles: Vec<_> = res.parties.iter().map(|party| party.title.as_str()).collect();
        assert_that!(titles).is_equal_to(vec!["party 4", "party 3"]);
        assert_that!(res.total).is_equal_to(5);
        assert_that!(res.last_page).is_equal_to(3);

        let res = database
            .find_page(PartyFilter::ByCreator(UserId(2)), Page::new(1, 10))
            .await
            .unwrap();
        assert_that!(res.total).is_equal_to(2);
        assert_that!(res.parties.iter().any(|party| party.title == "party 1")).is_true();
    }

    #[rstest]
    #[tokio::test]
    async fn test_find_page_favorited_by(database: MemoryDatabase) {
        PartyRepositoryPort::save(&database, new_party(UserId(1), "liked")).await.unwrap();
        PartyRepositoryPort::save(&database, new_party(UserId(2), "other")).await.unwrap();
        LikePort::save(
            &database,
            Like {
                liker_id: UserId(3),
                liked_id: UserId(1),
            },
        )
        .await
        .unwrap();

        let res = database
            .find_page(PartyFilter::FavoritedBy(UserId(3)), Page::new(1, 10))
            .await
            .unwrap();

        assert_that!(res.total).is_equal_to(1);
        assert_that!(res.parties[0].title.as_str()).is_equal_to("liked");
    }

    #[rstest]
    #[tokio::test]
    async fn test_debit_allows_negative_balance(database: MemoryDatabase) {
        database.insert_user(user(1, 5)).unwrap();

        let res = database.debit(&user(1, 5), 10).await;
        assert_that!(res).is_ok().matches(|user| user.points == -5);

        // Negative amounts credit the user
        let res = database.debit(&user(1, -5), -20).await;
        assert_that!(res).is_ok().matches(|user| user.points == 15);
    }

    #[rstest]
    #[tokio::test]
    async fn test_debit_missing_user(database: MemoryDatabase) {
        let res = database.debit(&user(9, 100), 10).await;
        assert_that!(res)
            .is_err()
            .matches(|err| matches!(err, user::Error::UserDoesNotExist(UserId(9))));
    }

    #[rstest]
    #[tokio::test]
    async fn test_member_lifecycle(database: MemoryDatabase) {
        let member = Member {
            party_id: PartyId(1),
            user_id: UserId(2),
        };

        assert_that!(MemberPort::exists(&database, member).await)
            .is_ok()
            .is_false();
        MemberPort::save(&database, member).await.unwrap();
        assert_that!(MemberPort::exists(&database, member).await)
            .is_ok()
            .is_true();
        assert_that!(database.find_by_party_id(PartyId(1)).await)
            .is_ok()
            .is_equal_to(vec![member]);
        MemberPort::delete(&database, member).await.unwrap();
        assert_that!(database.find_by_user_id(UserId(2)).await)
            .is_ok()
            .is_equal_to(vec![]);
    }

    #[rstest]
    #[tokio::test]
    async fn test_delete_party_removes_its_members(database: MemoryDatabase) {
        // GIVEN user 2 joined parties 1 and 2
        for title in ["first", "second"] {
            PartyRepositoryPort::save(&database, new_party(UserId(1), title))
                .await
                .unwrap();
        }
        for party_id in [1, 2] {
            let member = Member {
                party_id: PartyId(party_id),
                user_id: UserId(2),
            };
            MemberPort::save(&database, member).await.unwrap();
        }

        // WHEN deleting party 1
        PartyRepositoryPort::delete(&database, PartyId(1))
            .await
            .unwrap();

        // THEN only the membership of party 2 is left
        assert_that!(database.find_by_party_id(PartyId(1)).await)
            .is_ok()
            .is_equal_to(vec![]);
        assert_that!(database.find_by_user_id(UserId(2)).await)
            .is_ok()
            .is_equal_to(vec![Member {
                party_id: PartyId(2),
                user_id: UserId(2),
            }]);
    }
}
