use std::fmt;

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Minimum number of points spent when creating a party
///
/// Cheap parties still cost their creator this amount.
pub const MIN_PARTY_COST: i32 = 10;

/// Page size used when the caller asks for a non-positive limit
pub const DEFAULT_PAGE_LIMIT: i32 = 10;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PartyId(pub i64);

impl fmt::Display for PartyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A stored party
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Party {
    /// Identifier assigned by the party repository
    pub party_id: PartyId,
    pub title: String,
    pub description: String,
    /// Image reference
    ///
    /// Either empty, a file name in the local image store, or a URL returned by the remote
    /// image host.
    pub image: String,
    /// Cost of the party in points, at least 1
    pub price: i32,
    pub start_date: DateTime<Utc>,
    /// User that created the party. Never changes after creation.
    pub creator_id: UserId,
}

/// A party that has not been persisted yet
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewParty {
    pub title: String,
    pub description: String,
    pub image: String,
    pub price: i32,
    pub start_date: DateTime<Utc>,
    pub creator_id: UserId,
}

impl NewParty {
    pub fn into_party(self, party_id: PartyId) -> Party {
        Party {
            party_id,
            title: self.title,
            description: self.description,
            image: self.image,
            price: self.price,
            start_date: self.start_date,
            creator_id: self.creator_id,
        }
    }
}

/// Number of points a creator pays for a party with the given price
pub fn amount_to_spend(price: i32) -> i32 {
    price.max(MIN_PARTY_COST)
}

/// Fresh blob name for an image uploaded on behalf of `creator_id`
///
/// Names are unique per upload so replacing an image never overwrites a blob that another
/// party still references.
pub fn image_file_name(creator_id: UserId) -> String {
    format!("party_by_user_{creator_id}_{}.jpg", Uuid::new_v4().simple())
}

/// Balance-relevant view of a user
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct User {
    pub user_id: UserId,
    pub name: String,
    pub email: String,
    /// Current points balance
    ///
    /// This can be negative: affordability is checked before debiting, not by the ledger.
    pub points: i32,
}

/// A user that joined a party
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Member {
    pub party_id: PartyId,
    pub user_id: UserId,
}

/// A user that favorited another user's parties
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Like {
    pub liker_id: UserId,
    pub liked_id: UserId,
}

/// Entities that belong to exactly one user
pub trait Owned {
    fn owner_id(&self) -> UserId;

    fn is_owned_by(&self, user_id: UserId) -> bool {
        self.owner_id() == user_id
    }
}

impl Owned for Party {
    fn owner_id(&self) -> UserId {
        self.creator_id
    }
}

impl Owned for Member {
    fn owner_id(&self) -> UserId {
        self.user_id
    }
}

impl Owned for Like {
    fn owner_id(&self) -> UserId {
        self.liker_id
    }
}

/// Which parties a paginated query returns
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PartyFilter {
    All,
    /// Parties created by the given user
    ByCreator(UserId),
    /// Parties created by any user the given user liked
    FavoritedBy(UserId),
}

/// Requested page of a paginated query, 1-based
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Page {
    pub page: i32,
    pub limit: i32,
}

impl Page {
    pub fn new(page: i32, limit: i32) -> Self {
        Self { page, limit }
    }

    /// Replace out-of-range values with the first page and the default limit
    pub fn normalized(self) -> Self {
        Self {
            page: if self.page < 1 { 1 } else { self.page },
            limit: if self.limit < 1 {
                DEFAULT_PAGE_LIMIT
            } else {
                self.limit
            },
        }
    }

    /// Number of rows to skip. Only meaningful on a normalized page.
    pub fn offset(&self) -> i64 {
        (i64::from(self.page) - 1) * i64::from(self.limit)
    }
}

/// One page of parties
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Parties {
    pub parties: Vec<Party>,
    /// Number of parties matching the query across all pages
    pub total: u64,
    pub current_page: i32,
    /// Last page number, 0 when nothing matched
    pub last_page: i32,
}

impl Parties {
    pub fn new(parties: Vec<Party>, total: u64, page: Page) -> Self {
        let limit = u64::try_from(page.limit.max(1)).unwrap_or(1);
        let last_page = i32::try_from(total.div_ceil(limit)).unwrap_or(i32::MAX);
        Self {
            parties,
            total,
            current_page: page.page,
            last_page,
        }
    }
}
