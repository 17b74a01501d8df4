use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};

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

/// PostgreSQL implementation of every persistence port
#[derive(Clone, Debug)]
pub struct PostgresDatabase {
    pool: PgPool,
}

impl PostgresDatabase {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Apply the embedded schema migrations
    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

#[derive(FromRow)]
struct PartyRow {
    id: i64,
    title: String,
    description: String,
    image: String,
    price: i32,
    start_date: DateTime<Utc>,
    creator_id: i64,
}

impl From<PartyRow> for Party {
    fn from(row: PartyRow) -> Self {
        Self {
            party_id: PartyId(row.id),
            title: row.title,
            description: row.description,
            image: row.image,
            price: row.price,
            start_date: row.start_date,
            creator_id: UserId(row.creator_id),
        }
    }
}

#[derive(FromRow)]
struct UserRow {
    id: i64,
    name: String,
    email: String,
    points: i32,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        Self {
            user_id: UserId(row.id),
            name: row.name,
            email: row.email,
            points: row.points,
        }
    }
}

#[derive(FromRow)]
struct MemberRow {
    party_id: i64,
    user_id: i64,
}

impl From<MemberRow> for Member {
    fn from(row: MemberRow) -> Self {
        Self {
            party_id: PartyId(row.party_id),
            user_id: UserId(row.user_id),
        }
    }
}

#[derive(FromRow)]
struct LikeRow {
    liked_id: i64,
    liker_id: i64,
}

impl From<LikeRow> for Like {
    fn from(row: LikeRow) -> Self {
        Self {
            liker_id: UserId(row.liker_id),
            liked_id: UserId(row.liked_id),
        }
    }
}

const PARTY_COLUMNS: &str = "id, title, description, image, price, start_date, creator_id";

#[async_trait::async_trait]
impl PartyRepositoryPort for PostgresDatabase {
    async fn find_by_id(&self, party_id: PartyId) -> Result<Party, party::Error> {
        let row: Option<PartyRow> =
            sqlx::query_as(&format!("SELECT {PARTY_COLUMNS} FROM parties WHERE id = $1"))
                .bind(party_id.0)
                .fetch_optional(&self.pool)
                .await?;

        row.map(Party::from)
            .ok_or(party::Error::PartyDoesNotExist(party_id))
    }

    async fn find_page(&self, filter: PartyFilter, page: Page) -> Result<Parties, party::Error> {
        let limit = i64::from(page.limit);
        let offset = page.offset();

        let (rows, total) = match filter {
            PartyFilter::All => {
                let rows: Vec<PartyRow> = sqlx::query_as(&format!(
                    "SELECT {PARTY_COLUMNS} FROM parties \
                     ORDER BY created_date DESC LIMIT $1 OFFSET $2"
                ))
                .bind(limit)
                .bind(offset)
                .fetch_all(&self.pool)
                .await?;
                let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM parties")
                    .fetch_one(&self.pool)
                    .await?;
                (rows, total)
            }
            PartyFilter::ByCreator(creator_id) => {
                let rows: Vec<PartyRow> = sqlx::query_as(&format!(
                    "SELECT {PARTY_COLUMNS} FROM parties WHERE creator_id = $1 \
                     ORDER BY created_date DESC LIMIT $2 OFFSET $3"
                ))
                .bind(creator_id.0)
                .bind(limit)
                .bind(offset)
                .fetch_all(&self.pool)
                .await?;
                let total: i64 =
                    sqlx::query_scalar("SELECT COUNT(*) FROM parties WHERE creator_id = $1")
                        .bind(creator_id.0)
                        .fetch_one(&self.pool)
                        .await?;
                (rows, total)
            }
            PartyFilter::FavoritedBy(liker_id) => {
                let rows: Vec<PartyRow> = sqlx::query_as(&format!(
                    "SELECT {PARTY_COLUMNS} FROM parties \
                     WHERE creator_id IN (SELECT liked_id FROM likes WHERE liker_id = $1) \
                     ORDER BY created_date DESC LIMIT $2 OFFSET $3"
                ))
                .bind(liker_id.0)
                .bind(limit)
                .bind(offset)
                .fetch_all(&self.pool)
                .await?;
                let total: i64 = sqlx::query_scalar(
                    "SELECT COUNT(*) FROM parties \
                     WHERE creator_id IN (SELECT liked_id FROM likes WHERE liker_id = $1)",
                )
                .bind(liker_id.0)
                .fetch_one(&self.pool)
                .await?;
                (rows, total)
            }
        };

        Ok(Parties::new(
            rows.into_iter().map(Party::from).collect(),
            u64::try_from(total).unwrap_or_default(),
            page,
        ))
    }

    async fn save(&self, new_party: NewParty) -> Result<Party, party::Error> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO parties (title, description, image, price, start_date, creator_id) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING id",
        )
        .bind(&new_party.title)
        .bind(&new_party.description)
        .bind(&new_party.image)
        .bind(new_party.price)
        .bind(new_party.start_date)
        .bind(new_party.creator_id.0)
        .fetch_one(&self.pool)
        .await?;

        Ok(new_party.into_party(PartyId(id)))
    }

    async fn update(&self, party: &Party) -> Result<Party, party::Error> {
        let row: Option<PartyRow> = sqlx::query_as(&format!(
            "UPDATE parties SET title = $1, description = $2, image = $3, start_date = $4 \
             WHERE id = $5 RETURNING {PARTY_COLUMNS}"
        ))
        .bind(&party.title)
        .bind(&party.description)
        .bind(&party.image)
        .bind(party.start_date)
        .bind(party.party_id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Party::from)
            .ok_or(party::Error::PartyDoesNotExist(party.party_id))
    }

    async fn delete(&self, party_id: PartyId) -> Result<(), party::Error> {
        sqlx::query("DELETE FROM parties WHERE id = $1")
            .bind(party_id.0)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

#[async_trait::async_trait]
impl UserPort for PostgresDatabase {
    async fn find_by_id(&self, user_id: UserId) -> Result<User, user::Error> {
        let row: Option<UserRow> =
            sqlx::query_as("SELECT id, name, email, points FROM users WHERE id = $1")
                .bind(user_id.0)
                .fetch_optional(&self.pool)
                .await?;

        row.map(User::from)
            .ok_or(user::Error::UserDoesNotExist(user_id))
    }

    async fn debit(&self, user: &User, amount: i32) -> Result<User, user::Error> {
        let row: Option<UserRow> = sqlx::query_as(
            "UPDATE users SET points = points - $1 WHERE id = $2 \
             RETURNING id, name, email, points",
        )
        .bind(amount)
        .bind(user.user_id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.map(User::from)
            .ok_or(user::Error::UserDoesNotExist(user.user_id))
    }
}

#[async_trait::async_trait]
impl MemberPort for PostgresDatabase {
    async fn exists(&self, member: Member) -> Result<bool, member::Error> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM party_users WHERE party_id = $1 AND user_id = $2)",
        )
        .bind(member.party_id.0)
        .bind(member.user_id.0)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn save(&self, member: Member) -> Result<(), member::Error> {
        sqlx::query("INSERT INTO party_users (party_id, user_id) VALUES ($1, $2)")
            .bind(member.party_id.0)
            .bind(member.user_id.0)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn delete(&self, member: Member) -> Result<(), member::Error> {
        sqlx::query("DELETE FROM party_users WHERE party_id = $1 AND user_id = $2")
            .bind(member.party_id.0)
            .bind(member.user_id.0)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn find_by_party_id(&self, party_id: PartyId) -> Result<Vec<Member>, member::Error> {
        let rows: Vec<MemberRow> = sqlx::query_as(
            "SELECT party_id, user_id FROM party_users WHERE party_id = $1 ORDER BY user_id",
        )
        .bind(party_id.0)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Member::from).collect())
    }

    async fn find_by_user_id(&self, user_id: UserId) -> Result<Vec<Member>, member::Error> {
        let rows: Vec<MemberRow> = sqlx::query_as(
            "SELECT party_id, user_id FROM party_users WHERE user_id = $1 ORDER BY party_id",
        )
        .bind(user_id.0)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Member::from).collect())
    }
}

#[async_trait::async_trait]
impl LikePort for PostgresDatabase {
    async fn exists(&self, like: Like) -> Result<bool, like::Error> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM likes WHERE liked_id = $1 AND liker_id = $2)",
        )
        .bind(like.liked_id.0)
        .bind(like.liker_id.0)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn save(&self, like: Like) -> Result<(), like::Error> {
        sqlx::query("INSERT INTO likes (liked_id, liker_id) VALUES ($1, $2)")
            .bind(like.liked_id.0)
            .bind(like.liker_id.0)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn delete(&self, like: Like) -> Result<(), like::Error> {
        sqlx::query("DELETE FROM likes WHERE liked_id = $1 AND liker_id = $2")
            .bind(like.liked_id.0)
            .bind(like.liker_id.0)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn find_by_liked_id(&self, liked_id: UserId) -> Result<Vec<Like>, like::Error> {
        let rows: Vec<LikeRow> = sqlx::query_as(
            "SELECT liked_id, liker_id FROM likes WHERE liked_id = $1 ORDER BY liker_id",
        )
        .bind(liked_id.0)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Like::from).collect())
    }

    async fn find_by_liker_id(&self, liker_id: UserId) -> Result<Vec<Like>, like::Error> {
        let rows: Vec<LikeRow> = sqlx::query_as(
            "SELECT liked_id, liker_id FROM likes WHERE liker_id = $1 ORDER BY liked_id",
        )
        .bind(liker_id.0)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Like::from).collect())
    }
}

macro_rules! impl_from_sqlx {
    ($($error:path),+ $(,)?) => {
        $(
            impl From<sqlx::Error> for $error {
                fn from(err: sqlx::Error) -> Self {
                    Self::Adapter(Box::new(err))
                }
            }
        )+
    };
}

impl_from_sqlx!(party::Error, user::Error, member::Error, like::Error);
