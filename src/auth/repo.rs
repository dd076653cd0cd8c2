use async_trait::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::repo_types::{NewUser, User};

const USER_COLUMNS: &str = "id, username, email, password_hash, first_name, last_name, \
     country_of_residence, nationality, date_of_birth, gender, favorite_countries, \
     refresh_token, last_logout, created_at, updated_at";

/// Storage seam for user records. The session logic only ever talks to this
/// trait, so it runs unchanged against Postgres or the in-memory fake.
#[async_trait]
pub trait UserRepo: Send + Sync {
    async fn create(&self, new: NewUser) -> anyhow::Result<User>;

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>>;

    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>>;

    /// Uniqueness pre-check for registration: matches either column.
    async fn find_by_username_or_email(
        &self,
        username: &str,
        email: &str,
    ) -> anyhow::Result<Option<User>>;

    /// Binds a presented refresh token to a still-live session: both the id
    /// and the exact stored token string must match.
    async fn find_by_id_and_refresh_token(
        &self,
        id: Uuid,
        refresh_token: &str,
    ) -> anyhow::Result<Option<User>>;

    async fn set_refresh_token(&self, id: Uuid, refresh_token: &str) -> anyhow::Result<()>;

    /// Clears the refresh token and stamps `last_logout`. Idempotent.
    async fn clear_session(&self, id: Uuid) -> anyhow::Result<()>;

    /// Last-write-wins replacement of the favorites list.
    async fn set_favorites(&self, id: Uuid, favorites: &[String]) -> anyhow::Result<Vec<String>>;
}

pub struct PgUserRepo {
    db: PgPool,
}

impl PgUserRepo {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserRepo for PgUserRepo {
    async fn create(&self, new: NewUser) -> anyhow::Result<User> {
        let sql = format!(
            r#"
            INSERT INTO users (id, username, email, password_hash, first_name, last_name,
                               country_of_residence, nationality, date_of_birth, gender)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {USER_COLUMNS}
            "#
        );
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(Uuid::new_v4())
            .bind(&new.username)
            .bind(&new.email)
            .bind(&new.password_hash)
            .bind(&new.first_name)
            .bind(&new.last_name)
            .bind(&new.country_of_residence)
            .bind(&new.nationality)
            .bind(new.date_of_birth)
            .bind(new.gender)
            .fetch_one(&self.db)
            .await?;
        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await?;
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(email)
            .fetch_optional(&self.db)
            .await?;
        Ok(user)
    }

    async fn find_by_username_or_email(
        &self,
        username: &str,
        email: &str,
    ) -> anyhow::Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE username = $1 OR email = $2");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(username)
            .bind(email)
            .fetch_optional(&self.db)
            .await?;
        Ok(user)
    }

    async fn find_by_id_and_refresh_token(
        &self,
        id: Uuid,
        refresh_token: &str,
    ) -> anyhow::Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1 AND refresh_token = $2");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .bind(refresh_token)
            .fetch_optional(&self.db)
            .await?;
        Ok(user)
    }

    async fn set_refresh_token(&self, id: Uuid, refresh_token: &str) -> anyhow::Result<()> {
        sqlx::query("UPDATE users SET refresh_token = $2, updated_at = now() WHERE id = $1")
            .bind(id)
            .bind(refresh_token)
            .execute(&self.db)
            .await?;
        Ok(())
    }

    async fn clear_session(&self, id: Uuid) -> anyhow::Result<()> {
        sqlx::query(
            "UPDATE users SET refresh_token = NULL, last_logout = $2, updated_at = now() \
             WHERE id = $1",
        )
        .bind(id)
        .bind(OffsetDateTime::now_utc())
        .execute(&self.db)
        .await?;
        Ok(())
    }

    async fn set_favorites(&self, id: Uuid, favorites: &[String]) -> anyhow::Result<Vec<String>> {
        let row: (Vec<String>,) = sqlx::query_as(
            "UPDATE users SET favorite_countries = $2, updated_at = now() \
             WHERE id = $1 RETURNING favorite_countries",
        )
        .bind(id)
        .bind(favorites)
        .fetch_one(&self.db)
        .await?;
        Ok(row.0)
    }
}
