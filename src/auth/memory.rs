use std::sync::Mutex;

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::repo::UserRepo;
use crate::auth::repo_types::{NewUser, User};

/// In-memory UserRepo used by `AppState::fake()` and the tests.
#[derive(Default)]
pub struct MemoryUserRepo {
    users: Mutex<Vec<User>>,
}

impl MemoryUserRepo {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepo for MemoryUserRepo {
    async fn create(&self, new: NewUser) -> anyhow::Result<User> {
        let mut users = self.users.lock().expect("lock");
        if users
            .iter()
            .any(|u| u.username == new.username || u.email == new.email)
        {
            anyhow::bail!("duplicate username or email");
        }
        let now = OffsetDateTime::now_utc();
        let user = User {
            id: Uuid::new_v4(),
            username: new.username,
            email: new.email,
            password_hash: new.password_hash,
            first_name: new.first_name,
            last_name: new.last_name,
            country_of_residence: new.country_of_residence,
            nationality: new.nationality,
            date_of_birth: new.date_of_birth,
            gender: new.gender,
            favorite_countries: Vec::new(),
            refresh_token: None,
            last_logout: None,
            created_at: now,
            updated_at: now,
        };
        users.push(user.clone());
        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        let users = self.users.lock().expect("lock");
        Ok(users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let users = self.users.lock().expect("lock");
        Ok(users.iter().find(|u| u.email == email).cloned())
    }

    async fn find_by_username_or_email(
        &self,
        username: &str,
        email: &str,
    ) -> anyhow::Result<Option<User>> {
        let users = self.users.lock().expect("lock");
        Ok(users
            .iter()
            .find(|u| u.username == username || u.email == email)
            .cloned())
    }

    async fn find_by_id_and_refresh_token(
        &self,
        id: Uuid,
        refresh_token: &str,
    ) -> anyhow::Result<Option<User>> {
        let users = self.users.lock().expect("lock");
        Ok(users
            .iter()
            .find(|u| u.id == id && u.refresh_token.as_deref() == Some(refresh_token))
            .cloned())
    }

    async fn set_refresh_token(&self, id: Uuid, refresh_token: &str) -> anyhow::Result<()> {
        let mut users = self.users.lock().expect("lock");
        let user = users
            .iter_mut()
            .find(|u| u.id == id)
            .ok_or_else(|| anyhow::anyhow!("no such user"))?;
        user.refresh_token = Some(refresh_token.to_string());
        user.updated_at = OffsetDateTime::now_utc();
        Ok(())
    }

    async fn clear_session(&self, id: Uuid) -> anyhow::Result<()> {
        let mut users = self.users.lock().expect("lock");
        let user = users
            .iter_mut()
            .find(|u| u.id == id)
            .ok_or_else(|| anyhow::anyhow!("no such user"))?;
        let now = OffsetDateTime::now_utc();
        user.refresh_token = None;
        user.last_logout = Some(now);
        user.updated_at = now;
        Ok(())
    }

    async fn set_favorites(&self, id: Uuid, favorites: &[String]) -> anyhow::Result<Vec<String>> {
        let mut users = self.users.lock().expect("lock");
        let user = users
            .iter_mut()
            .find(|u| u.id == id)
            .ok_or_else(|| anyhow::anyhow!("no such user"))?;
        user.favorite_countries = favorites.to_vec();
        user.updated_at = OffsetDateTime::now_utc();
        Ok(user.favorite_countries.clone())
    }
}
