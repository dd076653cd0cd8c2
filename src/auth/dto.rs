use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::repo_types::{Gender, User};

/// Standard success envelope: `{"success": true, "data": ...}`.
#[derive(Debug, Serialize)]
pub struct ApiData<T> {
    pub success: bool,
    pub data: T,
}

impl<T> ApiData<T> {
    pub fn new(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

/// Registration body. Every field is optional at the wire level so the
/// validator can report all missing fields in one batch.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub country_of_residence: Option<String>,
    pub nationality: Option<String>,
    pub date_of_birth: Option<String>,
    pub gender: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FavoriteRequest {
    pub country_code: String,
}

/// Projection returned by register.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisteredUser {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub country_of_residence: String,
    pub nationality: String,
}

impl From<&User> for RegisteredUser {
    fn from(u: &User) -> Self {
        Self {
            id: u.id,
            username: u.username.clone(),
            email: u.email.clone(),
            first_name: u.first_name.clone(),
            last_name: u.last_name.clone(),
            country_of_residence: u.country_of_residence.clone(),
            nationality: u.nationality.clone(),
        }
    }
}

/// Projection returned by login.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoggedInUser {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub favorite_countries: Vec<String>,
}

impl From<&User> for LoggedInUser {
    fn from(u: &User) -> Self {
        Self {
            id: u.id,
            username: u.username.clone(),
            email: u.email.clone(),
            favorite_countries: u.favorite_countries.clone(),
        }
    }
}

/// Projection returned by refresh.
#[derive(Debug, Serialize)]
pub struct RefreshedUser {
    pub id: Uuid,
    pub username: String,
    pub email: String,
}

impl From<&User> for RefreshedUser {
    fn from(u: &User) -> Self {
        Self {
            id: u.id,
            username: u.username.clone(),
            email: u.email.clone(),
        }
    }
}

/// Full public projection for /auth/me. Hash and refresh token are simply
/// not part of this type.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub country_of_residence: String,
    pub nationality: String,
    pub date_of_birth: Option<String>,
    pub gender: Gender,
    pub favorite_countries: Vec<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl From<&User> for UserView {
    fn from(u: &User) -> Self {
        Self {
            id: u.id,
            username: u.username.clone(),
            email: u.email.clone(),
            first_name: u.first_name.clone(),
            last_name: u.last_name.clone(),
            country_of_residence: u.country_of_residence.clone(),
            nationality: u.nationality.clone(),
            date_of_birth: u.date_of_birth.map(|d| d.to_string()),
            gender: u.gender,
            favorite_countries: u.favorite_countries.clone(),
            created_at: u.created_at,
            updated_at: u.updated_at,
        }
    }
}
