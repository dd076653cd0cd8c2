use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::{Date, OffsetDateTime};
use uuid::Uuid;

/// Self-described gender. Stored as the Postgres `gender` enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "kebab-case")]
#[sqlx(type_name = "gender", rename_all = "kebab-case")]
pub enum Gender {
    Male,
    Female,
    Other,
    PreferNotToSay,
}

impl Default for Gender {
    fn default() -> Self {
        Gender::PreferNotToSay
    }
}

impl std::str::FromStr for Gender {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "male" => Ok(Gender::Male),
            "female" => Ok(Gender::Female),
            "other" => Ok(Gender::Other),
            "prefer-not-to-say" => Ok(Gender::PreferNotToSay),
            _ => Err(()),
        }
    }
}

/// User record in the database.
///
/// Deliberately not Serialize: everything that leaves the API goes through a
/// projection in `dto`, so the hash and the stored refresh token cannot leak.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub country_of_residence: String,
    pub nationality: String,
    pub date_of_birth: Option<Date>,
    pub gender: Gender,
    pub favorite_countries: Vec<String>,
    pub refresh_token: Option<String>,
    pub last_logout: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// Fields needed to insert a user. The id is generated by the repository.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub country_of_residence: String,
    pub nationality: String,
    pub date_of_birth: Option<Date>,
    pub gender: Gender,
}
