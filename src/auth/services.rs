use axum::extract::FromRef;
use lazy_static::lazy_static;
use regex::Regex;
use time::{macros::format_description, Date, OffsetDateTime};
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::dto::{LoginRequest, RegisterRequest};
use crate::auth::jwt::{JwtKeys, TokenKind, TokenPair};
use crate::auth::password::{hash_password, verify_password};
use crate::auth::repo_types::{Gender, NewUser, User};
use crate::error::ApiError;
use crate::state::AppState;

const MIN_AGE_YEARS: i32 = 13;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

fn trimmed(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn age_on(dob: Date, today: Date) -> i32 {
    let mut age = today.year() - dob.year();
    if (today.month() as u8, today.day()) < (dob.month() as u8, dob.day()) {
        age -= 1;
    }
    age
}

/// Normalized registration fields, produced only when every rule passed.
struct ValidRegistration {
    username: String,
    email: String,
    password: String,
    first_name: String,
    last_name: String,
    country_of_residence: String,
    nationality: String,
    date_of_birth: Option<Date>,
    gender: Gender,
}

/// Batch validation: collects every violated rule instead of failing on the
/// first, so a client can render all of them at once.
fn validate_registration(payload: &RegisterRequest) -> Result<ValidRegistration, Vec<String>> {
    let mut errors = Vec::new();

    let username = trimmed(&payload.username);
    let email = trimmed(&payload.email).map(|e| e.to_lowercase());
    let password = payload.password.clone().filter(|p| !p.is_empty());
    let first_name = trimmed(&payload.first_name);
    let last_name = trimmed(&payload.last_name);
    let country_of_residence = trimmed(&payload.country_of_residence);
    let nationality = trimmed(&payload.nationality);

    if username.is_none() {
        errors.push("Username is required".to_string());
    }
    if email.is_none() {
        errors.push("Email is required".to_string());
    }
    if password.is_none() {
        errors.push("Password is required".to_string());
    }
    if first_name.is_none() {
        errors.push("First name is required".to_string());
    }
    if last_name.is_none() {
        errors.push("Last name is required".to_string());
    }
    if country_of_residence.is_none() {
        errors.push("Country of residence is required".to_string());
    }
    if nationality.is_none() {
        errors.push("Nationality is required".to_string());
    }

    if let Some(u) = &username {
        // Characters, not bytes: multi-byte usernames count per character.
        let chars = u.chars().count();
        if chars < 3 || chars > 20 {
            errors.push("Username must be 3-20 characters".to_string());
        }
    }
    if let Some(e) = &email {
        if !is_valid_email(e) {
            errors.push("Invalid email format".to_string());
        }
    }
    if let Some(p) = &password {
        if p.len() < 8 {
            errors.push("Password must be at least 8 characters".to_string());
        }
    }

    let date_of_birth = match trimmed(&payload.date_of_birth) {
        None => None,
        Some(raw) => {
            let format = format_description!("[year]-[month]-[day]");
            match Date::parse(&raw, &format) {
                Ok(dob) => {
                    let today = OffsetDateTime::now_utc().date();
                    if age_on(dob, today) < MIN_AGE_YEARS {
                        errors.push("Must be at least 13 years old".to_string());
                    }
                    Some(dob)
                }
                Err(_) => {
                    errors.push("Invalid date format".to_string());
                    None
                }
            }
        }
    };

    let gender = match trimmed(&payload.gender) {
        None => Gender::default(),
        Some(raw) => match raw.parse::<Gender>() {
            Ok(g) => g,
            Err(()) => {
                errors.push("Invalid gender selection".to_string());
                Gender::default()
            }
        },
    };

    if !errors.is_empty() {
        return Err(errors);
    }

    // Every required field is Some once the error list is empty.
    Ok(ValidRegistration {
        username: username.unwrap_or_default(),
        email: email.unwrap_or_default(),
        password: password.unwrap_or_default(),
        first_name: first_name.unwrap_or_default(),
        last_name: last_name.unwrap_or_default(),
        country_of_residence: country_of_residence.unwrap_or_default(),
        nationality: nationality.unwrap_or_default(),
        date_of_birth,
        gender,
    })
}

/// Register a new user: batch-validate, check uniqueness, hash, persist,
/// issue a token pair and bind the refresh token to the record.
pub async fn register(
    state: &AppState,
    payload: RegisterRequest,
) -> Result<(User, TokenPair), ApiError> {
    let valid = validate_registration(&payload).map_err(ApiError::Validation)?;

    if state
        .users
        .find_by_username_or_email(&valid.username, &valid.email)
        .await?
        .is_some()
    {
        warn!(username = %valid.username, "registration conflict");
        return Err(ApiError::Validation(vec![
            "Username or email already exists".to_string(),
        ]));
    }

    let password_hash = hash_password(&valid.password).await?;
    let user = state
        .users
        .create(NewUser {
            username: valid.username,
            email: valid.email,
            password_hash,
            first_name: valid.first_name,
            last_name: valid.last_name,
            country_of_residence: valid.country_of_residence,
            nationality: valid.nationality,
            date_of_birth: valid.date_of_birth,
            gender: valid.gender,
        })
        .await?;

    let keys = JwtKeys::from_ref(state);
    let tokens = keys.issue_pair(user.id)?;
    state.users.set_refresh_token(user.id, &tokens.refresh).await?;

    info!(user_id = %user.id, email = %user.email, "user registered");
    Ok((user, tokens))
}

/// Verify credentials and start a session. Unknown email and wrong password
/// are indistinguishable to the caller.
pub async fn login(
    state: &AppState,
    payload: LoginRequest,
) -> Result<(User, TokenPair), ApiError> {
    let email = payload.email.trim().to_lowercase();

    let user = match state.users.find_by_email(&email).await? {
        Some(u) => u,
        None => {
            warn!("login with unknown email");
            return Err(ApiError::InvalidCredentials);
        }
    };

    if !verify_password(&payload.password, &user.password_hash).await? {
        warn!(user_id = %user.id, "login with invalid password");
        return Err(ApiError::InvalidCredentials);
    }

    let keys = JwtKeys::from_ref(state);
    let tokens = keys.issue_pair(user.id)?;
    // Overwrites any previous refresh token, revoking the prior session.
    state.users.set_refresh_token(user.id, &tokens.refresh).await?;

    info!(user_id = %user.id, "user logged in");
    Ok((user, tokens))
}

/// Exchange a live refresh token for a new access token. The refresh token
/// itself is not rotated. A token that was superseded by a later login fails
/// even while cryptographically valid, because it no longer matches the
/// stored one.
pub async fn refresh(state: &AppState, refresh_token: &str) -> Result<(User, String), ApiError> {
    let keys = JwtKeys::from_ref(state);
    let claims = keys
        .verify(refresh_token, TokenKind::Refresh)
        .map_err(|_| ApiError::Unauthorized)?;

    let user = state
        .users
        .find_by_id_and_refresh_token(claims.sub, refresh_token)
        .await?
        .ok_or(ApiError::Unauthorized)?;

    let access = keys.sign_access(user.id)?;
    info!(user_id = %user.id, "access token refreshed");
    Ok((user, access))
}

/// End the session: clear the stored refresh token and stamp the logout
/// instant that the gate uses to reject older access tokens. Idempotent.
pub async fn logout(state: &AppState, user_id: Uuid) -> Result<(), ApiError> {
    state.users.clear_session(user_id).await?;
    info!(user_id = %user_id, "user logged out");
    Ok(())
}

pub async fn current_user(state: &AppState, user_id: Uuid) -> Result<User, ApiError> {
    state
        .users
        .find_by_id(user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))
}

/// Toggle a country code in the favorites list: append when absent, remove
/// when present. Codes are opaque strings; validating them against the
/// country API is the frontend's concern.
pub async fn toggle_favorite(
    state: &AppState,
    user_id: Uuid,
    country_code: &str,
) -> Result<Vec<String>, ApiError> {
    let user = state
        .users
        .find_by_id(user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    let mut favorites = user.favorite_countries;
    match favorites.iter().position(|c| c == country_code) {
        Some(i) => {
            favorites.remove(i);
        }
        None => favorites.push(country_code.to_string()),
    }

    let favorites = state.users.set_favorites(user_id, &favorites).await?;
    Ok(favorites)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_payload() -> RegisterRequest {
        RegisterRequest {
            username: Some("alice123".into()),
            email: Some("a@b.com".into()),
            password: Some("longenough".into()),
            first_name: Some("A".into()),
            last_name: Some("B".into()),
            country_of_residence: Some("US".into()),
            nationality: Some("US".into()),
            date_of_birth: None,
            gender: None,
        }
    }

    fn empty_payload() -> RegisterRequest {
        RegisterRequest {
            username: None,
            email: None,
            password: None,
            first_name: None,
            last_name: None,
            country_of_residence: None,
            nationality: None,
            date_of_birth: None,
            gender: None,
        }
    }

    #[tokio::test]
    async fn register_reports_every_missing_field() {
        let state = AppState::fake();
        let err = register(&state, empty_payload()).await.unwrap_err();
        let ApiError::Validation(errors) = err else {
            panic!("expected validation error");
        };
        for msg in [
            "Username is required",
            "Email is required",
            "Password is required",
            "First name is required",
            "Last name is required",
            "Country of residence is required",
            "Nationality is required",
        ] {
            assert!(errors.iter().any(|e| e == msg), "missing: {msg}");
        }
    }

    #[tokio::test]
    async fn register_rejects_short_password() {
        let state = AppState::fake();
        let mut payload = valid_payload();
        payload.password = Some("short".into());
        let err = register(&state, payload).await.unwrap_err();
        let ApiError::Validation(errors) = err else {
            panic!("expected validation error");
        };
        assert_eq!(errors, vec!["Password must be at least 8 characters"]);
    }

    #[tokio::test]
    async fn register_collects_format_errors_together() {
        let state = AppState::fake();
        let payload = RegisterRequest {
            username: Some("ab".into()),
            email: Some("not-an-email".into()),
            password: Some("short".into()),
            date_of_birth: Some("circa 1990".into()),
            gender: Some("unknown".into()),
            ..valid_payload()
        };
        let err = register(&state, payload).await.unwrap_err();
        let ApiError::Validation(errors) = err else {
            panic!("expected validation error");
        };
        for msg in [
            "Username must be 3-20 characters",
            "Invalid email format",
            "Password must be at least 8 characters",
            "Invalid date format",
            "Invalid gender selection",
        ] {
            assert!(errors.iter().any(|e| e == msg), "missing: {msg}");
        }
    }

    #[tokio::test]
    async fn username_length_counts_characters_not_bytes() {
        let state = AppState::fake();

        // 20 characters but 40 bytes; must pass the 3-20 rule.
        let mut payload = valid_payload();
        payload.username = Some("é".repeat(20));
        register(&state, payload).await.expect("20-char multi-byte username accepted");

        // 2 characters but 4 bytes; too short even though the byte count
        // clears the minimum.
        let mut payload = valid_payload();
        payload.username = Some("éé".into());
        payload.email = Some("c@d.com".into());
        let err = register(&state, payload).await.unwrap_err();
        let ApiError::Validation(errors) = err else {
            panic!("expected validation error");
        };
        assert_eq!(errors, vec!["Username must be 3-20 characters"]);
    }

    #[tokio::test]
    async fn register_rejects_underage_user() {
        let state = AppState::fake();
        let recent = OffsetDateTime::now_utc().date().year() - 5;
        let mut payload = valid_payload();
        payload.date_of_birth = Some(format!("{recent}-01-15"));
        let err = register(&state, payload).await.unwrap_err();
        let ApiError::Validation(errors) = err else {
            panic!("expected validation error");
        };
        assert_eq!(errors, vec!["Must be at least 13 years old"]);
    }

    #[tokio::test]
    async fn duplicate_email_never_creates_a_second_record() {
        let state = AppState::fake();
        register(&state, valid_payload()).await.expect("first register");

        let mut second = valid_payload();
        second.username = Some("bob456".into());
        let err = register(&state, second).await.unwrap_err();
        let ApiError::Validation(errors) = err else {
            panic!("expected validation error");
        };
        assert_eq!(errors, vec!["Username or email already exists"]);

        let leaked = state
            .users
            .find_by_username_or_email("bob456", "nobody@nowhere.tld")
            .await
            .expect("lookup");
        assert!(leaked.is_none());
    }

    #[tokio::test]
    async fn login_hides_whether_email_exists() {
        let state = AppState::fake();
        register(&state, valid_payload()).await.expect("register");

        let wrong_password = login(
            &state,
            LoginRequest {
                email: "a@b.com".into(),
                password: "wrong-password".into(),
            },
        )
        .await
        .unwrap_err();
        let unknown_email = login(
            &state,
            LoginRequest {
                email: "nobody@b.com".into(),
                password: "longenough".into(),
            },
        )
        .await
        .unwrap_err();

        assert!(matches!(wrong_password, ApiError::InvalidCredentials));
        assert!(matches!(unknown_email, ApiError::InvalidCredentials));
    }

    #[tokio::test]
    async fn login_normalizes_email_case() {
        let state = AppState::fake();
        register(&state, valid_payload()).await.expect("register");
        let (user, _) = login(
            &state,
            LoginRequest {
                email: "  A@B.COM ".into(),
                password: "longenough".into(),
            },
        )
        .await
        .expect("login");
        assert_eq!(user.email, "a@b.com");
    }

    #[tokio::test]
    async fn refresh_issues_a_new_access_token() {
        let state = AppState::fake();
        let (user, tokens) = register(&state, valid_payload()).await.expect("register");

        let (refreshed, access) = refresh(&state, &tokens.refresh).await.expect("refresh");
        assert_eq!(refreshed.id, user.id);

        let keys = JwtKeys::from_ref(&state);
        let claims = keys.verify(&access, TokenKind::Access).expect("new access verifies");
        assert_eq!(claims.sub, user.id);
    }

    #[tokio::test]
    async fn refresh_rejects_tampered_token() {
        let state = AppState::fake();
        let (_, tokens) = register(&state, valid_payload()).await.expect("register");
        let mut tampered = tokens.refresh.clone();
        tampered.pop();
        tampered.push('x');
        let err = refresh(&state, &tampered).await.unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized));
    }

    #[tokio::test]
    async fn superseded_refresh_token_is_rejected() {
        let state = AppState::fake();
        let (_, old_tokens) = register(&state, valid_payload()).await.expect("register");

        // Ensure the second pair gets a different iat, otherwise the signed
        // strings would be identical.
        tokio::time::sleep(std::time::Duration::from_millis(1100)).await;
        login(
            &state,
            LoginRequest {
                email: "a@b.com".into(),
                password: "longenough".into(),
            },
        )
        .await
        .expect("second login");

        let err = refresh(&state, &old_tokens.refresh).await.unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized));
    }

    #[tokio::test]
    async fn logout_clears_session_and_is_idempotent() {
        let state = AppState::fake();
        let (user, tokens) = register(&state, valid_payload()).await.expect("register");

        logout(&state, user.id).await.expect("first logout");
        logout(&state, user.id).await.expect("second logout");

        let stored = current_user(&state, user.id).await.expect("still exists");
        assert!(stored.refresh_token.is_none());
        assert!(stored.last_logout.is_some());

        let err = refresh(&state, &tokens.refresh).await.unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized));
    }

    #[tokio::test]
    async fn current_user_unknown_id_is_not_found() {
        let state = AppState::fake();
        let err = current_user(&state, Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[tokio::test]
    async fn toggle_favorite_adds_then_removes() {
        let state = AppState::fake();
        let (user, _) = register(&state, valid_payload()).await.expect("register");

        let favorites = toggle_favorite(&state, user.id, "FRA").await.expect("add");
        assert_eq!(favorites, vec!["FRA"]);

        let favorites = toggle_favorite(&state, user.id, "DEU").await.expect("add");
        assert_eq!(favorites, vec!["FRA", "DEU"]);

        let favorites = toggle_favorite(&state, user.id, "FRA").await.expect("remove");
        assert_eq!(favorites, vec!["DEU"]);
    }

    #[test]
    fn email_regex_matches_simple_shapes() {
        assert!(is_valid_email("a@b.com"));
        assert!(is_valid_email("user.name@sub.domain.tld"));
        assert!(!is_valid_email("a@b"));
        assert!(!is_valid_email("a b@c.com"));
        assert!(!is_valid_email("@b.com"));
    }

    #[test]
    fn age_is_calendar_accurate() {
        use time::macros::date;
        assert_eq!(age_on(date!(2010 - 06 - 15), date!(2023 - 06 - 14)), 12);
        assert_eq!(age_on(date!(2010 - 06 - 15), date!(2023 - 06 - 15)), 13);
    }
}
