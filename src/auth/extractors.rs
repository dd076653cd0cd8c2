use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use axum_extra::extract::cookie::CookieJar;
use tracing::warn;

use crate::auth::cookies::ACCESS_COOKIE;
use crate::auth::jwt::{JwtKeys, TokenKind};
use crate::auth::repo_types::User;
use crate::error::ApiError;
use crate::state::AppState;

/// Authorization gate: validates the access-token cookie and resolves the
/// user, which is then available to the handler.
///
/// Beyond signature and expiry this also requires a live session: the user
/// must still hold a refresh token, and the access token must have been
/// issued after the most recent logout. A stolen pre-logout access token is
/// useless even inside its one-hour window.
pub struct AuthUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        let token = jar
            .get(ACCESS_COOKIE)
            .map(|c| c.value().to_string())
            .ok_or(ApiError::Unauthorized)?;

        let keys = JwtKeys::from_ref(state);
        let claims = keys.verify(&token, TokenKind::Access).map_err(|_| {
            warn!("invalid or expired access token");
            ApiError::Unauthorized
        })?;

        let user = state
            .users
            .find_by_id(claims.sub)
            .await?
            .ok_or_else(|| ApiError::NotFound("No user found with this id".to_string()))?;

        if user.refresh_token.is_none() {
            warn!(user_id = %user.id, "access token without a live session");
            return Err(ApiError::Unauthorized);
        }
        if let Some(last_logout) = user.last_logout {
            // iat has whole-second granularity, so a token minted in the
            // same second as the logout survives this check. Tightening to
            // <= would instead reject tokens from a login that lands in the
            // logout's second, so the one-second window stands.
            if (claims.iat as i64) < last_logout.unix_timestamp() {
                warn!(user_id = %user.id, "access token issued before last logout");
                return Err(ApiError::Unauthorized);
            }
        }

        Ok(AuthUser(user))
    }
}
