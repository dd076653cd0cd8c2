use axum::{
    extract::{FromRef, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use axum_extra::extract::cookie::CookieJar;
use tracing::instrument;

use crate::auth::{
    cookies::{self, ACCESS_COOKIE, REFRESH_COOKIE},
    dto::{
        ApiData, FavoriteRequest, LoggedInUser, LoginRequest, RefreshedUser, RegisterRequest,
        RegisteredUser, UserView,
    },
    extractors::AuthUser,
    jwt::JwtKeys,
    services,
};
use crate::error::ApiError;
use crate::state::AppState;

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/logout", get(logout))
        .route("/auth/refresh", get(refresh))
        .route("/auth/me", get(me))
        .route("/auth/favorites", put(toggle_favorite))
}

#[instrument(skip(state, jar, payload))]
async fn register(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(payload): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (user, tokens) = services::register(&state, payload).await?;
    let keys = JwtKeys::from_ref(&state);
    let jar = jar
        .add(cookies::access_cookie(tokens.access, keys.access_ttl))
        .add(cookies::refresh_cookie(tokens.refresh, keys.refresh_ttl));
    Ok((
        StatusCode::CREATED,
        jar,
        Json(ApiData::new(RegisteredUser::from(&user))),
    ))
}

#[instrument(skip(state, jar, payload))]
async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (user, tokens) = services::login(&state, payload).await?;
    let keys = JwtKeys::from_ref(&state);
    let jar = jar
        .add(cookies::access_cookie(tokens.access, keys.access_ttl))
        .add(cookies::refresh_cookie(tokens.refresh, keys.refresh_ttl));
    Ok((jar, Json(ApiData::new(LoggedInUser::from(&user)))))
}

#[instrument(skip(state, jar, user), fields(user_id = %user.id))]
async fn logout(
    State(state): State<AppState>,
    jar: CookieJar,
    AuthUser(user): AuthUser,
) -> Result<impl IntoResponse, ApiError> {
    services::logout(&state, user.id).await?;
    let jar = jar
        .add(cookies::clear_cookie(ACCESS_COOKIE))
        .add(cookies::clear_cookie(REFRESH_COOKIE));
    Ok((jar, Json(ApiData::new(serde_json::json!({})))))
}

#[instrument(skip(state, jar))]
async fn refresh(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<impl IntoResponse, ApiError> {
    let token = jar
        .get(REFRESH_COOKIE)
        .map(|c| c.value().to_string())
        .ok_or(ApiError::Unauthorized)?;

    let (user, access) = services::refresh(&state, &token).await?;
    let keys = JwtKeys::from_ref(&state);
    let jar = jar.add(cookies::access_cookie(access, keys.access_ttl));
    Ok((jar, Json(ApiData::new(RefreshedUser::from(&user)))))
}

#[instrument(skip(state, user), fields(user_id = %user.id))]
async fn me(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<impl IntoResponse, ApiError> {
    let user = services::current_user(&state, user.id).await?;
    Ok(Json(ApiData::new(UserView::from(&user))))
}

#[instrument(skip(state, user), fields(user_id = %user.id))]
async fn toggle_favorite(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(payload): Json<FavoriteRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let favorites = services::toggle_favorite(&state, user.id, &payload.country_code).await?;
    Ok(Json(ApiData::new(favorites)))
}
