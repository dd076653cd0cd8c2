use axum_extra::extract::cookie::{Cookie, SameSite};
use time::Duration;

pub const ACCESS_COOKIE: &str = "accessToken";
pub const REFRESH_COOKIE: &str = "refreshToken";

// Cross-site cookie contract shared with the SPA: HttpOnly, Secure,
// SameSite=None, root path.
fn session_cookie(name: &'static str, value: String, max_age: Duration) -> Cookie<'static> {
    Cookie::build((name, value))
        .http_only(true)
        .secure(true)
        .same_site(SameSite::None)
        .path("/")
        .max_age(max_age)
        .build()
}

pub fn access_cookie(token: String, ttl: std::time::Duration) -> Cookie<'static> {
    session_cookie(ACCESS_COOKIE, token, Duration::seconds(ttl.as_secs() as i64))
}

pub fn refresh_cookie(token: String, ttl: std::time::Duration) -> Cookie<'static> {
    session_cookie(REFRESH_COOKIE, token, Duration::seconds(ttl.as_secs() as i64))
}

/// Expired variant with matching attributes, used to clear on logout.
pub fn clear_cookie(name: &'static str) -> Cookie<'static> {
    session_cookie(name, String::new(), Duration::ZERO)
}
