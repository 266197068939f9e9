// Auth middleware: static bearer token check for the admin API.
//
// Requests must carry `Authorization: Bearer <MANNERLY_ADMIN_TOKEN>`.
// Anything else gets a 401 before reaching a handler.

use axum::extract::{Request, State};
use axum::http::{header, StatusCode};
use axum::middleware::Next;
use axum::response::Response;

use super::AppState;

/// Axum middleware: reject requests without the admin token with 401.
pub async fn require_admin(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let provided = bearer_token(&request);
    let authorized = match provided {
        Some(token) => !state.admin_token.is_empty() && constant_time_eq(token, &state.admin_token),
        None => false,
    };

    if !authorized {
        return super::api_error(StatusCode::UNAUTHORIZED, "Authentication required");
    }
    next.run(request).await
}

/// Pull the token out of an `Authorization: Bearer ...` header.
fn bearer_token(request: &Request) -> Option<&str> {
    let value = request.headers().get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    Some(token.trim())
}

/// Constant-time string comparison to prevent timing attacks.
fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.bytes()
        .zip(b.bytes())
        .fold(0u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    fn request(auth: Option<&str>) -> Request {
        let mut builder = axum::http::Request::builder().uri("/api/leaderboard");
        if let Some(value) = auth {
            builder = builder.header(header::AUTHORIZATION, value);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[test]
    fn test_bearer_token_extraction() {
        assert_eq!(bearer_token(&request(Some("Bearer abc"))), Some("abc"));
        assert_eq!(bearer_token(&request(Some("bearer abc"))), Some("abc"));
        assert_eq!(bearer_token(&request(Some("Basic abc"))), None);
        assert_eq!(bearer_token(&request(Some("abc"))), None);
        assert_eq!(bearer_token(&request(None)), None);
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq("secret", "secret"));
        assert!(!constant_time_eq("secret", "secreT"));
        assert!(!constant_time_eq("secret", "secrets"));
    }
}
