//! Caller identity extraction.
//!
//! Tokens are issued and verified upstream; by the time a request reaches
//! the hub its user id travels in the `x-user-id` header (and the optional
//! role in `x-user-role`). Browsers cannot set headers on a WebSocket
//! upgrade, so the `user_id` and `role` query parameters are accepted as a
//! fallback.

use axum::extract::{FromRequestParts, Query};
use axum::http::request::Parts;
use serde::Deserialize;

use crate::error::HubError;

/// Header carrying the authenticated user id.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Header carrying the authenticated user's role.
pub const USER_ROLE_HEADER: &str = "x-user-role";

/// Resolved caller of the current request or connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Non-empty user identifier.
    pub user_id: String,
    /// Role of the user, if supplied.
    pub role: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct IdentityQuery {
    user_id: Option<String>,
    role: Option<String>,
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = HubError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = |name: &str| non_empty(parts.headers.get(name).and_then(|v| v.to_str().ok()));
        let query = Query::<IdentityQuery>::try_from_uri(&parts.uri)
            .map(|Query(q)| q)
            .unwrap_or_default();

        let user_id = header(USER_ID_HEADER)
            .or_else(|| non_empty(query.user_id.as_deref()))
            .ok_or_else(|| HubError::Unauthorized("user not authenticated".to_string()))?;
        let role = header(USER_ROLE_HEADER).or_else(|| non_empty(query.role.as_deref()));

        Ok(Self { user_id, role })
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn extract(request: Request<()>) -> Result<Identity, HubError> {
        let (mut parts, ()) = request.into_parts();
        Identity::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn reads_headers() {
        let Ok(request) = Request::builder()
            .uri("/api/v1/events")
            .header(USER_ID_HEADER, "alice")
            .header(USER_ROLE_HEADER, "admin")
            .body(())
        else {
            panic!("request build failed");
        };
        let Ok(identity) = extract(request).await else {
            panic!("identity expected");
        };
        assert_eq!(identity.user_id, "alice");
        assert_eq!(identity.role.as_deref(), Some("admin"));
    }

    #[tokio::test]
    async fn falls_back_to_query() {
        let Ok(request) = Request::builder().uri("/ws?groups=a&user_id=bob").body(()) else {
            panic!("request build failed");
        };
        let Ok(identity) = extract(request).await else {
            panic!("identity expected");
        };
        assert_eq!(identity.user_id, "bob");
        assert!(identity.role.is_none());
    }

    #[tokio::test]
    async fn missing_or_blank_user_is_unauthorized() {
        let Ok(request) = Request::builder()
            .uri("/ws")
            .header(USER_ID_HEADER, "  ")
            .body(())
        else {
            panic!("request build failed");
        };
        let Err(HubError::Unauthorized(_)) = extract(request).await else {
            panic!("expected Unauthorized");
        };
    }
}
