use axum::body::Body;
use axum::http::{HeaderMap, Request};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use super::error::ApiError;

pub const ACTOR_HEADER: &str = "x-actor";
pub const ANONYMOUS_ACTOR: &str = "anonymous";
const MAX_ACTOR_LEN: usize = 128;

/// Who is making the request, as recorded in versions and audit entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor(pub String);

impl Actor {
    pub fn anonymous() -> Self {
        Self(ANONYMOUS_ACTOR.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Read the actor from request headers. A missing or blank header is anonymous.
    pub fn from_headers(headers: &HeaderMap) -> Result<Self, ApiError> {
        let Some(value) = headers.get(ACTOR_HEADER) else {
            return Ok(Self::anonymous());
        };
        let value = value
            .to_str()
            .map_err(|_| ApiError::bad_request("invalid x-actor header", None))?
            .trim();

        if value.is_empty() {
            return Ok(Self::anonymous());
        }
        if value.len() > MAX_ACTOR_LEN || value.chars().any(char::is_control) {
            return Err(ApiError::bad_request(
                "invalid x-actor header",
                Some(format!("at most {MAX_ACTOR_LEN} printable characters")),
            ));
        }
        Ok(Self(value.to_string()))
    }
}

pub async fn resolve_actor(mut request: Request<Body>, next: Next) -> Response {
    let actor = match Actor::from_headers(request.headers()) {
        Ok(actor) => actor,
        Err(err) => return err.into_response(),
    };

    request.extensions_mut().insert(actor.clone());
    let mut response = next.run(request).await;
    response.extensions_mut().insert(actor);
    response
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn missing_header_is_anonymous() {
        let actor = Actor::from_headers(&HeaderMap::new()).expect("actor");
        assert_eq!(actor, Actor::anonymous());
    }

    #[test]
    fn header_is_trimmed() {
        let mut headers = HeaderMap::new();
        headers.insert(ACTOR_HEADER, HeaderValue::from_static("  editor@example.com "));
        let actor = Actor::from_headers(&headers).expect("actor");
        assert_eq!(actor.as_str(), "editor@example.com");
    }

    #[test]
    fn overlong_header_is_rejected() {
        let mut headers = HeaderMap::new();
        let long = "a".repeat(MAX_ACTOR_LEN + 1);
        headers.insert(
            ACTOR_HEADER,
            HeaderValue::from_str(&long).expect("header value"),
        );
        assert!(Actor::from_headers(&headers).is_err());
    }
}
