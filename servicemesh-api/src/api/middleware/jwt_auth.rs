//! Bearer token gate for the vendor proxy routes.

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

use crate::api::error::ApiError;
use crate::api::jwt::{Claims, JwtService, TokenRejection};

fn bearer_token(request: &Request) -> Result<&str, ApiError> {
    let value = request
        .headers()
        .get(AUTHORIZATION)
        .ok_or_else(|| ApiError::unauthorized("Missing authorization token"))?;

    value
        .to_str()
        .ok()
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| ApiError::unauthorized("Invalid token format"))
}

/// Rejects requests without a valid bearer token and exposes the verified
/// [`Claims`] to handlers through request extensions.
pub async fn jwt_auth_middleware(
    State(jwt_service): State<Arc<JwtService>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let claims = jwt_service
        .verify(bearer_token(&request)?)
        .map_err(|rejection| match rejection {
            TokenRejection::Expired => ApiError::unauthorized("Token has expired"),
            TokenRejection::Invalid(reason) => {
                tracing::debug!(%reason, "Rejected bearer token");
                ApiError::unauthorized("Invalid token")
            }
        })?;

    tracing::trace!(sub = %claims.sub, "Authenticated request");
    request.extensions_mut().insert::<Claims>(claims);

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::StatusCode;

    fn with_header(value: &str) -> Request {
        Request::builder()
            .header(AUTHORIZATION, value)
            .body(Body::empty())
            .unwrap()
    }

    #[test]
    fn test_bearer_token_is_extracted() {
        let request = with_header("Bearer abc.def.ghi");
        assert_eq!(bearer_token(&request).unwrap(), "abc.def.ghi");
    }

    #[test]
    fn test_missing_header() {
        let request = Request::builder().body(Body::empty()).unwrap();
        let err = bearer_token(&request).unwrap_err();
        assert_eq!(err.status, StatusCode::UNAUTHORIZED);
        assert_eq!(err.message, "Missing authorization token");
    }

    #[test]
    fn test_non_bearer_schemes_are_rejected() {
        for value in ["Basic dXNlcjpwYXNz", "Bearer ", "bearer abc"] {
            let err = bearer_token(&with_header(value)).unwrap_err();
            assert_eq!(err.message, "Invalid token format", "{value}");
        }
    }
}
