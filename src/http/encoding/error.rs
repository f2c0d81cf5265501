use warp::http::StatusCode;
use warp::{Rejection, Reply};

use crate::auth::AuthError;

/// An [`AuthError`] tagged with the endpoint it came out of, which decides
/// what the browser or API caller gets to see.
#[derive(Debug)]
pub enum AuthRejection {
    Initiate(AuthError),
    Callback(AuthError),
    Token(AuthError),
}

impl warp::reject::Reject for AuthRejection {}

#[derive(serde::Serialize)]
struct TokenFailure {
    success: bool,
    error: &'static str,
}

pub fn status_of(error: &AuthError) -> StatusCode {
    match error {
        AuthError::InvalidState
        | AuthError::MissingCode
        | AuthError::MissingVerifier
        | AuthError::AccessDenied { .. } => StatusCode::BAD_REQUEST,
        AuthError::NotConnected => StatusCode::UNAUTHORIZED,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub async fn handle_reject(err: Rejection) -> Result<impl Reply, Rejection> {
    match err.find::<AuthRejection>() {
        Some(AuthRejection::Initiate(_)) => Ok(warp::reply::with_status(
            "Failed to initiate OAuth",
            StatusCode::INTERNAL_SERVER_ERROR,
        )
        .into_response()),
        Some(AuthRejection::Callback(e)) => {
            Ok(warp::reply::with_status("Authentication failed", status_of(e)).into_response())
        }
        Some(AuthRejection::Token(e)) => {
            let status = status_of(e);
            let error = match status {
                StatusCode::UNAUTHORIZED => "Not connected; authorization required",
                _ => "Failed to retrieve access token",
            };
            let body = warp::reply::json(&TokenFailure {
                success: false,
                error,
            });
            Ok(warp::reply::with_status(body, status).into_response())
        }
        None => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_are_client_errors() {
        assert_eq!(status_of(&AuthError::InvalidState), StatusCode::BAD_REQUEST);
        assert_eq!(status_of(&AuthError::MissingVerifier), StatusCode::BAD_REQUEST);
        assert_eq!(status_of(&AuthError::NotConnected), StatusCode::UNAUTHORIZED);
        assert_eq!(
            status_of(&AuthError::TokenExchangeFailed {
                status: Some(400),
                body: "{}".to_string(),
                transport: None,
            }),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
