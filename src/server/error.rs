use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use std::{error::Error, fmt::Display};

use crate::error::BlogError;

#[derive(Debug)]
pub struct ServerError {
    pub prefix: &'static str,
    pub message: String,
    pub status_code: StatusCode,
}

impl Error for ServerError {}

impl Display for ServerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.prefix, self.message)
    }
}

impl From<BlogError> for ServerError {
    fn from(err: BlogError) -> Self {
        let (prefix, status_code) = match &err {
            BlogError::NotFound { .. } => ("[NOT FOUND]", StatusCode::NOT_FOUND),
            BlogError::InvalidCursor(_) | BlogError::InvalidSlug(_) => {
                ("[BAD REQUEST]", StatusCode::BAD_REQUEST)
            }
            BlogError::Http(_)
            | BlogError::Decode(_)
            | BlogError::Api(_)
            | BlogError::MissingUid(_) => ("[BAD GATEWAY]", StatusCode::BAD_GATEWAY),
            _ => ("[SERVER ERROR]", StatusCode::INTERNAL_SERVER_ERROR),
        };
        ServerError {
            prefix,
            message: err.to_string(),
            status_code,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        if self.status_code.is_server_error() {
            tracing::error!("{}", self);
        } else {
            tracing::debug!("{}", self);
        }
        (self.status_code, self.to_string()).into_response()
    }
}

/// A resolution that failed upstream earlier and is now reported
pub fn bad_gateway(message: String) -> ServerError {
    ServerError {
        prefix: "[BAD GATEWAY]",
        message,
        status_code: StatusCode::BAD_GATEWAY,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let not_found = BlogError::NotFound {
            doc_type: "post".to_string(),
            uid: "x".to_string(),
        };
        assert_eq!(
            ServerError::from(not_found).status_code,
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ServerError::from(BlogError::InvalidCursor("c".to_string())).status_code,
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ServerError::from(BlogError::Api("no master ref".to_string())).status_code,
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            ServerError::from(BlogError::InvalidDate("soon".to_string())).status_code,
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_display_carries_prefix() {
        let err = ServerError::from(BlogError::InvalidCursor("c".to_string()));
        assert_eq!(err.to_string(), "[BAD REQUEST] invalid pagination cursor 'c'");
    }
}
