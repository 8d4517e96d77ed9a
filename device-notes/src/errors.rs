use std::sync::{Arc, OnceLock};

use crate::error_responses;
use aide::OperationIo;
use axum::{
    extract::{
        multipart::{MultipartError, MultipartRejection},
        rejection::{JsonRejection, PathRejection},
        Request,
    },
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub use response::ErrorResponse;

pub type Result<T> = std::result::Result<T, Error>;

/// Error responses are documented once, as the API-wide default response.
#[derive(thiserror::Error, Debug, OperationIo)]
#[aide(output)]
pub enum Error {
    #[error("not_found")]
    NotFound(String),

    // validation
    #[error("validation")]
    Validation(String),
    #[error("validation")]
    JsonValidation(#[from] JsonRejection),
    #[error("validation")]
    PathValidation(#[from] PathRejection),
    #[error("validation")]
    MultipartValidation(#[from] MultipartRejection),
    #[error("validation")]
    Multipart(#[from] MultipartError),

    // ai provider
    #[error("upstream: {0}")]
    Upstream(String),

    #[error(transparent)]
    DB(crate::db::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("unexpected")]
    Unexpected(String),
}

impl Error {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}

impl From<crate::db::Error> for Error {
    fn from(error: crate::db::Error) -> Self {
        match error {
            crate::db::Error::NotFound(msg) => Self::NotFound(msg),
            error => Self::DB(error),
        }
    }
}

impl From<crate::ai::Error> for Error {
    fn from(error: crate::ai::Error) -> Self {
        Self::Upstream(error.to_string())
    }
}

/// crate::Error <--> tokio_rusqlite::Error
/// ```ignore
/// impl From<tokio_rusqlite::Error> for Error { }
/// impl From<Error> for tokio_rusqlite::Error { }
/// ```
pub mod db_mappers {
    use super::*;
    use crate::db::{self, tokio_rusqlite};

    impl From<tokio_rusqlite::Error> for Error {
        fn from(error: tokio_rusqlite::Error) -> Self {
            match error {
                tokio_rusqlite::Error::Other(err) => match err.downcast::<Error>() {
                    Ok(err) => *err,
                    Err(err) => Error::from(db::Error::from(tokio_rusqlite::Error::Other(err))),
                },
                error => Error::from(db::Error::from(error)),
            }
        }
    }

    impl From<db::rusqlite::Error> for Error {
        fn from(error: db::rusqlite::Error) -> Self {
            Error::from(db::Error::from(error))
        }
    }

    impl From<Error> for tokio_rusqlite::Error {
        fn from(error: Error) -> Self {
            tokio_rusqlite::Error::Other(error.into())
        }
    }
}

// Response

error_responses! {
    not_found: 404,
    validation: 400,
    path_validation: 400,
    json_validation: 400,
    payload_too_large: 413,
    upstream: 500,
    unexpected: 500
}

impl From<&Error> for ErrorResponse {
    fn from(error: &Error) -> Self {
        let errors = errors();
        match error {
            Error::NotFound(message) => errors.not_found.with_message(message),
            Error::Validation(message) => errors.validation.with_message(message),
            Error::JsonValidation(error) => errors.json_validation.with_message(error.body_text()),
            Error::PathValidation(error) => errors.path_validation.with_message(error.body_text()),
            Error::MultipartValidation(error) => errors.validation.with_message(error.body_text()),
            Error::Multipart(error) if error.status() == StatusCode::PAYLOAD_TOO_LARGE => {
                errors.payload_too_large.with_message(error.body_text())
            }
            Error::Multipart(error) => errors.validation.with_message(error.body_text()),
            Error::Upstream(message) => errors.upstream.with_message(message),
            Error::Unexpected(message) => errors.unexpected.with_message(message),
            _ => errors.unexpected.with_message("Unexpected"),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> axum::response::Response {
        let error = Arc::new(self);

        let error_res = ErrorResponse::from(error.as_ref());
        let status = error_res.status;

        let mut res = axum::Json(error_res).into_response();
        res.extensions_mut().insert(error);

        *res.status_mut() = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        res
    }
}

pub async fn on_error(request: Request, next: Next) -> Response {
    let response = next.run(request).await;

    let error = response.extensions().get::<Arc<Error>>().map(Arc::as_ref);
    if let Some(error) = error {
        if response.status().is_server_error() {
            tracing::error!("{:?}", error);
        } else {
            tracing::debug!("{:?}", error);
        }
    }

    response
}

mod response {
    use super::*;

    #[derive(Debug, Serialize, Deserialize, Clone, Default, JsonSchema)]
    pub struct ErrorResponse {
        pub error: String,
        pub message: Option<String>,
        pub status: u16,
    }

    impl ErrorResponse {
        pub fn new(error: impl Into<String>, status: u16) -> Self {
            Self {
                error: error.into(),
                status,
                ..Default::default()
            }
        }

        pub fn with_message(&self, message: impl Into<String>) -> Self {
            let mut res = self.clone();
            res.message = Some(message.into());
            res
        }
    }

    /// Typed responses keyed by error name
    /// ```ignore
    /// error_responses! {
    ///     not_found: 404,
    ///     unexpected: 500
    /// }
    ///
    /// impl From<&Error> for ErrorResponse {
    ///     fn from(error: &Error) -> Self {
    ///     let errors = errors(); // <- from macro
    ///     match error {
    ///         Error::NotFound(message) => errors.not_found.with_message(message),
    ///         Error::Unexpected(message) => errors.unexpected.with_message(message),
    ///     }
    /// }
    /// ```
    #[macro_export]
    macro_rules! error_responses {
        (
            $($name:ident: $code:expr),* $(,)?
        ) => {
            #[derive(Debug, Clone, Serialize)]
            struct Responses {
                $(
                    $name: ErrorResponse,
                )*
            }

            static ERRORS: OnceLock<Responses> = OnceLock::new();

            fn errors() -> &'static Responses {
                ERRORS.get_or_init(|| Responses {
                    $(
                        $name: ErrorResponse::new(stringify!($name), $code),
                    )*
                })
            }
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_errors_to_statuses() {
        assert_eq!(ErrorResponse::from(&Error::NotFound("Note not found".into())).status, 404);
        assert_eq!(ErrorResponse::from(&Error::validation("bad")).status, 400);
        assert_eq!(ErrorResponse::from(&Error::Upstream("quota exceeded".into())).status, 500);
        assert_eq!(ErrorResponse::from(&Error::Unexpected("boom".into())).status, 500);
    }

    #[test]
    fn payload_too_large_is_413() {
        let errors = errors();

        assert_eq!(errors.payload_too_large.status, 413);
        assert_eq!(errors.payload_too_large.error, "payload_too_large");
    }

    #[test]
    fn upstream_message_is_passed_through() {
        let res = ErrorResponse::from(&Error::Upstream("quota exceeded".into()));

        assert_eq!(res.error, "upstream");
        assert_eq!(res.message.as_deref(), Some("quota exceeded"));
    }

    #[test]
    fn storage_errors_are_not_leaked() {
        let error = Error::from(crate::db::Error::Rusqlite(crate::db::rusqlite::Error::InvalidQuery));
        let res = ErrorResponse::from(&error);

        assert_eq!(res.status, 500);
        assert_eq!(res.message.as_deref(), Some("Unexpected"));
    }

    #[test]
    fn no_rows_becomes_not_found() {
        let error = Error::from(crate::db::rusqlite::Error::QueryReturnedNoRows);

        assert!(matches!(error, Error::NotFound(_)));
    }
}
