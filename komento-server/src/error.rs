use komento_api::{CommentId, Error as ApiError};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),

    #[error(transparent)]
    Api(#[from] ApiError),
}

impl Error {
    pub fn permission_denied() -> Error {
        Error::Api(ApiError::PermissionDenied)
    }

    pub fn invalid_content(msg: impl Into<String>) -> Error {
        Error::Api(ApiError::InvalidContent(msg.into()))
    }

    pub fn invalid_relation(relation: impl Into<String>) -> Error {
        Error::Api(ApiError::InvalidRelation(relation.into()))
    }

    pub fn thread_not_found(id: CommentId) -> Error {
        Error::Api(ApiError::ThreadNotFound(id))
    }

    pub fn action_not_allowed(msg: impl Into<String>) -> Error {
        Error::Api(ApiError::ActionNotAllowed(msg.into()))
    }
}

impl axum::response::IntoResponse for Error {
    fn into_response(self) -> axum::response::Response {
        let err = match self {
            Error::Anyhow(err) => {
                tracing::error!(?err, "internal server error");
                #[cfg(not(test))]
                let err =
                    ApiError::Unknown(String::from("Internal server error, see logs for details"));
                #[cfg(test)]
                let err = ApiError::Unknown(format!("Internal server error: {err:?}"));
                err
            }
            Error::Api(err) => {
                tracing::info!("returning error to client: {err}");
                err
            }
        };
        (err.status_code(), err.contents()).into_response()
    }
}
