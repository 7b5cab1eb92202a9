use anyhow::{anyhow, Context};
use serde_json::json;

#[derive(Debug, Eq, PartialEq, thiserror::Error)]
pub enum Error {
    #[error("Unknown error: {0}")]
    Unknown(String),

    #[error("Permission denied")]
    PermissionDenied,

    #[error("Invalid content: {0}")]
    InvalidContent(String),

    #[error("Invalid relation {0:?}")]
    InvalidRelation(String),

    #[error("Thread does not exist: {0}")]
    ThreadNotFound(crate::CommentId),

    #[error("Action not allowed: {0}")]
    ActionNotAllowed(String),
}

impl Error {
    pub fn status_code(&self) -> http::StatusCode {
        use http::StatusCode;
        match self {
            Error::Unknown(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::PermissionDenied => StatusCode::FORBIDDEN,
            Error::InvalidContent(_) => StatusCode::BAD_REQUEST,
            Error::InvalidRelation(_) => StatusCode::BAD_REQUEST,
            Error::ThreadNotFound(_) => StatusCode::BAD_REQUEST,
            Error::ActionNotAllowed(_) => StatusCode::CONFLICT,
        }
    }

    pub fn contents(&self) -> Vec<u8> {
        serde_json::to_vec(&match self {
            Error::Unknown(msg) => json!({
                "message": msg,
                "type": "unknown",
            }),
            Error::PermissionDenied => json!({
                "message": "permission denied",
                "type": "permission-denied",
            }),
            Error::InvalidContent(msg) => json!({
                "message": msg,
                "type": "invalid-content",
            }),
            Error::InvalidRelation(relation) => json!({
                "message": "relation cannot be resolved",
                "type": "invalid-relation",
                "relation": relation,
            }),
            Error::ThreadNotFound(id) => json!({
                "message": "thread does not exist",
                "type": "thread-not-found",
                "id": id,
            }),
            Error::ActionNotAllowed(msg) => json!({
                "message": msg,
                "type": "action-not-allowed",
            }),
        })
        .expect("serializing error contents")
    }

    pub fn parse(body: &[u8]) -> anyhow::Result<Error> {
        let data: serde_json::Value =
            serde_json::from_slice(body).context("parsing error contents")?;
        let message = || {
            String::from(
                data.get("message")
                    .and_then(|msg| msg.as_str())
                    .unwrap_or(""),
            )
        };
        Ok(
            match data
                .get("type")
                .and_then(|t| t.as_str())
                .ok_or_else(|| anyhow!("error type is not a string"))?
            {
                "unknown" => Error::Unknown(message()),
                "permission-denied" => Error::PermissionDenied,
                "invalid-content" => Error::InvalidContent(message()),
                "invalid-relation" => Error::InvalidRelation(String::from(
                    data.get("relation")
                        .and_then(|r| r.as_str())
                        .ok_or_else(|| anyhow!("error is a relation error without a relation"))?,
                )),
                "thread-not-found" => Error::ThreadNotFound(
                    data.get("id")
                        .cloned()
                        .map(serde_json::from_value)
                        .transpose()
                        .context("error has a malformed comment id")?
                        .ok_or_else(|| anyhow!("error is a thread error without a comment id"))?,
                ),
                "action-not-allowed" => Error::ActionNotAllowed(message()),
                _ => return Err(anyhow!("error contents has unknown type")),
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_round_trip_through_json() {
        let errors = vec![
            Error::Unknown(String::from("boom")),
            Error::PermissionDenied,
            Error::InvalidContent(String::from("content is empty")),
            Error::InvalidRelation(String::from("article")),
            Error::ThreadNotFound(crate::CommentId::stub()),
            Error::ActionNotAllowed(String::from("comment does not exist")),
        ];
        for e in errors {
            assert_eq!(e, Error::parse(&e.contents()).unwrap());
        }
    }
}
