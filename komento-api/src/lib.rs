use chrono::Utc;

pub use uuid::{uuid, Uuid};
pub type Time = chrono::DateTime<Utc>;

pub const STUB_UUID: Uuid = uuid!("ffffffff-ffff-ffff-ffff-ffffffffffff");

mod error;
mod filter;
pub mod store;
pub mod tree;

pub use error::Error;
pub use filter::filter_comment;
pub use tree::{build_tree, CommentNode};

#[derive(
    Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, serde::Deserialize, serde::Serialize,
)]
pub struct CommentId(pub Uuid);

impl CommentId {
    pub fn stub() -> CommentId {
        CommentId(STUB_UUID)
    }
}

impl std::fmt::Display for CommentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(
    Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, serde::Deserialize, serde::Serialize,
)]
pub struct ReportId(pub Uuid);

impl ReportId {
    pub fn stub() -> ReportId {
        ReportId(STUB_UUID)
    }
}

#[derive(
    Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, serde::Deserialize, serde::Serialize,
)]
pub struct UserId(pub Uuid);

impl UserId {
    pub fn stub() -> UserId {
        UserId(STUB_UUID)
    }
}

#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Author {
    pub id: UserId,
    pub name: String,

    /// Contact address, kept for moderation followups. Never serialized to
    /// regular API consumers, see `filter_comment`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

/// Polymorphic reference to the content entity a comment is attached to.
#[derive(Clone, Debug, Eq, Hash, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct RelatedRef {
    pub content_type: String,
    pub ref_id: String,
}

impl RelatedRef {
    /// The scoping key used by flat retrieval, `"{content_type}:{ref_id}"`.
    pub fn slug(&self) -> String {
        format!("{}:{}", self.content_type, self.ref_id)
    }

    pub fn parse(relation: &str) -> Result<RelatedRef, Error> {
        match relation.split_once(':') {
            Some((content_type, ref_id)) if !content_type.is_empty() && !ref_id.is_empty() => {
                Ok(RelatedRef {
                    content_type: String::from(content_type),
                    ref_id: String::from(ref_id),
                })
            }
            _ => Err(Error::InvalidRelation(String::from(relation))),
        }
    }
}

/// Weak pointer to a parent comment. Storage usually hands back the bare id;
/// single-comment lookups populate the full parent so moderators get context
/// in one round-trip.
#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(untagged)]
pub enum Thread {
    Ref(CommentId),
    Full(Box<Comment>),
}

impl Thread {
    pub fn id(&self) -> CommentId {
        match self {
            Thread::Ref(id) => *id,
            Thread::Full(c) => c.id,
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Comment {
    pub id: CommentId,
    pub content: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<Author>,

    #[serde(default)]
    pub related: Vec<RelatedRef>,

    /// Immutable after creation; the sole scoping key for flat retrieval.
    pub related_slug: String,

    /// None means root-level. The pointers form a forest; consumers guard
    /// against malformed cyclic data themselves (see `tree`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_of: Option<Thread>,

    #[serde(default)]
    pub blocked: bool,

    #[serde(default)]
    pub blocked_thread: bool,

    #[serde(default)]
    pub points: i64,

    #[serde(default)]
    pub reports: Vec<Report>,

    pub created_at: Time,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<Time>,
}

impl Comment {
    pub fn parent_id(&self) -> Option<CommentId> {
        self.thread_of.as_ref().map(|t| t.id())
    }
}

#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Report {
    pub id: ReportId,

    /// The reported comment.
    pub related: CommentId,

    pub resolved: bool,

    pub reason: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    pub created_at: Time,
}

#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct NewComment {
    pub content: String,

    #[serde(default)]
    pub related: Vec<RelatedRef>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_of: Option<CommentId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<Author>,
}

/// Only `content` is mutable. The other fields are the caller's echo of the
/// entity it thinks it is editing; a mismatch with stored data rejects the
/// update.
#[derive(Clone, Debug, Default, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct CommentUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<UserId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_of: Option<CommentId>,
}

#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct NewReport {
    pub reason: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,

    /// start / limit; only meaningful when the caller asked for pagination.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u64>,
}

#[derive(Clone, Debug, Default, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct ListQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,

    /// Full-text search phrase.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<store::Sort>,
}

impl ListQuery {
    pub fn is_paginated(&self) -> bool {
        self.start.is_some() || self.limit.is_some()
    }
}

pub fn validate_content(content: &str) -> Result<(), Error> {
    if content.trim().is_empty() {
        return Err(Error::InvalidContent(String::from("content is empty")));
    }
    if content.contains('\0') {
        return Err(Error::InvalidContent(String::from(
            "null byte in content is not allowed",
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn related_ref_slug_round_trips() {
        let r = RelatedRef {
            content_type: String::from("api::article.article"),
            ref_id: String::from("42"),
        };
        assert_eq!(r.slug(), "api::article.article:42");
        assert_eq!(RelatedRef::parse(&r.slug()).unwrap(), r);
    }

    #[test]
    fn malformed_relations_are_rejected() {
        for bad in ["", "article", ":1", "article:"] {
            assert_eq!(
                RelatedRef::parse(bad),
                Err(Error::InvalidRelation(String::from(bad)))
            );
        }
    }

    #[test]
    fn empty_and_null_content_is_invalid() {
        assert!(validate_content("hello").is_ok());
        assert!(validate_content("").is_err());
        assert!(validate_content("   \n").is_err());
        assert!(validate_content("he\0llo").is_err());
    }
}
