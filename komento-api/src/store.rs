//! The storage capability consumed by the service. Implementations live
//! outside this crate (Postgres in the server, in-memory in the mock store);
//! handles are resolved once at startup and injected, never looked up per
//! call.

use async_trait::async_trait;

use crate::{Author, Comment, CommentId, RelatedRef, Report, ReportId};

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Sort {
    #[default]
    CreatedAtDesc,
    CreatedAtAsc,
}

/// Which relations to populate on returned comments.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Populate {
    pub author: bool,
    pub reports: bool,
    pub thread_of: bool,
}

impl Populate {
    pub fn all() -> Populate {
        Populate {
            author: true,
            reports: true,
            thread_of: true,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum ThreadSelect {
    /// Do not filter on the parent pointer.
    #[default]
    Unfiltered,
    /// Top-level comments only.
    Root,
    /// Direct children of one comment.
    Of(CommentId),
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct CommentSelect {
    pub id: Option<CommentId>,
    pub related_slug: Option<String>,
    pub thread_of: ThreadSelect,
    pub offset: Option<u64>,
    pub limit: Option<u64>,
    pub sort: Option<Sort>,
    pub populate: Populate,
}

impl CommentSelect {
    pub fn by_id(id: CommentId) -> CommentSelect {
        CommentSelect {
            id: Some(id),
            ..Default::default()
        }
    }

    pub fn for_relation(slug: Option<&str>) -> CommentSelect {
        CommentSelect {
            related_slug: slug.map(String::from),
            ..Default::default()
        }
    }

    pub fn children_of(parent: CommentId) -> CommentSelect {
        CommentSelect {
            thread_of: ThreadSelect::Of(parent),
            ..Default::default()
        }
    }

    pub fn populated(mut self, populate: Populate) -> CommentSelect {
        self.populate = populate;
        self
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct NewCommentRecord {
    pub content: String,
    pub author: Option<Author>,
    pub related: Vec<RelatedRef>,
    pub related_slug: String,
    pub thread_of: Option<CommentId>,
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct CommentPatch {
    pub content: Option<String>,
    pub blocked: Option<bool>,
    pub blocked_thread: Option<bool>,
    pub points: Option<i64>,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct NewReportRecord {
    pub related: CommentId,
    pub reason: String,
    pub content: Option<String>,
}

/// Absent entities come back as `Ok(None)` or an empty vec; only transport
/// and storage faults are errors.
#[async_trait]
pub trait CommentStore: Send + Sync {
    async fn find(&self, sel: CommentSelect) -> anyhow::Result<Vec<Comment>>;
    async fn find_one(&self, sel: CommentSelect) -> anyhow::Result<Option<Comment>>;
    async fn create(&self, data: NewCommentRecord) -> anyhow::Result<Comment>;
    async fn update(&self, id: CommentId, patch: CommentPatch) -> anyhow::Result<Comment>;
    async fn count(&self, sel: CommentSelect) -> anyhow::Result<u64>;

    /// Full-text variants of `find`/`count`.
    async fn search(&self, text: &str, sel: CommentSelect) -> anyhow::Result<Vec<Comment>>;
    async fn count_search(&self, text: &str, sel: CommentSelect) -> anyhow::Result<u64>;
}

#[async_trait]
pub trait ReportStore: Send + Sync {
    async fn create(&self, data: NewReportRecord) -> anyhow::Result<Report>;

    /// Flips `resolved` on the report matching both ids. `None` when no such
    /// report exists.
    async fn resolve(&self, id: ReportId, related: CommentId)
        -> anyhow::Result<Option<Report>>;
}
