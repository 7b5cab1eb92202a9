use std::collections::{HashMap, HashSet};

use anyhow::Context;
use async_trait::async_trait;
use komento_api::{
    store::{
        CommentPatch, CommentSelect, CommentStore, NewCommentRecord, NewReportRecord, ReportStore,
    },
    Author, Comment, CommentId, RelatedRef, Report, ReportId, Thread, Time, UserId, Uuid,
};
use sqlx::{postgres::PgRow, Row};

use crate::query::{self, Bind};

const COMMENT_COLS: &str = "c.id, c.content, c.author_id, c.author_name, c.author_email, \
     c.author_avatar, c.related, c.related_slug, c.thread_of, c.blocked, c.blocked_thread, \
     c.points, c.created_at, c.updated_at";

const REPORT_COLS: &str = "r.id, r.related, r.resolved, r.reason, r.content, r.created_at";

#[derive(Clone)]
pub struct PgStore {
    pool: sqlx::PgPool,
}

impl PgStore {
    pub fn new(pool: sqlx::PgPool) -> PgStore {
        PgStore { pool }
    }

    async fn fetch(
        &self,
        sel: &CommentSelect,
        text: Option<&str>,
    ) -> anyhow::Result<Vec<Comment>> {
        let q = query::to_postgres(sel, text);
        let sql = format!(
            "SELECT {COMMENT_COLS} FROM comments c WHERE {}{}",
            q.where_clause, q.tail
        );
        let rows = bind_all(sqlx::query(&sql), &q.binds)
            .fetch_all(&self.pool)
            .await
            .context("querying comments table")?;
        let mut comments = rows
            .iter()
            .map(comment_from_row)
            .collect::<anyhow::Result<Vec<_>>>()?;
        if !sel.populate.author {
            for c in &mut comments {
                c.author = None;
            }
        }
        if sel.populate.reports {
            self.attach_reports(&mut comments).await?;
        }
        if sel.populate.thread_of {
            self.attach_parents(&mut comments).await?;
        }
        Ok(comments)
    }

    async fn fetch_count(&self, sel: &CommentSelect, text: Option<&str>) -> anyhow::Result<u64> {
        let unpaged = CommentSelect {
            offset: None,
            limit: None,
            sort: None,
            ..sel.clone()
        };
        let q = query::to_postgres(&unpaged, text);
        let sql = format!("SELECT COUNT(*) FROM comments c WHERE {}", q.where_clause);
        let count: i64 = bind_all(sqlx::query(&sql), &q.binds)
            .fetch_one(&self.pool)
            .await
            .context("counting comments")?
            .try_get(0)
            .context("retrieving the count")?;
        Ok(count as u64)
    }

    async fn attach_reports(&self, comments: &mut [Comment]) -> anyhow::Result<()> {
        let ids: Vec<Uuid> = comments.iter().map(|c| c.id.0).collect();
        if ids.is_empty() {
            return Ok(());
        }
        let sql = format!(
            "SELECT {REPORT_COLS} FROM reports r WHERE r.related = ANY($1) ORDER BY r.created_at"
        );
        let rows = sqlx::query(&sql)
            .bind(ids)
            .fetch_all(&self.pool)
            .await
            .context("querying reports table")?;
        let mut by_comment: HashMap<CommentId, Vec<Report>> = HashMap::new();
        for row in &rows {
            let report = report_from_row(row)?;
            by_comment.entry(report.related).or_default().push(report);
        }
        for c in comments {
            c.reports = by_comment.remove(&c.id).unwrap_or_default();
        }
        Ok(())
    }

    /// Swaps bare parent refs for fully-populated parents (reports
    /// included), one extra round-trip for the whole batch.
    async fn attach_parents(&self, comments: &mut [Comment]) -> anyhow::Result<()> {
        let parent_ids: HashSet<Uuid> = comments.iter().filter_map(|c| c.parent_id()).map(|id| id.0).collect();
        if parent_ids.is_empty() {
            return Ok(());
        }
        let sql = format!("SELECT {COMMENT_COLS} FROM comments c WHERE c.id = ANY($1)");
        let rows = sqlx::query(&sql)
            .bind(parent_ids.into_iter().collect::<Vec<_>>())
            .fetch_all(&self.pool)
            .await
            .context("querying parent comments")?;
        let mut parents = rows
            .iter()
            .map(comment_from_row)
            .collect::<anyhow::Result<Vec<_>>>()?;
        self.attach_reports(&mut parents).await?;
        let by_id: HashMap<CommentId, Comment> =
            parents.into_iter().map(|p| (p.id, p)).collect();
        for c in comments {
            if let Some(Thread::Ref(parent)) = &c.thread_of {
                if let Some(p) = by_id.get(parent) {
                    c.thread_of = Some(Thread::Full(Box::new(p.clone())));
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl CommentStore for PgStore {
    async fn find(&self, sel: CommentSelect) -> anyhow::Result<Vec<Comment>> {
        self.fetch(&sel, None).await
    }

    async fn find_one(&self, sel: CommentSelect) -> anyhow::Result<Option<Comment>> {
        let sel = CommentSelect {
            limit: Some(1),
            ..sel
        };
        Ok(self.fetch(&sel, None).await?.into_iter().next())
    }

    async fn create(&self, data: NewCommentRecord) -> anyhow::Result<Comment> {
        let sql = format!(
            "INSERT INTO comments \
                 (content, author_id, author_name, author_email, author_avatar, \
                  related, related_slug, thread_of) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             RETURNING {}",
            COMMENT_COLS.replace("c.", "comments."),
        );
        let row = sqlx::query(&sql)
            .bind(data.content)
            .bind(data.author.as_ref().map(|a| a.id.0))
            .bind(data.author.as_ref().map(|a| a.name.clone()))
            .bind(data.author.as_ref().and_then(|a| a.email.clone()))
            .bind(data.author.as_ref().and_then(|a| a.avatar.clone()))
            .bind(sqlx::types::Json(data.related))
            .bind(data.related_slug)
            .bind(data.thread_of.map(|id| id.0))
            .fetch_one(&self.pool)
            .await
            .context("inserting comment")?;
        comment_from_row(&row)
    }

    async fn update(&self, id: CommentId, patch: CommentPatch) -> anyhow::Result<Comment> {
        let mut sets = vec![String::from("updated_at = now()")];
        let mut binds = Vec::new();
        if let Some(content) = patch.content {
            binds.push(Bind::String(content));
            sets.push(format!("content = ${}", binds.len()));
        }
        if let Some(blocked) = patch.blocked {
            binds.push(Bind::Bool(blocked));
            sets.push(format!("blocked = ${}", binds.len()));
        }
        if let Some(blocked_thread) = patch.blocked_thread {
            binds.push(Bind::Bool(blocked_thread));
            sets.push(format!("blocked_thread = ${}", binds.len()));
        }
        if let Some(points) = patch.points {
            binds.push(Bind::I64(points));
            sets.push(format!("points = ${}", binds.len()));
        }
        binds.push(Bind::Uuid(id.0));
        let sql = format!(
            "UPDATE comments SET {} WHERE id = ${} RETURNING {}",
            sets.join(", "),
            binds.len(),
            COMMENT_COLS.replace("c.", "comments."),
        );
        let row = bind_all(sqlx::query(&sql), &binds)
            .fetch_optional(&self.pool)
            .await
            .with_context(|| format!("updating comment {id:?}"))?;
        match row {
            Some(row) => comment_from_row(&row),
            None => anyhow::bail!("comment {id:?} does not exist"),
        }
    }

    async fn count(&self, sel: CommentSelect) -> anyhow::Result<u64> {
        self.fetch_count(&sel, None).await
    }

    async fn search(&self, text: &str, sel: CommentSelect) -> anyhow::Result<Vec<Comment>> {
        self.fetch(&sel, Some(text)).await
    }

    async fn count_search(&self, text: &str, sel: CommentSelect) -> anyhow::Result<u64> {
        self.fetch_count(&sel, Some(text)).await
    }
}

#[async_trait]
impl ReportStore for PgStore {
    async fn create(&self, data: NewReportRecord) -> anyhow::Result<Report> {
        let sql = format!(
            "INSERT INTO reports (related, reason, content) VALUES ($1, $2, $3) RETURNING {}",
            REPORT_COLS.replace("r.", "reports."),
        );
        let row = sqlx::query(&sql)
            .bind(data.related.0)
            .bind(data.reason)
            .bind(data.content)
            .fetch_one(&self.pool)
            .await
            .context("inserting report")?;
        report_from_row(&row)
    }

    async fn resolve(
        &self,
        id: ReportId,
        related: CommentId,
    ) -> anyhow::Result<Option<Report>> {
        let sql = format!(
            "UPDATE reports SET resolved = true WHERE id = $1 AND related = $2 RETURNING {}",
            REPORT_COLS.replace("r.", "reports."),
        );
        let row = sqlx::query(&sql)
            .bind(id.0)
            .bind(related.0)
            .fetch_optional(&self.pool)
            .await
            .with_context(|| format!("resolving report {id:?}"))?;
        row.as_ref().map(report_from_row).transpose()
    }
}

fn bind_all<'q>(
    mut query: sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments>,
    binds: &[Bind],
) -> sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments> {
    for b in binds {
        query = match b {
            Bind::Bool(v) => query.bind(*v),
            Bind::Uuid(v) => query.bind(*v),
            Bind::String(v) => query.bind(v.clone()),
            Bind::I64(v) => query.bind(*v),
        };
    }
    query
}

fn comment_from_row(row: &PgRow) -> anyhow::Result<Comment> {
    let author = match row
        .try_get::<Option<Uuid>, _>("author_id")
        .context("retrieving the author_id field")?
    {
        None => None,
        Some(id) => Some(Author {
            id: UserId(id),
            name: row
                .try_get::<Option<String>, _>("author_name")
                .context("retrieving the author_name field")?
                .unwrap_or_default(),
            email: row
                .try_get("author_email")
                .context("retrieving the author_email field")?,
            avatar: row
                .try_get("author_avatar")
                .context("retrieving the author_avatar field")?,
        }),
    };
    let related: sqlx::types::Json<Vec<RelatedRef>> = row
        .try_get("related")
        .context("retrieving the related field")?;
    Ok(Comment {
        id: CommentId(row.try_get("id").context("retrieving the id field")?),
        content: row
            .try_get("content")
            .context("retrieving the content field")?,
        author,
        related: related.0,
        related_slug: row
            .try_get("related_slug")
            .context("retrieving the related_slug field")?,
        thread_of: row
            .try_get::<Option<Uuid>, _>("thread_of")
            .context("retrieving the thread_of field")?
            .map(|id| Thread::Ref(CommentId(id))),
        blocked: row
            .try_get("blocked")
            .context("retrieving the blocked field")?,
        blocked_thread: row
            .try_get("blocked_thread")
            .context("retrieving the blocked_thread field")?,
        points: row
            .try_get("points")
            .context("retrieving the points field")?,
        reports: Vec::new(),
        created_at: row
            .try_get::<Time, _>("created_at")
            .context("retrieving the created_at field")?,
        updated_at: row
            .try_get("updated_at")
            .context("retrieving the updated_at field")?,
    })
}

fn report_from_row(row: &PgRow) -> anyhow::Result<Report> {
    Ok(Report {
        id: ReportId(row.try_get("id").context("retrieving the id field")?),
        related: CommentId(
            row.try_get("related")
                .context("retrieving the related field")?,
        ),
        resolved: row
            .try_get("resolved")
            .context("retrieving the resolved field")?,
        reason: row
            .try_get("reason")
            .context("retrieving the reason field")?,
        content: row
            .try_get("content")
            .context("retrieving the content field")?,
        created_at: row
            .try_get("created_at")
            .context("retrieving the created_at field")?,
    })
}
