//! The service layer proper: flat retrieval, nested retrieval and the
//! comment lifecycle. Moderation actions live in `moderation`.

use std::sync::Arc;

use anyhow::Context;
use komento_api::{
    build_tree, filter_comment,
    store::{
        CommentPatch, CommentSelect, CommentStore, NewCommentRecord, NewReportRecord, Populate,
        ReportStore, Sort,
    },
    Comment, CommentId, CommentNode, CommentUpdate, ListQuery, NewComment, NewReport, Page,
    RelatedRef, Report,
};

use crate::{badwords::ContentChecker, Error};

const DEFAULT_PAGE_SIZE: u64 = 10;

#[derive(Clone)]
pub struct Service {
    comments: Arc<dyn CommentStore>,
    reports: Arc<dyn ReportStore>,
    checker: Arc<dyn ContentChecker>,
}

impl Service {
    pub fn new(
        comments: Arc<dyn CommentStore>,
        reports: Arc<dyn ReportStore>,
        checker: Arc<dyn ContentChecker>,
    ) -> Service {
        Service {
            comments,
            reports,
            checker,
        }
    }

    pub(crate) fn comments(&self) -> &dyn CommentStore {
        &*self.comments
    }

    pub(crate) fn reports(&self) -> &dyn ReportStore {
        &*self.reports
    }

    /// Paginated, searchable listing across all comments regardless of
    /// related target. Sorted by creation time descending when paginated,
    /// unless the caller overrides the sort.
    pub async fn find_all(&self, query: ListQuery) -> Result<Page<Comment>, Error> {
        let paginated = query.is_paginated();
        let (start, limit) = (
            query.start.unwrap_or(0),
            query.limit.unwrap_or(DEFAULT_PAGE_SIZE).max(1),
        );
        let sel = CommentSelect {
            sort: query.sort.or(paginated.then_some(Sort::CreatedAtDesc)),
            offset: paginated.then_some(start),
            limit: paginated.then_some(limit),
            populate: Populate {
                author: true,
                reports: true,
                thread_of: false,
            },
            ..Default::default()
        };
        let items = match &query.query {
            Some(text) => self
                .comments
                .search(text, sel)
                .await
                .context("searching comments")?,
            None => self.comments.find(sel).await.context("listing comments")?,
        };
        let total = match (paginated, &query.query) {
            (false, _) => items.len() as u64,
            (true, Some(text)) => self
                .comments
                .count_search(text, CommentSelect::default())
                .await
                .context("counting search results")?,
            (true, None) => self
                .comments
                .count(CommentSelect::default())
                .await
                .context("counting comments")?,
        };
        Ok(Page {
            items: items.into_iter().map(filter_comment).collect(),
            total,
            page: paginated.then_some(start / limit),
        })
    }

    /// Every comment scoped to one related target (or all of them), as a
    /// flat list. No pagination.
    pub async fn find_all_flat(&self, relation: Option<&str>) -> Result<Vec<Comment>, Error> {
        let sel = CommentSelect::for_relation(relation).populated(Populate {
            author: true,
            reports: true,
            thread_of: false,
        });
        let comments = self
            .comments
            .find(sel)
            .await
            .with_context(|| format!("listing comments for relation {relation:?}"))?;
        Ok(comments.into_iter().map(filter_comment).collect())
    }

    /// Flat fetch, then thread reconstruction.
    pub async fn find_all_in_hierarchy(
        &self,
        relation: Option<&str>,
        starting_from: Option<CommentId>,
        drop_blocked_threads: bool,
    ) -> Result<Vec<CommentNode>, Error> {
        let flat = self.find_all_flat(relation).await?;
        Ok(build_tree(&flat, starting_from, drop_blocked_threads))
    }

    /// Single comment by id, additionally scoped by relation when one is
    /// supplied; an id/relation mismatch is simply not found.
    pub async fn find_one(
        &self,
        id: CommentId,
        relation: Option<&str>,
    ) -> Result<Option<Comment>, Error> {
        let sel = CommentSelect {
            related_slug: relation.map(String::from),
            ..CommentSelect::by_id(id)
        }
        .populated(Populate::all());
        let comment = self
            .comments
            .find_one(sel)
            .await
            .with_context(|| format!("fetching comment {id:?}"))?;
        Ok(comment.map(filter_comment))
    }

    pub async fn create(&self, relation: &str, data: NewComment) -> Result<Comment, Error> {
        let (related, related_slug) = self.resolve_related(relation, &data.related)?;
        if let Some(parent) = data.thread_of {
            let sel = CommentSelect {
                related_slug: Some(related_slug.clone()),
                ..CommentSelect::by_id(parent)
            };
            self.comments
                .find_one(sel)
                .await
                .with_context(|| format!("resolving thread parent {parent:?}"))?
                .ok_or_else(|| Error::thread_not_found(parent))?;
        }
        self.check_content(&data.content)?;
        let created = self
            .comments
            .create(NewCommentRecord {
                content: data.content,
                author: data.author,
                related,
                related_slug,
                thread_of: data.thread_of,
            })
            .await
            .context("creating comment")?;
        Ok(filter_comment(created))
    }

    /// Only `content` is mutable. Every supplied field must match the stored
    /// entity, so a stale caller view loses with a conflict instead of
    /// clobbering someone else's edit.
    pub async fn update(
        &self,
        id: CommentId,
        relation: &str,
        data: CommentUpdate,
    ) -> Result<Comment, Error> {
        let existing = self.require(id, relation).await?;
        let content = data
            .content
            .ok_or_else(|| Error::action_not_allowed("update carries no content"))?;
        if let Some(author) = data.author {
            if existing.author.as_ref().map(|a| a.id) != Some(author) {
                return Err(Error::action_not_allowed("author does not match"));
            }
        }
        if let Some(parent) = data.thread_of {
            if existing.parent_id() != Some(parent) {
                return Err(Error::action_not_allowed("thread parent does not match"));
            }
        }
        self.check_content(&content)
            .map_err(|_| Error::action_not_allowed("content was rejected"))?;
        let updated = self
            .comments
            .update(
                id,
                CommentPatch {
                    content: Some(content),
                    ..Default::default()
                },
            )
            .await
            .with_context(|| format!("updating comment {id:?}"))?;
        Ok(filter_comment(updated))
    }

    /// Unconditional +1; missing points count as zero. No dedup at this
    /// layer.
    pub async fn points_up(&self, id: CommentId, relation: &str) -> Result<Comment, Error> {
        let existing = self.require(id, relation).await?;
        let updated = self
            .comments
            .update(
                id,
                CommentPatch {
                    points: Some(existing.points + 1),
                    ..Default::default()
                },
            )
            .await
            .with_context(|| format!("upvoting comment {id:?}"))?;
        Ok(filter_comment(updated))
    }

    pub async fn report_abuse(
        &self,
        id: CommentId,
        relation: &str,
        data: NewReport,
    ) -> Result<Report, Error> {
        self.require(id, relation).await?;
        let report = self
            .reports
            .create(NewReportRecord {
                related: id,
                reason: data.reason,
                content: data.content,
            })
            .await
            .with_context(|| format!("reporting comment {id:?}"))?;
        Ok(report)
    }

    /// Existence gate shared by the conflict-on-absent operations.
    pub(crate) async fn require(&self, id: CommentId, relation: &str) -> Result<Comment, Error> {
        let sel = CommentSelect {
            related_slug: Some(String::from(relation)),
            ..CommentSelect::by_id(id)
        }
        .populated(Populate::all());
        self.comments
            .find_one(sel)
            .await
            .with_context(|| format!("fetching comment {id:?}"))?
            .ok_or_else(|| Error::action_not_allowed("comment does not exist"))
    }

    /// Flattens the supplied related references to exactly one, or falls
    /// back to the relation string itself. Multi-target comments are
    /// rejected.
    fn resolve_related(
        &self,
        relation: &str,
        related: &[RelatedRef],
    ) -> Result<(Vec<RelatedRef>, String), Error> {
        match related {
            [] => {
                let fallback = RelatedRef::parse(relation)?;
                let slug = fallback.slug();
                Ok((vec![fallback], slug))
            }
            [single] => Ok((vec![single.clone()], single.slug())),
            _ => Err(Error::invalid_relation(format!(
                "{} related entities supplied, exactly one is required",
                related.len()
            ))),
        }
    }

    fn check_content(&self, content: &str) -> Result<(), Error> {
        komento_api::validate_content(content)?;
        if !self.checker.is_clean(content) {
            return Err(Error::invalid_content("content contains forbidden words"));
        }
        Ok(())
    }
}
