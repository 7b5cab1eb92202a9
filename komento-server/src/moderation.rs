//! Moderation actions: single-comment and whole-thread blocking, the
//! cascading propagation of thread-block state, and report resolution.

use std::collections::HashSet;

use anyhow::Context;
use async_recursion::async_recursion;
use futures::future::join_all;
use komento_api::{
    build_tree, filter_comment,
    store::{CommentPatch, CommentSelect, Populate},
    Comment, CommentId, CommentNode, Report, ReportId,
};

use crate::{service::Service, Error};

/// A moderator's view of one comment: the comment itself (parent populated
/// inline) plus the sibling list at its level of the thread.
#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct ThreadView {
    pub selected: Comment,
    pub level: Vec<CommentNode>,
}

/// What a thread-block cascade actually did. The cascade is not
/// transactional: nodes in `updated` stay updated even when siblings land in
/// `failures`.
#[derive(Clone, Debug, Default, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct CascadeOutcome {
    pub updated: Vec<CommentId>,
    pub failures: Vec<CascadeFailure>,
}

impl CascadeOutcome {
    pub fn fully_applied(&self) -> bool {
        self.failures.is_empty()
    }
}

#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct CascadeFailure {
    pub id: CommentId,
    pub reason: String,
}

/// Response of the thread-block action: the toggled root plus the cascade
/// outcome, so degraded success is visible to the caller.
#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct ThreadBlock {
    pub comment: Comment,
    pub cascade: CascadeOutcome,
}

impl Service {
    /// One comment with its parent and reports populated, plus its sibling
    /// set, for moderator context. The relation scope is derived from the
    /// comment's own first related reference.
    pub async fn find_one_and_thread(&self, id: CommentId) -> Result<ThreadView, Error> {
        let sel = CommentSelect::by_id(id).populated(Populate::all());
        let selected = self
            .comments()
            .find_one(sel)
            .await
            .with_context(|| format!("fetching comment {id:?}"))?
            .ok_or_else(|| Error::action_not_allowed("comment does not exist"))?;
        let relation = selected
            .related
            .first()
            .map(|r| r.slug())
            .unwrap_or_else(|| selected.related_slug.clone());
        let flat = self.find_all_flat(Some(&relation)).await?;
        let level = build_tree(&flat, selected.parent_id(), false);
        Ok(ThreadView {
            selected: filter_comment(selected),
            level,
        })
    }

    /// Toggles `blocked` on exactly one comment. No cascade.
    pub async fn block_comment(&self, id: CommentId) -> Result<Comment, Error> {
        let existing = self.require_any(id).await?;
        let updated = self
            .comments()
            .update(
                id,
                CommentPatch {
                    blocked: Some(!existing.blocked),
                    ..Default::default()
                },
            )
            .await
            .with_context(|| format!("toggling block on comment {id:?}"))?;
        Ok(filter_comment(updated))
    }

    /// Toggles `blocked_thread` on the comment, then propagates the new
    /// value to every descendant. Propagation is best-effort: per-node
    /// failures are collected and reported, never silently swallowed, and
    /// already-updated branches stay updated.
    pub async fn block_comment_thread(&self, id: CommentId) -> Result<ThreadBlock, Error> {
        let existing = self.require_any(id).await?;
        let block_status = !existing.blocked_thread;
        let updated = self
            .comments()
            .update(
                id,
                CommentPatch {
                    blocked_thread: Some(block_status),
                    ..Default::default()
                },
            )
            .await
            .with_context(|| format!("toggling thread block on comment {id:?}"))?;
        let mut outcome = CascadeOutcome::default();
        let mut visited = HashSet::from([id]);
        self.block_thread_nested(id, block_status, &mut visited, &mut outcome)
            .await;
        if !outcome.fully_applied() {
            tracing::warn!(
                root = ?id,
                failed = outcome.failures.len(),
                updated = outcome.updated.len(),
                "thread block cascade applied partially"
            );
        }
        Ok(ThreadBlock {
            comment: filter_comment(updated),
            cascade: outcome,
        })
    }

    /// Sets `blocked_thread = block_status` on every direct child of
    /// `parent` concurrently, then recurses into each child. Storage
    /// failures become `CascadeFailure` entries instead of aborting the
    /// sweep. The visited set turns malformed cyclic data into a reported
    /// integrity error rather than unbounded recursion.
    #[async_recursion]
    async fn block_thread_nested(
        &self,
        parent: CommentId,
        block_status: bool,
        visited: &mut HashSet<CommentId>,
        outcome: &mut CascadeOutcome,
    ) {
        let children = match self
            .comments()
            .find(CommentSelect::children_of(parent))
            .await
        {
            Ok(children) => children,
            Err(err) => {
                outcome.failures.push(CascadeFailure {
                    id: parent,
                    reason: format!("listing children: {err:#}"),
                });
                return;
            }
        };
        let mut level = Vec::new();
        for c in &children {
            if visited.insert(c.id) {
                level.push(c.id);
            } else {
                tracing::warn!(id = ?c.id, "comment parent pointers contain a cycle");
                outcome.failures.push(CascadeFailure {
                    id: c.id,
                    reason: String::from("parent pointers contain a cycle"),
                });
            }
        }
        let patches = level.iter().map(|id| {
            self.comments().update(
                *id,
                CommentPatch {
                    blocked_thread: Some(block_status),
                    ..Default::default()
                },
            )
        });
        for (id, res) in level.iter().zip(join_all(patches).await) {
            match res {
                Ok(_) => outcome.updated.push(*id),
                Err(err) => {
                    tracing::warn!(id = ?id, err = %format!("{err:#}"), "cascade update failed");
                    outcome.failures.push(CascadeFailure {
                        id: *id,
                        reason: format!("{err:#}"),
                    });
                }
            }
        }
        for id in level {
            self.block_thread_nested(id, block_status, visited, outcome)
                .await;
        }
    }

    /// Marks one report as handled, scoped by both the report and the
    /// reported comment so a mismatched pair resolves nothing.
    pub async fn resolve_abuse_report(
        &self,
        report: ReportId,
        comment: CommentId,
    ) -> Result<Report, Error> {
        self.reports()
            .resolve(report, comment)
            .await
            .with_context(|| format!("resolving report {report:?} on comment {comment:?}"))?
            .ok_or_else(|| Error::action_not_allowed("report does not exist"))
    }

    /// Like `require`, without a relation scope: moderation acts by id
    /// alone.
    async fn require_any(&self, id: CommentId) -> Result<Comment, Error> {
        self.comments()
            .find_one(CommentSelect::by_id(id))
            .await
            .with_context(|| format!("fetching comment {id:?}"))?
            .ok_or_else(|| Error::action_not_allowed("comment does not exist"))
    }
}
