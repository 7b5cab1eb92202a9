//! In-memory implementation of the storage capability, for tests.
//!
//! Keeps comments in insertion order (creation order), populates relations
//! the same way the Postgres store does, and can be told to fail updates on
//! chosen comments so the non-transactional moderation cascade can be
//! exercised.

use std::collections::HashSet;
use std::sync::Mutex;

use anyhow::bail;
use async_trait::async_trait;
use chrono::Utc;
use komento_api::{
    store::{
        CommentPatch, CommentSelect, CommentStore, NewCommentRecord, NewReportRecord, ReportStore,
        Sort, ThreadSelect,
    },
    Comment, CommentId, Report, ReportId, Thread, Uuid,
};

#[derive(Default)]
pub struct MockStore {
    state: Mutex<State>,
}

#[derive(Default)]
struct State {
    comments: Vec<Comment>,
    reports: Vec<Report>,
    fail_updates_on: HashSet<CommentId>,
}

impl MockStore {
    pub fn new() -> MockStore {
        MockStore::default()
    }

    /// Make every later `update` on `id` fail, as a storage fault would.
    pub fn test_fail_updates_on(&self, id: CommentId) {
        self.state.lock().unwrap().fail_updates_on.insert(id);
    }

    /// Raw stored entity, bypassing population and filtering.
    pub fn test_comment(&self, id: CommentId) -> Option<Comment> {
        self.state
            .lock()
            .unwrap()
            .comments
            .iter()
            .find(|c| c.id == id)
            .cloned()
    }

    pub fn test_report(&self, id: ReportId) -> Option<Report> {
        self.state
            .lock()
            .unwrap()
            .reports
            .iter()
            .find(|r| r.id == id)
            .cloned()
    }

    /// Seed a fully-formed comment, e.g. one that is already blocked.
    pub fn test_seed_comment(&self, c: Comment) {
        self.state.lock().unwrap().comments.push(c);
    }
}

impl State {
    fn select<'a>(&'a self, sel: &CommentSelect) -> Vec<&'a Comment> {
        let mut matches: Vec<&Comment> = self
            .comments
            .iter()
            .filter(|c| sel.id.map_or(true, |id| c.id == id))
            .filter(|c| {
                sel.related_slug
                    .as_ref()
                    .map_or(true, |slug| c.related_slug == *slug)
            })
            .filter(|c| match sel.thread_of {
                ThreadSelect::Unfiltered => true,
                ThreadSelect::Root => c.parent_id().is_none(),
                ThreadSelect::Of(parent) => c.parent_id() == Some(parent),
            })
            .collect();
        match sel.sort {
            None => (),
            Some(Sort::CreatedAtAsc) => matches.sort_by_key(|c| c.created_at),
            Some(Sort::CreatedAtDesc) => {
                matches.sort_by_key(|c| std::cmp::Reverse(c.created_at))
            }
        }
        let start = sel.offset.unwrap_or(0) as usize;
        let matches = matches.into_iter().skip(start);
        match sel.limit {
            Some(limit) => matches.take(limit as usize).collect(),
            None => matches.collect(),
        }
    }

    fn populate(&self, c: &Comment, sel: &CommentSelect) -> Comment {
        let mut c = c.clone();
        if !sel.populate.author {
            c.author = None;
        }
        if sel.populate.reports {
            c.reports = self
                .reports
                .iter()
                .filter(|r| r.related == c.id)
                .cloned()
                .collect();
        } else {
            c.reports = Vec::new();
        }
        if sel.populate.thread_of {
            if let Some(parent_id) = c.parent_id() {
                if let Some(parent) = self.comments.iter().find(|p| p.id == parent_id) {
                    let mut parent = parent.clone();
                    parent.reports = self
                        .reports
                        .iter()
                        .filter(|r| r.related == parent.id)
                        .cloned()
                        .collect();
                    c.thread_of = Some(Thread::Full(Box::new(parent)));
                }
            }
        }
        c
    }
}

#[async_trait]
impl CommentStore for MockStore {
    async fn find(&self, sel: CommentSelect) -> anyhow::Result<Vec<Comment>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .select(&sel)
            .into_iter()
            .map(|c| state.populate(c, &sel))
            .collect())
    }

    async fn find_one(&self, sel: CommentSelect) -> anyhow::Result<Option<Comment>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .select(&sel)
            .into_iter()
            .next()
            .map(|c| state.populate(c, &sel)))
    }

    async fn create(&self, data: NewCommentRecord) -> anyhow::Result<Comment> {
        let mut state = self.state.lock().unwrap();
        let c = Comment {
            id: CommentId(Uuid::new_v4()),
            content: data.content,
            author: data.author,
            related: data.related,
            related_slug: data.related_slug,
            thread_of: data.thread_of.map(Thread::Ref),
            blocked: false,
            blocked_thread: false,
            points: 0,
            reports: Vec::new(),
            created_at: Utc::now(),
            updated_at: None,
        };
        state.comments.push(c.clone());
        Ok(c)
    }

    async fn update(&self, id: CommentId, patch: CommentPatch) -> anyhow::Result<Comment> {
        let mut state = self.state.lock().unwrap();
        if state.fail_updates_on.contains(&id) {
            bail!("injected storage failure updating {id:?}");
        }
        let Some(c) = state.comments.iter_mut().find(|c| c.id == id) else {
            bail!("updating missing comment {id:?}");
        };
        if let Some(content) = patch.content {
            c.content = content;
        }
        if let Some(blocked) = patch.blocked {
            c.blocked = blocked;
        }
        if let Some(blocked_thread) = patch.blocked_thread {
            c.blocked_thread = blocked_thread;
        }
        if let Some(points) = patch.points {
            c.points = points;
        }
        c.updated_at = Some(Utc::now());
        Ok(c.clone())
    }

    async fn count(&self, sel: CommentSelect) -> anyhow::Result<u64> {
        let sel = CommentSelect {
            offset: None,
            limit: None,
            ..sel
        };
        Ok(self.state.lock().unwrap().select(&sel).len() as u64)
    }

    async fn search(&self, text: &str, sel: CommentSelect) -> anyhow::Result<Vec<Comment>> {
        let needle = text.to_lowercase();
        let state = self.state.lock().unwrap();
        let unpaged = CommentSelect {
            offset: None,
            limit: None,
            ..sel.clone()
        };
        let matches = state
            .select(&unpaged)
            .into_iter()
            .filter(|c| c.content.to_lowercase().contains(&needle))
            .skip(sel.offset.unwrap_or(0) as usize);
        let matches: Vec<&Comment> = match sel.limit {
            Some(limit) => matches.take(limit as usize).collect(),
            None => matches.collect(),
        };
        Ok(matches
            .into_iter()
            .map(|c| state.populate(c, &sel))
            .collect())
    }

    async fn count_search(&self, text: &str, sel: CommentSelect) -> anyhow::Result<u64> {
        let sel = CommentSelect {
            offset: None,
            limit: None,
            ..sel
        };
        Ok(self.search(text, sel).await?.len() as u64)
    }
}

#[async_trait]
impl ReportStore for MockStore {
    async fn create(&self, data: NewReportRecord) -> anyhow::Result<Report> {
        let mut state = self.state.lock().unwrap();
        let r = Report {
            id: ReportId(Uuid::new_v4()),
            related: data.related,
            resolved: false,
            reason: data.reason,
            content: data.content,
            created_at: Utc::now(),
        };
        state.reports.push(r.clone());
        Ok(r)
    }

    async fn resolve(
        &self,
        id: ReportId,
        related: CommentId,
    ) -> anyhow::Result<Option<Report>> {
        let mut state = self.state.lock().unwrap();
        let Some(r) = state
            .reports
            .iter_mut()
            .find(|r| r.id == id && r.related == related)
        else {
            return Ok(None);
        };
        r.resolved = true;
        Ok(Some(r.clone()))
    }
}
