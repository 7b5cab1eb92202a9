use crate::{Comment, Thread};

/// Outbound filtering applied to every comment before it leaves the service:
/// strips storage-internal author fields, drops reports a moderator already
/// resolved, and recurses into a populated parent. Pure and idempotent.
pub fn filter_comment(mut c: Comment) -> Comment {
    if let Some(author) = &mut c.author {
        author.email = None;
    }
    c.reports.retain(|r| !r.resolved);
    c.thread_of = c.thread_of.take().map(|t| match t {
        Thread::Ref(id) => Thread::Ref(id),
        Thread::Full(parent) => Thread::Full(Box::new(filter_comment(*parent))),
    });
    c
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Author, CommentId, Report, ReportId, Time, UserId, Uuid};

    fn comment(id: CommentId) -> Comment {
        Comment {
            id,
            content: String::from("hello"),
            author: Some(Author {
                id: UserId(Uuid::new_v4()),
                name: String::from("ada"),
                email: Some(String::from("ada@example.com")),
                avatar: None,
            }),
            related: Vec::new(),
            related_slug: String::from("article:1"),
            thread_of: None,
            blocked: false,
            blocked_thread: false,
            points: 0,
            reports: Vec::new(),
            created_at: epoch(),
            updated_at: None,
        }
    }

    fn epoch() -> Time {
        chrono::DateTime::from_utc(chrono::NaiveDateTime::from_timestamp_opt(0, 0).unwrap(), chrono::Utc)
    }

    fn report(related: CommentId, resolved: bool) -> Report {
        Report {
            id: ReportId(Uuid::new_v4()),
            related,
            resolved,
            reason: String::from("spam"),
            content: None,
            created_at: epoch(),
        }
    }

    #[test]
    fn resolved_reports_never_survive() {
        let id = CommentId(Uuid::new_v4());
        let mut c = comment(id);
        c.reports = vec![report(id, true), report(id, false), report(id, true)];
        let filtered = filter_comment(c);
        assert_eq!(filtered.reports.len(), 1);
        assert!(filtered.reports.iter().all(|r| !r.resolved));
    }

    #[test]
    fn author_email_is_stripped() {
        let filtered = filter_comment(comment(CommentId(Uuid::new_v4())));
        assert_eq!(filtered.author.unwrap().email, None);
    }

    #[test]
    fn filtering_recurses_into_populated_parent() {
        let parent_id = CommentId(Uuid::new_v4());
        let mut parent = comment(parent_id);
        parent.reports = vec![report(parent_id, true)];
        let mut child = comment(CommentId(Uuid::new_v4()));
        child.thread_of = Some(Thread::Full(Box::new(parent)));
        let filtered = filter_comment(child);
        match filtered.thread_of {
            Some(Thread::Full(parent)) => {
                assert!(parent.reports.is_empty());
                assert_eq!(parent.author.as_ref().unwrap().email, None);
            }
            other => panic!("parent was not kept populated: {other:?}"),
        }
    }

    #[test]
    fn filtering_is_idempotent() {
        let id = CommentId(Uuid::new_v4());
        let mut c = comment(id);
        c.reports = vec![report(id, true), report(id, false)];
        let mut parent = comment(CommentId(Uuid::new_v4()));
        parent.reports = vec![report(parent.id, true)];
        c.thread_of = Some(Thread::Full(Box::new(parent)));
        let once = filter_comment(c);
        assert_eq!(filter_comment(once.clone()), once);
    }

    #[test]
    fn bare_parent_refs_are_left_alone() {
        let parent_id = CommentId(Uuid::new_v4());
        let mut c = comment(CommentId(Uuid::new_v4()));
        c.thread_of = Some(Thread::Ref(parent_id));
        assert_eq!(filter_comment(c).thread_of, Some(Thread::Ref(parent_id)));
    }
}
