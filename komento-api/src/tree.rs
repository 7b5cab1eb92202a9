//! Reconstruction of the nested comment hierarchy from the flat,
//! parent-pointer storage model.

use std::collections::{HashMap, HashSet};

use crate::{Comment, CommentId};

#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct CommentNode {
    #[serde(flatten)]
    pub comment: Comment,
    pub children: Vec<CommentNode>,
}

impl CommentNode {
    /// Number of comments in this subtree, the node itself included.
    pub fn len(&self) -> usize {
        1 + self.children.iter().map(CommentNode::len).sum::<usize>()
    }
}

/// Builds the nested hierarchy out of a flat comment sequence.
///
/// Roots are the comments whose parent pointer equals `starting_from`
/// (`None` selects top-level comments); children are attached depth-first,
/// keeping the input order among siblings. Comments whose parent is absent
/// from `comments` are unreachable and do not appear in the output.
///
/// With `drop_blocked_threads`, a comment with `blocked_thread` set is still
/// emitted (moderators need to see it) but its descendants are pruned.
///
/// The pointers are expected to form a forest; a visited set keeps malformed
/// cyclic data from recursing forever, and a revisit is reported as a
/// data-integrity problem rather than silently walked again.
pub fn build_tree(
    comments: &[Comment],
    starting_from: Option<CommentId>,
    drop_blocked_threads: bool,
) -> Vec<CommentNode> {
    let mut by_parent: HashMap<Option<CommentId>, Vec<&Comment>> = HashMap::new();
    for c in comments {
        by_parent.entry(c.parent_id()).or_default().push(c);
    }
    let mut visited = HashSet::with_capacity(comments.len());
    attach(&by_parent, starting_from, drop_blocked_threads, &mut visited)
}

fn attach(
    by_parent: &HashMap<Option<CommentId>, Vec<&Comment>>,
    parent: Option<CommentId>,
    drop_blocked_threads: bool,
    visited: &mut HashSet<CommentId>,
) -> Vec<CommentNode> {
    let mut nodes = Vec::new();
    let Some(children) = by_parent.get(&parent) else {
        return nodes;
    };
    for c in children {
        if !visited.insert(c.id) {
            tracing::warn!(id = ?c.id, "comment parent pointers contain a cycle");
            continue;
        }
        let children = if drop_blocked_threads && c.blocked_thread {
            Vec::new()
        } else {
            attach(by_parent, Some(c.id), drop_blocked_threads, visited)
        };
        nodes.push(CommentNode {
            comment: (*c).clone(),
            children,
        });
    }
    nodes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Thread, Time, Uuid};

    fn comment(id: CommentId, parent: Option<CommentId>) -> Comment {
        Comment {
            id,
            content: format!("comment {id:?}"),
            author: None,
            related: Vec::new(),
            related_slug: String::from("article:1"),
            thread_of: parent.map(Thread::Ref),
            blocked: false,
            blocked_thread: false,
            points: 0,
            reports: Vec::new(),
            created_at: epoch(),
            updated_at: None,
        }
    }

    fn epoch() -> Time {
        chrono::DateTime::from_utc(
            chrono::NaiveDateTime::from_timestamp_opt(0, 0).unwrap(),
            chrono::Utc,
        )
    }

    fn id() -> CommentId {
        CommentId(Uuid::new_v4())
    }

    fn total_len(nodes: &[CommentNode]) -> usize {
        nodes.iter().map(CommentNode::len).sum()
    }

    fn contains(nodes: &[CommentNode], needle: CommentId) -> bool {
        nodes
            .iter()
            .any(|n| n.comment.id == needle || contains(&n.children, needle))
    }

    #[test]
    fn every_comment_with_a_reachable_parent_lands_in_the_tree() {
        let (root_a, root_b, child, grandchild) = (id(), id(), id(), id());
        let flat = vec![
            comment(root_a, None),
            comment(root_b, None),
            comment(child, Some(root_a)),
            comment(grandchild, Some(child)),
        ];
        let tree = build_tree(&flat, None, false);
        assert_eq!(tree.len(), 2);
        assert_eq!(total_len(&tree), flat.len());
        assert_eq!(tree[0].comment.id, root_a);
        assert_eq!(tree[0].children[0].comment.id, child);
        assert_eq!(tree[0].children[0].children[0].comment.id, grandchild);
        assert!(tree[1].children.is_empty());
    }

    #[test]
    fn sibling_order_follows_input_order() {
        let root = id();
        let (first, second, third) = (id(), id(), id());
        let flat = vec![
            comment(root, None),
            comment(first, Some(root)),
            comment(second, Some(root)),
            comment(third, Some(root)),
        ];
        let tree = build_tree(&flat, None, false);
        let order: Vec<_> = tree[0].children.iter().map(|n| n.comment.id).collect();
        assert_eq!(order, vec![first, second, third]);
    }

    #[test]
    fn tree_can_be_rooted_at_any_comment() {
        let (root, child_a, child_b, grandchild) = (id(), id(), id(), id());
        let flat = vec![
            comment(root, None),
            comment(child_a, Some(root)),
            comment(child_b, Some(root)),
            comment(grandchild, Some(child_a)),
        ];
        let level = build_tree(&flat, Some(root), false);
        assert_eq!(level.len(), 2);
        assert_eq!(level[0].comment.id, child_a);
        assert_eq!(level[0].children[0].comment.id, grandchild);
    }

    #[test]
    fn orphaned_children_are_unreachable() {
        let (root, orphan) = (id(), id());
        let flat = vec![comment(root, None), comment(orphan, Some(id()))];
        let tree = build_tree(&flat, None, false);
        assert_eq!(total_len(&tree), 1);
        assert!(!contains(&tree, orphan));
    }

    #[test]
    fn blocked_threads_keep_the_node_but_lose_the_subtree() {
        let (root, child, grandchild, sibling) = (id(), id(), id(), id());
        let mut blocked = comment(child, Some(root));
        blocked.blocked_thread = true;
        let flat = vec![
            comment(root, None),
            blocked,
            comment(grandchild, Some(child)),
            comment(sibling, Some(root)),
        ];

        let tree = build_tree(&flat, None, true);
        assert!(contains(&tree, child));
        assert!(!contains(&tree, grandchild));
        assert!(contains(&tree, sibling));

        // without the flag the whole subtree is visible
        let tree = build_tree(&flat, None, false);
        assert!(contains(&tree, grandchild));
    }

    #[test]
    fn deep_nesting_is_fully_reconstructed() {
        let mut flat = vec![comment(CommentId(Uuid::new_v4()), None)];
        for _ in 0..200 {
            let parent = flat.last().unwrap().id;
            flat.push(comment(id(), Some(parent)));
        }
        let tree = build_tree(&flat, None, false);
        assert_eq!(total_len(&tree), flat.len());
        let mut depth = 0;
        let mut level = &tree;
        while !level.is_empty() {
            depth += 1;
            level = &level[0].children;
        }
        assert_eq!(depth, flat.len());
    }

    #[test]
    fn cyclic_parent_pointers_terminate() {
        let (a, b) = (id(), id());
        let flat = vec![comment(a, Some(b)), comment(b, Some(a))];
        // no root exists, so nothing is reachable; mostly this must not hang
        assert_eq!(build_tree(&flat, None, false).len(), 0);
        // rooting inside the cycle walks each node at most once
        let tree = build_tree(&flat, Some(a), false);
        assert_eq!(total_len(&tree), 2);
    }
}
