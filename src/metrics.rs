//! Derived metrics and author attachment.
//!
//! Counts are computed from the live tables at call time and never cached
//! server-side; inputs are consumed by value and never mutated in place.
//! Batch attachment is independent per post and order-preserving.

use crate::core::store::Store;
use crate::models::models::{Comment, CommentView, Post, PostView, PublicUser};

fn author_of(store: &Store, author_id: &str) -> PublicUser {
    match store.get_user(author_id) {
        Some(user) => PublicUser::from(&user),
        // Dangling author references cannot normally exist (account deletion
        // cascades), but a projection must still be produced.
        None => PublicUser {
            id: author_id.to_string(),
            username: String::new(),
            first_name: None,
            last_name: None,
        },
    }
}

/// Enriches one post: `total_comments` counted at read time, `total_likes`
/// from the like-set length, author public fields joined in.
pub fn attach_post_metrics(store: &Store, post: Post) -> PostView {
    let total_comments = store.count_comments(&post.id);
    let total_likes = post.likes.len();
    let author = author_of(store, &post.author_id);
    PostView {
        post,
        author,
        total_comments,
        total_likes,
    }
}

/// Batch form: independent per entity, order-preserving.
pub fn attach_post_metrics_batch(store: &Store, posts: Vec<Post>) -> Vec<PostView> {
    posts
        .into_iter()
        .map(|post| attach_post_metrics(store, post))
        .collect()
}

pub fn attach_comment_author(store: &Store, comment: Comment) -> CommentView {
    let author = author_of(store, &comment.author_id);
    CommentView { comment, author }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::helpers::{new_id, now_iso};
    use crate::core::store::build_user;

    fn post_by(author_id: &str, likes: Vec<String>) -> Post {
        Post {
            id: new_id(),
            author_id: author_id.to_string(),
            body: "body".into(),
            likes,
            created_at: now_iso(),
            updated_at: None,
        }
    }

    #[test]
    fn counts_match_underlying_collections() {
        let store = Store::new();
        let author = store
            .insert_user(build_user("ada", "ada@example.com", Some("Ada".into()), None))
            .unwrap();
        let post = store.insert_post(post_by(&author.id, vec!["u1".into(), "u2".into()]));

        for _ in 0..3 {
            store.insert_comment(Comment {
                id: new_id(),
                post_id: post.id.clone(),
                author_id: author.id.clone(),
                body: "a comment".into(),
                created_at: now_iso(),
                updated_at: None,
            });
        }

        let view = attach_post_metrics(&store, post);
        assert_eq!(view.total_comments, 3);
        assert_eq!(view.total_likes, 2);
        assert_eq!(view.author.username, "ada");
        assert_eq!(view.author.first_name.as_deref(), Some("Ada"));
    }

    #[test]
    fn empty_like_set_counts_zero() {
        let store = Store::new();
        let view = attach_post_metrics(&store, post_by("nobody", Vec::new()));
        assert_eq!(view.total_likes, 0);
        assert_eq!(view.total_comments, 0);
    }

    #[test]
    fn batch_is_order_preserving() {
        let store = Store::new();
        let first = post_by("a", Vec::new());
        let second = post_by("b", vec!["x".into()]);
        let ids = vec![first.id.clone(), second.id.clone()];

        let views = attach_post_metrics_batch(&store, vec![first, second]);
        assert_eq!(views[0].post.id, ids[0]);
        assert_eq!(views[1].post.id, ids[1]);
        assert_eq!(views[1].total_likes, 1);
    }
}
