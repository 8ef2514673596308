//! Comment mutations and listing. Owner checks behave like the post ones:
//! a non-owned comment is indistinguishable from a missing one.

use serde::Serialize;

use crate::config::MAX_BODY_LENGTH;
use crate::core::errors::ApiError;
use crate::core::helpers::{new_id, now_iso, validate_id};
use crate::core::store::Store;
use crate::events::{FeedEvent, Publisher};
use crate::metrics::attach_comment_author;
use crate::models::models::{Comment, CommentView};
use crate::posts::filter_body;

#[derive(Serialize)]
pub struct CommentList {
    pub comments: Vec<CommentView>,
    #[serde(rename = "totalComments")]
    pub total_comments: usize,
}

pub fn get_comments(store: &Store, post_id: &str) -> Result<CommentList, ApiError> {
    if !validate_id(post_id) {
        return Err(ApiError::BadRequest("Invalid Post ID format.".to_string()));
    }
    if store.get_post(post_id).is_none() {
        return Err(ApiError::NotFound("Post not found.".to_string()));
    }

    let comments: Vec<CommentView> = store
        .comments_for_post(post_id)
        .into_iter()
        .map(|comment| attach_comment_author(store, comment))
        .collect();
    Ok(CommentList {
        total_comments: comments.len(),
        comments,
    })
}

pub fn create_comment(
    store: &Store,
    publisher: &Publisher,
    actor_id: &str,
    post_id: Option<&str>,
    body: Option<&str>,
) -> Result<CommentView, ApiError> {
    let mut empty_fields = Vec::new();
    if post_id.unwrap_or_default().is_empty() {
        empty_fields.push("post_id");
    }
    if body.unwrap_or_default().is_empty() {
        empty_fields.push("body");
    }
    if !empty_fields.is_empty() {
        return Err(ApiError::MissingFields(empty_fields));
    }

    let post_id = post_id.unwrap_or_default();
    let body = body.unwrap_or_default();
    if !validate_id(post_id) {
        return Err(ApiError::BadRequest("Invalid Post ID format.".to_string()));
    }
    if body.len() > MAX_BODY_LENGTH {
        return Err(ApiError::BadRequest("Comment body too long.".to_string()));
    }

    // Parent checks and insert commit as one unit: a post-deletion cascade
    // committing in between would otherwise leave an orphaned comment.
    let comment = store.transaction(|tables| {
        if !tables.users.contains_key(actor_id) {
            return Err(ApiError::Unauthorized);
        }
        if !tables.posts.contains_key(post_id) {
            return Err(ApiError::NotFound("Post not found.".to_string()));
        }
        let comment = Comment {
            id: new_id(),
            post_id: post_id.to_string(),
            author_id: actor_id.to_string(),
            body: filter_body(body),
            created_at: now_iso(),
            updated_at: None,
        };
        tables.comments.insert(comment.id.clone(), comment.clone());
        Ok(comment)
    })?;
    tracing::info!(comment = %comment.id, post = %post_id, "comment created");

    let view = attach_comment_author(store, comment);
    publisher.publish(FeedEvent::NewComment(view.clone()));
    Ok(view)
}

pub fn update_comment(
    store: &Store,
    actor_id: &str,
    comment_id: &str,
    body: Option<&str>,
) -> Result<Comment, ApiError> {
    if !validate_id(comment_id) {
        return Err(ApiError::BadRequest("Invalid ID format.".to_string()));
    }
    let body = body.unwrap_or_default();
    if body.is_empty() {
        return Err(ApiError::MissingFields(vec!["body"]));
    }
    if body.len() > MAX_BODY_LENGTH {
        return Err(ApiError::BadRequest("Comment body too long.".to_string()));
    }

    store
        .update_comment_owned(comment_id, actor_id, filter_body(body))
        .ok_or_else(|| ApiError::NotFound("Comment not found.".to_string()))
}

pub fn delete_comment(
    store: &Store,
    publisher: &Publisher,
    actor_id: &str,
    comment_id: &str,
) -> Result<Comment, ApiError> {
    if !validate_id(comment_id) {
        return Err(ApiError::BadRequest("Invalid ID format.".to_string()));
    }

    let comment = store
        .remove_comment_owned(comment_id, actor_id)
        .ok_or_else(|| ApiError::NotFound("Comment not found.".to_string()))?;

    publisher.publish(FeedEvent::DeletedComment(comment_id.to_string()));
    Ok(comment)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::store::build_user;
    use crate::posts::create_post;

    fn setup() -> (Store, Publisher, String, String) {
        let store = Store::new();
        let publisher = Publisher::new();
        let user = store
            .insert_user(build_user("ada", "ada@example.com", None, None))
            .unwrap();
        let post = create_post(&store, &publisher, &user.id, Some("a post")).unwrap();
        (store, publisher, user.id, post.post.id)
    }

    #[test]
    fn missing_fields_are_enumerated() {
        let (store, publisher, actor, _) = setup();
        let err = create_comment(&store, &publisher, &actor, None, None).unwrap_err();
        assert_eq!(err, ApiError::MissingFields(vec!["post_id", "body"]));

        let err = create_comment(&store, &publisher, &actor, Some("some-id"), None).unwrap_err();
        assert_eq!(err, ApiError::MissingFields(vec!["body"]));
    }

    #[test]
    fn comment_by_unknown_actor_is_unauthorized() {
        let (store, publisher, _, post_id) = setup();
        let err =
            create_comment(&store, &publisher, &new_id(), Some(&post_id), Some("hi")).unwrap_err();
        assert_eq!(err, ApiError::Unauthorized);
        assert_eq!(store.count_comments(&post_id), 0);
    }

    #[test]
    fn comment_on_missing_post_is_not_found() {
        let (store, publisher, actor, _) = setup();
        let err =
            create_comment(&store, &publisher, &actor, Some(&new_id()), Some("hi")).unwrap_err();
        assert_eq!(err, ApiError::NotFound("Post not found.".to_string()));
    }

    #[test]
    fn listing_is_newest_first_with_total() {
        let (store, publisher, actor, post_id) = setup();
        let first =
            create_comment(&store, &publisher, &actor, Some(&post_id), Some("first")).unwrap();
        let mut older = first.comment.clone();
        older.created_at = "2000-01-01T00:00:00+00:00".to_string();
        store.insert_comment(older);
        create_comment(&store, &publisher, &actor, Some(&post_id), Some("second")).unwrap();

        let list = get_comments(&store, &post_id).unwrap();
        assert_eq!(list.total_comments, 2);
        assert_eq!(list.comments[0].comment.body, "second");
    }

    #[test]
    fn non_owner_delete_is_not_found() {
        let (store, publisher, actor, post_id) = setup();
        let other = store
            .insert_user(build_user("bob", "bob@example.com", None, None))
            .unwrap();
        let comment =
            create_comment(&store, &publisher, &actor, Some(&post_id), Some("mine")).unwrap();

        let err =
            delete_comment(&store, &publisher, &other.id, &comment.comment.id).unwrap_err();
        assert_eq!(err, ApiError::NotFound("Comment not found.".to_string()));
        assert_eq!(store.count_comments(&post_id), 1);
    }
}
