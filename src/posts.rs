//! Post mutations and paginated feed reads.
//!
//! Mutating operations check ownership by scoping the write to the acting
//! user; a missing post and a post owned by someone else both come back as
//! `NotFound`. Events are published only after the write (and any cascade)
//! has committed.

use std::sync::OnceLock;

use ammonia::Builder;
use html_escape::encode_double_quoted_attribute;
use regex::Regex;

use crate::config::MAX_BODY_LENGTH;
use crate::core::errors::ApiError;
use crate::core::helpers::{new_id, now_iso, validate_id};
use crate::core::pagination::{clamp_paging, Page};
use crate::core::store::Store;
use crate::events::{FeedEvent, Publisher};
use crate::metrics::{attach_post_metrics, attach_post_metrics_batch};
use crate::models::models::{Post, PostView};

fn url_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r"https?://[^\s]+").expect("Regex should compile"))
}

/// Sanitizes HTML out of a body and turns bare URLs into safe links.
pub fn filter_body(body: &str) -> String {
    let clean = Builder::default()
        .link_rel(Some("noopener noreferrer"))
        .clean(body)
        .to_string();

    url_regex()
        .replace_all(&clean, |caps: &regex::Captures| {
            let url = &caps[0];
            let escaped_url = encode_double_quoted_attribute(url);
            format!(r#"<a href="{}" target="_blank">{}</a>"#, escaped_url, url)
        })
        .to_string()
}

fn validated_body(body: Option<&str>) -> Result<String, ApiError> {
    let body = body.unwrap_or_default();
    if body.is_empty() {
        return Err(ApiError::MissingFields(vec!["body"]));
    }
    if body.len() > MAX_BODY_LENGTH {
        return Err(ApiError::BadRequest("Post body too long.".to_string()));
    }
    Ok(filter_body(body))
}

pub fn create_post(
    store: &Store,
    publisher: &Publisher,
    actor_id: &str,
    body: Option<&str>,
) -> Result<PostView, ApiError> {
    let body = validated_body(body)?;

    // Author check and insert commit as one unit: a racing account
    // deletion cannot leave a post referencing a removed user.
    let post = store.transaction(|tables| {
        if !tables.users.contains_key(actor_id) {
            return Err(ApiError::Unauthorized);
        }
        let post = Post {
            id: new_id(),
            author_id: actor_id.to_string(),
            body,
            likes: Vec::new(),
            created_at: now_iso(),
            updated_at: None,
        };
        tables.posts.insert(post.id.clone(), post.clone());
        Ok(post)
    })?;
    tracing::info!(post = %post.id, author = %actor_id, "post created");

    let view = attach_post_metrics(store, post);
    publisher.publish(FeedEvent::NewPost(view.clone()));
    Ok(view)
}

pub fn update_post(
    store: &Store,
    publisher: &Publisher,
    actor_id: &str,
    post_id: &str,
    body: Option<&str>,
) -> Result<PostView, ApiError> {
    if !validate_id(post_id) {
        return Err(ApiError::BadRequest("Invalid ID format.".to_string()));
    }
    let body = validated_body(body)?;

    let post = store
        .update_post_owned(post_id, actor_id, body)
        .ok_or_else(|| ApiError::NotFound("Post not found.".to_string()))?;

    let view = attach_post_metrics(store, post);
    publisher.publish(FeedEvent::UpdatedPost(view.clone()));
    Ok(view)
}

/// Deletes a post and every comment referencing it as one atomic unit. If
/// the owner-scoped lookup misses, the unit aborts and no comment is
/// touched.
pub fn delete_post(
    store: &Store,
    publisher: &Publisher,
    actor_id: &str,
    post_id: &str,
) -> Result<Post, ApiError> {
    if !validate_id(post_id) {
        return Err(ApiError::BadRequest("Invalid ID format.".to_string()));
    }

    let post = store.transaction(|tables| -> Result<Post, ApiError> {
        let post = tables
            .remove_post_owned(post_id, actor_id)
            .ok_or_else(|| ApiError::NotFound("Post not found.".to_string()))?;
        let removed = tables.remove_comments_for_post(post_id);
        tracing::info!(post = %post_id, comments = removed, "post deleted with cascade");
        Ok(post)
    })?;

    publisher.publish(FeedEvent::DeletedPost(post_id.to_string()));
    Ok(post)
}

/// Flips the actor's membership in the like-set. The flip itself happens
/// inside the store, so concurrent toggles by different users never lose
/// updates.
pub fn toggle_like(
    store: &Store,
    publisher: &Publisher,
    actor_id: &str,
    post_id: &str,
) -> Result<PostView, ApiError> {
    if !validate_id(post_id) {
        return Err(ApiError::BadRequest("Invalid ID format.".to_string()));
    }

    let post = store
        .toggle_like(post_id, actor_id)
        .ok_or_else(|| ApiError::NotFound("Post not found.".to_string()))?;

    let view = attach_post_metrics(store, post);
    publisher.publish(FeedEvent::UpdatedPost(view.clone()));
    Ok(view)
}

// === Reads ===

pub fn get_post(store: &Store, post_id: &str) -> Result<PostView, ApiError> {
    if !validate_id(post_id) {
        return Err(ApiError::BadRequest("Invalid ID format.".to_string()));
    }
    let post = store
        .get_post(post_id)
        .ok_or_else(|| ApiError::NotFound("Post not found.".to_string()))?;
    Ok(attach_post_metrics(store, post))
}

/// Global feed, newest first.
pub fn get_posts(store: &Store, page: usize, limit: usize) -> Page<PostView> {
    let (page, limit) = clamp_paging(page, limit);
    let skip = (page - 1) * limit;
    let (posts, total) = store.posts_page(None, skip, limit);
    Page::new(attach_post_metrics_batch(store, posts), page, limit, total)
}

/// Profile feed: one user's posts, newest first.
pub fn get_users_posts(
    store: &Store,
    username: &str,
    page: usize,
    limit: usize,
) -> Result<Page<PostView>, ApiError> {
    let (page, limit) = clamp_paging(page, limit);
    let user = store
        .find_user_by_username(username)
        .ok_or_else(|| ApiError::NotFound("User not found.".to_string()))?;

    let skip = (page - 1) * limit;
    let authors = vec![user.id];
    let (posts, total) = store.posts_page(Some(&authors), skip, limit);
    Ok(Page::new(
        attach_post_metrics_batch(store, posts),
        page,
        limit,
        total,
    ))
}

/// Following feed: posts authored by users the viewer follows, plus the
/// viewer's own.
pub fn get_following_posts(
    store: &Store,
    actor_id: &str,
    page: usize,
    limit: usize,
) -> Page<PostView> {
    let (page, limit) = clamp_paging(page, limit);
    let mut authors: Vec<String> = store
        .following_of(actor_id)
        .into_iter()
        .map(|edge| edge.following_id)
        .collect();
    authors.push(actor_id.to_string());

    let skip = (page - 1) * limit;
    let (posts, total) = store.posts_page(Some(&authors), skip, limit);
    Page::new(attach_post_metrics_batch(store, posts), page, limit, total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::store::build_user;

    fn setup() -> (Store, Publisher, String) {
        let store = Store::new();
        let publisher = Publisher::new();
        let user = store
            .insert_user(build_user("ada", "ada@example.com", None, None))
            .unwrap();
        (store, publisher, user.id)
    }

    #[test]
    fn create_requires_a_body() {
        let (store, publisher, actor) = setup();
        let err = create_post(&store, &publisher, &actor, None).unwrap_err();
        assert_eq!(err, ApiError::MissingFields(vec!["body"]));

        let err = create_post(&store, &publisher, &actor, Some("")).unwrap_err();
        assert_eq!(err, ApiError::MissingFields(vec!["body"]));
    }

    #[test]
    fn create_by_unknown_actor_is_unauthorized() {
        let (store, publisher, _) = setup();
        let err = create_post(&store, &publisher, &new_id(), Some("ghost author")).unwrap_err();
        assert_eq!(err, ApiError::Unauthorized);
        let (_, total) = store.posts_page(None, 0, 10);
        assert_eq!(total, 0);
    }

    #[test]
    fn page_and_limit_are_clamped_to_the_contract() {
        let (store, publisher, actor) = setup();
        create_post(&store, &publisher, &actor, Some("only post")).unwrap();

        let page = get_posts(&store, 0, 0);
        assert_eq!(page.current_page, 1);
        assert_eq!(page.posts.len(), 1);
        assert_eq!(page.pages, 1);
    }

    #[test]
    fn create_rejects_oversized_body() {
        let (store, publisher, actor) = setup();
        let long = "a".repeat(MAX_BODY_LENGTH + 1);
        let err = create_post(&store, &publisher, &actor, Some(&long)).unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
    }

    #[test]
    fn update_by_non_owner_reads_as_not_found() {
        let (store, publisher, actor) = setup();
        let other = store
            .insert_user(build_user("bob", "bob@example.com", None, None))
            .unwrap();
        let view = create_post(&store, &publisher, &actor, Some("mine")).unwrap();

        let err = update_post(&store, &publisher, &other.id, &view.post.id, Some("stolen"))
            .unwrap_err();
        assert_eq!(err, ApiError::NotFound("Post not found.".to_string()));

        // Same outcome as a genuinely missing post.
        let err =
            update_post(&store, &publisher, &other.id, &new_id(), Some("ghost")).unwrap_err();
        assert_eq!(err, ApiError::NotFound("Post not found.".to_string()));
    }

    #[test]
    fn delete_cascades_to_comments_atomically() {
        let (store, publisher, actor) = setup();
        let view = create_post(&store, &publisher, &actor, Some("with comments")).unwrap();

        for _ in 0..2 {
            store.insert_comment(crate::models::models::Comment {
                id: new_id(),
                post_id: view.post.id.clone(),
                author_id: actor.clone(),
                body: "c".into(),
                created_at: now_iso(),
                updated_at: None,
            });
        }

        delete_post(&store, &publisher, &actor, &view.post.id).unwrap();
        assert!(store.get_post(&view.post.id).is_none());
        assert_eq!(store.count_comments(&view.post.id), 0);
    }

    #[test]
    fn delete_miss_leaves_comments_untouched() {
        let (store, publisher, actor) = setup();
        let other = store
            .insert_user(build_user("bob", "bob@example.com", None, None))
            .unwrap();
        let view = create_post(&store, &publisher, &actor, Some("keep me")).unwrap();
        store.insert_comment(crate::models::models::Comment {
            id: new_id(),
            post_id: view.post.id.clone(),
            author_id: actor.clone(),
            body: "c".into(),
            created_at: now_iso(),
            updated_at: None,
        });

        let err = delete_post(&store, &publisher, &other.id, &view.post.id).unwrap_err();
        assert_eq!(err, ApiError::NotFound("Post not found.".to_string()));
        assert_eq!(store.count_comments(&view.post.id), 1);
    }

    #[test]
    fn filter_body_linkifies_and_strips_scripts() {
        let filtered = filter_body("look https://example.com <script>alert(1)</script>");
        assert!(filtered.contains(r#"<a href="https://example.com""#));
        assert!(!filtered.contains("<script>"));
    }

    #[test]
    fn following_feed_includes_the_viewer() {
        let (store, publisher, actor) = setup();
        let other = store
            .insert_user(build_user("bob", "bob@example.com", None, None))
            .unwrap();
        create_post(&store, &publisher, &actor, Some("my own")).unwrap();
        create_post(&store, &publisher, &other.id, Some("not followed")).unwrap();

        let page = get_following_posts(&store, &actor, 1, 10);
        assert_eq!(page.total_posts, 1);
        assert_eq!(page.posts[0].post.author_id, actor);

        store.insert_relationship(&actor, &other.id).unwrap();
        let page = get_following_posts(&store, &actor, 1, 10);
        assert_eq!(page.total_posts, 2);
    }
}
