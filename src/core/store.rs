//! In-memory entity store: the single source of truth.
//!
//! All tables sit behind one mutex, which is also the transaction boundary:
//! a transactional unit runs every step against the locked tables and either
//! commits as a whole or restores the pre-unit snapshot, so steps of
//! different units never interleave. Like-set toggles are single store
//! operations under the same lock rather than application-level
//! read-modify-write.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, MutexGuard};

use crate::core::helpers::{new_id, now_iso};
use crate::models::models::{Comment, Post, Relationship, User};

#[derive(Debug, PartialEq)]
pub enum StoreError {
    /// A uniqueness constraint was violated; distinguishable from any other
    /// storage failure so callers can surface a conflict instead of an
    /// internal error.
    UniqueViolation(&'static str),
    Backend(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::UniqueViolation(what) => write!(f, "unique constraint violated: {}", what),
            StoreError::Backend(msg) => write!(f, "storage failure: {}", msg),
        }
    }
}

impl std::error::Error for StoreError {}

#[derive(Default, Clone)]
pub struct Tables {
    pub users: HashMap<String, User>,
    pub posts: HashMap<String, Post>,
    pub comments: HashMap<String, Comment>,
    /// Keyed by (follower_id, following_id); the key is the uniqueness
    /// constraint on the directed pair.
    pub relationships: HashMap<(String, String), Relationship>,
}

impl Tables {
    /// Owner-scoped removal: deletes the post only if `author_id` owns it.
    pub fn remove_post_owned(&mut self, post_id: &str, author_id: &str) -> Option<Post> {
        match self.posts.get(post_id) {
            Some(post) if post.author_id == author_id => self.posts.remove(post_id),
            _ => None,
        }
    }

    pub fn remove_comments_for_post(&mut self, post_id: &str) -> usize {
        let before = self.comments.len();
        self.comments.retain(|_, c| c.post_id != post_id);
        before - self.comments.len()
    }

    pub fn remove_posts_by_author(&mut self, user_id: &str) -> Vec<String> {
        let ids: Vec<String> = self
            .posts
            .values()
            .filter(|p| p.author_id == user_id)
            .map(|p| p.id.clone())
            .collect();
        for id in &ids {
            self.posts.remove(id);
        }
        ids
    }

    pub fn remove_comments_by_author(&mut self, user_id: &str) -> usize {
        let before = self.comments.len();
        self.comments.retain(|_, c| c.author_id != user_id);
        before - self.comments.len()
    }

    /// Pulls `user_id` out of every post's like-set.
    pub fn pull_likes_everywhere(&mut self, user_id: &str) {
        for post in self.posts.values_mut() {
            post.likes.retain(|id| id != user_id);
        }
    }

    /// Inserts a follow edge; the directed pair is the uniqueness key.
    pub fn insert_relationship(
        &mut self,
        follower_id: &str,
        following_id: &str,
    ) -> Result<Relationship, StoreError> {
        let key = (follower_id.to_string(), following_id.to_string());
        if self.relationships.contains_key(&key) {
            return Err(StoreError::UniqueViolation("Relationship"));
        }
        let edge = Relationship {
            follower_id: follower_id.to_string(),
            following_id: following_id.to_string(),
            created_at: now_iso(),
        };
        self.relationships.insert(key, edge.clone());
        Ok(edge)
    }

    /// Removes every follow edge where `user_id` is either endpoint.
    pub fn remove_relationships_touching(&mut self, user_id: &str) -> usize {
        let before = self.relationships.len();
        self.relationships
            .retain(|(follower, following), _| follower != user_id && following != user_id);
        before - self.relationships.len()
    }
}

#[derive(Default)]
pub struct Store {
    inner: Mutex<Tables>,
}

fn newest_first(posts: &mut [Post]) {
    posts.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| b.id.cmp(&a.id))
    });
}

impl Store {
    pub fn new() -> Self {
        Store::default()
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.inner.lock().expect("store lock poisoned")
    }

    /// Runs `f` as a single transactional unit. The tables stay locked for
    /// the whole unit; on `Err` the pre-unit snapshot is restored, so a unit
    /// either commits every step or none of them.
    pub fn transaction<T, E>(&self, f: impl FnOnce(&mut Tables) -> Result<T, E>) -> Result<T, E> {
        let mut tables = self.tables();
        let snapshot = tables.clone();
        match f(&mut tables) {
            Ok(value) => Ok(value),
            Err(err) => {
                *tables = snapshot;
                Err(err)
            }
        }
    }

    // === Users ===

    pub fn insert_user(&self, user: User) -> Result<User, StoreError> {
        let mut tables = self.tables();
        let taken = tables
            .users
            .values()
            .any(|u| u.username == user.username || u.email == user.email);
        if taken {
            return Err(StoreError::UniqueViolation("Email or Username"));
        }
        tables.users.insert(user.id.clone(), user.clone());
        Ok(user)
    }

    pub fn get_user(&self, id: &str) -> Option<User> {
        self.tables().users.get(id).cloned()
    }

    pub fn find_user_by_username(&self, username: &str) -> Option<User> {
        self.tables()
            .users
            .values()
            .find(|u| u.username == username)
            .cloned()
    }

    // === Posts ===

    pub fn insert_post(&self, post: Post) -> Post {
        self.tables().posts.insert(post.id.clone(), post.clone());
        post
    }

    pub fn get_post(&self, id: &str) -> Option<Post> {
        self.tables().posts.get(id).cloned()
    }

    /// Owner-scoped update. A missing post and a post owned by someone else
    /// are the same miss.
    pub fn update_post_owned(&self, post_id: &str, author_id: &str, body: String) -> Option<Post> {
        let mut tables = self.tables();
        match tables.posts.get_mut(post_id) {
            Some(post) if post.author_id == author_id => {
                post.body = body;
                post.updated_at = Some(now_iso());
                Some(post.clone())
            }
            _ => None,
        }
    }

    /// Atomic like-set flip: adds `user_id` if absent, removes it if
    /// present, in one store operation. The set invariant (each id at most
    /// once) is enforced here.
    pub fn toggle_like(&self, post_id: &str, user_id: &str) -> Option<Post> {
        let mut tables = self.tables();
        let post = tables.posts.get_mut(post_id)?;
        if post.likes.iter().any(|id| id == user_id) {
            post.likes.retain(|id| id != user_id);
        } else {
            post.likes.push(user_id.to_string());
        }
        Some(post.clone())
    }

    /// One page of posts, newest first, optionally restricted to a set of
    /// author ids. Returns the page plus the total matching count.
    pub fn posts_page(
        &self,
        authors: Option<&[String]>,
        skip: usize,
        limit: usize,
    ) -> (Vec<Post>, usize) {
        let tables = self.tables();
        let mut matching: Vec<Post> = tables
            .posts
            .values()
            .filter(|p| match authors {
                Some(ids) => ids.iter().any(|id| id == &p.author_id),
                None => true,
            })
            .cloned()
            .collect();
        newest_first(&mut matching);
        let total = matching.len();
        let page = matching.into_iter().skip(skip).take(limit).collect();
        (page, total)
    }

    // === Comments ===

    pub fn insert_comment(&self, comment: Comment) -> Comment {
        self.tables()
            .comments
            .insert(comment.id.clone(), comment.clone());
        comment
    }

    pub fn update_comment_owned(
        &self,
        comment_id: &str,
        author_id: &str,
        body: String,
    ) -> Option<Comment> {
        let mut tables = self.tables();
        match tables.comments.get_mut(comment_id) {
            Some(comment) if comment.author_id == author_id => {
                comment.body = body;
                comment.updated_at = Some(now_iso());
                Some(comment.clone())
            }
            _ => None,
        }
    }

    pub fn remove_comment_owned(&self, comment_id: &str, author_id: &str) -> Option<Comment> {
        let mut tables = self.tables();
        match tables.comments.get(comment_id) {
            Some(comment) if comment.author_id == author_id => tables.comments.remove(comment_id),
            _ => None,
        }
    }

    /// Comments for a post, newest first.
    pub fn comments_for_post(&self, post_id: &str) -> Vec<Comment> {
        let mut comments: Vec<Comment> = self
            .tables()
            .comments
            .values()
            .filter(|c| c.post_id == post_id)
            .cloned()
            .collect();
        comments.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        comments
    }

    pub fn count_comments(&self, post_id: &str) -> usize {
        self.tables()
            .comments
            .values()
            .filter(|c| c.post_id == post_id)
            .count()
    }

    // === Relationships ===

    pub fn insert_relationship(
        &self,
        follower_id: &str,
        following_id: &str,
    ) -> Result<Relationship, StoreError> {
        self.tables().insert_relationship(follower_id, following_id)
    }

    pub fn remove_relationship(
        &self,
        follower_id: &str,
        following_id: &str,
    ) -> Option<Relationship> {
        self.tables()
            .relationships
            .remove(&(follower_id.to_string(), following_id.to_string()))
    }

    /// Edges where `user_id` is the followee.
    pub fn followers_of(&self, user_id: &str) -> Vec<Relationship> {
        self.tables()
            .relationships
            .values()
            .filter(|r| r.following_id == user_id)
            .cloned()
            .collect()
    }

    /// Edges where `user_id` is the follower.
    pub fn following_of(&self, user_id: &str) -> Vec<Relationship> {
        self.tables()
            .relationships
            .values()
            .filter(|r| r.follower_id == user_id)
            .cloned()
            .collect()
    }

    pub fn count_followers(&self, user_id: &str) -> usize {
        self.tables()
            .relationships
            .values()
            .filter(|r| r.following_id == user_id)
            .count()
    }

    pub fn count_following(&self, user_id: &str) -> usize {
        self.tables()
            .relationships
            .values()
            .filter(|r| r.follower_id == user_id)
            .count()
    }
}

/// Builds a user record; used by account creation and tests.
pub fn build_user(
    username: &str,
    email: &str,
    first_name: Option<String>,
    last_name: Option<String>,
) -> User {
    User {
        id: new_id(),
        username: username.to_string(),
        email: email.to_string(),
        first_name,
        last_name,
        bio: None,
        created_at: now_iso(),
        updated_at: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seed_user(store: &Store, name: &str) -> User {
        store
            .insert_user(build_user(name, &format!("{}@example.com", name), None, None))
            .unwrap()
    }

    fn seed_post(store: &Store, author: &str, body: &str) -> Post {
        store.insert_post(Post {
            id: new_id(),
            author_id: author.to_string(),
            body: body.to_string(),
            likes: Vec::new(),
            created_at: now_iso(),
            updated_at: None,
        })
    }

    #[test]
    fn toggle_like_never_duplicates() {
        let store = Store::new();
        let user = seed_user(&store, "ada");
        let post = seed_post(&store, &user.id, "hello");

        let after_first = store.toggle_like(&post.id, &user.id).unwrap();
        assert_eq!(after_first.likes, vec![user.id.clone()]);

        let after_second = store.toggle_like(&post.id, &user.id).unwrap();
        assert!(after_second.likes.is_empty());

        let after_third = store.toggle_like(&post.id, &user.id).unwrap();
        assert_eq!(after_third.likes.len(), 1);
    }

    #[test]
    fn toggle_like_missing_post_is_none() {
        let store = Store::new();
        assert!(store.toggle_like("nope", "someone").is_none());
    }

    #[test]
    fn duplicate_relationship_is_a_unique_violation() {
        let store = Store::new();
        let a = seed_user(&store, "a");
        let b = seed_user(&store, "b");

        store.insert_relationship(&a.id, &b.id).unwrap();
        let err = store.insert_relationship(&a.id, &b.id).unwrap_err();
        assert_eq!(err, StoreError::UniqueViolation("Relationship"));
        assert_eq!(store.count_followers(&b.id), 1);

        // Reverse direction is a different edge.
        store.insert_relationship(&b.id, &a.id).unwrap();
    }

    #[test]
    fn duplicate_username_or_email_rejected() {
        let store = Store::new();
        seed_user(&store, "ada");

        let err = store
            .insert_user(build_user("ada", "other@example.com", None, None))
            .unwrap_err();
        assert_eq!(err, StoreError::UniqueViolation("Email or Username"));

        let err = store
            .insert_user(build_user("other", "ada@example.com", None, None))
            .unwrap_err();
        assert_eq!(err, StoreError::UniqueViolation("Email or Username"));
    }

    #[test]
    fn failed_transaction_restores_snapshot() {
        let store = Store::new();
        let user = seed_user(&store, "ada");
        let post = seed_post(&store, &user.id, "will survive");

        let result: Result<(), StoreError> = store.transaction(|tables| {
            tables.posts.clear();
            tables.users.clear();
            Err(StoreError::Backend("simulated".into()))
        });

        assert!(result.is_err());
        assert!(store.get_post(&post.id).is_some());
        assert!(store.get_user(&user.id).is_some());
    }

    #[test]
    fn posts_page_is_newest_first_with_totals() {
        let store = Store::new();
        let user = seed_user(&store, "ada");
        for i in 0..3 {
            let mut post = seed_post(&store, &user.id, &format!("post {}", i));
            post.created_at = format!("2026-01-0{}T00:00:00+00:00", i + 1);
            store.insert_post(post);
        }

        let (page, total) = store.posts_page(None, 0, 2);
        assert_eq!(total, 3);
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].body, "post 2");
        assert_eq!(page[1].body, "post 1");

        let (rest, _) = store.posts_page(None, 2, 2);
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].body, "post 0");
    }
}
