//! Account creation, lookups, and the account-deletion cascade.

use ammonia::Builder;

use crate::auth::TokenRegistry;
use crate::config::{MAX_BIO_LENGTH, MAX_USERNAME_LENGTH, MIN_USERNAME_LENGTH};
use crate::core::errors::ApiError;
use crate::core::store::{build_user, Store};
use crate::events::{FeedEvent, Publisher};
use crate::models::models::{PublicUser, User, UserProfile};

fn sanitize_text(text: &str) -> String {
    // Plain text only, no HTML allowed.
    Builder::default()
        .tags(std::collections::HashSet::new())
        .clean(text)
        .to_string()
}

pub struct NewUser<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub first_name: Option<&'a str>,
    pub last_name: Option<&'a str>,
}

/// Creates an account. Username and email uniqueness is enforced by the
/// store; a duplicate of either surfaces as a conflict. Credentials are the
/// auth collaborator's problem and never pass through here.
pub fn create_user(store: &Store, params: NewUser<'_>) -> Result<User, ApiError> {
    let mut empty_fields = Vec::new();
    if params.username.is_empty() {
        empty_fields.push("username");
    }
    if params.email.is_empty() {
        empty_fields.push("email");
    }
    if !empty_fields.is_empty() {
        return Err(ApiError::MissingFields(empty_fields));
    }

    let username = sanitize_text(params.username);
    if username.len() < MIN_USERNAME_LENGTH || username.len() > MAX_USERNAME_LENGTH {
        return Err(ApiError::BadRequest(
            "Username must be 3-50 characters.".to_string(),
        ));
    }
    if !params.email.contains('@') {
        return Err(ApiError::BadRequest("Invalid Email Address.".to_string()));
    }

    let user = store.insert_user(build_user(
        &username,
        params.email,
        params.first_name.map(sanitize_text),
        params.last_name.map(sanitize_text),
    ))?;
    tracing::info!(user = %user.id, username = %user.username, "user created");
    Ok(user)
}

pub fn update_bio(store: &Store, actor_id: &str, bio: &str) -> Result<User, ApiError> {
    if bio.len() > MAX_BIO_LENGTH {
        return Err(ApiError::BadRequest("Bio too long (max 128 chars).".to_string()));
    }
    let sanitized = sanitize_text(bio);

    store.transaction(|tables| match tables.users.get_mut(actor_id) {
        Some(user) => {
            user.bio = if sanitized.is_empty() { None } else { Some(sanitized.clone()) };
            user.updated_at = Some(crate::core::helpers::now_iso());
            Ok(user.clone())
        }
        None => Err(ApiError::NotFound("User not found.".to_string())),
    })
}

/// Deletes the account and everything referencing it as one atomic unit:
/// authored posts, authored comments, the id in every like-set, and every
/// follow edge touching the user. A missing user aborts the unit with no
/// side effects. Feed-visible removals are broadcast after commit so
/// connected clients drop the dead entries immediately.
pub fn delete_user(
    store: &Store,
    publisher: &Publisher,
    auth: &TokenRegistry,
    actor_id: &str,
) -> Result<(), ApiError> {
    let removed_posts = store.transaction(|tables| {
        if !tables.users.contains_key(actor_id) {
            return Err(ApiError::NotFound("User not found.".to_string()));
        }

        let removed_posts = tables.remove_posts_by_author(actor_id);
        for post_id in &removed_posts {
            tables.remove_comments_for_post(post_id);
        }
        tables.remove_comments_by_author(actor_id);
        tables.pull_likes_everywhere(actor_id);
        let edges = tables.remove_relationships_touching(actor_id);
        tables.users.remove(actor_id);

        tracing::info!(
            user = %actor_id,
            posts = removed_posts.len(),
            edges,
            "account deleted with cascade"
        );
        Ok(removed_posts)
    })?;

    auth.revoke_user(actor_id);
    for post_id in removed_posts {
        publisher.publish(FeedEvent::DeletedPost(post_id));
    }
    Ok(())
}

// === Lookups ===

fn profile_of(store: &Store, user: &User) -> UserProfile {
    UserProfile {
        user: PublicUser::from(user),
        bio: user.bio.clone(),
        follower_count: store.count_followers(&user.id),
        following_count: store.count_following(&user.id),
    }
}

pub fn get_user_by_id(store: &Store, id: &str) -> Result<UserProfile, ApiError> {
    if !crate::core::helpers::validate_id(id) {
        return Err(ApiError::BadRequest("Invalid ID format.".to_string()));
    }
    let user = store
        .get_user(id)
        .ok_or_else(|| ApiError::NotFound("User not found.".to_string()))?;
    Ok(profile_of(store, &user))
}

pub fn get_user_by_username(store: &Store, username: &str) -> Result<UserProfile, ApiError> {
    let user = store
        .find_user_by_username(username)
        .ok_or_else(|| ApiError::NotFound("User not found.".to_string()))?;
    Ok(profile_of(store, &user))
}
