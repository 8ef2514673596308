//! Relationship consistency layer: the authoritative follow graph.
//!
//! Follow and unfollow recompute the target's counts from the edge set and
//! broadcast a `relationship_update`; the listings attach the other
//! endpoint's public profile and emit nothing.

use crate::core::errors::ApiError;
use crate::core::helpers::validate_id;
use crate::core::store::{Store, StoreError};
use crate::events::{FeedEvent, Publisher};
use crate::models::models::{FollowEdgeView, PublicUser, Relationship};

fn validated_pair(follower_id: &str, target_user_id: &str) -> Result<(), ApiError> {
    if !validate_id(target_user_id) {
        return Err(ApiError::BadRequest(
            "Invalid Target User ID format.".to_string(),
        ));
    }
    if !validate_id(follower_id) {
        return Err(ApiError::BadRequest(
            "Invalid Follower ID format.".to_string(),
        ));
    }
    Ok(())
}

fn publish_counts(store: &Store, publisher: &Publisher, target_user_id: &str) {
    publisher.publish(FeedEvent::RelationshipUpdate {
        user_id: target_user_id.to_string(),
        // Who follows the target, and who the target themself follows.
        follower_count: store.count_followers(target_user_id),
        following_count: store.count_following(target_user_id),
    });
}

pub fn follow(
    store: &Store,
    publisher: &Publisher,
    actor_id: &str,
    target_user_id: &str,
) -> Result<Relationship, ApiError> {
    validated_pair(actor_id, target_user_id)?;
    if actor_id == target_user_id {
        return Err(ApiError::BadRequest(
            "You can't follow yourself...".to_string(),
        ));
    }

    // Endpoint checks and edge insert commit as one unit: a racing account
    // deletion cannot leave an edge referencing a removed user.
    let edge = store.transaction(|tables| {
        if !tables.users.contains_key(actor_id) {
            return Err(ApiError::Unauthorized);
        }
        if !tables.users.contains_key(target_user_id) {
            return Err(ApiError::NotFound("User not found.".to_string()));
        }
        tables
            .insert_relationship(actor_id, target_user_id)
            .map_err(|err| match err {
                StoreError::UniqueViolation(_) => {
                    ApiError::Conflict("You already follow this user.".to_string())
                }
                other => other.into(),
            })
    })?;
    tracing::info!(follower = %actor_id, target = %target_user_id, "follow");

    publish_counts(store, publisher, target_user_id);
    Ok(edge)
}

pub fn unfollow(
    store: &Store,
    publisher: &Publisher,
    actor_id: &str,
    target_user_id: &str,
) -> Result<Relationship, ApiError> {
    validated_pair(actor_id, target_user_id)?;
    if actor_id == target_user_id {
        return Err(ApiError::BadRequest(
            "You can't unfollow yourself...".to_string(),
        ));
    }

    let edge = store
        .remove_relationship(actor_id, target_user_id)
        .ok_or_else(|| ApiError::NotFound("Relationship not found.".to_string()))?;
    tracing::info!(follower = %actor_id, target = %target_user_id, "unfollow");

    publish_counts(store, publisher, target_user_id);
    Ok(edge)
}

fn attach_endpoint(
    store: &Store,
    edges: Vec<Relationship>,
    pick: impl Fn(&Relationship) -> &str,
) -> Vec<FollowEdgeView> {
    edges
        .into_iter()
        .filter_map(|edge| {
            let user = store.get_user(pick(&edge))?;
            Some(FollowEdgeView {
                follower_id: edge.follower_id,
                following_id: edge.following_id,
                user: PublicUser::from(&user),
            })
        })
        .collect()
}

/// Users who follow `username`, with their public profiles attached.
pub fn list_followers(store: &Store, username: &str) -> Result<Vec<FollowEdgeView>, ApiError> {
    let user = store
        .find_user_by_username(username)
        .ok_or_else(|| ApiError::NotFound("User not found.".to_string()))?;
    let edges = store.followers_of(&user.id);
    Ok(attach_endpoint(store, edges, |edge| &edge.follower_id))
}

/// Users `username` follows, with their public profiles attached.
pub fn list_following(store: &Store, username: &str) -> Result<Vec<FollowEdgeView>, ApiError> {
    let user = store
        .find_user_by_username(username)
        .ok_or_else(|| ApiError::NotFound("User not found.".to_string()))?;
    let edges = store.following_of(&user.id);
    Ok(attach_endpoint(store, edges, |edge| &edge.following_id))
}
