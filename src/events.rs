//! Typed mutation events and their fan-out.
//!
//! Every successful mutation broadcasts one event to all currently
//! connected subscription sessions. Delivery is best-effort: no ack, no
//! retry, nothing persisted for sessions that connect later - they catch
//! up on their next paginated fetch. The broadcast is fully decoupled from
//! the HTTP response to the acting client, which may also receive its own
//! echo through its subscription.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::config::EVENT_CHANNEL_CAPACITY;
use crate::models::models::{CommentView, PostView};

/// Wire shape: `{ "type": "<name>", "payload": ... }`. Post events carry the
/// full enriched view; delete events carry the bare identity.
#[derive(Serialize, Deserialize, Clone)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum FeedEvent {
    NewPost(PostView),
    UpdatedPost(PostView),
    DeletedPost(String),
    NewComment(CommentView),
    DeletedComment(String),
    RelationshipUpdate {
        #[serde(rename = "userId")]
        user_id: String,
        #[serde(rename = "followerCount")]
        follower_count: usize,
        #[serde(rename = "followingCount")]
        following_count: usize,
    },
}

impl FeedEvent {
    pub fn name(&self) -> &'static str {
        match self {
            FeedEvent::NewPost(_) => "new_post",
            FeedEvent::UpdatedPost(_) => "updated_post",
            FeedEvent::DeletedPost(_) => "deleted_post",
            FeedEvent::NewComment(_) => "new_comment",
            FeedEvent::DeletedComment(_) => "deleted_comment",
            FeedEvent::RelationshipUpdate { .. } => "relationship_update",
        }
    }
}

pub struct Publisher {
    sender: broadcast::Sender<FeedEvent>,
}

impl Default for Publisher {
    fn default() -> Self {
        Publisher::new()
    }
}

impl Publisher {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Publisher { sender }
    }

    /// Best-effort broadcast. Having no subscribers is not a failure, and a
    /// failed delivery is never surfaced to the acting client.
    pub fn publish(&self, event: FeedEvent) {
        let name = event.name();
        match self.sender.send(event) {
            Ok(receivers) => tracing::debug!(event = name, receivers, "event published"),
            Err(_) => tracing::debug!(event = name, "event dropped, no subscribers"),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<FeedEvent> {
        self.sender.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_serialize_with_type_and_payload() {
        let event = FeedEvent::RelationshipUpdate {
            user_id: "u1".into(),
            follower_count: 2,
            following_count: 5,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "relationship_update");
        assert_eq!(json["payload"]["userId"], "u1");
        assert_eq!(json["payload"]["followerCount"], 2);

        let deleted = FeedEvent::DeletedPost("p1".into());
        let json = serde_json::to_value(&deleted).unwrap();
        assert_eq!(json["type"], "deleted_post");
        assert_eq!(json["payload"], "p1");
    }

    #[tokio::test]
    async fn publish_reaches_every_subscriber() {
        let publisher = Publisher::new();
        let mut first = publisher.subscribe();
        let mut second = publisher.subscribe();

        publisher.publish(FeedEvent::DeletedPost("p1".into()));

        for receiver in [&mut first, &mut second] {
            match receiver.recv().await.unwrap() {
                FeedEvent::DeletedPost(id) => assert_eq!(id, "p1"),
                other => panic!("unexpected event {}", other.name()),
            }
        }
    }

    #[tokio::test]
    async fn publish_without_subscribers_is_not_an_error() {
        let publisher = Publisher::new();
        publisher.publish(FeedEvent::DeletedPost("p1".into()));
    }
}
