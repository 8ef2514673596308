//! Per-connection subscription context.
//!
//! A session is created at connect time from the handshake token and owns
//! its own broadcast receiver; dropping it is the disconnect. Nothing is
//! looked up ambiently - the viewer identity travels with the session. A
//! session only ever sees events published after it subscribed.

use tokio::sync::broadcast::error::RecvError;
use tokio::sync::broadcast::Receiver;

use crate::auth::TokenRegistry;
use crate::core::helpers::new_id;
use crate::events::{FeedEvent, Publisher};

pub struct SubscriptionSession {
    pub id: String,
    /// Resolved viewer identity; `None` for anonymous connections.
    pub viewer_id: Option<String>,
    receiver: Receiver<FeedEvent>,
}

impl SubscriptionSession {
    pub fn connect(publisher: &Publisher, auth: &TokenRegistry, token: Option<&str>) -> Self {
        let viewer_id = token.and_then(|t| auth.resolve(t));
        let session = SubscriptionSession {
            id: new_id(),
            viewer_id,
            receiver: publisher.subscribe(),
        };
        tracing::debug!(
            session = %session.id,
            viewer = session.viewer_id.as_deref().unwrap_or("anonymous"),
            "session connected"
        );
        session
    }

    /// Surrenders the raw receiver, for adapters (like the SSE endpoint)
    /// that frame events as a stream instead of polling [`Self::next_event`].
    pub fn into_receiver(self) -> Receiver<FeedEvent> {
        self.receiver
    }

    /// Next event for this session, in publish order. A lagged receiver
    /// skips the overrun (missed events are recovered by the client's next
    /// fetch); `None` means the publisher is gone.
    pub async fn next_event(&mut self) -> Option<FeedEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(RecvError::Lagged(missed)) => {
                    tracing::warn!(session = %self.id, missed, "session lagged, events dropped");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }
}
