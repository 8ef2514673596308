//! Client-side feed reconciliation.
//!
//! One scope-filtered, de-duplicated view of the feed is maintained by a
//! pure reducer over an explicit action type: paginated loads replace or
//! extend the list, live events are folded in one at a time in receipt
//! order. The reducer performs no I/O and never dispatches further actions;
//! serialization happens in [`FeedHandle`], and the live connection
//! lifecycle (including the identity-change race guard) in [`LiveFeed`].

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::task::JoinHandle;

use crate::events::FeedEvent;
use crate::models::models::PostView;
use crate::session::SubscriptionSession;

/// Which posts the current view is interested in.
#[derive(Clone, PartialEq, Debug)]
pub enum FeedScope {
    Global,
    Following,
    Profile { username: String },
}

#[derive(Clone)]
pub struct FeedState {
    /// Newest first.
    pub posts: Vec<PostView>,
    pub has_more: bool,
    pub total_posts: usize,
    pub scope: FeedScope,
}

impl FeedState {
    pub fn initial() -> Arc<FeedState> {
        Arc::new(FeedState {
            posts: Vec::new(),
            has_more: false,
            total_posts: 0,
            scope: FeedScope::Global,
        })
    }
}

pub enum FeedAction {
    /// Page 1 of a fresh load: replaces the list wholesale.
    SetPage {
        posts: Vec<PostView>,
        has_more: bool,
        total_posts: usize,
    },
    /// "Load more": appends to the tail, prior order untouched.
    AppendPage { posts: Vec<PostView>, has_more: bool },
    /// A live `new_post`. `is_following_author` is computed by the
    /// connection layer from the viewer's follow set so the reducer stays
    /// free of I/O.
    IncomingCreate {
        post: PostView,
        is_following_author: bool,
    },
    /// A live `updated_post`: replaced in place if present, ignored if the
    /// post is outside the current page window.
    IncomingUpdate(PostView),
    /// A live `deleted_post`.
    IncomingDelete(String),
    /// Scope change: clears everything and sets the new scope.
    Reset(FeedScope),
}

/// The single synchronous transition function. A rejected or redundant
/// action returns the same `Arc`, so downstream consumers can skip work on
/// pointer equality.
pub fn reduce(state: &Arc<FeedState>, action: FeedAction) -> Arc<FeedState> {
    match action {
        FeedAction::SetPage {
            posts,
            has_more,
            total_posts,
        } => Arc::new(FeedState {
            posts,
            has_more,
            total_posts,
            scope: state.scope.clone(),
        }),

        FeedAction::AppendPage { posts, has_more } => {
            let mut merged = state.posts.clone();
            merged.extend(posts);
            Arc::new(FeedState {
                posts: merged,
                has_more,
                total_posts: state.total_posts,
                scope: state.scope.clone(),
            })
        }

        FeedAction::IncomingCreate {
            post,
            is_following_author,
        } => {
            let relevant = match &state.scope {
                FeedScope::Global => true,
                FeedScope::Following => is_following_author,
                FeedScope::Profile { username } => post.author.username == *username,
            };
            if !relevant {
                return Arc::clone(state);
            }
            if state.posts.iter().any(|p| p.post.id == post.post.id) {
                return Arc::clone(state);
            }

            let mut posts = Vec::with_capacity(state.posts.len() + 1);
            posts.push(post);
            posts.extend(state.posts.iter().cloned());
            Arc::new(FeedState {
                posts,
                has_more: state.has_more,
                total_posts: state.total_posts + 1,
                scope: state.scope.clone(),
            })
        }

        FeedAction::IncomingUpdate(post) => {
            if !state.posts.iter().any(|p| p.post.id == post.post.id) {
                return Arc::clone(state);
            }
            let posts = state
                .posts
                .iter()
                .map(|p| {
                    if p.post.id == post.post.id {
                        post.clone()
                    } else {
                        p.clone()
                    }
                })
                .collect();
            Arc::new(FeedState {
                posts,
                has_more: state.has_more,
                total_posts: state.total_posts,
                scope: state.scope.clone(),
            })
        }

        FeedAction::IncomingDelete(post_id) => {
            if !state.posts.iter().any(|p| p.post.id == post_id) {
                return Arc::clone(state);
            }
            let posts = state
                .posts
                .iter()
                .filter(|p| p.post.id != post_id)
                .cloned()
                .collect();
            Arc::new(FeedState {
                posts,
                has_more: state.has_more,
                total_posts: state.total_posts.saturating_sub(1),
                scope: state.scope.clone(),
            })
        }

        FeedAction::Reset(scope) => Arc::new(FeedState {
            posts: Vec::new(),
            has_more: false,
            total_posts: 0,
            scope,
        }),
    }
}

/// Serialized dispatch over the current state: transitions are applied one
/// at a time in receipt order, never computed against a stale snapshot.
pub struct FeedHandle {
    state: Mutex<Arc<FeedState>>,
}

impl FeedHandle {
    pub fn new() -> Arc<FeedHandle> {
        Arc::new(FeedHandle {
            state: Mutex::new(FeedState::initial()),
        })
    }

    pub fn snapshot(&self) -> Arc<FeedState> {
        Arc::clone(&self.state.lock().expect("feed state lock poisoned"))
    }

    pub fn dispatch(&self, action: FeedAction) -> Arc<FeedState> {
        let mut current = self.state.lock().expect("feed state lock poisoned");
        let next = reduce(&current, action);
        *current = Arc::clone(&next);
        next
    }

    /// Dispatch guarded by a connection generation: the check happens under
    /// the state lock, so once a teardown has bumped the generation no
    /// event from the old connection can reach the state.
    fn dispatch_if_generation(
        &self,
        generation: &AtomicU64,
        expected: u64,
        action: FeedAction,
    ) -> bool {
        let mut current = self.state.lock().expect("feed state lock poisoned");
        if generation.load(Ordering::SeqCst) != expected {
            return false;
        }
        *current = reduce(&current, action);
        true
    }
}

/// Owns the live half of the feed: an event pump folding the subscription
/// stream into the handle, plus the viewer's follow set used for the
/// following-scope predicate. Re-connected whenever the viewer identity
/// changes; the generation guard keeps events from a torn-down connection
/// out of the state machine.
pub struct LiveFeed {
    handle: Arc<FeedHandle>,
    following: Arc<Mutex<HashSet<String>>>,
    generation: Arc<AtomicU64>,
    pump: Option<JoinHandle<()>>,
}

impl LiveFeed {
    pub fn new(handle: Arc<FeedHandle>) -> Self {
        LiveFeed {
            handle,
            following: Arc::new(Mutex::new(HashSet::new())),
            generation: Arc::new(AtomicU64::new(0)),
            pump: None,
        }
    }

    pub fn handle(&self) -> Arc<FeedHandle> {
        Arc::clone(&self.handle)
    }

    /// Replaces the viewer's follow set, typically after the initial
    /// following fetch for a new identity.
    pub fn set_following(&self, ids: impl IntoIterator<Item = String>) {
        let mut following = self.following.lock().expect("follow set lock poisoned");
        following.clear();
        following.extend(ids);
    }

    pub fn add_following(&self, user_id: &str) {
        self.following
            .lock()
            .expect("follow set lock poisoned")
            .insert(user_id.to_string());
    }

    pub fn remove_following(&self, user_id: &str) {
        self.following
            .lock()
            .expect("follow set lock poisoned")
            .remove(user_id);
    }

    /// Tears down any previous connection and starts pumping events from
    /// `session` into the feed state.
    pub fn connect(&mut self, mut session: SubscriptionSession) {
        self.disconnect();

        let my_generation = self.generation.load(Ordering::SeqCst);
        let handle = Arc::clone(&self.handle);
        let following = Arc::clone(&self.following);
        let generation = Arc::clone(&self.generation);
        let session_id = session.id.clone();

        self.pump = Some(tokio::spawn(async move {
            while let Some(event) = session.next_event().await {
                let action = match event {
                    FeedEvent::NewPost(post) => {
                        let is_following_author = following
                            .lock()
                            .expect("follow set lock poisoned")
                            .contains(&post.post.author_id);
                        FeedAction::IncomingCreate {
                            post,
                            is_following_author,
                        }
                    }
                    FeedEvent::UpdatedPost(post) => FeedAction::IncomingUpdate(post),
                    FeedEvent::DeletedPost(id) => FeedAction::IncomingDelete(id),
                    // Comment and relationship events do not reshape the
                    // post list; per-post and per-profile views consume
                    // them from their own subscriptions.
                    FeedEvent::NewComment(_)
                    | FeedEvent::DeletedComment(_)
                    | FeedEvent::RelationshipUpdate { .. } => continue,
                };
                if !handle.dispatch_if_generation(&generation, my_generation, action) {
                    tracing::debug!(session = %session_id, "stale connection, pump stopped");
                    break;
                }
            }
        }));
    }

    /// Invalidates the current connection. Called on identity change and on
    /// drop; after this returns, no event from the old connection will be
    /// dispatched.
    pub fn disconnect(&mut self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
    }
}

impl Drop for LiveFeed {
    fn drop(&mut self) {
        self.disconnect();
    }
}
