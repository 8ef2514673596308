//! Ripple - a social feed core.
//!
//! Server side: a mutation coordinator performing cascade-aware writes
//! against an entity store, a metric aggregator computing derived counts at
//! read time, a relationship layer owning the follow graph, and an event
//! publisher fanning typed events out to every connected subscription
//! session.
//!
//! Client side: a feed reconciliation state machine ([`feed`]) that merges
//! paginated loads with the live event stream into one de-duplicated,
//! scope-filtered view.

pub mod auth;
pub mod comments;
pub mod config;
pub mod core;
pub mod events;
pub mod feed;
pub mod follow;
pub mod metrics;
pub mod models;
pub mod posts;
pub mod session;
pub mod users;
