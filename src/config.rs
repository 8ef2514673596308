pub const MAX_BODY_LENGTH: usize = 512;
pub const MAX_BIO_LENGTH: usize = 128;
pub const MIN_USERNAME_LENGTH: usize = 3;
pub const MAX_USERNAME_LENGTH: usize = 50;

/// Capacity of the event broadcast channel. A subscriber that lags behind
/// by more than this simply misses events and catches up on its next fetch.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

pub fn posts_per_page() -> usize {
    std::env::var("RIPPLE_POSTS_PER_PAGE")
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .filter(|n| *n > 0)
        .unwrap_or(10)
}
