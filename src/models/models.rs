use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct User {
    pub id: String,
    pub username: String,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub bio: Option<String>,
    pub created_at: String,
    pub updated_at: Option<String>,
}

/// The field set projected when a user is attached to someone else's
/// entity (post author, comment author, follow edge endpoint).
#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
pub struct PublicUser {
    pub id: String,
    pub username: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

impl From<&User> for PublicUser {
    fn from(user: &User) -> Self {
        PublicUser {
            id: user.id.clone(),
            username: user.username.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Post {
    pub id: String,
    pub author_id: String,
    pub body: String,
    /// Liker user ids. Set semantics: membership is flipped atomically by
    /// the store, never via application-level read-modify-write.
    pub likes: Vec<String>,
    pub created_at: String,
    pub updated_at: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Comment {
    pub id: String,
    pub post_id: String,
    pub author_id: String,
    pub body: String,
    pub created_at: String,
    pub updated_at: Option<String>,
}

/// A directed follow edge. The (follower_id, following_id) pair is unique,
/// enforced by the store.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Relationship {
    pub follower_id: String,
    pub following_id: String,
    pub created_at: String,
}

/// A post enriched for clients: derived metrics plus the author's public
/// fields. This is the shape carried by `new_post` / `updated_post` events
/// and by every paginated feed response.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct PostView {
    #[serde(flatten)]
    pub post: Post,
    pub author: PublicUser,
    pub total_comments: usize,
    pub total_likes: usize,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct CommentView {
    #[serde(flatten)]
    pub comment: Comment,
    pub author: PublicUser,
}

/// A user's own profile as returned to clients: public fields plus bio and
/// the current follow-graph counts, credentials never included.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct UserProfile {
    #[serde(flatten)]
    pub user: PublicUser,
    pub bio: Option<String>,
    #[serde(rename = "followerCount")]
    pub follower_count: usize,
    #[serde(rename = "followingCount")]
    pub following_count: usize,
}

/// A follow edge with the other endpoint's public profile attached, as
/// returned by the follower/following listings.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct FollowEdgeView {
    pub follower_id: String,
    pub following_id: String,
    pub user: PublicUser,
}
