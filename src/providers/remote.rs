use async_trait::async_trait;
use bytes::Bytes;

use crate::error::RemoteError;
use crate::models::{ContentId, ContentItem, CropRect, IdPage, MediaId, UserId, UserProfile};

/// Everything the bot needs from the social network.
///
/// Implementations own transport, authentication and wire parsing, and must
/// translate failures into [`RemoteError`] (see [`RemoteError::classify`]).
#[async_trait]
pub trait RemoteClient: Send + Sync {
    async fn post_message(&self, text: &str, media: Option<&MediaId>) -> Result<ContentItem, RemoteError>;

    async fn upload_media(&self, data: Bytes) -> Result<MediaId, RemoteError>;

    async fn search_content(&self, query: &str, limit: usize) -> Result<Vec<ContentItem>, RemoteError>;

    async fn follow(&self, id: &UserId) -> Result<UserProfile, RemoteError>;

    async fn unfollow(&self, id: &UserId) -> Result<UserProfile, RemoteError>;

    async fn favorite(&self, id: &ContentId) -> Result<(), RemoteError>;

    /// Returns the newly created retweet.
    async fn retweet(&self, id: &ContentId) -> Result<ContentItem, RemoteError>;

    /// Followers of `user`, or of the authenticated account when `None`.
    /// A `None` cursor asks for the first page.
    async fn get_follower_ids(&self, user: Option<&UserId>, cursor: Option<&str>) -> Result<IdPage, RemoteError>;

    /// Accounts the authenticated account follows.
    async fn get_friend_ids(&self, cursor: Option<&str>) -> Result<IdPage, RemoteError>;

    async fn find_user(&self, query: &str) -> Result<Vec<UserProfile>, RemoteError>;

    async fn update_profile_banner(&self, image: Bytes, crop: Option<CropRect>) -> Result<(), RemoteError>;
}
