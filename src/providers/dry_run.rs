use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use tracing::info;

use crate::error::RemoteError;
use crate::models::{ContentId, ContentItem, CropRect, IdPage, MediaId, UserId, UserProfile};
use crate::providers::remote::RemoteClient;

/// A client that never touches the network. Mutations are logged and
/// answered with synthetic results; reads come back empty.
pub struct DryRunClient {
    account: UserProfile,
    next_id: AtomicU64,
}

impl DryRunClient {
    pub fn new(account_name: &str) -> Self {
        DryRunClient {
            account: UserProfile {
                id: UserId::from(0),
                name: account_name.to_string(),
            },
            next_id: AtomicU64::new(1),
        }
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    fn profile(id: &UserId) -> UserProfile {
        UserProfile {
            id: id.clone(),
            name: String::new(),
        }
    }
}

#[async_trait]
impl RemoteClient for DryRunClient {
    async fn post_message(&self, text: &str, media: Option<&MediaId>) -> Result<ContentItem, RemoteError> {
        let id = ContentId::from(self.next_id());
        info!(id = %id, media = ?media, text, "dry run: would post message");
        Ok(ContentItem {
            id,
            text: text.to_string(),
            author: self.account.clone(),
            favorite_count: 0,
            retweeted: None,
        })
    }

    async fn upload_media(&self, data: Bytes) -> Result<MediaId, RemoteError> {
        let id = MediaId(self.next_id().to_string());
        info!(media = %id.0, bytes = data.len(), "dry run: would upload media");
        Ok(id)
    }

    async fn search_content(&self, query: &str, limit: usize) -> Result<Vec<ContentItem>, RemoteError> {
        info!(query, limit, "dry run: search returns nothing");
        Ok(Vec::new())
    }

    async fn follow(&self, id: &UserId) -> Result<UserProfile, RemoteError> {
        info!(id = %id, "dry run: would follow");
        Ok(Self::profile(id))
    }

    async fn unfollow(&self, id: &UserId) -> Result<UserProfile, RemoteError> {
        info!(id = %id, "dry run: would unfollow");
        Ok(Self::profile(id))
    }

    async fn favorite(&self, id: &ContentId) -> Result<(), RemoteError> {
        info!(id = %id, "dry run: would like");
        Ok(())
    }

    async fn retweet(&self, id: &ContentId) -> Result<ContentItem, RemoteError> {
        info!(id = %id, "dry run: would retweet");
        Ok(ContentItem {
            id: ContentId::from(self.next_id()),
            text: String::new(),
            author: self.account.clone(),
            favorite_count: 0,
            retweeted: None,
        })
    }

    async fn get_follower_ids(&self, _user: Option<&UserId>, _cursor: Option<&str>) -> Result<IdPage, RemoteError> {
        Ok(IdPage::default())
    }

    async fn get_friend_ids(&self, _cursor: Option<&str>) -> Result<IdPage, RemoteError> {
        Ok(IdPage::default())
    }

    async fn find_user(&self, query: &str) -> Result<Vec<UserProfile>, RemoteError> {
        info!(query, "dry run: user search returns nothing");
        Ok(Vec::new())
    }

    async fn update_profile_banner(&self, image: Bytes, crop: Option<CropRect>) -> Result<(), RemoteError> {
        info!(bytes = image.len(), crop = ?crop, "dry run: would update profile banner");
        Ok(())
    }
}
