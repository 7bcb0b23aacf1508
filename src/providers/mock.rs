//! Scripted remote client for tests.
//!
//! Results are popped from per-call FIFO queues; an empty queue means
//! success. Every call is recorded.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::RemoteError;
use crate::models::{ContentId, ContentItem, CropRect, IdPage, MediaId, UserId, UserProfile};
use crate::providers::remote::RemoteClient;

#[derive(Clone, Debug, PartialEq)]
pub enum Call {
    Post(String, Option<MediaId>),
    Upload(usize),
    Search(String, usize),
    Follow(UserId),
    Unfollow(UserId),
    Favorite(ContentId),
    Retweet(ContentId),
    FollowerIds(Option<UserId>, Option<String>),
    FriendIds(Option<String>),
    FindUser(String),
    Banner(Option<CropRect>),
}

#[derive(Default)]
pub struct MockClient {
    pub calls: Mutex<Vec<Call>>,
    pub search: Mutex<VecDeque<Result<Vec<ContentItem>, RemoteError>>>,
    pub follow: Mutex<VecDeque<Result<(), RemoteError>>>,
    pub unfollow: Mutex<VecDeque<Result<(), RemoteError>>>,
    pub retweet: Mutex<VecDeque<Result<(), RemoteError>>>,
    pub post: Mutex<VecDeque<Result<(), RemoteError>>>,
    pub favorite: Mutex<VecDeque<Result<(), RemoteError>>>,
    /// Pages served for `get_follower_ids(Some(user), ..)`.
    pub user_follower_pages: Mutex<VecDeque<Result<IdPage, RemoteError>>>,
    /// Our own followers and friends, served as one page each.
    pub own_followers: Mutex<Vec<UserId>>,
    pub own_friends: Mutex<Vec<UserId>>,
    pub users: Mutex<Vec<UserProfile>>,
}

impl MockClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls().iter().filter(|&c| pred(c)).count()
    }

    pub fn push_search(&self, result: Result<Vec<ContentItem>, RemoteError>) {
        self.search.lock().unwrap().push_back(result);
    }

    pub fn push_follow(&self, result: Result<(), RemoteError>) {
        self.follow.lock().unwrap().push_back(result);
    }

    pub fn push_unfollow(&self, result: Result<(), RemoteError>) {
        self.unfollow.lock().unwrap().push_back(result);
    }

    pub fn push_retweet(&self, result: Result<(), RemoteError>) {
        self.retweet.lock().unwrap().push_back(result);
    }

    pub fn push_post(&self, result: Result<(), RemoteError>) {
        self.post.lock().unwrap().push_back(result);
    }

    pub fn push_follower_page(&self, result: Result<IdPage, RemoteError>) {
        self.user_follower_pages.lock().unwrap().push_back(result);
    }

    pub fn set_own_friends(&self, ids: Vec<UserId>) {
        *self.own_friends.lock().unwrap() = ids;
    }

    pub fn set_own_followers(&self, ids: Vec<UserId>) {
        *self.own_followers.lock().unwrap() = ids;
    }

    pub fn set_users(&self, users: Vec<UserProfile>) {
        *self.users.lock().unwrap() = users;
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn next(queue: &Mutex<VecDeque<Result<(), RemoteError>>>) -> Result<(), RemoteError> {
        queue.lock().unwrap().pop_front().unwrap_or(Ok(()))
    }
}

pub fn user(id: u64) -> UserProfile {
    UserProfile {
        id: UserId::from(id),
        name: format!("user{id}"),
    }
}

pub fn content(id: u64, text: &str, author: u64) -> ContentItem {
    ContentItem {
        id: ContentId::from(id),
        text: text.to_string(),
        author: user(author),
        favorite_count: 0,
        retweeted: None,
    }
}

#[async_trait]
impl RemoteClient for MockClient {
    async fn post_message(&self, text: &str, media: Option<&MediaId>) -> Result<ContentItem, RemoteError> {
        self.record(Call::Post(text.to_string(), media.cloned()));
        Self::next(&self.post)?;
        Ok(ContentItem {
            id: ContentId::new("posted"),
            text: text.to_string(),
            author: user(0),
            favorite_count: 0,
            retweeted: None,
        })
    }

    async fn upload_media(&self, data: Bytes) -> Result<MediaId, RemoteError> {
        self.record(Call::Upload(data.len()));
        Ok(MediaId("media-1".to_string()))
    }

    async fn search_content(&self, query: &str, limit: usize) -> Result<Vec<ContentItem>, RemoteError> {
        self.record(Call::Search(query.to_string(), limit));
        self.search.lock().unwrap().pop_front().unwrap_or(Ok(Vec::new()))
    }

    async fn follow(&self, id: &UserId) -> Result<UserProfile, RemoteError> {
        self.record(Call::Follow(id.clone()));
        Self::next(&self.follow)?;
        Ok(UserProfile {
            id: id.clone(),
            name: format!("user{id}"),
        })
    }

    async fn unfollow(&self, id: &UserId) -> Result<UserProfile, RemoteError> {
        self.record(Call::Unfollow(id.clone()));
        Self::next(&self.unfollow)?;
        Ok(UserProfile {
            id: id.clone(),
            name: format!("user{id}"),
        })
    }

    async fn favorite(&self, id: &ContentId) -> Result<(), RemoteError> {
        self.record(Call::Favorite(id.clone()));
        Self::next(&self.favorite)
    }

    async fn retweet(&self, id: &ContentId) -> Result<ContentItem, RemoteError> {
        self.record(Call::Retweet(id.clone()));
        Self::next(&self.retweet)?;
        Ok(ContentItem {
            id: ContentId::new(format!("rt-{id}")),
            text: String::new(),
            author: user(0),
            favorite_count: 0,
            retweeted: None,
        })
    }

    async fn get_follower_ids(&self, user: Option<&UserId>, cursor: Option<&str>) -> Result<IdPage, RemoteError> {
        self.record(Call::FollowerIds(user.cloned(), cursor.map(str::to_string)));
        match user {
            Some(_) => self
                .user_follower_pages
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Ok(IdPage::default())),
            None => Ok(IdPage {
                ids: self.own_followers.lock().unwrap().clone(),
                next_cursor: None,
            }),
        }
    }

    async fn get_friend_ids(&self, cursor: Option<&str>) -> Result<IdPage, RemoteError> {
        self.record(Call::FriendIds(cursor.map(str::to_string)));
        Ok(IdPage {
            ids: self.own_friends.lock().unwrap().clone(),
            next_cursor: None,
        })
    }

    async fn find_user(&self, query: &str) -> Result<Vec<UserProfile>, RemoteError> {
        self.record(Call::FindUser(query.to_string()));
        Ok(self.users.lock().unwrap().clone())
    }

    async fn update_profile_banner(&self, _image: Bytes, crop: Option<CropRect>) -> Result<(), RemoteError> {
        self.record(Call::Banner(crop));
        Ok(())
    }
}
