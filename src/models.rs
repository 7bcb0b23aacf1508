use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Remote user identifier. The remote side hands out integers, but we key
/// everything by the decimal string so snapshots never lose precision.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        UserId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<u64> for UserId {
    fn from(id: u64) -> Self {
        UserId(id.to_string())
    }
}

impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        UserId(id.to_string())
    }
}

impl From<String> for UserId {
    fn from(id: String) -> Self {
        UserId(id)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Remote content (tweet) identifier.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(transparent)]
pub struct ContentId(String);

impl ContentId {
    pub fn new(id: impl Into<String>) -> Self {
        ContentId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<u64> for ContentId {
    fn from(id: u64) -> Self {
        ContentId(id.to_string())
    }
}

impl From<&str> for ContentId {
    fn from(id: &str) -> Self {
        ContentId(id.to_string())
    }
}

impl fmt::Display for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct UserProfile {
    pub id: UserId,
    pub name: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ContentItem {
    pub id: ContentId,
    pub text: String,
    pub author: UserProfile,
    #[serde(default)]
    pub favorite_count: u64,
    /// Set when this item is itself a retweet of another item.
    #[serde(default)]
    pub retweeted: Option<Box<ContentItem>>,
}

/// One entry of the seen content ledger.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct SeenContent {
    pub id: ContentId,
    pub text: String,
}

impl From<&ContentItem> for SeenContent {
    fn from(item: &ContentItem) -> Self {
        SeenContent {
            id: item.id.clone(),
            text: item.text.clone(),
        }
    }
}

#[derive(Serialize, Deserialize, Default, Clone, Debug, PartialEq)]
pub struct SeenContentLedger {
    pub items: Vec<SeenContent>,
}

/// Relationship bookkeeping for one remote account.
///
/// For the friends set `active` means "we currently follow them"; for the
/// followers set it means "they currently follow us".
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct RelationshipRecord {
    pub first_seen: DateTime<Utc>,
    pub active: bool,
}

#[derive(Serialize, Deserialize, Default, Clone, Debug, PartialEq)]
pub struct RelationshipSet {
    pub ids: BTreeMap<UserId, RelationshipRecord>,
}

/// A page of user ids. `next_cursor` is `None` once the list is exhausted.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct IdPage {
    pub ids: Vec<UserId>,
    pub next_cursor: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MediaId(pub String);

/// Something to publish, as returned by a caller-supplied source.
#[derive(Clone, Debug, Default)]
pub struct Post {
    pub text: String,
    pub link: Option<String>,
    pub media: Option<Bytes>,
}

impl Post {
    pub fn text(text: impl Into<String>) -> Self {
        Post {
            text: text.into(),
            ..Default::default()
        }
    }
}

/// Banner crop area. All four values must be strictly positive.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CropRect {
    pub width: u32,
    pub height: u32,
    pub offset_left: u32,
    pub offset_top: u32,
}

impl CropRect {
    pub fn new(width: u32, height: u32, offset_left: u32, offset_top: u32) -> Option<Self> {
        if width == 0 || height == 0 || offset_left == 0 || offset_top == 0 {
            return None;
        }
        Some(CropRect {
            width,
            height,
            offset_left,
            offset_top,
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LikePolicy {
    pub auto: bool,
    pub threshold: u64,
}

impl Default for LikePolicy {
    fn default() -> Self {
        LikePolicy {
            auto: false,
            threshold: 1000,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetweetPolicy {
    pub max_attempts: u32,
    pub like: bool,
}

impl Default for RetweetPolicy {
    fn default() -> Self {
        RetweetPolicy {
            max_attempts: 5,
            like: true,
        }
    }
}

/// Sleeping behavior between remote calls.
///
/// After each call the bot sleeps a random `0..=max_rand` seconds, then with
/// a chance of `extra_chance` over `extra_chance_total` sleeps again between
/// `extra_min` and `extra_max` seconds. For example `1, 10, 30, 60` adds a
/// 30 to 60 second pause after roughly one call in ten.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SleepPolicy {
    pub max_rand: u64,
    pub extra_chance: u64,
    pub extra_chance_total: u64,
    pub extra_min: u64,
    pub extra_max: u64,
}

impl Default for SleepPolicy {
    fn default() -> Self {
        SleepPolicy {
            max_rand: 120,
            extra_chance: 1,
            extra_chance_total: 10,
            extra_min: 2500,
            extra_max: 5000,
        }
    }
}
