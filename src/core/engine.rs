use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use async_trait::async_trait;
use bytes::Bytes;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::compose::{compose, SHORT_LINK_WIDTH};
use crate::dedup;
use crate::error::{EngineError, RemoteError, StoreError};
use crate::memory::{ContentLedger, SnapshotStore};
use crate::models::{
    ContentItem, CropRect, LikePolicy, Post, RetweetPolicy, SeenContent, SleepPolicy, UserId, UserProfile,
};
use crate::pacing::{Clock, Pacer, RandomSource};
use crate::providers::remote::RemoteClient;
use crate::relationships::{RelationKind, RelationshipStore};

/// Candidates fetched per search.
pub const SEARCH_BATCH_SIZE: usize = 5;
/// Upper bound of the random pause before each search, in seconds.
const SEARCH_JITTER_MAX_SECS: u64 = 120;
/// Friends younger than this are never unfollowed.
const UNFOLLOW_MIN_AGE_SECS: i64 = 24 * 60 * 60;
pub const FOLLOW_COOLDOWN: Duration = Duration::from_secs(15 * 60);
pub const UNFOLLOW_IDLE_WAIT: Duration = Duration::from_secs(3 * 60 * 60);

/// Caller-supplied content to publish.
#[async_trait]
pub trait PostSource: Send + Sync {
    async fn fetch(&self) -> anyhow::Result<Vec<Post>>;
}

/// Where snapshots live and how the engine starts out.
#[derive(Clone, Debug)]
pub struct EngineOptions {
    pub followers_key: String,
    pub friends_key: String,
    pub ledger_key: String,
    /// `false` removes every pacing delay (debug mode).
    pub pacing: bool,
    pub like_policy: LikePolicy,
    pub retweet_policy: RetweetPolicy,
    pub sleep_policy: SleepPolicy,
}

impl Default for EngineOptions {
    fn default() -> Self {
        EngineOptions {
            followers_key: "storage/followers.json".to_string(),
            friends_key: "storage/friends.json".to_string(),
            ledger_key: "storage/tweets.json".to_string(),
            pacing: true,
            like_policy: LikePolicy::default(),
            retweet_policy: RetweetPolicy::default(),
            sleep_policy: SleepPolicy::default(),
        }
    }
}

enum RetweetState {
    Searching { attempt: u32 },
    Candidate { attempt: u32, candidates: Vec<ContentItem> },
    Retweeted(ContentItem),
    Exhausted,
}

/// Performs follow/unfollow/retweet/like/post transitions against the remote
/// client and records every successful one locally, so repeated runs never
/// repeat or contradict an action.
pub struct ActionEngine {
    client: Arc<dyn RemoteClient>,
    friends: RelationshipStore,
    followers: RelationshipStore,
    ledger: ContentLedger,
    pacer: Pacer,
    clock: Arc<dyn Clock>,
    rng: Arc<dyn RandomSource>,
    like_policy: ArcSwap<LikePolicy>,
    retweet_policy: ArcSwap<RetweetPolicy>,
    sleep_policy: ArcSwap<SleepPolicy>,
    shutdown: CancellationToken,
}

impl ActionEngine {
    /// Opens (or creates) the three snapshots. Does not talk to the remote
    /// side; call [`ActionEngine::reconcile_all`] for that.
    pub fn open(
        client: Arc<dyn RemoteClient>,
        backend: Arc<dyn SnapshotStore>,
        clock: Arc<dyn Clock>,
        rng: Arc<dyn RandomSource>,
        options: EngineOptions,
        shutdown: CancellationToken,
    ) -> Result<Self, StoreError> {
        let followers = RelationshipStore::open(
            RelationKind::Followers,
            options.followers_key,
            backend.clone(),
            clock.clone(),
        )?;
        let friends = RelationshipStore::open(RelationKind::Friends, options.friends_key, backend.clone(), clock.clone())?;
        let ledger = ContentLedger::open(options.ledger_key, backend)?;
        let pacer = Pacer::new(clock.clone(), rng.clone(), options.pacing, shutdown.clone());
        Ok(ActionEngine {
            client,
            friends,
            followers,
            ledger,
            pacer,
            clock,
            rng,
            like_policy: ArcSwap::from_pointee(options.like_policy),
            retweet_policy: ArcSwap::from_pointee(options.retweet_policy),
            sleep_policy: ArcSwap::from_pointee(options.sleep_policy),
            shutdown,
        })
    }

    pub fn friends(&self) -> &RelationshipStore {
        &self.friends
    }

    pub fn followers(&self) -> &RelationshipStore {
        &self.followers
    }

    pub fn ledger(&self) -> &ContentLedger {
        &self.ledger
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn like_policy(&self) -> LikePolicy {
        **self.like_policy.load()
    }

    pub fn set_like_policy(&self, policy: LikePolicy) {
        info!(auto = policy.auto, threshold = policy.threshold, "setting like policy");
        self.like_policy.store(Arc::new(policy));
    }

    pub fn retweet_policy(&self) -> RetweetPolicy {
        **self.retweet_policy.load()
    }

    pub fn set_retweet_policy(&self, policy: RetweetPolicy) {
        info!(max_attempts = policy.max_attempts, like = policy.like, "setting retweet policy");
        self.retweet_policy.store(Arc::new(policy));
    }

    pub fn sleep_policy(&self) -> SleepPolicy {
        **self.sleep_policy.load()
    }

    pub fn set_sleep_policy(&self, policy: SleepPolicy) {
        info!(?policy, "setting default sleep policy");
        self.sleep_policy.store(Arc::new(policy));
    }

    pub async fn reconcile_all(&self) -> Result<(), EngineError> {
        self.reconcile_followers().await?;
        self.reconcile_friends().await
    }

    pub async fn reconcile_friends(&self) -> Result<(), EngineError> {
        let ids = self.fetch_all_ids(RelationKind::Friends).await?;
        self.friends.reconcile(ids).await?;
        Ok(())
    }

    pub async fn reconcile_followers(&self) -> Result<(), EngineError> {
        let ids = self.fetch_all_ids(RelationKind::Followers).await?;
        self.followers.reconcile(ids).await?;
        Ok(())
    }

    async fn fetch_all_ids(&self, kind: RelationKind) -> Result<Vec<UserId>, RemoteError> {
        let mut ids = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let page = match kind {
                RelationKind::Friends => self.client.get_friend_ids(cursor.as_deref()).await?,
                RelationKind::Followers => self.client.get_follower_ids(None, cursor.as_deref()).await?,
            };
            ids.extend(page.ids);
            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }
        debug!(%kind, count = ids.len(), "fetched remote ids");
        Ok(ids)
    }

    /// Retweets one piece of content matching a random query. A search that
    /// yields nothing retweetable is retried up to `max_attempts` times.
    /// Returns the retweeted candidate.
    pub async fn retweet_once(&self, queries: &[String], banned: &[String]) -> Result<ContentItem, EngineError> {
        if queries.is_empty() {
            return Err(EngineError::NoQueries);
        }
        let policy = self.retweet_policy();
        // Attempt 0 is the first search; later ones are retries.
        let mut state = RetweetState::Searching { attempt: 0 };
        loop {
            state = match state {
                RetweetState::Searching { attempt } => {
                    if attempt > policy.max_attempts || self.shutdown.is_cancelled() {
                        RetweetState::Exhausted
                    } else {
                        self.pacer.jitter(SEARCH_JITTER_MAX_SECS).await;
                        let candidates = self.search_candidates(queries, banned).await?;
                        if candidates.is_empty() {
                            RetweetState::Searching { attempt: attempt + 1 }
                        } else {
                            RetweetState::Candidate { attempt, candidates }
                        }
                    }
                }
                RetweetState::Candidate { attempt, candidates } => match self.retweet_first(&candidates).await? {
                    Some(retweeted) => RetweetState::Retweeted(retweeted),
                    None => RetweetState::Searching { attempt: attempt + 1 },
                },
                RetweetState::Retweeted(item) => return Ok(item),
                RetweetState::Exhausted => {
                    return Err(EngineError::Exhausted {
                        attempts: policy.max_attempts,
                    })
                }
            };
        }
    }

    async fn search_candidates(&self, queries: &[String], banned: &[String]) -> Result<Vec<ContentItem>, EngineError> {
        let query = &queries[self.rng.index(queries.len())];
        info!(query = %query, "searching content to retweet");
        let results = self.client.search_content(query, SEARCH_BATCH_SIZE).await?;
        let previous = self.ledger.snapshot().await;
        let candidates = dedup::filter(results, &previous, banned);
        info!(count = candidates.len(), "found content to retweet");
        Ok(candidates)
    }

    /// Retweets the first candidate that the remote side accepts.
    async fn retweet_first(&self, candidates: &[ContentItem]) -> Result<Option<ContentItem>, EngineError> {
        let like = self.retweet_policy().like;
        for candidate in candidates {
            if like {
                self.maybe_like(candidate).await?;
            }
            match self.client.retweet(&candidate.id).await {
                Ok(retweet) => {
                    if like {
                        self.maybe_like(&retweet).await?;
                    }
                    info!(rid = %retweet.id, id = %candidate.id, "retweeted");
                    self.ledger.append(SeenContent::from(candidate)).await?;
                    self.follow_author(&candidate.author).await?;
                    return Ok(Some(candidate.clone()));
                }
                Err(e) if e.is_fatal() => return Err(e.into()),
                Err(e) => {
                    warn!(id = %candidate.id, error = %e, "failed to retweet");
                    self.follow_author(&candidate.author).await?;
                }
            }
        }
        Ok(None)
    }

    /// Likes `item` when its like count is above the threshold, falling
    /// back to the status it retweets.
    async fn maybe_like(&self, item: &ContentItem) -> Result<(), EngineError> {
        let policy = self.like_policy();
        if !policy.auto {
            return Ok(());
        }
        let mut current = item;
        loop {
            if current.favorite_count > policy.threshold {
                match self.client.favorite(&current.id).await {
                    Ok(()) => info!(id = %current.id, "liked"),
                    Err(e) if e.is_fatal() => return Err(e.into()),
                    Err(e) => debug!(id = %current.id, error = %e, "failed to like"),
                }
                return Ok(());
            }
            match current.retweeted.as_deref() {
                Some(original) => current = original,
                None => return Ok(()),
            }
        }
    }

    async fn follow_author(&self, author: &UserProfile) -> Result<(), EngineError> {
        if self.friends.lookup_friend(&author.id).await.is_some_and(|r| r.active) {
            debug!(id = %author.id, "author already followed");
            return Ok(());
        }
        match self.follow_and_record(&author.id).await {
            Ok(_) => {
                info!(id = %author.id, name = %author.name, "following author");
                Ok(())
            }
            Err(EngineError::Remote(e)) if !e.is_fatal() => {
                warn!(id = %author.id, name = %author.name, error = %e, "failed to follow author");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Follows `id` and records the new friend. Every follow goes through
    /// here.
    async fn follow_and_record(&self, id: &UserId) -> Result<UserProfile, EngineError> {
        let user = self.client.follow(id).await?;
        self.friends.record_friend_added(id).await?;
        Ok(user)
    }

    /// Follows the followers of the first account matching `query`, over
    /// at most `max_pages` pages. Returns how many accounts were followed.
    pub async fn follow_followers(
        &self,
        query: &str,
        max_pages: u32,
        sleep_policy: Option<SleepPolicy>,
    ) -> Result<usize, EngineError> {
        let policy = sleep_policy.unwrap_or_else(|| self.sleep_policy());
        info!(query, max_pages, ?policy, "launching auto follow");
        self.reconcile_all().await?;
        let ids = self.fetch_follower_ids_of(query, max_pages).await?;
        let mut followed = 0;
        for id in ids {
            if self.shutdown.is_cancelled() {
                break;
            }
            if self.friends.lookup_friend(&id).await.is_some() || self.followers.is_follower(&id).await {
                continue;
            }
            if self.follow_with_cooldown(&id).await? {
                followed += 1;
                self.pacer.delay_before_next_action(&policy).await;
            }
        }
        info!(followed, "auto follow done");
        Ok(followed)
    }

    async fn fetch_follower_ids_of(&self, query: &str, max_pages: u32) -> Result<Vec<UserId>, EngineError> {
        let users = self.client.find_user(query).await?;
        let Some(user) = users.into_iter().next() else {
            return Err(EngineError::UserNotFound(query.to_string()));
        };
        let mut ids = Vec::new();
        let mut cursor: Option<String> = None;
        for page in 1..=max_pages {
            let fetched = match self.client.get_follower_ids(Some(&user.id), cursor.as_deref()).await {
                Ok(fetched) => fetched,
                Err(e) if e.is_fatal() => return Err(e.into()),
                Err(e) => {
                    warn!(user = %user.id, page, error = %e, "failed to fetch followers page");
                    break;
                }
            };
            ids.extend(fetched.ids);
            match fetched.next_cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }
        info!(user = %user.id, name = %user.name, count = ids.len(), "fetched followers to follow");
        Ok(ids)
    }

    /// Follows `id`, waiting out temporary follow restrictions. Returns
    /// whether the account is now followed.
    async fn follow_with_cooldown(&self, id: &UserId) -> Result<bool, EngineError> {
        loop {
            match self.follow_and_record(id).await {
                Ok(user) => {
                    info!(id = %id, name = %user.name, "following");
                    return Ok(true);
                }
                Err(EngineError::Remote(RemoteError::RelationshipRestricted(reason))) => {
                    warn!(id = %id, reason = %reason, "unable to follow at this time, waiting 15 minutes");
                    if !self.suspend(FOLLOW_COOLDOWN).await {
                        return Ok(false);
                    }
                }
                Err(EngineError::Remote(e)) if !e.is_fatal() => {
                    warn!(id = %id, error = %e, "failed to follow");
                    return Ok(false);
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Unfollows friends known for at least a day, forever. Returns once
    /// shutdown is requested.
    pub async fn unfollow_all(&self, sleep_policy: Option<SleepPolicy>) -> Result<(), EngineError> {
        let policy = sleep_policy.unwrap_or_else(|| self.sleep_policy());
        info!(?policy, "launching auto unfollow");
        self.reconcile_friends().await?;
        let min_age = chrono::Duration::seconds(UNFOLLOW_MIN_AGE_SECS);
        let mut failed: HashSet<UserId> = HashSet::new();
        while !self.shutdown.is_cancelled() {
            let Some(id) = self.friends.next_unfollow_candidate_excluding(min_age, &failed).await else {
                info!("no more friends to unfollow, waiting 3 hours");
                if !self.suspend(UNFOLLOW_IDLE_WAIT).await {
                    break;
                }
                failed.clear();
                continue;
            };
            match self.client.unfollow(&id).await {
                Ok(user) => {
                    self.friends.record_friend_removed(&id).await?;
                    info!(id = %id, name = %user.name, "unfollowing");
                    self.pacer.delay_before_next_action(&policy).await;
                }
                Err(e) if e.is_fatal() => return Err(e.into()),
                Err(e) => {
                    warn!(id = %id, error = %e, "failed to unfollow");
                    failed.insert(id);
                }
            }
        }
        info!("auto unfollow disabled");
        Ok(())
    }

    /// Posts `post`, uploading its media first. A link is first assumed to
    /// take the short link width; if the remote side still finds the text
    /// too long, it is recomposed with the link's real length once.
    pub async fn publish(&self, post: &Post) -> Result<ContentItem, EngineError> {
        let media = match &post.media {
            Some(data) => Some(self.client.upload_media(data.clone()).await?),
            None => None,
        };
        let link = post.link.as_deref().unwrap_or_default();
        let width = if link.is_empty() { 0 } else { SHORT_LINK_WIDTH };
        let text = compose(&post.text, link, width);
        let posted = match self.client.post_message(&text, media.as_ref()).await {
            Ok(posted) => posted,
            Err(RemoteError::MessageTooLong(reason)) if !link.is_empty() => {
                debug!(reason = %reason, "message too long, recomposing with the full link length");
                let text = compose(&post.text, link, link.chars().count());
                self.client.post_message(&text, media.as_ref()).await?
            }
            Err(e) => return Err(e.into()),
        };
        info!(id = %posted.id, text = %posted.text, "posted message");
        Ok(posted)
    }

    /// Publishes every post `source` returns. Failed posts are logged and
    /// skipped; returns how many were posted.
    pub async fn publish_from(&self, source: &dyn PostSource) -> Result<usize, EngineError> {
        let posts = source.fetch().await.map_err(EngineError::Source)?;
        let mut posted = 0;
        for post in &posts {
            match self.publish(post).await {
                Ok(_) => posted += 1,
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => warn!(error = %e, text = %post.text, "failed to post"),
            }
        }
        Ok(posted)
    }

    pub async fn update_profile_banner(&self, image: Bytes, crop: Option<CropRect>) -> Result<(), EngineError> {
        self.client.update_profile_banner(image, crop).await?;
        info!(?crop, "profile banner updated");
        Ok(())
    }

    /// Waits `duration` unless shutdown is requested first. Returns whether
    /// the caller should carry on.
    async fn suspend(&self, duration: Duration) -> bool {
        if self.shutdown.is_cancelled() {
            return false;
        }
        tokio::select! {
            _ = self.clock.sleep(duration) => {}
            _ = self.shutdown.cancelled() => {}
        }
        !self.shutdown.is_cancelled()
    }
}
