//! Local view of who we follow (friends) and who follows us (followers).
//!
//! Records are never deleted: an ended relationship is kept with
//! `active = false` so the bot does not follow the same account twice.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::StoreError;
use crate::memory::{load_or_init, save_typed, SnapshotStore};
use crate::models::{RelationshipRecord, RelationshipSet, UserId};
use crate::pacing::Clock;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RelationKind {
    Friends,
    Followers,
}

impl fmt::Display for RelationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelationKind::Friends => f.write_str("friends"),
            RelationKind::Followers => f.write_str("followers"),
        }
    }
}

/// Applies an authoritative remote id list to `local`: every record goes
/// inactive, then every remote id is reactivated or inserted with
/// `first_seen = now`. Existing `first_seen` values are kept.
pub fn reconcile_snapshot<I>(local: &RelationshipSet, remote_ids: I, now: DateTime<Utc>) -> RelationshipSet
where
    I: IntoIterator<Item = UserId>,
{
    let mut updated = local.clone();
    for record in updated.ids.values_mut() {
        record.active = false;
    }
    for id in remote_ids {
        updated
            .ids
            .entry(id)
            .and_modify(|record| record.active = true)
            .or_insert(RelationshipRecord {
                first_seen: now,
                active: true,
            });
    }
    updated
}

pub struct RelationshipStore {
    kind: RelationKind,
    key: String,
    backend: Arc<dyn SnapshotStore>,
    clock: Arc<dyn Clock>,
    set: Mutex<RelationshipSet>,
}

impl RelationshipStore {
    /// Loads the snapshot under `key`, creating an empty one if absent.
    pub fn open(
        kind: RelationKind,
        key: impl Into<String>,
        backend: Arc<dyn SnapshotStore>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, StoreError> {
        let key = key.into();
        let set: RelationshipSet = load_or_init(backend.as_ref(), &key)?;
        info!(%kind, key = %key, records = set.ids.len(), "relationship snapshot loaded");
        Ok(RelationshipStore {
            kind,
            key,
            backend,
            clock,
            set: Mutex::new(set),
        })
    }

    pub fn kind(&self) -> RelationKind {
        self.kind
    }

    /// Replaces the snapshot with its reconciliation against `remote_ids`.
    /// The new snapshot is persisted before it becomes visible.
    pub async fn reconcile<I>(&self, remote_ids: I) -> Result<(), StoreError>
    where
        I: IntoIterator<Item = UserId>,
    {
        let mut set = self.set.lock().await;
        let updated = reconcile_snapshot(&set, remote_ids, self.clock.now());
        save_typed(self.backend.as_ref(), &self.key, &updated)?;
        let active = updated.ids.values().filter(|r| r.active).count();
        info!(kind = %self.kind, total = updated.ids.len(), active, "relationships reconciled");
        *set = updated;
        Ok(())
    }

    /// Inserts or overwrites `id` as active since now. Like every
    /// `*_friend` method, it applies to whichever set this store holds.
    pub async fn record_friend_added(&self, id: &UserId) -> Result<(), StoreError> {
        let mut set = self.set.lock().await;
        set.ids.insert(
            id.clone(),
            RelationshipRecord {
                first_seen: self.clock.now(),
                active: true,
            },
        );
        save_typed(self.backend.as_ref(), &self.key, &*set)
    }

    /// Flags `id` as no longer active. The record itself is kept.
    pub async fn record_friend_removed(&self, id: &UserId) -> Result<(), StoreError> {
        let mut set = self.set.lock().await;
        let Some(record) = set.ids.get_mut(id) else {
            return Err(StoreError::UnknownIdentifier {
                key: self.key.clone(),
                id: id.clone(),
            });
        };
        record.active = false;
        save_typed(self.backend.as_ref(), &self.key, &*set)
    }

    /// Copy of the record for `id`, in whichever set this store holds.
    pub async fn lookup_friend(&self, id: &UserId) -> Option<RelationshipRecord> {
        self.set.lock().await.ids.get(id).copied()
    }

    pub async fn is_follower(&self, id: &UserId) -> bool {
        self.set.lock().await.ids.contains_key(id)
    }

    /// First active record, in ascending id order, known for at least
    /// `min_age`.
    pub async fn next_unfollow_candidate(&self, min_age: Duration) -> Option<UserId> {
        self.next_unfollow_candidate_excluding(min_age, &HashSet::new())
            .await
    }

    pub async fn next_unfollow_candidate_excluding(
        &self,
        min_age: Duration,
        skip: &HashSet<UserId>,
    ) -> Option<UserId> {
        let now = self.clock.now();
        let set = self.set.lock().await;
        let found = set
            .ids
            .iter()
            .find(|(id, record)| record.active && now - record.first_seen >= min_age && !skip.contains(*id))
            .map(|(id, _)| id.clone());
        debug!(kind = %self.kind, found = ?found, "unfollow candidate scan");
        found
    }

    pub async fn snapshot(&self) -> RelationshipSet {
        self.set.lock().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.set.lock().await.ids.len()
    }

    pub async fn active_count(&self) -> usize {
        self.set.lock().await.ids.values().filter(|r| r.active).count()
    }
}
