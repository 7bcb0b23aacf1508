//! Drops candidates that are banned or were already acted upon.

use std::collections::HashSet;

use tracing::debug;

use crate::models::{ContentId, ContentItem, SeenContent};
use crate::normalize::fingerprint;

/// Filters a freshly fetched batch, in this order:
/// 1. candidates whose text or author name contains a banned term,
/// 2. later candidates with the same fingerprint as an earlier one,
/// 3. candidates whose id or fingerprint is already in `previously_seen`.
///
/// Survivors keep their input order.
pub fn filter(
    candidates: Vec<ContentItem>,
    previously_seen: &[SeenContent],
    banned: &[String],
) -> Vec<ContentItem> {
    let allowed = remove_banned(candidates, banned);
    let unique = remove_duplicates(allowed);
    take_difference(previously_seen, unique)
}

fn remove_banned(candidates: Vec<ContentItem>, banned: &[String]) -> Vec<ContentItem> {
    candidates
        .into_iter()
        .filter(|item| {
            let hit = banned
                .iter()
                .find(|term| item.text.contains(term.as_str()) || item.author.name.contains(term.as_str()));
            if let Some(term) = hit {
                debug!(id = %item.id, term = %term, text = %item.text, "removing banned candidate");
            }
            hit.is_none()
        })
        .collect()
}

fn remove_duplicates(candidates: Vec<ContentItem>) -> Vec<ContentItem> {
    let mut seen = HashSet::new();
    candidates
        .into_iter()
        .filter(|item| {
            let fresh = seen.insert(fingerprint(&item.text));
            if !fresh {
                debug!(id = %item.id, text = %item.text, "found a duplicate in batch");
            }
            fresh
        })
        .collect()
}

fn take_difference(previous: &[SeenContent], current: Vec<ContentItem>) -> Vec<ContentItem> {
    let ids: HashSet<&ContentId> = previous.iter().map(|seen| &seen.id).collect();
    let texts: HashSet<String> = previous.iter().map(|seen| fingerprint(&seen.text)).collect();
    current
        .into_iter()
        .filter(|item| {
            if ids.contains(&item.id) {
                debug!(id = %item.id, text = %item.text, "already acted upon (same id)");
                return false;
            }
            if texts.contains(&fingerprint(&item.text)) {
                debug!(id = %item.id, text = %item.text, "already acted upon (same text)");
                return false;
            }
            true
        })
        .collect()
}
