//! The incremental merge engine.
//!
//! Reconciles a previously archived collection against a freshly paginated
//! live feed. Both sides are ordered newest-first. New records end up ahead
//! of the known ones in feed order, already-known records keep their archive
//! positions, and edited records can be replaced in place. Once enough
//! already-known records have been seen, paging stops early on the
//! assumption that the feed only grows at the head.

use std::collections::{HashMap, HashSet};

use tracing::{debug, warn};

use crate::Result;
use crate::error::Error;
use crate::feed::FeedSource;
use crate::record::{FeedItem, Record};
use crate::types::RecordId;

/// Stop paging after this many already-known records have been seen.
///
/// Ten known items imply everything older is already archived. This is a
/// heuristic, not a proof; feeds with unusual edit or delete patterns can
/// violate the assumption, which is why `--no-stopping` exists.
pub const STOP_AFTER_DUPLICATES: usize = 10;

/// Knobs for one reconcile run.
#[derive(Debug, Clone)]
pub struct MergeOptions {
    /// Stop fetching once this many duplicates have been seen.
    pub stop_after: Option<usize>,

    /// Replace changed records in place instead of counting them as
    /// duplicates.
    pub update_existing: bool,

    /// Require evidence that the feed overlaps the archive: either the
    /// newest known record's id appears in the feed, or the duplicate
    /// threshold fires. Exhausting the feed without either is a lost
    /// resume point.
    pub require_resume_point: bool,
}

impl MergeOptions {
    /// The default incremental fetch: stop early, don't rewrite history.
    pub fn incremental() -> Self {
        Self {
            stop_after: Some(STOP_AFTER_DUPLICATES),
            update_existing: false,
            require_resume_point: true,
        }
    }

    /// A forced full walk of the feed, updating edited records in place.
    pub fn full_refetch() -> Self {
        Self {
            stop_after: None,
            update_existing: true,
            require_resume_point: false,
        }
    }
}

/// The result of one reconcile run.
#[derive(Debug, Default)]
pub struct MergeOutcome {
    /// The updated collection, newest-first.
    pub records: Vec<Record>,

    /// Records that were not in the archive before.
    pub added: usize,

    /// Known records replaced in place because their content changed.
    pub updated: usize,

    /// Known records seen again unchanged.
    pub duplicates: usize,
}

/// Reconcile a known collection against a live feed.
///
/// Items failing the `accept` filter are skipped before they reach the
/// merge. On success the returned collection satisfies: at most one record
/// per identity, new records ahead of known ones in feed order, known
/// records in their original relative order.
///
/// # Errors
///
/// Propagates feed errors unchanged. Returns [`Error::ResumePointLost`]
/// when the feed is exhausted without any evidence of overlap with a
/// non-empty archive (see [`MergeOptions::require_resume_point`]).
pub async fn reconcile<S, F>(
    known: &[Record],
    source: &mut S,
    accept: F,
    options: &MergeOptions,
) -> Result<MergeOutcome>
where
    S: FeedSource + ?Sized,
    F: Fn(&FeedItem) -> bool,
{
    let index: HashMap<RecordId, usize> = known
        .iter()
        .enumerate()
        .map(|(position, record)| (record.id.clone(), position))
        .collect();

    if index.len() < known.len() {
        warn!(
            known = known.len(),
            distinct = index.len(),
            "archived collection contains duplicate identities; keeping first occurrences"
        );
    }

    let resume_target = known.first().map(|record| record.id.clone());
    let mut resume_seen = false;
    let mut stopped_early = false;

    let mut kept: Vec<Record> = known.to_vec();
    let mut fresh: Vec<Record> = Vec::new();
    let mut fresh_ids: HashSet<RecordId> = HashSet::new();

    let mut outcome = MergeOutcome::default();

    'pages: while let Some(page) = source.next_page().await? {
        for item in page {
            if !accept(&item) {
                continue;
            }
            let Some(record) = item.into_record() else {
                continue;
            };

            if Some(&record.id) == resume_target.as_ref() {
                resume_seen = true;
            }

            if let Some(&position) = index.get(&record.id) {
                if kept[position].equivalent(&record) {
                    outcome.duplicates += 1;
                } else if options.update_existing {
                    kept[position] = record;
                    outcome.updated += 1;
                } else {
                    outcome.duplicates += 1;
                }

                if let Some(threshold) = options.stop_after {
                    if outcome.duplicates >= threshold {
                        debug!(duplicates = outcome.duplicates, "stopping early");
                        stopped_early = true;
                        break 'pages;
                    }
                }
            } else if fresh_ids.insert(record.id.clone()) {
                fresh.push(record);
                outcome.added += 1;
            }
            // A repeat within the feed itself (e.g. a pinned item shown
            // twice) is dropped without counting toward the threshold.
        }
    }

    if options.require_resume_point && !resume_seen && !stopped_early {
        if let Some(id) = resume_target {
            return Err(Error::ResumePointLost { id });
        }
    }

    debug!(
        added = outcome.added,
        updated = outcome.updated,
        duplicates = outcome.duplicates,
        "reconcile finished"
    );

    fresh.extend(kept);
    outcome.records = fresh;
    Ok(outcome)
}
