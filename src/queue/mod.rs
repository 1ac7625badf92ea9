//! Review queue: persists potential-match decisions with enforced status
//! transitions, priority ordering, and aging.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::error::{ErrorContext, ResolverError};
use crate::matching::{Explanation, Outcome, Score};
use crate::record::Record;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Status {
    Pending,
    Confirmed,
    Rejected,
    Expired,
    Cancelled,
}

impl Status {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Status::Pending)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DecisionAction {
    Confirm,
    Reject,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decision {
    pub action: DecisionAction,
    pub selected_match_id: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PotentialMatch {
    pub record: Record,
    pub score: Score,
    pub outcome: Outcome,
    pub explanation: Explanation,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueItem {
    pub id: String,
    pub candidate_record: Record,
    pub potential_matches: Vec<PotentialMatch>,
    pub status: Status,
    pub priority: i64,
    pub tags: BTreeSet<String>,
    pub created_at: DateTime<Utc>,
    pub decided_at: Option<DateTime<Utc>>,
    pub decided_by: Option<String>,
    pub decision: Option<Decision>,
    pub context: Option<JsonValue>,
}

impl QueueItem {
    pub fn new(id: impl Into<String>, candidate_record: Record, potential_matches: Vec<PotentialMatch>, priority: i64) -> Self {
        Self {
            id: id.into(),
            candidate_record,
            potential_matches,
            status: Status::Pending,
            priority,
            tags: BTreeSet::new(),
            created_at: Utc::now(),
            decided_at: None,
            decided_by: None,
            decision: None,
            context: None,
        }
    }

    fn ensure_pending(&self, to: &str) -> Result<(), ResolverError> {
        if self.status != Status::Pending {
            return Err(ResolverError::InvalidStatusTransition {
                id: self.id.clone(),
                from: format!("{:?}", self.status),
                to: to.to_string(),
            });
        }
        Ok(())
    }

    /// `pending -> confirmed`. The only non-terminal-entry transition
    /// that records a decision with a selected match.
    pub fn confirm(&mut self, decided_by: Option<String>, selected_match_id: Option<String>, notes: Option<String>) -> Result<(), ResolverError> {
        self.ensure_pending("confirmed")?;
        self.status = Status::Confirmed;
        self.decided_at = Some(Utc::now());
        self.decided_by = decided_by;
        self.decision = Some(Decision {
            action: DecisionAction::Confirm,
            selected_match_id,
            notes,
        });
        Ok(())
    }

    /// `pending -> rejected`.
    pub fn reject(&mut self, decided_by: Option<String>, notes: Option<String>) -> Result<(), ResolverError> {
        self.ensure_pending("rejected")?;
        self.status = Status::Rejected;
        self.decided_at = Some(Utc::now());
        self.decided_by = decided_by;
        self.decision = Some(Decision {
            action: DecisionAction::Reject,
            selected_match_id: None,
            notes,
        });
        Ok(())
    }

    /// `pending -> cancelled`.
    pub fn cancel(&mut self) -> Result<(), ResolverError> {
        self.ensure_pending("cancelled")?;
        self.status = Status::Cancelled;
        self.decided_at = Some(Utc::now());
        Ok(())
    }

    /// `pending -> expired`, driven by wall-clock age exceeding
    /// `auto_expire_after`.
    pub fn maybe_expire(&mut self, now: DateTime<Utc>, auto_expire_after: ChronoDuration) -> bool {
        if self.status != Status::Pending {
            return false;
        }
        if now - self.created_at >= auto_expire_after {
            self.status = Status::Expired;
            self.decided_at = Some(now);
            true
        } else {
            false
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct QueueFilter {
    pub statuses: Vec<Status>,
    pub tags: Vec<String>,
    pub older_than: Option<DateTime<Utc>>,
    pub newer_than: Option<DateTime<Utc>>,
    pub priority: Option<i64>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl QueueFilter {
    fn matches(&self, item: &QueueItem) -> bool {
        if !self.statuses.is_empty() && !self.statuses.contains(&item.status) {
            return false;
        }
        if !self.tags.is_empty() && !self.tags.iter().all(|t| item.tags.contains(t)) {
            return false;
        }
        if let Some(older_than) = self.older_than {
            if item.created_at >= older_than {
                return false;
            }
        }
        if let Some(newer_than) = self.newer_than {
            if item.created_at <= newer_than {
                return false;
            }
        }
        if let Some(priority) = self.priority {
            if item.priority != priority {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueStats {
    pub total: usize,
    pub pending: usize,
    pub confirmed: usize,
    pub rejected: usize,
    pub expired: usize,
    pub cancelled: usize,
    pub oldest_pending_age_seconds: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertThresholds {
    pub max_queue_size: usize,
    pub max_age: ChronoDuration,
    pub min_throughput_per_day: f64,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            max_queue_size: 1000,
            max_age: ChronoDuration::days(7),
            min_throughput_per_day: 10.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum QueueAlert {
    QueueTooLarge { size: usize, threshold: usize },
    ItemTooOld { item_id: String, age_seconds: i64 },
    ThroughputTooLow { per_day: f64, threshold: f64 },
}

/// In-process store for queue items, ordered for priority-then-age
/// retrieval. Real persistence is delegated to an external
/// `QueueRepository`; this is the pure decision logic plus an in-memory
/// reference implementation for tests.
#[derive(Default)]
pub struct ReviewQueue {
    items: HashMap<String, QueueItem>,
}

impl ReviewQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, item: QueueItem) {
        self.items.insert(item.id.clone(), item);
    }

    pub fn get(&self, id: &str) -> Option<&QueueItem> {
        self.items.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Result<&mut QueueItem, ResolverError> {
        self.items.get_mut(id).ok_or_else(|| ResolverError::QueueItemNotFound { id: id.to_string() })
    }

    /// Items matching `filter`, ordered by descending priority then
    /// ascending creation time, with `offset`/`limit` applied last.
    pub fn find(&self, filter: &QueueFilter) -> Vec<&QueueItem> {
        let mut matched: Vec<&QueueItem> = self.items.values().filter(|item| filter.matches(item)).collect();
        matched.sort_by(|a, b| b.priority.cmp(&a.priority).then(a.created_at.cmp(&b.created_at)));
        let offset = filter.offset.unwrap_or(0);
        let iter = matched.into_iter().skip(offset);
        match filter.limit {
            Some(limit) => iter.take(limit).collect(),
            None => iter.collect(),
        }
    }

    pub fn count(&self, filter: &QueueFilter) -> usize {
        self.items.values().filter(|item| filter.matches(item)).count()
    }

    pub fn delete(&mut self, id: &str) -> Result<QueueItem, ResolverError> {
        self.items
            .remove(id)
            .ok_or_else(|| ResolverError::QueueItemNotFound { id: id.to_string() })
    }

    /// Sweep all pending items for wall-clock expiry, returning the ids
    /// that transitioned to `expired`.
    pub fn sweep_expired(&mut self, now: DateTime<Utc>, auto_expire_after: ChronoDuration) -> Vec<String> {
        self.items
            .values_mut()
            .filter(|item| item.maybe_expire(now, auto_expire_after))
            .map(|item| item.id.clone())
            .collect()
    }

    pub fn stats(&self, now: DateTime<Utc>) -> QueueStats {
        let mut stats = QueueStats {
            total: self.items.len(),
            pending: 0,
            confirmed: 0,
            rejected: 0,
            expired: 0,
            cancelled: 0,
            oldest_pending_age_seconds: None,
        };
        let mut oldest: Option<DateTime<Utc>> = None;
        for item in self.items.values() {
            match item.status {
                Status::Pending => {
                    stats.pending += 1;
                    oldest = Some(oldest.map_or(item.created_at, |o| o.min(item.created_at)));
                }
                Status::Confirmed => stats.confirmed += 1,
                Status::Rejected => stats.rejected += 1,
                Status::Expired => stats.expired += 1,
                Status::Cancelled => stats.cancelled += 1,
            }
        }
        stats.oldest_pending_age_seconds = oldest.map(|o| (now - o).num_seconds());
        stats
    }

    /// Evaluate `thresholds` against current state plus a caller-supplied
    /// recent decision throughput (decisions/day), emitting zero or more
    /// alerts.
    pub fn check_alerts(&self, now: DateTime<Utc>, thresholds: &AlertThresholds, recent_throughput_per_day: f64) -> Vec<QueueAlert> {
        let mut alerts = Vec::new();
        let stats = self.stats(now);

        if stats.total >= thresholds.max_queue_size {
            alerts.push(QueueAlert::QueueTooLarge {
                size: stats.total,
                threshold: thresholds.max_queue_size,
            });
        }

        for item in self.items.values() {
            if item.status == Status::Pending {
                let age = now - item.created_at;
                if age >= thresholds.max_age {
                    alerts.push(QueueAlert::ItemTooOld {
                        item_id: item.id.clone(),
                        age_seconds: age.num_seconds(),
                    });
                }
            }
        }

        if recent_throughput_per_day < thresholds.min_throughput_per_day {
            alerts.push(QueueAlert::ThroughputTooLow {
                per_day: recent_throughput_per_day,
                threshold: thresholds.min_throughput_per_day,
            });
        }

        alerts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matching::Thresholds as MatchThresholds;

    fn item() -> QueueItem {
        QueueItem::new("q1", Record::new(), vec![], 0)
    }

    #[test]
    fn s5_confirm_then_reject_fails() {
        let mut item = item();
        item.confirm(Some("reviewer".to_string()), Some("r1".to_string()), None).unwrap();
        assert_eq!(item.status, Status::Confirmed);
        assert!(item.decided_at.is_some());

        let err = item.reject(None, None).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::InvalidStatusTransition);
    }

    #[test]
    fn every_transition_from_pending_succeeds_once() {
        for transition in ["confirm", "reject", "cancel"] {
            let mut item = item();
            match transition {
                "confirm" => item.confirm(None, None, None).unwrap(),
                "reject" => item.reject(None, None).unwrap(),
                "cancel" => item.cancel().unwrap(),
                _ => unreachable!(),
            }
            assert!(item.status.is_terminal());
        }
    }

    #[test]
    fn terminal_states_are_absorbing() {
        let mut item = item();
        item.cancel().unwrap();
        assert!(item.confirm(None, None, None).is_err());
        assert!(item.reject(None, None).is_err());
        assert!(item.cancel().is_err());
    }

    #[test]
    fn expiry_driven_by_wall_clock_age() {
        let mut item = item();
        item.created_at = Utc::now() - ChronoDuration::days(31);
        let expired = item.maybe_expire(Utc::now(), ChronoDuration::days(30));
        assert!(expired);
        assert_eq!(item.status, Status::Expired);
    }

    #[test]
    fn queue_find_orders_by_priority_then_age() {
        let mut queue = ReviewQueue::new();
        let mut low = QueueItem::new("low", Record::new(), vec![], 0);
        low.created_at = Utc::now() - ChronoDuration::minutes(5);
        let mut high = QueueItem::new("high", Record::new(), vec![], 10);
        high.created_at = Utc::now();
        queue.insert(low);
        queue.insert(high);

        let results = queue.find(&QueueFilter::default());
        assert_eq!(results[0].id, "high");
    }

    #[test]
    fn check_alerts_flags_oversized_queue() {
        let mut queue = ReviewQueue::new();
        queue.insert(item());
        let thresholds = AlertThresholds {
            max_queue_size: 1,
            ..AlertThresholds::default()
        };
        let alerts = queue.check_alerts(Utc::now(), &thresholds, 100.0);
        assert!(alerts.iter().any(|a| matches!(a, QueueAlert::QueueTooLarge { .. })));
    }

    #[test]
    fn unused_import_guard() {
        let _ = MatchThresholds {
            no_match: 0.0,
            definite_match: 1.0,
        };
    }
}
