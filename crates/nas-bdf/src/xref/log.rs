//! Bounded log of tolerated resolution errors.

use serde::Serialize;
use tracing::{error, warn};

use super::Stage;
use super::options::OverflowPolicy;
use crate::error::{EntityRef, StructuralError};

/// One tolerated failure
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct XrefErrorRecord {
    pub stage: Stage,
    pub entity: EntityRef,
    pub description: String,
}

/// Outcome of recording a tolerated error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Overflow {
    Continue,
    Abort,
}

/// Errors tolerated during a cross-reference pass.
///
/// Records stay pending until the running total first exceeds the limit.
/// At that point the overflow policy fires (once): the backlog is logged and
/// moved to the flushed list, and under [`OverflowPolicy::Flush`] every later
/// record is flushed as soon as it arrives.
#[derive(Debug, Clone, Serialize)]
pub struct XrefErrorLog {
    limit: usize,
    policy: OverflowPolicy,
    total: usize,
    overflow_events: usize,
    pending: Vec<XrefErrorRecord>,
    flushed: Vec<XrefErrorRecord>,
}

impl Default for XrefErrorLog {
    fn default() -> Self {
        Self::new(100, OverflowPolicy::Flush)
    }
}

impl XrefErrorLog {
    pub fn new(limit: usize, policy: OverflowPolicy) -> Self {
        Self {
            limit,
            policy,
            total: 0,
            overflow_events: 0,
            pending: Vec::new(),
            flushed: Vec::new(),
        }
    }

    /// Empty the log and apply a new limit/policy
    pub fn reset(&mut self, limit: usize, policy: OverflowPolicy) {
        *self = Self::new(limit, policy);
    }

    pub fn record(&mut self, stage: Stage, entity: EntityRef, err: &StructuralError) -> Overflow {
        warn!(stage = %stage, entity = %entity, "{err}");
        self.total += 1;
        self.pending.push(XrefErrorRecord {
            stage,
            entity,
            description: err.to_string(),
        });

        if self.total <= self.limit {
            return Overflow::Continue;
        }
        if self.overflow_events == 0 {
            self.overflow_events = 1;
            error!(
                total = self.total,
                limit = self.limit,
                "too many cross-reference errors, flushing backlog"
            );
            self.flush();
            return match self.policy {
                OverflowPolicy::Flush => Overflow::Continue,
                OverflowPolicy::Abort => Overflow::Abort,
            };
        }
        self.flush();
        Overflow::Continue
    }

    fn flush(&mut self) {
        for record in self.pending.drain(..) {
            error!(stage = %record.stage, entity = %record.entity, "{}", record.description);
            self.flushed.push(record);
        }
    }

    /// Total tolerated errors this pass
    pub fn total(&self) -> usize {
        self.total
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn policy(&self) -> OverflowPolicy {
        self.policy
    }

    /// Number of times the overflow policy fired (0 or 1)
    pub fn overflow_events(&self) -> usize {
        self.overflow_events
    }

    /// Every record in arrival order
    pub fn records(&self) -> impl Iterator<Item = &XrefErrorRecord> {
        self.flushed.iter().chain(self.pending.iter())
    }

    /// Records not yet reported through the overflow policy
    pub fn pending(&self) -> &[XrefErrorRecord] {
        &self.pending
    }

    pub fn flushed(&self) -> &[XrefErrorRecord] {
        &self.flushed
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    pub fn clear(&mut self) {
        self.reset(self.limit, self.policy);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn err(id: i32) -> StructuralError {
        StructuralError::missing(EntityRef::new("CROD", id), "property", 99)
    }

    #[test]
    fn stays_pending_under_the_limit() {
        let mut log = XrefErrorLog::new(3, OverflowPolicy::Flush);
        for id in 1..=3 {
            assert_eq!(
                log.record(Stage::Elements, EntityRef::new("CROD", id), &err(id)),
                Overflow::Continue
            );
        }
        assert_eq!(log.total(), 3);
        assert_eq!(log.pending().len(), 3);
        assert_eq!(log.overflow_events(), 0);
    }

    #[test]
    fn flush_policy_fires_once_and_continues() {
        let mut log = XrefErrorLog::new(2, OverflowPolicy::Flush);
        for id in 1..=5 {
            assert_eq!(
                log.record(Stage::Loads, EntityRef::new("CROD", id), &err(id)),
                Overflow::Continue
            );
        }
        assert_eq!(log.overflow_events(), 1);
        assert_eq!(log.total(), 5);
        assert!(log.pending().is_empty());
        assert_eq!(log.flushed().len(), 5);
        let ids: Vec<_> = log.records().map(|r| r.entity.to_string()).collect();
        assert_eq!(ids, vec!["CROD 1", "CROD 2", "CROD 3", "CROD 4", "CROD 5"]);
    }

    #[test]
    fn abort_policy_signals_on_first_overflow() {
        let mut log = XrefErrorLog::new(1, OverflowPolicy::Abort);
        assert_eq!(
            log.record(Stage::Materials, EntityRef::new("MAT1", 1), &err(1)),
            Overflow::Continue
        );
        assert_eq!(
            log.record(Stage::Materials, EntityRef::new("MAT1", 2), &err(2)),
            Overflow::Abort
        );
        assert_eq!(log.overflow_events(), 1);
    }

    #[test]
    fn clear_keeps_configuration() {
        let mut log = XrefErrorLog::new(7, OverflowPolicy::Abort);
        log.record(Stage::Elements, EntityRef::new("CROD", 1), &err(1));
        log.clear();
        assert!(log.is_empty());
        assert_eq!(log.limit(), 7);
        assert_eq!(log.policy(), OverflowPolicy::Abort);
    }
}
