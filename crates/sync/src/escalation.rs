//! Consecutive-error tracking for the primary stream.

use crate::error::StoreError;

/// Outcome of recording one error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Escalation {
    /// Expected for restricted sessions; counter untouched.
    Benign,
    /// Below threshold; keep trusting push delivery.
    Retrying { count: u32, threshold: u32 },
    /// Threshold just reached. Fires once per escalation.
    Escalated { count: u32 },
    /// Already escalated; still counting.
    AlreadyEscalated { count: u32 },
}

#[derive(Debug, Clone)]
pub struct ErrorEscalationTracker {
    threshold: u32,
    consecutive: u32,
    escalated: bool,
}

impl ErrorEscalationTracker {
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold: threshold.max(1),
            consecutive: 0,
            escalated: false,
        }
    }

    pub fn record(&mut self, error: &StoreError) -> Escalation {
        if error.is_benign() {
            return Escalation::Benign;
        }
        self.consecutive = self.consecutive.saturating_add(1);
        if self.escalated {
            Escalation::AlreadyEscalated {
                count: self.consecutive,
            }
        } else if self.consecutive >= self.threshold {
            self.escalated = true;
            Escalation::Escalated {
                count: self.consecutive,
            }
        } else {
            Escalation::Retrying {
                count: self.consecutive,
                threshold: self.threshold,
            }
        }
    }

    /// Called on any successful snapshot and on manual refresh.
    pub fn reset(&mut self) {
        self.consecutive = 0;
        self.escalated = false;
    }

    pub fn count(&self) -> u32 {
        self.consecutive
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    pub fn is_escalated(&self) -> bool {
        self.escalated
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escalates_exactly_once_at_threshold() {
        let mut t = ErrorEscalationTracker::new(3);
        let err = StoreError::unavailable("down");

        assert_eq!(t.record(&err), Escalation::Retrying { count: 1, threshold: 3 });
        assert_eq!(t.record(&err), Escalation::Retrying { count: 2, threshold: 3 });
        assert_eq!(t.record(&err), Escalation::Escalated { count: 3 });
        assert_eq!(t.record(&err), Escalation::AlreadyEscalated { count: 4 });
        assert_eq!(t.record(&err), Escalation::AlreadyEscalated { count: 5 });
    }

    #[test]
    fn benign_errors_do_not_count() {
        let mut t = ErrorEscalationTracker::new(3);
        for _ in 0..10 {
            assert_eq!(t.record(&StoreError::permission_denied("no")), Escalation::Benign);
        }
        assert_eq!(t.count(), 0);
    }

    #[test]
    fn reset_rearms_escalation() {
        let mut t = ErrorEscalationTracker::new(2);
        let err = StoreError::unavailable("down");
        t.record(&err);
        t.record(&err);
        assert!(t.is_escalated());

        t.reset();
        assert_eq!(t.count(), 0);
        assert!(!t.is_escalated());
        assert_eq!(t.record(&err), Escalation::Retrying { count: 1, threshold: 2 });
        assert_eq!(t.record(&err), Escalation::Escalated { count: 2 });
    }

    #[test]
    fn threshold_is_at_least_one() {
        let mut t = ErrorEscalationTracker::new(0);
        assert_eq!(t.threshold(), 1);
        assert_eq!(
            t.record(&StoreError::unavailable("x")),
            Escalation::Escalated { count: 1 }
        );
    }
}
