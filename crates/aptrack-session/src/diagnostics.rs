//! Report-once channel for reconciliation problems.

use crate::ReconcileError;

/// Distinct reconciliation problems, in the order first seen.
///
/// A repeat of an already recorded error is counted but not logged
/// again, so a misbehaving server cannot flood the log.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    reported: Vec<ReconcileError>,
    suppressed: usize,
}

impl Diagnostics {
    /// Records `err`. Returns `true` the first time it is seen.
    pub fn report(&mut self, err: ReconcileError) -> bool {
        if self.reported.contains(&err) {
            self.suppressed += 1;
            return false;
        }
        tracing::warn!(error = %err, "reconciliation problem");
        self.reported.push(err);
        true
    }

    pub fn reported(&self) -> &[ReconcileError] {
        &self.reported
    }

    /// How many repeats were swallowed.
    pub fn suppressed(&self) -> usize {
        self.suppressed
    }
}

#[cfg(test)]
mod tests {
    use aptrack_protocol::SlotId;

    use super::*;

    #[test]
    fn test_report_records_each_distinct_error_once() {
        let mut diagnostics = Diagnostics::default();
        let err = ReconcileError::UnknownSlot {
            cmd: "ReceivedItems",
            slot: SlotId(2),
        };

        assert!(diagnostics.report(err.clone()));
        assert!(!diagnostics.report(err.clone()));
        assert!(diagnostics.report(ReconcileError::NotConnected { cmd: "LocationInfo" }));

        assert_eq!(diagnostics.reported().len(), 2);
        assert_eq!(diagnostics.suppressed(), 1);
    }
}
