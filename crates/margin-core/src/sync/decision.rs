//! Three-way timestamp comparison deciding which copy of a note wins

use std::cmp::Ordering;

use chrono::{DateTime, Utc};

/// How an incoming note relates to the local copy with the same guid
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Same change date on both sides
    Identical,
    /// Both sides changed independently relative to the sync baseline
    Conflict,
    /// The local copy is strictly newer
    LocalNewer,
    /// The incoming copy is strictly newer
    RemoteNewer,
}

/// The three pairwise orderings the decision is made from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Comparison {
    /// local vs incoming
    pub both: Ordering,
    /// baseline vs local
    pub sync_local: Ordering,
    /// baseline vs incoming
    pub sync_remote: Ordering,
}

impl Comparison {
    pub fn new(local: DateTime<Utc>, incoming: DateTime<Utc>, baseline: DateTime<Utc>) -> Self {
        Self {
            both: local.cmp(&incoming),
            sync_local: baseline.cmp(&local),
            sync_remote: baseline.cmp(&incoming),
        }
    }

    /// Whether the baseline sits on the same side of both change dates.
    ///
    /// Both after the baseline means both were edited since the last sync; both
    /// before it means the clocks disagree. Either way neither side is a clean
    /// continuation of the other.
    pub fn baseline_on_same_side(&self) -> bool {
        matches!(
            (self.sync_local, self.sync_remote),
            (Ordering::Less, Ordering::Less) | (Ordering::Greater, Ordering::Greater)
        )
    }

    /// `local` vs `incoming` as -1, 0 or 1, the direction handed to the presenter
    pub fn direction(&self) -> i32 {
        match self.both {
            Ordering::Less => -1,
            Ordering::Equal => 0,
            Ordering::Greater => 1,
        }
    }
}

/// Apply the decision table. The first matching rule wins.
pub fn classify(comparison: &Comparison, is_push_round: bool) -> Verdict {
    if comparison.both == Ordering::Equal {
        Verdict::Identical
    } else if is_push_round && comparison.baseline_on_same_side() {
        Verdict::Conflict
    } else if comparison.both == Ordering::Greater {
        Verdict::LocalNewer
    } else {
        Verdict::RemoteNewer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, hour, 0, 0).unwrap()
    }

    fn verdict(local: u32, incoming: u32, baseline: u32, push: bool) -> Verdict {
        classify(&Comparison::new(at(local), at(incoming), at(baseline)), push)
    }

    #[test]
    fn test_identical_dates_win_over_everything() {
        assert_eq!(verdict(5, 5, 1, true), Verdict::Identical);
        assert_eq!(verdict(5, 5, 9, false), Verdict::Identical);
    }

    #[test]
    fn test_local_edit_after_sync_is_not_a_conflict() {
        // synced at T0 = remote date, local edited to T1
        assert_eq!(verdict(3, 1, 1, true), Verdict::LocalNewer);
    }

    #[test]
    fn test_remote_edit_after_sync_is_not_a_conflict() {
        assert_eq!(verdict(1, 3, 1, true), Verdict::RemoteNewer);
    }

    #[test]
    fn test_both_edited_since_baseline_conflicts() {
        assert_eq!(verdict(3, 4, 1, true), Verdict::Conflict);
        assert_eq!(verdict(4, 3, 1, true), Verdict::Conflict);
    }

    #[test]
    fn test_both_before_baseline_conflicts() {
        assert_eq!(verdict(2, 3, 8, true), Verdict::Conflict);
    }

    #[test]
    fn test_baseline_between_dates_resolves_by_newer() {
        assert_eq!(verdict(2, 6, 4, true), Verdict::RemoteNewer);
        assert_eq!(verdict(6, 2, 4, true), Verdict::LocalNewer);
    }

    #[test]
    fn test_conflicts_only_escalate_on_push_rounds() {
        assert_eq!(verdict(3, 4, 1, false), Verdict::RemoteNewer);
        assert_eq!(verdict(4, 3, 1, false), Verdict::LocalNewer);
    }

    #[test]
    fn test_direction() {
        let comparison = Comparison::new(at(4), at(3), at(1));
        assert_eq!(comparison.direction(), 1);
        let comparison = Comparison::new(at(3), at(4), at(1));
        assert_eq!(comparison.direction(), -1);
    }
}
