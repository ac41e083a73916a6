use crate::scorer::DimensionScore;
use crate::types::{Severity, Verdict};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub verdict: Verdict,
    /// Changes can be applied as targeted edits instead of a full revision.
    pub surgical: bool,
}

/// One pass, one verdict: a pure function of the dimension ratings.
pub fn decide(scores: &[DimensionScore]) -> Decision {
    let worst = scores
        .iter()
        .map(|s| s.rating)
        .max()
        .unwrap_or(Severity::Pass);
    let verdict = match worst {
        Severity::Pass => Verdict::Approved,
        Severity::Warn => Verdict::ApprovedWithChanges,
        Severity::Fail => Verdict::NeedsRevision,
    };
    Decision {
        verdict,
        surgical: verdict == Verdict::ApprovedWithChanges,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Dimension;

    fn scores(ratings: [Severity; 6]) -> Vec<DimensionScore> {
        Dimension::all()
            .iter()
            .zip(ratings)
            .map(|(&dimension, rating)| DimensionScore {
                dimension,
                rating,
                count: usize::from(rating != Severity::Pass),
            })
            .collect()
    }

    #[test]
    fn all_pass_is_approved() {
        let d = decide(&scores([Severity::Pass; 6]));
        assert_eq!(d.verdict, Verdict::Approved);
        assert!(!d.surgical);
    }

    #[test]
    fn any_warn_without_fail_is_approved_with_changes() {
        let mut r = [Severity::Pass; 6];
        r[3] = Severity::Warn;
        let d = decide(&scores(r));
        assert_eq!(d.verdict, Verdict::ApprovedWithChanges);
        assert!(d.surgical);
    }

    #[test]
    fn any_fail_needs_revision() {
        let mut r = [Severity::Warn; 6];
        r[5] = Severity::Fail;
        assert_eq!(decide(&scores(r)).verdict, Verdict::NeedsRevision);
    }
}
