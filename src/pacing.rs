use std::collections::{BTreeMap, BTreeSet};

use crate::models::PacingMix;

/// Daily work-unit mix for a per-subject time budget in minutes.
pub fn pacing_for(minutes_per_subject: u32) -> PacingMix {
    match minutes_per_subject {
        m if m >= 60 => PacingMix {
            lessons: 1.0,
            practice: 1.0,
            review: 0.2,
        },
        m if m >= 45 => PacingMix {
            lessons: 1.0,
            practice: 0.5,
            review: 0.2,
        },
        _ => PacingMix {
            lessons: 0.8,
            practice: 0.2,
            review: 0.0,
        },
    }
}

/// Same mix for every subject. Counts stay fractional; rounding is up to the
/// caller.
pub fn distribute(
    minutes_per_subject: u32,
    subjects: &BTreeSet<String>,
) -> BTreeMap<String, PacingMix> {
    let mix = pacing_for(minutes_per_subject);
    subjects.iter().map(|s| (s.clone(), mix)).collect()
}
