//! Mastery tracking with spaced-repetition due dates.
//!
//! Each practice event appends evidence, moves the skill's level by at most one
//! step and pushes `next_due` out by the interval for the resulting level.

use chrono::Duration;
use tracing::debug;

use crate::clock::Clock;
use crate::engine::{retry_on_conflict, Engine};
use crate::error::{is_write_race, EngineError, Result};
use crate::models::{PracticeEntry, PracticeEvent, SkillState, MAX_LEVEL};
use crate::scope::ScopeProvider;

/// Below this much evidence only the bootstrap rule applies.
pub const BOOTSTRAP_EVIDENCE: i64 = 3;
/// Highest level reachable while bootstrapping.
pub const BOOTSTRAP_CAP: u8 = 1;
/// Evidence needed before a skill can be promoted to mastered.
pub const MASTERY_MIN_EVIDENCE: i64 = 5;
/// Success rate is computed over this many most recent entries.
pub const RATE_WINDOW: usize = 5;

// Spaced repetition interval for a level; strictly increasing
pub fn review_interval(level: u8) -> Duration {
    match level {
        0 => Duration::minutes(10),
        1 => Duration::hours(1),
        2 => Duration::days(1),
        3 => Duration::days(3),
        4 => Duration::days(7),
        _ => Duration::days(14),
    }
}

/// Share of successes among the last `RATE_WINDOW` entries. Zero when empty.
pub fn recent_success_rate(history: &[PracticeEntry]) -> f64 {
    let window = &history[history.len().saturating_sub(RATE_WINDOW)..];
    if window.is_empty() {
        return 0.0;
    }
    let successes = window.iter().filter(|e| e.success).count();
    successes as f64 / window.len() as f64
}

/// Level after a practice event. `evidence_count` and `history` already
/// include the event. Rules are checked in order and the first match wins.
pub fn next_level(level: u8, evidence_count: i64, history: &[PracticeEntry], success: bool) -> u8 {
    if evidence_count < BOOTSTRAP_EVIDENCE {
        return if success && level < BOOTSTRAP_CAP {
            level + 1
        } else {
            level
        };
    }

    let rate = recent_success_rate(history);
    if rate >= 0.90 && evidence_count >= MASTERY_MIN_EVIDENCE {
        (level + 1).min(MAX_LEVEL)
    } else if rate >= 0.75 {
        (level + 1).min(4)
    } else if rate >= 0.60 {
        // Plateau band: hold the current level
        level
    } else if rate < 0.40 {
        if level == 0 {
            0
        } else {
            (level - 1).max(1)
        }
    } else {
        level
    }
}

/// Applies one practice event to `state` in memory, keeping at most
/// `history_limit` inline history entries.
pub fn apply_practice(state: &mut SkillState, entry: PracticeEntry, history_limit: usize) {
    let at = entry.at;
    let success = entry.success;

    state.history.push(entry);
    if state.history.len() > history_limit {
        let excess = state.history.len() - history_limit;
        state.history.drain(..excess);
    }
    state.evidence_count += 1;
    state.last_practice = Some(at);
    state.level = next_level(state.level, state.evidence_count, &state.history, success);
    state.next_due = Some(at + review_interval(state.level));
}

pub fn validate_score(score: Option<f64>) -> Result<()> {
    match score {
        Some(s) if !s.is_finite() || !(0.0..=100.0).contains(&s) => Err(EngineError::invalid(
            format!("score {} outside 0..=100", s),
        )),
        _ => Ok(()),
    }
}

impl<S: ScopeProvider, C: Clock> Engine<S, C> {
    /// Records one practice attempt and returns the updated skill state.
    ///
    /// Every call is a new evidence event; identical calls accumulate. A lost
    /// optimistic-update race is retried up to `max_conflict_retries` times.
    pub fn record_practice(
        &self,
        learner_id: i64,
        skill_id: i64,
        success: bool,
        score: Option<f64>,
    ) -> Result<SkillState> {
        validate_score(score)?;
        self.require_learner(learner_id)?;
        if self.db.get_skill(skill_id)?.is_none() {
            return Err(EngineError::not_found(format!("skill {}", skill_id)));
        }

        retry_on_conflict(self.config.max_conflict_retries, |_| {
            self.try_record(learner_id, skill_id, success, score)
        })
    }

    fn try_record(
        &self,
        learner_id: i64,
        skill_id: i64,
        success: bool,
        score: Option<f64>,
    ) -> Result<SkillState> {
        let race = |e: rusqlite::Error| {
            if is_write_race(&e) {
                EngineError::Conflict(format!(
                    "skill state for learner {} skill {} changed concurrently",
                    learner_id, skill_id
                ))
            } else {
                EngineError::Database(e)
            }
        };

        let tx = self.db.begin().map_err(race)?;

        let mut state = self
            .db
            .get_skill_state(learner_id, skill_id)
            .map_err(race)?
            .unwrap_or_else(|| SkillState::fresh(learner_id, skill_id));
        let previous_level = state.level;
        let expected_version = state.version;
        // Taken after the read so a retry stamps the attempt that wins
        let now = self.clock.now();

        apply_practice(
            &mut state,
            PracticeEntry {
                at: now,
                success,
                score,
            },
            self.config.history_limit,
        );

        if state.is_persisted() {
            let written = self
                .db
                .update_skill_state(&state, expected_version)
                .map_err(race)?;
            if !written {
                return Err(EngineError::Conflict(format!(
                    "skill state for learner {} skill {} is at a newer version than {}",
                    learner_id, skill_id, expected_version
                )));
            }
            state.version = expected_version + 1;
        } else {
            state.id = self.db.insert_skill_state(&state).map_err(race)?;
            state.version = 1;
        }

        self.db
            .append_evidence(learner_id, skill_id, success, score, now)
            .map_err(race)?;
        tx.commit().map_err(race)?;

        debug!(
            learner_id,
            skill_id,
            success,
            from = previous_level,
            to = state.level,
            evidence = state.evidence_count,
            "recorded practice"
        );

        Ok(state)
    }

    pub fn skill_state(&self, learner_id: i64, skill_id: i64) -> Result<Option<SkillState>> {
        Ok(self.db.get_skill_state(learner_id, skill_id)?)
    }

    /// Evidence log for one learner/skill pair, newest first.
    pub fn evidence(
        &self,
        learner_id: i64,
        skill_id: i64,
        limit: usize,
    ) -> Result<Vec<PracticeEvent>> {
        Ok(self.db.list_evidence(learner_id, skill_id, limit)?)
    }
}
