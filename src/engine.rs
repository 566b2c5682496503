use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::warn;

use crate::clock::{Clock, SystemClock};
use crate::config::EngineConfig;
use crate::db::Database;
use crate::error::{EngineError, Result};
use crate::models::Learner;
use crate::scope::ScopeProvider;

/// The mastery and scheduling engine.
///
/// Owns the database handle and every injected collaborator: the curriculum
/// scope provider, the clock and the random source. Operations live in
/// `mastery`, `review` and `planner`.
pub struct Engine<S, C = SystemClock> {
    pub(crate) db: Database,
    pub(crate) scope: S,
    pub(crate) clock: C,
    pub(crate) rng: StdRng,
    pub(crate) config: EngineConfig,
}

impl<S: ScopeProvider, C: Clock> Engine<S, C> {
    /// Out-of-range config values are clamped with [`EngineConfig::normalized`].
    pub fn new(db: Database, scope: S, clock: C, rng: StdRng, config: EngineConfig) -> Self {
        Self {
            db,
            scope,
            clock,
            rng,
            config: config.normalized(),
        }
    }

    /// Builds the engine with an RNG seeded from `config.rng_seed`, or from
    /// entropy when no seed is configured.
    pub fn with_config(db: Database, scope: S, clock: C, config: EngineConfig) -> Self {
        let rng = match config.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self::new(db, scope, clock, rng, config)
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub(crate) fn require_learner(&self, learner_id: i64) -> Result<Learner> {
        self.db
            .get_learner(learner_id)?
            .ok_or_else(|| EngineError::not_found(format!("learner {}", learner_id)))
    }
}

/// Runs `op` until it succeeds, fails with something other than a conflict,
/// or has been retried `max_retries` times. The attempt number (starting at 0)
/// is passed in so the operation can re-read its inputs.
pub(crate) fn retry_on_conflict<T, F>(max_retries: u32, mut op: F) -> Result<T>
where
    F: FnMut(u32) -> Result<T>,
{
    let mut attempt = 0;
    loop {
        match op(attempt) {
            Err(e) if e.is_conflict() && attempt < max_retries => {
                attempt += 1;
                warn!(attempt, max_retries, "retrying after conflict: {}", e);
            }
            other => return other,
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::clock::ManualClock;
    use crate::models::Difficulty;
    use crate::scope::{ScopeSkill, StaticScope};
    use chrono::{DateTime, TimeZone, Utc};

    pub fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap()
    }

    pub fn setup_db() -> Database {
        let db = Database::open(":memory:").expect("Failed to create in-memory database");
        db.init().expect("Failed to initialize database");
        db
    }

    /// Engine over an in-memory database with a manual clock at `t0` and a
    /// seeded RNG. The returned clock handle controls the engine's time.
    pub fn setup_engine(scope: StaticScope) -> (Engine<StaticScope, ManualClock>, ManualClock) {
        let clock = ManualClock::new(t0());
        let config = EngineConfig {
            rng_seed: Some(7),
            ..EngineConfig::default()
        };
        let engine = Engine::with_config(setup_db(), scope, clock.clone(), config);
        (engine, clock)
    }

    /// Registers `difficulties.len()` skills for grade 3 `subject` and returns
    /// them as scope entries in registration order.
    pub fn register_skills(
        db: &Database,
        subject: &str,
        difficulties: &[Difficulty],
    ) -> Vec<ScopeSkill> {
        difficulties
            .iter()
            .enumerate()
            .map(|(i, d)| {
                let code = format!("{}-{}", subject, i);
                let id = db
                    .add_skill(&code, &code, "3", subject, *d, i as i64)
                    .unwrap();
                ScopeSkill {
                    skill_id: id,
                    difficulty: *d,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use crate::scope::StaticScope;
    use std::cell::Cell;

    #[test]
    fn require_learner_reports_missing_id() {
        let (engine, _) = setup_engine(StaticScope::new());
        let err = engine.require_learner(42).unwrap_err();
        assert!(matches!(err, EngineError::NotFound(ref m) if m.contains("42")));
    }

    #[test]
    fn config_is_normalized_on_construction() {
        let config = EngineConfig {
            history_limit: 0,
            scope_cache_capacity: 0,
            rng_seed: Some(7),
            ..EngineConfig::default()
        };
        let engine = Engine::with_config(
            setup_db(),
            StaticScope::new(),
            crate::clock::ManualClock::new(t0()),
            config,
        );
        assert_eq!(engine.config().history_limit, 5);
        assert_eq!(engine.config().scope_cache_capacity, 1);
    }

    #[test]
    fn seeded_engines_draw_identically() {
        use rand::Rng;
        let (mut a, _) = setup_engine(StaticScope::new());
        let (mut b, _) = setup_engine(StaticScope::new());
        let xs: Vec<u32> = (0..5).map(|_| a.rng.gen()).collect();
        let ys: Vec<u32> = (0..5).map(|_| b.rng.gen()).collect();
        assert_eq!(xs, ys);
    }

    mod retry_tests {
        use super::*;

        #[test]
        fn succeeds_after_transient_conflicts() {
            let calls = Cell::new(0);
            let result = retry_on_conflict(3, |attempt| {
                calls.set(calls.get() + 1);
                if attempt < 2 {
                    Err(EngineError::Conflict("busy".into()))
                } else {
                    Ok(attempt)
                }
            });
            assert_eq!(result.unwrap(), 2);
            assert_eq!(calls.get(), 3);
        }

        #[test]
        fn persistent_conflict_is_surfaced() {
            let calls = Cell::new(0);
            let result: Result<()> = retry_on_conflict(3, |_| {
                calls.set(calls.get() + 1);
                Err(EngineError::Conflict("busy".into()))
            });
            assert!(result.unwrap_err().is_conflict());
            // first try plus three retries
            assert_eq!(calls.get(), 4);
        }

        #[test]
        fn other_errors_are_not_retried() {
            let calls = Cell::new(0);
            let result: Result<()> = retry_on_conflict(3, |_| {
                calls.set(calls.get() + 1);
                Err(EngineError::invalid("bad score"))
            });
            assert!(matches!(result, Err(EngineError::InvalidArgument(_))));
            assert_eq!(calls.get(), 1);
        }
    }
}
