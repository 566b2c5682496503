use crate::clock::Clock;
use crate::engine::Engine;
use crate::error::Result;
use crate::models::{SkillState, Stats};
use crate::scope::ScopeProvider;

impl<S: ScopeProvider, C: Clock> Engine<S, C> {
    /// Skills due for review right now, most overdue and least mastered first,
    /// ties broken by skill id. Mastered skills are never returned.
    pub fn get_due(&self, learner_id: i64, limit: usize) -> Result<Vec<SkillState>> {
        self.require_learner(learner_id)?;
        if limit == 0 {
            return Ok(Vec::new());
        }
        Ok(self.db.due_skill_states(learner_id, self.clock.now(), limit)?)
    }

    pub fn learner_stats(&self, learner_id: i64) -> Result<Stats> {
        self.require_learner(learner_id)?;
        Ok(self.db.get_stats(learner_id, self.clock.now())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::test_support::*;
    use crate::error::EngineError;
    use crate::models::Difficulty;
    use crate::scope::StaticScope;
    use chrono::Duration;

    #[test]
    fn nothing_due_before_any_practice() {
        let (engine, _) = setup_engine(StaticScope::new());
        let learner = engine.db.add_learner("Ada", "3").unwrap();
        register_skills(&engine.db, "Math", &[Difficulty::Easy]);
        assert!(engine.get_due(learner, 10).unwrap().is_empty());
    }

    #[test]
    fn practiced_skill_leaves_queue_until_interval_passes() {
        let (engine, clock) = setup_engine(StaticScope::new());
        let learner = engine.db.add_learner("Ada", "3").unwrap();
        let skill = register_skills(&engine.db, "Math", &[Difficulty::Easy])[0].skill_id;

        engine.record_practice(learner, skill, false, None).unwrap();
        assert!(engine.get_due(learner, 10).unwrap().is_empty());

        clock.advance(Duration::minutes(10));
        let due = engine.get_due(learner, 10).unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].skill_id, skill);

        // Practicing again always pushes it back out
        engine.record_practice(learner, skill, false, None).unwrap();
        assert!(engine.get_due(learner, 10).unwrap().is_empty());
    }

    #[test]
    fn ordered_by_due_then_level_then_skill() {
        let (engine, clock) = setup_engine(StaticScope::new());
        let learner = engine.db.add_learner("Ada", "3").unwrap();
        let skills: Vec<i64> = register_skills(
            &engine.db,
            "Math",
            &[Difficulty::Easy, Difficulty::Easy, Difficulty::Easy],
        )
        .iter()
        .map(|s| s.skill_id)
        .collect();

        // skills[0] at level 1 (due +1h), skills[1] and skills[2] at level 0 (due +10m)
        engine.record_practice(learner, skills[0], true, None).unwrap();
        engine.record_practice(learner, skills[2], false, None).unwrap();
        engine.record_practice(learner, skills[1], false, None).unwrap();

        clock.advance(Duration::hours(2));
        let due = engine.get_due(learner, 10).unwrap();
        let order: Vec<i64> = due.iter().map(|s| s.skill_id).collect();
        assert_eq!(order, vec![skills[1], skills[2], skills[0]]);

        let limited = engine.get_due(learner, 2).unwrap();
        assert_eq!(limited.len(), 2);
        assert!(engine.get_due(learner, 0).unwrap().is_empty());
    }

    #[test]
    fn mastered_skills_are_never_due() {
        let (engine, clock) = setup_engine(StaticScope::new());
        let learner = engine.db.add_learner("Ada", "3").unwrap();
        let skill = register_skills(&engine.db, "Math", &[Difficulty::Easy])[0].skill_id;

        for _ in 0..6 {
            engine.record_practice(learner, skill, true, None).unwrap();
        }
        assert_eq!(engine.skill_state(learner, skill).unwrap().unwrap().level, 5);

        clock.advance(Duration::days(60));
        let due = engine.get_due(learner, 10).unwrap();
        assert!(due.iter().all(|s| s.level < 5 && s.next_due.unwrap() <= clock_now(&engine)));
        assert!(due.is_empty());
    }

    #[test]
    fn get_due_does_not_mutate() {
        let (engine, clock) = setup_engine(StaticScope::new());
        let learner = engine.db.add_learner("Ada", "3").unwrap();
        let skill = register_skills(&engine.db, "Math", &[Difficulty::Easy])[0].skill_id;
        engine.record_practice(learner, skill, true, None).unwrap();
        clock.advance(Duration::days(1));

        let before = engine.skill_state(learner, skill).unwrap().unwrap();
        for _ in 0..3 {
            engine.get_due(learner, 10).unwrap();
        }
        let after = engine.skill_state(learner, skill).unwrap().unwrap();
        assert_eq!(before.version, after.version);
        assert_eq!(before.next_due, after.next_due);
    }

    #[test]
    fn unknown_learner_is_not_found() {
        let (engine, _) = setup_engine(StaticScope::new());
        assert!(matches!(
            engine.get_due(5, 10),
            Err(EngineError::NotFound(_))
        ));
    }

    #[test]
    fn stats_reflect_practice() {
        let (engine, clock) = setup_engine(StaticScope::new());
        let learner = engine.db.add_learner("Ada", "3").unwrap();
        let skills = register_skills(&engine.db, "Math", &[Difficulty::Easy, Difficulty::Hard]);

        for _ in 0..6 {
            engine
                .record_practice(learner, skills[0].skill_id, true, None)
                .unwrap();
        }
        engine
            .record_practice(learner, skills[1].skill_id, false, None)
            .unwrap();
        clock.advance(Duration::hours(1));

        let stats = engine.learner_stats(learner).unwrap();
        assert_eq!(stats.tracked_skills, 2);
        assert_eq!(stats.total_evidence, 7);
        assert_eq!(stats.mastered, 1);
        assert_eq!(stats.due_now, 1);
        assert!((stats.avg_level - 2.5).abs() < 1e-9);
    }

    fn clock_now<S: ScopeProvider, C: Clock>(
        engine: &Engine<S, C>,
    ) -> chrono::DateTime<chrono::Utc> {
        engine.clock.now()
    }
}
