//! Weekly lesson planning.
//!
//! A week is five school days starting at `week_start`. Each day gets one
//! lesson item per enabled subject, bound to that date by a pending
//! assignment. The whole week is written in a single transaction.

use chrono::{Days, NaiveDate};
use rand::distributions::{Distribution, WeightedIndex};
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::{BTreeSet, HashMap, HashSet};
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::engine::Engine;
use crate::error::{is_unique_violation, EngineError, Result};
use crate::models::{
    Assignment, AssignmentStatus, Difficulty, GeneratedWeek, ItemType, LessonItem, PlanSettings,
    PlanView, SkippedSlot,
};
use crate::pacing::distribute;
use crate::scope::{ScopeProvider, ScopeSkill};

pub const SCHOOL_DAYS: u64 = 5;

/// Picks the skill for one day/subject slot.
///
/// Works in the easiest tier that still has an unmastered skill and takes the
/// first one (scope order) not yet scheduled this week. When the whole tier is
/// already scheduled, one of its skills is drawn uniformly from `rng`. If every
/// skill is mastered the easiest tier is used as is.
pub fn select_skill<'a, R: Rng + ?Sized>(
    skills: &'a [ScopeSkill],
    mastered: &HashSet<i64>,
    scheduled: &HashSet<i64>,
    rng: &mut R,
) -> Option<&'a ScopeSkill> {
    let tier = |difficulty: Difficulty, skip_mastered: bool| -> Vec<&'a ScopeSkill> {
        skills
            .iter()
            .filter(|s| s.difficulty == difficulty)
            .filter(|s| !skip_mastered || !mastered.contains(&s.skill_id))
            .collect()
    };

    let candidates = Difficulty::ALL
        .iter()
        .map(|d| tier(*d, true))
        .find(|t| !t.is_empty())
        .or_else(|| {
            Difficulty::ALL
                .iter()
                .map(|d| tier(*d, false))
                .find(|t| !t.is_empty())
        })?;

    if let Some(skill) = candidates
        .iter()
        .copied()
        .find(|s| !scheduled.contains(&s.skill_id))
    {
        return Some(skill);
    }

    candidates.choose(rng).copied()
}

/// Weighted draw of the item type for a slot.
pub fn draw_item_type<R: Rng + ?Sized>(rng: &mut R) -> ItemType {
    match WeightedIndex::new(ItemType::ALL.map(|t| t.weight())) {
        Ok(dist) => ItemType::ALL[dist.sample(rng)],
        // Unreachable with the fixed positive weights
        Err(_) => ItemType::Lesson,
    }
}

// None when the week runs past the last representable date
fn school_days(week_start: NaiveDate) -> Option<Vec<NaiveDate>> {
    (0..SCHOOL_DAYS)
        .map(|d| week_start.checked_add_days(Days::new(d)))
        .collect()
}

// Trimmed, non-empty, first occurrence wins
fn normalize_subjects(subjects: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    subjects
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .filter(|s| seen.insert(s.to_string()))
        .map(str::to_string)
        .collect()
}

impl<S: ScopeProvider, C: Clock> Engine<S, C> {
    /// Generates the lesson plan, items and assignments for one learner week.
    ///
    /// Subjects with no skills in scope are skipped and listed in
    /// `GeneratedWeek::skipped`; only infrastructure failures abort the week.
    pub fn generate_week(
        &mut self,
        learner_id: i64,
        week_start: NaiveDate,
        subjects: &[String],
        minutes_per_subject: u32,
    ) -> Result<GeneratedWeek> {
        let subjects = normalize_subjects(subjects);
        if subjects.is_empty() {
            return Err(EngineError::invalid("at least one subject is required"));
        }
        if minutes_per_subject == 0 {
            return Err(EngineError::invalid("minutes per subject must be positive"));
        }
        let days = school_days(week_start).ok_or_else(|| {
            EngineError::invalid(format!("week of {} is out of the calendar range", week_start))
        })?;
        let learner = self.require_learner(learner_id)?;
        if self.db.plan_exists(learner_id, week_start)? {
            return Err(EngineError::AlreadyExists(format!(
                "plan for learner {} week of {}",
                learner_id, week_start
            )));
        }

        let mut scope: HashMap<&str, Vec<ScopeSkill>> = HashMap::new();
        for subject in &subjects {
            let skills = self.scope.get_skills(&learner.grade, subject)?;
            scope.insert(subject.as_str(), skills);
        }

        let mastered: HashSet<i64> = self
            .db
            .list_skill_states(learner_id)?
            .into_iter()
            .filter(|s| s.is_mastered())
            .map(|s| s.skill_id)
            .collect();

        let subject_set: BTreeSet<String> = subjects.iter().cloned().collect();
        let settings = PlanSettings {
            subjects: subjects.clone(),
            minutes_per_subject,
            pacing: distribute(minutes_per_subject, &subject_set),
        };

        let now = self.clock.now();
        let tx = self.db.begin()?;

        let plan_id = self
            .db
            .insert_plan(learner_id, week_start, &settings, now)
            .map_err(|e| {
                if is_unique_violation(&e) {
                    EngineError::AlreadyExists(format!(
                        "plan for learner {} week of {}",
                        learner_id, week_start
                    ))
                } else {
                    EngineError::Database(e)
                }
            })?;

        let mut items = Vec::new();
        let mut assignments = Vec::new();
        let mut skipped = Vec::new();
        let mut scheduled: HashSet<i64> = HashSet::new();
        let mut order_index = 0i64;

        for &date in &days {
            for subject in &subjects {
                let skills = scope.get(subject.as_str()).map(Vec::as_slice).unwrap_or(&[]);
                let Some(skill) = select_skill(skills, &mastered, &scheduled, &mut self.rng)
                else {
                    warn!(
                        learner_id,
                        %date,
                        subject = %subject,
                        "no skills in scope, slot skipped"
                    );
                    skipped.push(SkippedSlot {
                        date,
                        subject: subject.clone(),
                        reason: format!(
                            "no skills in scope for grade {} {}",
                            learner.grade, subject
                        ),
                    });
                    continue;
                };
                let skill_id = skill.skill_id;
                scheduled.insert(skill_id);

                let item_type = draw_item_type(&mut self.rng);
                let item_id = self.db.insert_item(
                    plan_id,
                    subject,
                    item_type,
                    &[skill_id],
                    minutes_per_subject,
                    order_index,
                )?;
                let assignment_id = self.db.insert_assignment(item_id, learner_id, date, None)?;
                debug!(
                    %date,
                    subject = %subject,
                    skill_id,
                    item_type = item_type.as_str(),
                    "scheduled"
                );

                items.push(LessonItem {
                    id: item_id,
                    plan_id,
                    subject: subject.clone(),
                    item_type,
                    skill_ids: vec![skill_id],
                    estimated_minutes: minutes_per_subject,
                    order_index,
                });
                assignments.push(Assignment {
                    id: assignment_id,
                    item_id,
                    learner_id,
                    scheduled_date: date,
                    status: AssignmentStatus::Pending,
                    started_at: None,
                    completed_at: None,
                    carried_from: None,
                });
                order_index += 1;
            }
        }

        let plan = self
            .db
            .get_plan(plan_id)?
            .ok_or_else(|| EngineError::not_found(format!("plan {}", plan_id)))?;
        tx.commit()?;

        info!(
            learner_id,
            %week_start,
            items = items.len(),
            skipped = skipped.len(),
            "generated weekly plan"
        );

        Ok(GeneratedWeek {
            plan,
            items,
            assignments,
            skipped,
        })
    }

    /// Reschedules every pending assignment on `from_date` to the next day.
    /// Source rows are left as they are; a source already carried over is not
    /// carried again. Returns the number of new assignments.
    pub fn carry_over_incomplete(&self, learner_id: i64, from_date: NaiveDate) -> Result<usize> {
        self.require_learner(learner_id)?;
        let to_date = from_date.checked_add_days(Days::new(1)).ok_or_else(|| {
            EngineError::invalid(format!("no day after {} to carry work to", from_date))
        })?;

        let tx = self.db.begin()?;
        let mut carried = 0;
        for source in self.db.assignments_on(learner_id, from_date)? {
            if source.status != AssignmentStatus::Pending {
                continue;
            }
            if self.db.is_carried_over(source.id)? {
                debug!(assignment_id = source.id, "already carried over");
                continue;
            }
            self.db
                .insert_assignment(source.item_id, learner_id, to_date, Some(source.id))?;
            carried += 1;
        }
        tx.commit()?;

        info!(learner_id, %from_date, %to_date, carried, "carried over incomplete work");
        Ok(carried)
    }

    /// Moves an item to `new_index` within its plan's display order (clamped
    /// to the end) and renumbers the plan's items. Returns them in new order.
    pub fn reorder_item(&self, item_id: i64, new_index: usize) -> Result<Vec<LessonItem>> {
        let item = self
            .db
            .get_item(item_id)?
            .ok_or_else(|| EngineError::not_found(format!("lesson item {}", item_id)))?;

        let tx = self.db.begin()?;
        let mut items = self.db.list_items(item.plan_id)?;
        let from = items
            .iter()
            .position(|i| i.id == item_id)
            .ok_or_else(|| EngineError::not_found(format!("lesson item {}", item_id)))?;
        let moved = items.remove(from);
        let to = new_index.min(items.len());
        items.insert(to, moved);

        for (index, item) in items.iter_mut().enumerate() {
            let index = index as i64;
            if item.order_index != index {
                self.db.set_item_order(item.id, index)?;
                item.order_index = index;
            }
        }
        tx.commit()?;

        Ok(items)
    }

    pub fn get_plan(&self, learner_id: i64, week_start: NaiveDate) -> Result<Option<PlanView>> {
        self.require_learner(learner_id)?;
        let Some(plan) = self.db.find_plan(learner_id, week_start)? else {
            return Ok(None);
        };
        let items = self.db.list_items(plan.id)?;
        let assignments = self.db.list_plan_assignments(plan.id)?;
        Ok(Some(PlanView {
            plan,
            items,
            assignments,
        }))
    }

    pub fn assignments_on(&self, learner_id: i64, date: NaiveDate) -> Result<Vec<Assignment>> {
        self.require_learner(learner_id)?;
        Ok(self.db.assignments_on(learner_id, date)?)
    }

    /// Applies a student-workflow status change. `started_at` is stamped the
    /// first time work starts and `completed_at` on completion.
    pub fn set_assignment_status(
        &self,
        assignment_id: i64,
        status: AssignmentStatus,
    ) -> Result<Assignment> {
        let mut assignment = self
            .db
            .get_assignment(assignment_id)?
            .ok_or_else(|| EngineError::not_found(format!("assignment {}", assignment_id)))?;

        if !assignment.status.can_transition_to(status) {
            return Err(EngineError::invalid(format!(
                "assignment {} cannot move from {} to {}",
                assignment_id,
                assignment.status.as_str(),
                status.as_str()
            )));
        }

        let now = self.clock.now();
        if status == AssignmentStatus::InProgress && assignment.started_at.is_none() {
            assignment.started_at = Some(now);
        }
        if status == AssignmentStatus::Completed {
            assignment.completed_at = Some(now);
        }
        assignment.status = status;

        self.db.update_assignment_status(
            assignment.id,
            assignment.status,
            assignment.started_at,
            assignment.completed_at,
        )?;
        Ok(assignment)
    }
}
