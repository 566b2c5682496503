use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const MAX_LEVEL: u8 = 5;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Learner {
    pub id: i64,
    pub name: String,
    pub grade: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub const ALL: [Difficulty; 3] = [Difficulty::Easy, Difficulty::Medium, Difficulty::Hard];

    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "easy" | "e" => Some(Difficulty::Easy),
            "medium" | "m" => Some(Difficulty::Medium),
            "hard" | "h" => Some(Difficulty::Hard),
            _ => None,
        }
    }
}

// A catalog skill as registered with the engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Skill {
    pub id: i64,
    pub code: String,
    pub name: String,
    pub grade: String,
    pub subject: String,
    pub difficulty: Difficulty,
    pub sequence: i64,
}

// One entry of a skill state's inline history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PracticeEntry {
    pub at: DateTime<Utc>,
    pub success: bool,
    pub score: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillState {
    pub id: i64,
    pub learner_id: i64,
    pub skill_id: i64,
    pub level: u8,
    pub evidence_count: i64,
    pub last_practice: Option<DateTime<Utc>>,
    pub next_due: Option<DateTime<Utc>>,
    pub history: Vec<PracticeEntry>,
    /// Optimistic concurrency counter, bumped on every write.
    pub version: i64,
}

impl SkillState {
    /// A state that has never been practiced and is not yet persisted.
    pub fn fresh(learner_id: i64, skill_id: i64) -> Self {
        Self {
            id: 0,
            learner_id,
            skill_id,
            level: 0,
            evidence_count: 0,
            last_practice: None,
            next_due: None,
            history: Vec::new(),
            version: 0,
        }
    }

    pub fn is_persisted(&self) -> bool {
        self.version > 0
    }

    pub fn is_mastered(&self) -> bool {
        self.level >= MAX_LEVEL
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        !self.is_mastered() && self.next_due.map_or(false, |due| due <= now)
    }

    pub fn mastery_label(&self) -> &'static str {
        level_label(self.level)
    }
}

pub fn level_label(level: u8) -> &'static str {
    match level {
        0 => "New",
        1 => "Learning",
        2 => "Familiar",
        3 => "Comfortable",
        4 => "Proficient",
        5 => "Mastered",
        _ => "Unknown",
    }
}

// Evidence log row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PracticeEvent {
    pub id: i64,
    pub learner_id: i64,
    pub skill_id: i64,
    pub success: bool,
    pub score: Option<f64>,
    pub practiced_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemType {
    Lesson,
    Practice,
    Review,
    Assessment,
}

impl ItemType {
    pub const ALL: [ItemType; 4] = [
        ItemType::Lesson,
        ItemType::Practice,
        ItemType::Review,
        ItemType::Assessment,
    ];

    /// Draw weight used by the weekly planner.
    pub fn weight(&self) -> f64 {
        match self {
            ItemType::Lesson => 0.5,
            ItemType::Practice => 0.3,
            ItemType::Review => 0.15,
            ItemType::Assessment => 0.05,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ItemType::Lesson => "lesson",
            ItemType::Practice => "practice",
            ItemType::Review => "review",
            ItemType::Assessment => "assessment",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "lesson" => Some(ItemType::Lesson),
            "practice" => Some(ItemType::Practice),
            "review" => Some(ItemType::Review),
            "assessment" => Some(ItemType::Assessment),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentStatus {
    Pending,
    InProgress,
    Completed,
    Excused,
}

impl AssignmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssignmentStatus::Pending => "pending",
            AssignmentStatus::InProgress => "in_progress",
            AssignmentStatus::Completed => "completed",
            AssignmentStatus::Excused => "excused",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Some(AssignmentStatus::Pending),
            "in_progress" | "in-progress" | "started" => Some(AssignmentStatus::InProgress),
            "completed" | "complete" | "done" => Some(AssignmentStatus::Completed),
            "excused" => Some(AssignmentStatus::Excused),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            AssignmentStatus::Pending => "Pending",
            AssignmentStatus::InProgress => "In Progress",
            AssignmentStatus::Completed => "Completed",
            AssignmentStatus::Excused => "Excused",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, AssignmentStatus::Completed | AssignmentStatus::Excused)
    }

    pub fn can_transition_to(&self, next: AssignmentStatus) -> bool {
        use AssignmentStatus::*;
        match (self, next) {
            (Pending, InProgress | Completed | Excused) => true,
            (InProgress, Pending | Completed | Excused) => true,
            _ => false,
        }
    }
}

// Fractional work-unit counts for one subject per school day
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PacingMix {
    pub lessons: f64,
    pub practice: f64,
    pub review: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanSettings {
    pub subjects: Vec<String>,
    pub minutes_per_subject: u32,
    pub pacing: BTreeMap<String, PacingMix>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LessonPlan {
    pub id: i64,
    pub learner_id: i64,
    pub week_start: NaiveDate,
    pub settings: PlanSettings,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LessonItem {
    pub id: i64,
    pub plan_id: i64,
    pub subject: String,
    pub item_type: ItemType,
    pub skill_ids: Vec<i64>,
    pub estimated_minutes: u32,
    pub order_index: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assignment {
    pub id: i64,
    pub item_id: i64,
    pub learner_id: i64,
    pub scheduled_date: NaiveDate,
    pub status: AssignmentStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Source assignment when this row was created by carry-over.
    pub carried_from: Option<i64>,
}

// A day/subject slot the planner could not fill
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedSlot {
    pub date: NaiveDate,
    pub subject: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedWeek {
    pub plan: LessonPlan,
    pub items: Vec<LessonItem>,
    pub assignments: Vec<Assignment>,
    pub skipped: Vec<SkippedSlot>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanView {
    pub plan: LessonPlan,
    pub items: Vec<LessonItem>,
    pub assignments: Vec<Assignment>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stats {
    pub tracked_skills: i64,
    pub total_evidence: i64,
    pub mastered: i64,
    pub due_now: i64,
    pub avg_level: f64,
}

// JSON output wrapper for CLI
#[derive(Debug, Serialize)]
pub struct JsonOutput<T: Serialize> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T: Serialize> JsonOutput<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(msg.into()),
        }
    }
}
