use chrono::{Duration, NaiveDate};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::collections::BTreeSet;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use cadence::config::DEFAULT_LOG_FILTER;
use cadence::models::{AssignmentStatus, Difficulty, JsonOutput, PlanView};
use cadence::{CachedScope, CatalogScope, Database, Engine, EngineConfig, SystemClock};

#[derive(Parser)]
#[command(name = "cadence")]
#[command(about = "Skill mastery tracking and weekly lesson planning for learners")]
#[command(version)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database
    Init,

    /// Manage learners
    #[command(subcommand)]
    Learner(LearnerCommands),

    /// Manage the skill catalog
    #[command(subcommand)]
    Skill(SkillCommands),

    /// Record a practice attempt
    Practice {
        /// Learner ID
        learner: i64,

        /// Skill ID
        skill: i64,

        /// Practice outcome: success/fail
        #[arg(long, short)]
        outcome: String,

        /// Optional score from 0 to 100
        #[arg(long, short)]
        score: Option<f64>,
    },

    /// List skills due for review
    Due {
        /// Learner ID
        learner: i64,

        /// Maximum number of skills
        #[arg(long, short, default_value_t = 10)]
        limit: usize,
    },

    /// Show mastery state and recent evidence for a skill
    History {
        /// Learner ID
        learner: i64,

        /// Skill ID
        skill: i64,

        /// Maximum number of evidence rows
        #[arg(long, short, default_value_t = 20)]
        limit: usize,
    },

    /// Show mastery statistics for a learner
    Stats {
        /// Learner ID
        learner: i64,
    },

    /// Show the daily pacing mix for a time budget
    Pacing {
        /// Minutes per subject per day
        #[arg(long, short)]
        minutes: u32,

        /// Comma-separated subjects
        #[arg(long, short)]
        subjects: String,
    },

    /// Weekly lesson plans
    #[command(subcommand)]
    Plan(PlanCommands),

    /// Daily assignments
    #[command(subcommand)]
    Assignment(AssignmentCommands),
}

#[derive(Subcommand)]
enum LearnerCommands {
    /// Add a learner
    Add {
        /// Learner name
        name: String,

        /// Grade level
        #[arg(long, short)]
        grade: String,
    },

    /// List all learners
    List,
}

#[derive(Subcommand)]
enum SkillCommands {
    /// Add a skill to the catalog
    Add {
        /// Unique skill code
        code: String,

        /// Skill name
        name: String,

        /// Grade level
        #[arg(long, short)]
        grade: String,

        /// Subject
        #[arg(long, short)]
        subject: String,

        /// Difficulty: easy/medium/hard
        #[arg(long, short, default_value = "easy")]
        difficulty: String,

        /// Position in the scope and sequence
        #[arg(long, default_value_t = 0)]
        sequence: i64,
    },

    /// List skills in scope for a grade and subject
    List {
        /// Grade level
        #[arg(long, short)]
        grade: String,

        /// Subject
        #[arg(long, short)]
        subject: String,
    },
}

#[derive(Subcommand)]
enum PlanCommands {
    /// Generate a five-day plan starting at a date
    Generate {
        /// Learner ID
        learner: i64,

        /// First school day (YYYY-MM-DD)
        #[arg(long, short)]
        week: NaiveDate,

        /// Comma-separated subjects
        #[arg(long, short)]
        subjects: String,

        /// Minutes per subject per day
        #[arg(long, short, default_value_t = 45)]
        minutes: u32,
    },

    /// Show a generated plan
    Show {
        /// Learner ID
        learner: i64,

        /// First school day (YYYY-MM-DD)
        #[arg(long, short)]
        week: NaiveDate,
    },

    /// Move pending assignments from a day to the next day
    CarryOver {
        /// Learner ID
        learner: i64,

        /// Day to carry from (YYYY-MM-DD)
        #[arg(long, short)]
        date: NaiveDate,
    },

    /// Change an item's position in its plan
    Reorder {
        /// Lesson item ID
        item: i64,

        /// New zero-based position
        index: usize,
    },
}

#[derive(Subcommand)]
enum AssignmentCommands {
    /// List assignments for a day
    List {
        /// Learner ID
        learner: i64,

        /// Day (YYYY-MM-DD)
        #[arg(long, short)]
        date: NaiveDate,
    },

    /// Update an assignment's status
    Status {
        /// Assignment ID
        id: i64,

        /// New status: pending/in_progress/completed/excused
        status: String,
    },
}

fn main() {
    let cli = Cli::parse();
    let config = EngineConfig::from_env();
    init_tracing(&config.log_filter);

    if let Err(e) = run(cli, config) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn init_tracing(filter: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(cli: Cli, config: EngineConfig) -> Result<(), Box<dyn std::error::Error>> {
    let db_path = config.db_path.clone();
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent).ok();
    }
    debug!(path = %db_path.display(), "opening database");

    let db = Database::open(&db_path)?;
    let journal = db.enable_wal()?;
    debug!(journal = %journal, "journal mode");
    let scope = CachedScope::new(
        CatalogScope::open(&db_path)?,
        SystemClock,
        Duration::seconds(config.scope_cache_ttl_secs),
        config.scope_cache_capacity,
    );
    let mut engine = Engine::with_config(db, scope, SystemClock, config);

    match cli.command {
        Commands::Init => {
            engine.db().init()?;
            if cli.json {
                print_json(&JsonOutput::<()>::ok(()))?;
            } else {
                println!("Database initialized at: {}", db_path.display());
            }
        }

        Commands::Learner(learner_cmd) => match learner_cmd {
            LearnerCommands::Add { name, grade } => {
                let id = engine.db().add_learner(&name, &grade)?;
                if cli.json {
                    print_json(&JsonOutput::ok(serde_json::json!({
                        "id": id,
                        "name": name,
                        "grade": grade
                    })))?;
                } else {
                    println!("Added learner '{}' (grade {}) with ID: {}", name, grade, id);
                }
            }

            LearnerCommands::List => {
                let learners = engine.db().list_learners()?;
                if cli.json {
                    print_json(&JsonOutput::ok(&learners))?;
                } else if learners.is_empty() {
                    println!("No learners found.");
                } else {
                    println!("{:<5} {:<30} GRADE", "ID", "NAME");
                    println!("{}", "-".repeat(45));
                    for learner in learners {
                        println!(
                            "{:<5} {:<30} {}",
                            learner.id,
                            truncate(&learner.name, 28),
                            learner.grade
                        );
                    }
                }
            }
        },

        Commands::Skill(skill_cmd) => match skill_cmd {
            SkillCommands::Add {
                code,
                name,
                grade,
                subject,
                difficulty,
                sequence,
            } => {
                let difficulty = Difficulty::from_str(&difficulty).ok_or_else(|| {
                    format!(
                        "Invalid difficulty '{}'. Use: easy, medium, or hard",
                        difficulty
                    )
                })?;
                let id =
                    engine
                        .db()
                        .add_skill(&code, &name, &grade, &subject, difficulty, sequence)?;

                if cli.json {
                    print_json(&JsonOutput::ok(serde_json::json!({
                        "id": id,
                        "code": code
                    })))?;
                } else {
                    println!("Added skill '{}' with ID: {}", code, id);
                }
            }

            SkillCommands::List { grade, subject } => {
                let skills = engine.db().skills_for(&grade, &subject)?;
                if cli.json {
                    print_json(&JsonOutput::ok(&skills))?;
                } else if skills.is_empty() {
                    println!("No skills in scope for grade {} {}.", grade, subject);
                } else {
                    println!("{:<5} {:<12} {:<36} DIFFICULTY", "ID", "CODE", "NAME");
                    println!("{}", "-".repeat(66));
                    for skill in skills {
                        println!(
                            "{:<5} {:<12} {:<36} {}",
                            skill.id,
                            truncate(&skill.code, 12),
                            truncate(&skill.name, 34),
                            skill.difficulty.as_str()
                        );
                    }
                }
            }
        },

        Commands::Practice {
            learner,
            skill,
            outcome,
            score,
        } => {
            let success = parse_outcome(&outcome)?;
            let state = engine.record_practice(learner, skill, success, score)?;

            if cli.json {
                print_json(&JsonOutput::ok(&state))?;
            } else {
                println!("Practice recorded for skill {}.", skill);
                println!(
                    "Mastery level: {} ({})",
                    state.level,
                    state.mastery_label()
                );
                if let Some(next) = &state.next_due {
                    println!("Next review: {}", next.format("%Y-%m-%d %H:%M UTC"));
                }
            }
        }

        Commands::Due { learner, limit } => {
            let due = engine.get_due(learner, limit)?;
            if cli.json {
                print_json(&JsonOutput::ok(&due))?;
            } else if due.is_empty() {
                println!("Nothing due for review.");
            } else {
                println!("{:<8} {:<14} {:<20} EVIDENCE", "SKILL", "LEVEL", "DUE");
                println!("{}", "-".repeat(55));
                for state in due {
                    let due_at = state
                        .next_due
                        .map(|d| d.format("%Y-%m-%d %H:%M").to_string())
                        .unwrap_or_else(|| "-".to_string());
                    println!(
                        "{:<8} {:<14} {:<20} {}",
                        state.skill_id,
                        format!("{} {}", state.level, state.mastery_label()),
                        due_at,
                        state.evidence_count
                    );
                }
            }
        }

        Commands::History {
            learner,
            skill,
            limit,
        } => {
            let state = engine.skill_state(learner, skill)?;
            let events = engine.evidence(learner, skill, limit)?;

            if cli.json {
                print_json(&JsonOutput::ok(serde_json::json!({
                    "state": state,
                    "evidence": events
                })))?;
            } else {
                match &state {
                    Some(s) => {
                        println!("Skill {}: {} (level {})", skill, s.mastery_label(), s.level);
                        println!("Evidence: {}", s.evidence_count);
                    }
                    None => println!("Skill {} has not been practiced.", skill),
                }
                if !events.is_empty() {
                    println!();
                    println!("{:<20} {:<8} SCORE", "WHEN", "RESULT");
                    println!("{}", "-".repeat(40));
                    for event in events {
                        println!(
                            "{:<20} {:<8} {}",
                            event.practiced_at.format("%Y-%m-%d %H:%M"),
                            if event.success { "success" } else { "fail" },
                            event
                                .score
                                .map(|s| format!("{:.2}", s))
                                .unwrap_or_else(|| "-".to_string())
                        );
                    }
                }
            }
        }

        Commands::Stats { learner } => {
            let stats = engine.learner_stats(learner)?;
            if cli.json {
                print_json(&JsonOutput::ok(&stats))?;
            } else {
                println!("=== Mastery Statistics ===");
                println!("Tracked skills: {}", stats.tracked_skills);
                println!("Practice events: {}", stats.total_evidence);
                println!("Mastered: {}", stats.mastered);
                println!("Due for review: {}", stats.due_now);
                println!("Average level: {:.1}/5", stats.avg_level);
            }
        }

        Commands::Pacing { minutes, subjects } => {
            let subjects: BTreeSet<String> = split_subjects(&subjects).into_iter().collect();
            let pacing = cadence::distribute(minutes, &subjects);

            if cli.json {
                print_json(&JsonOutput::ok(&pacing))?;
            } else {
                println!("{:<20} {:<10} {:<10} REVIEW", "SUBJECT", "LESSONS", "PRACTICE");
                println!("{}", "-".repeat(50));
                for (subject, mix) in pacing {
                    println!(
                        "{:<20} {:<10.2} {:<10.2} {:.2}",
                        truncate(&subject, 18),
                        mix.lessons,
                        mix.practice,
                        mix.review
                    );
                }
            }
        }

        Commands::Plan(plan_cmd) => match plan_cmd {
            PlanCommands::Generate {
                learner,
                week,
                subjects,
                minutes,
            } => {
                let subjects = split_subjects(&subjects);
                let generated = engine.generate_week(learner, week, &subjects, minutes)?;

                if cli.json {
                    print_json(&JsonOutput::ok(&generated))?;
                } else {
                    println!(
                        "Generated plan {} for week of {}: {} items.",
                        generated.plan.id,
                        generated.plan.week_start,
                        generated.items.len()
                    );
                    for slot in &generated.skipped {
                        println!("  skipped {} {}: {}", slot.date, slot.subject, slot.reason);
                    }
                }
            }

            PlanCommands::Show { learner, week } => match engine.get_plan(learner, week)? {
                Some(view) => {
                    if cli.json {
                        print_json(&JsonOutput::ok(&view))?;
                    } else {
                        print_plan(&view);
                    }
                }
                None if cli.json => {
                    print_json(&JsonOutput::<()>::err("Plan not found"))?;
                }
                None => println!("No plan for week of {}.", week),
            },

            PlanCommands::CarryOver { learner, date } => {
                let carried = engine.carry_over_incomplete(learner, date)?;
                if cli.json {
                    print_json(&JsonOutput::ok(serde_json::json!({ "carried": carried })))?;
                } else {
                    println!("Carried {} assignment(s) from {}.", carried, date);
                }
            }

            PlanCommands::Reorder { item, index } => {
                let items = engine.reorder_item(item, index)?;
                if cli.json {
                    print_json(&JsonOutput::ok(&items))?;
                } else {
                    println!("Moved item {}.", item);
                }
            }
        },

        Commands::Assignment(assignment_cmd) => match assignment_cmd {
            AssignmentCommands::List { learner, date } => {
                let assignments = engine.assignments_on(learner, date)?;
                if cli.json {
                    print_json(&JsonOutput::ok(&assignments))?;
                } else if assignments.is_empty() {
                    println!("No assignments on {}.", date);
                } else {
                    println!("{:<5} {:<6} {:<12} CARRIED FROM", "ID", "ITEM", "STATUS");
                    println!("{}", "-".repeat(40));
                    for a in assignments {
                        println!(
                            "{:<5} {:<6} {:<12} {}",
                            a.id,
                            a.item_id,
                            a.status.label(),
                            a.carried_from
                                .map(|id| id.to_string())
                                .unwrap_or_else(|| "-".to_string())
                        );
                    }
                }
            }

            AssignmentCommands::Status { id, status } => {
                let status = AssignmentStatus::from_str(&status).ok_or_else(|| {
                    format!(
                        "Invalid status '{}'. Use: pending, in_progress, completed, or excused",
                        status
                    )
                })?;
                let assignment = engine.set_assignment_status(id, status)?;

                if cli.json {
                    print_json(&JsonOutput::ok(&assignment))?;
                } else {
                    println!("Assignment {} is now {}.", id, assignment.status.label());
                }
            }
        },
    }

    Ok(())
}

fn print_plan(view: &PlanView) {
    println!(
        "=== Week of {} (plan {}) ===",
        view.plan.week_start, view.plan.id
    );
    println!(
        "{:<5} {:<12} {:<14} {:<11} {:<8} STATUS",
        "ITEM", "DATE", "SUBJECT", "TYPE", "SKILLS"
    );
    println!("{}", "-".repeat(65));
    for item in &view.items {
        let skills: Vec<String> = item.skill_ids.iter().map(|id| id.to_string()).collect();
        for a in view.assignments.iter().filter(|a| a.item_id == item.id) {
            println!(
                "{:<5} {:<12} {:<14} {:<11} {:<8} {}",
                item.id,
                a.scheduled_date,
                truncate(&item.subject, 14),
                item.item_type.as_str(),
                skills.join(","),
                a.status.label()
            );
        }
    }
}

fn print_json<T: Serialize>(output: &JsonOutput<T>) -> Result<(), serde_json::Error> {
    println!("{}", serde_json::to_string(output)?);
    Ok(())
}

fn parse_outcome(outcome: &str) -> Result<bool, String> {
    match outcome.trim().to_lowercase().as_str() {
        "success" | "pass" | "correct" => Ok(true),
        "fail" | "failure" | "incorrect" => Ok(false),
        _ => Err(format!(
            "Invalid outcome '{}'. Use: success or fail",
            outcome
        )),
    }
}

fn split_subjects(subjects: &str) -> Vec<String> {
    subjects
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    mod truncate_tests {
        use super::*;

        #[test]
        fn truncate_short_string() {
            assert_eq!(truncate("hello", 10), "hello");
        }

        #[test]
        fn truncate_exact_length() {
            assert_eq!(truncate("hello", 5), "hello");
        }

        #[test]
        fn truncate_long_string() {
            assert_eq!(truncate("hello world", 8), "hello...");
        }

        #[test]
        fn truncate_multibyte() {
            assert_eq!(truncate("ñandú ñandú", 7), "ñand...");
        }
    }

    mod helper_tests {
        use super::*;

        #[test]
        fn outcome_words() {
            assert_eq!(parse_outcome("success"), Ok(true));
            assert_eq!(parse_outcome(" FAIL "), Ok(false));
            assert!(parse_outcome("partial").is_err());
        }

        #[test]
        fn subjects_are_split_and_trimmed() {
            assert_eq!(
                split_subjects("Math, Reading,,Science "),
                vec!["Math", "Reading", "Science"]
            );
            assert!(split_subjects(" , ").is_empty());
        }
    }

    mod cli_parsing_tests {
        use super::*;

        #[test]
        fn parse_init_command() {
            let cli = Cli::try_parse_from(["cadence", "init"]).unwrap();
            assert!(!cli.json);
            assert!(matches!(cli.command, Commands::Init));
        }

        #[test]
        fn parse_json_flag_global() {
            let cli1 = Cli::try_parse_from(["cadence", "--json", "stats", "1"]).unwrap();
            assert!(cli1.json);

            let cli2 = Cli::try_parse_from(["cadence", "stats", "1", "--json"]).unwrap();
            assert!(cli2.json);
        }

        #[test]
        fn parse_learner_add() {
            let cli =
                Cli::try_parse_from(["cadence", "learner", "add", "Ada", "--grade", "3"]).unwrap();
            match cli.command {
                Commands::Learner(LearnerCommands::Add { name, grade }) => {
                    assert_eq!(name, "Ada");
                    assert_eq!(grade, "3");
                }
                _ => panic!("Expected Learner Add command"),
            }
        }

        #[test]
        fn parse_skill_add_defaults() {
            let cli = Cli::try_parse_from([
                "cadence", "skill", "add", "M3-1", "Place value", "-g", "3", "-s", "Math",
            ])
            .unwrap();
            match cli.command {
                Commands::Skill(SkillCommands::Add {
                    code,
                    difficulty,
                    sequence,
                    ..
                }) => {
                    assert_eq!(code, "M3-1");
                    assert_eq!(difficulty, "easy");
                    assert_eq!(sequence, 0);
                }
                _ => panic!("Expected Skill Add command"),
            }
        }

        #[test]
        fn parse_practice_with_score() {
            let cli = Cli::try_parse_from([
                "cadence", "practice", "1", "2", "--outcome", "success", "--score", "90",
            ])
            .unwrap();
            match cli.command {
                Commands::Practice {
                    learner,
                    skill,
                    outcome,
                    score,
                } => {
                    assert_eq!(learner, 1);
                    assert_eq!(skill, 2);
                    assert_eq!(outcome, "success");
                    assert_eq!(score, Some(90.0));
                }
                _ => panic!("Expected Practice command"),
            }
        }

        #[test]
        fn parse_due_default_limit() {
            let cli = Cli::try_parse_from(["cadence", "due", "4"]).unwrap();
            match cli.command {
                Commands::Due { learner, limit } => {
                    assert_eq!(learner, 4);
                    assert_eq!(limit, 10);
                }
                _ => panic!("Expected Due command"),
            }
        }

        #[test]
        fn parse_plan_generate() {
            let cli = Cli::try_parse_from([
                "cadence",
                "plan",
                "generate",
                "1",
                "--week",
                "2026-03-02",
                "--subjects",
                "Math,Reading",
                "--minutes",
                "60",
            ])
            .unwrap();
            match cli.command {
                Commands::Plan(PlanCommands::Generate {
                    learner,
                    week,
                    subjects,
                    minutes,
                }) => {
                    assert_eq!(learner, 1);
                    assert_eq!(week, NaiveDate::from_ymd_opt(2026, 3, 2).unwrap());
                    assert_eq!(subjects, "Math,Reading");
                    assert_eq!(minutes, 60);
                }
                _ => panic!("Expected Plan Generate command"),
            }
        }

        #[test]
        fn parse_plan_carry_over() {
            let cli =
                Cli::try_parse_from(["cadence", "plan", "carry-over", "1", "-d", "2026-03-03"])
                    .unwrap();
            assert!(matches!(
                cli.command,
                Commands::Plan(PlanCommands::CarryOver { learner: 1, .. })
            ));
        }

        #[test]
        fn parse_plan_reorder() {
            let cli = Cli::try_parse_from(["cadence", "plan", "reorder", "12", "0"]).unwrap();
            match cli.command {
                Commands::Plan(PlanCommands::Reorder { item, index }) => {
                    assert_eq!(item, 12);
                    assert_eq!(index, 0);
                }
                _ => panic!("Expected Plan Reorder command"),
            }
        }

        #[test]
        fn parse_assignment_status() {
            let cli =
                Cli::try_parse_from(["cadence", "assignment", "status", "9", "completed"]).unwrap();
            match cli.command {
                Commands::Assignment(AssignmentCommands::Status { id, status }) => {
                    assert_eq!(id, 9);
                    assert_eq!(status, "completed");
                }
                _ => panic!("Expected Assignment Status command"),
            }
        }

        #[test]
        fn parse_bad_date_fails() {
            let result = Cli::try_parse_from([
                "cadence", "plan", "show", "1", "--week", "next monday",
            ]);
            assert!(result.is_err());
        }

        #[test]
        fn parse_missing_required_arg_fails() {
            assert!(Cli::try_parse_from(["cadence", "learner", "add", "Ada"]).is_err());
            assert!(Cli::try_parse_from(["cadence", "practice", "1", "2"]).is_err());
            assert!(Cli::try_parse_from(["cadence", "plan", "generate", "1"]).is_err());
            assert!(Cli::try_parse_from(["cadence", "invalid"]).is_err());
        }
    }
}
