//! Curriculum scope-and-sequence lookups.
//!
//! The catalog itself is owned elsewhere; the planner only needs the ordered
//! skills for a grade/subject with their difficulty tags. `CachedScope` is the
//! one place lookups are cached, and it is constructed explicitly with its TTL
//! and capacity.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

use crate::clock::Clock;
use crate::db::Database;
use crate::error::Result;
use crate::models::Difficulty;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScopeSkill {
    pub skill_id: i64,
    pub difficulty: Difficulty,
}

pub trait ScopeProvider {
    /// Ordered skills for a grade and subject. An empty list is a valid answer.
    fn get_skills(&self, grade: &str, subject: &str) -> Result<Vec<ScopeSkill>>;
}

impl<P: ScopeProvider + ?Sized> ScopeProvider for Box<P> {
    fn get_skills(&self, grade: &str, subject: &str) -> Result<Vec<ScopeSkill>> {
        (**self).get_skills(grade, subject)
    }
}

/// Reads the skills registry over its own connection.
pub struct CatalogScope {
    db: Database,
}

impl CatalogScope {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self {
            db: Database::open(path)?,
        })
    }

    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

impl ScopeProvider for CatalogScope {
    fn get_skills(&self, grade: &str, subject: &str) -> Result<Vec<ScopeSkill>> {
        let skills = self.db.skills_for(grade, subject)?;
        Ok(skills
            .into_iter()
            .map(|s| ScopeSkill {
                skill_id: s.id,
                difficulty: s.difficulty,
            })
            .collect())
    }
}

/// Fixed in-memory scope, handy for embedding and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticScope {
    entries: HashMap<(String, String), Vec<ScopeSkill>>,
}

impl StaticScope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, grade: &str, subject: &str, skills: Vec<ScopeSkill>) -> Self {
        self.insert(grade, subject, skills);
        self
    }

    pub fn insert(&mut self, grade: &str, subject: &str, skills: Vec<ScopeSkill>) {
        self.entries
            .insert((grade.to_string(), subject.to_string()), skills);
    }
}

impl ScopeProvider for StaticScope {
    fn get_skills(&self, grade: &str, subject: &str) -> Result<Vec<ScopeSkill>> {
        Ok(self
            .entries
            .get(&(grade.to_string(), subject.to_string()))
            .cloned()
            .unwrap_or_default())
    }
}

struct CacheEntry {
    skills: Vec<ScopeSkill>,
    fetched_at: DateTime<Utc>,
}

/// TTL cache in front of another provider. Entries older than `ttl` are
/// refetched; when more than `capacity` keys are held, expired entries go
/// first and then the oldest fetch.
pub struct CachedScope<P, C> {
    inner: P,
    clock: C,
    ttl: Duration,
    capacity: usize,
    entries: Mutex<HashMap<(String, String), CacheEntry>>,
}

impl<P: ScopeProvider, C: Clock> CachedScope<P, C> {
    pub fn new(inner: P, clock: C, ttl: Duration, capacity: usize) -> Self {
        Self {
            inner,
            clock,
            ttl,
            capacity: capacity.max(1),
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn invalidate(&self, grade: &str, subject: &str) {
        self.lock()
            .remove(&(grade.to_string(), subject.to_string()));
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<(String, String), CacheEntry>> {
        // Cached values are plain data; a panic elsewhere cannot corrupt them.
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn evict(&self, entries: &mut HashMap<(String, String), CacheEntry>, now: DateTime<Utc>) {
        if entries.len() <= self.capacity {
            return;
        }
        let ttl = self.ttl;
        entries.retain(|_, e| now - e.fetched_at < ttl);

        while entries.len() > self.capacity {
            let oldest = entries
                .iter()
                .min_by_key(|(_, e)| e.fetched_at)
                .map(|(k, _)| k.clone());
            match oldest {
                Some(key) => {
                    debug!(grade = %key.0, subject = %key.1, "evicting scope cache entry");
                    entries.remove(&key);
                }
                None => break,
            }
        }
    }
}

impl<P: ScopeProvider, C: Clock> ScopeProvider for CachedScope<P, C> {
    fn get_skills(&self, grade: &str, subject: &str) -> Result<Vec<ScopeSkill>> {
        let key = (grade.to_string(), subject.to_string());
        let now = self.clock.now();

        if let Some(entry) = self.lock().get(&key) {
            if now - entry.fetched_at < self.ttl {
                debug!(grade, subject, "scope cache hit");
                return Ok(entry.skills.clone());
            }
        }

        let skills = self.inner.get_skills(grade, subject)?;

        let mut entries = self.lock();
        entries.insert(
            key,
            CacheEntry {
                skills: skills.clone(),
                fetched_at: now,
            },
        );
        self.evict(&mut entries, now);

        Ok(skills)
    }
}
