use std::path::PathBuf;

pub const DEFAULT_DB_NAME: &str = "cadence.db";
pub const DEFAULT_CONFLICT_RETRIES: u32 = 3;
pub const DEFAULT_HISTORY_LIMIT: usize = 20;
pub const DEFAULT_SCOPE_TTL_SECS: i64 = 300;
pub const DEFAULT_SCOPE_CACHE_CAPACITY: usize = 64;
pub const DEFAULT_LOG_FILTER: &str = "warn";

// The success-rate window looks at the last five entries.
const MIN_HISTORY_LIMIT: usize = 5;

/// Engine settings. Every field has a default and can be overridden from the
/// environment with `EngineConfig::from_env`.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub db_path: PathBuf,
    /// Extra attempts after an optimistic-update conflict on a skill state.
    pub max_conflict_retries: u32,
    /// Entries kept in a skill state's inline history.
    pub history_limit: usize,
    pub scope_cache_ttl_secs: i64,
    pub scope_cache_capacity: usize,
    /// Fixed RNG seed for reproducible plans; entropy when unset.
    pub rng_seed: Option<u64>,
    pub log_filter: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            max_conflict_retries: DEFAULT_CONFLICT_RETRIES,
            history_limit: DEFAULT_HISTORY_LIMIT,
            scope_cache_ttl_secs: DEFAULT_SCOPE_TTL_SECS,
            scope_cache_capacity: DEFAULT_SCOPE_CACHE_CAPACITY,
            rng_seed: None,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from any key lookup; unparsable values fall back to
    /// the default for that field.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(path) = lookup("CADENCE_DB") {
            config.db_path = PathBuf::from(path);
        }
        if let Some(seed) = lookup("CADENCE_SEED").and_then(|s| s.trim().parse().ok()) {
            config.rng_seed = Some(seed);
        }
        if let Some(filter) = lookup("CADENCE_LOG") {
            config.log_filter = filter;
        }
        if let Some(n) = lookup("CADENCE_CONFLICT_RETRIES").and_then(|s| s.trim().parse().ok()) {
            config.max_conflict_retries = n;
        }
        if let Some(n) = lookup("CADENCE_HISTORY_LIMIT").and_then(|s| s.trim().parse().ok()) {
            config.history_limit = n;
        }
        if let Some(n) = lookup("CADENCE_SCOPE_TTL_SECS").and_then(|s| s.trim().parse().ok()) {
            config.scope_cache_ttl_secs = n;
        }

        config.normalized()
    }

    pub fn normalized(mut self) -> Self {
        self.history_limit = self.history_limit.max(MIN_HISTORY_LIMIT);
        self.scope_cache_ttl_secs = self.scope_cache_ttl_secs.max(0);
        self.scope_cache_capacity = self.scope_cache_capacity.max(1);
        self
    }
}

fn default_db_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("cadence")
        .join(DEFAULT_DB_NAME)
}
