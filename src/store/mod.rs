use std::collections::HashMap;

use crate::models::popover::{CandidateQuery, Counter, Popover, PopoverFields, PostStatus};

pub mod sqlite;

/// Unified data-access trait. Every database operation goes through here.
/// Implementation: `SqliteStore` (wraps rusqlite/r2d2).
pub trait Store: Send + Sync {
    // ── Lifecycle ───────────────────────────────────────────────────
    fn run_migrations(&self) -> Result<(), String>;
    fn seed_defaults(&self) -> Result<(), String>;

    // ── Settings ────────────────────────────────────────────────────
    fn setting_get(&self, key: &str) -> Option<String>;
    fn setting_get_or(&self, key: &str, default: &str) -> String {
        self.setting_get(key).unwrap_or_else(|| default.to_string())
    }
    fn setting_get_i64(&self, key: &str) -> i64 {
        self.setting_get(key)
            .and_then(|v| v.parse().ok())
            .unwrap_or(0)
    }
    fn setting_set(&self, key: &str, value: &str) -> Result<(), String>;
    fn setting_all(&self) -> HashMap<String, String>;

    // ── Popovers ────────────────────────────────────────────────────
    fn popover_find_by_id(&self, id: i64) -> Option<Popover>;
    fn popover_lookup(&self, id: i64) -> Result<Option<Popover>, String>;
    fn popover_list(&self, status: Option<PostStatus>, limit: i64, offset: i64) -> Vec<Popover>;
    fn popover_count(&self, status: Option<PostStatus>) -> i64;
    fn popover_candidates(&self, query: &CandidateQuery) -> Result<Vec<Popover>, String>;
    fn popover_create(&self, fields: &PopoverFields) -> Result<i64, String>;
    fn popover_update(&self, id: i64, fields: &PopoverFields) -> Result<(), String>;
    fn popover_update_status(&self, id: i64, status: PostStatus) -> Result<(), String>;
    fn popover_delete(&self, id: i64) -> Result<(), String>;

    // ── Counters ────────────────────────────────────────────────────
    /// Atomic read-modify-write of a single counter on a single record.
    fn popover_increment(
        &self,
        id: i64,
        counter: Counter,
        published_only: bool,
    ) -> Result<Option<i64>, String>;
}
