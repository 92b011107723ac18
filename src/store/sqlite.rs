use std::collections::HashMap;

use crate::db::DbPool;
use crate::models::popover::{CandidateQuery, Counter, Popover, PopoverFields, PostStatus};
use crate::models::settings::Setting;

use super::Store;

/// SQLite-backed implementation of the Store trait.
/// Wraps the r2d2 connection pool and delegates to model methods.
pub struct SqliteStore {
    pub pool: DbPool,
}

impl SqliteStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn new_at(path: &str) -> Result<Self, String> {
        let pool = crate::db::init_pool_at(path).map_err(|e| e.to_string())?;
        Ok(Self { pool })
    }
}

impl Store for SqliteStore {
    // ── Lifecycle ───────────────────────────────────────────────────

    fn run_migrations(&self) -> Result<(), String> {
        crate::db::run_migrations(&self.pool).map_err(|e| e.to_string())
    }

    fn seed_defaults(&self) -> Result<(), String> {
        crate::db::seed_defaults(&self.pool).map_err(|e| e.to_string())
    }

    // ── Settings ────────────────────────────────────────────────────

    fn setting_get(&self, key: &str) -> Option<String> {
        Setting::get(&self.pool, key)
    }

    fn setting_set(&self, key: &str, value: &str) -> Result<(), String> {
        Setting::set(&self.pool, key, value)
    }

    fn setting_all(&self) -> HashMap<String, String> {
        Setting::all(&self.pool)
    }

    // ── Popovers ────────────────────────────────────────────────────

    fn popover_find_by_id(&self, id: i64) -> Option<Popover> {
        Popover::find_by_id(&self.pool, id)
    }

    fn popover_lookup(&self, id: i64) -> Result<Option<Popover>, String> {
        Popover::lookup(&self.pool, id)
    }

    fn popover_list(&self, status: Option<PostStatus>, limit: i64, offset: i64) -> Vec<Popover> {
        Popover::list(&self.pool, status, limit, offset)
    }

    fn popover_count(&self, status: Option<PostStatus>) -> i64 {
        Popover::count(&self.pool, status)
    }

    fn popover_candidates(&self, query: &CandidateQuery) -> Result<Vec<Popover>, String> {
        Popover::candidates(&self.pool, query)
    }

    fn popover_create(&self, fields: &PopoverFields) -> Result<i64, String> {
        Popover::create(&self.pool, fields)
    }

    fn popover_update(&self, id: i64, fields: &PopoverFields) -> Result<(), String> {
        Popover::update(&self.pool, id, fields)
    }

    fn popover_update_status(&self, id: i64, status: PostStatus) -> Result<(), String> {
        Popover::update_status(&self.pool, id, status)
    }

    fn popover_delete(&self, id: i64) -> Result<(), String> {
        Popover::delete(&self.pool, id)
    }

    // ── Counters ────────────────────────────────────────────────────

    fn popover_increment(
        &self,
        id: i64,
        counter: Counter,
        published_only: bool,
    ) -> Result<Option<i64>, String> {
        Popover::increment(&self.pool, id, counter, published_only)
    }
}
